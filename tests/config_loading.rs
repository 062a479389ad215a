use glam::Vec3;
use splat_shadows::cli::CliOverrides;
use splat_shadows::config::MIN_RESOLUTION;
use splat_shadows::ShadowSettings;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn settings_file_overrides_defaults() {
    let mut temp = NamedTempFile::new().expect("temp shadow settings");
    write!(temp, r#"{{"light_position":[1.0,4.0,-2.0],"resolution":512,"far_plane":60.0,"force_render":true}}"#)
        .expect("write shadow settings");

    let settings = ShadowSettings::load(temp.path()).expect("load settings");
    assert_eq!(settings.light_position, Vec3::new(1.0, 4.0, -2.0));
    assert_eq!(settings.resolution, 512);
    assert_eq!(settings.far_plane, 60.0);
    assert!(settings.force_render);
    assert_eq!(settings.near_plane, ShadowSettings::default().near_plane, "unset fields keep defaults");
}

#[test]
fn saved_settings_load_back_unchanged() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("shadow.json");
    let settings = ShadowSettings { resolution: 2048, depth_bias: 0.01, ..Default::default() };
    std::fs::write(&path, serde_json::to_vec_pretty(&settings).expect("serialize")).expect("write settings");
    assert_eq!(ShadowSettings::load(&path).expect("load settings"), settings);
}

#[test]
fn broken_or_missing_files_fall_back_to_defaults() {
    let dir = tempdir().expect("temp dir");
    assert!(ShadowSettings::load(dir.path().join("missing.json")).is_err());
    assert_eq!(ShadowSettings::load_or_default(dir.path().join("missing.json")), ShadowSettings::default());

    let mut temp = NamedTempFile::new().expect("temp shadow settings");
    write!(temp, "{{ not json").expect("write broken settings");
    assert_eq!(ShadowSettings::load_or_default(temp.path()), ShadowSettings::default());
}

#[test]
fn cli_flags_apply_on_top_of_file_and_get_validated() {
    let mut temp = NamedTempFile::new().expect("temp shadow settings");
    write!(temp, r#"{{"resolution":1024,"near_plane":1.0}}"#).expect("write shadow settings");
    let mut settings = ShadowSettings::load(temp.path()).expect("load settings");

    let cli = CliOverrides::parse(["bake", "--resolution", "4", "--far", "0.5"]).expect("parse flags");
    settings.apply_overrides(&cli.into_settings_overrides());
    assert_eq!(settings.resolution, 4);
    assert!(!settings.is_valid());

    let validated = settings.validated();
    assert_eq!(validated.resolution, MIN_RESOLUTION);
    assert_eq!(validated.near_plane, 1.0);
    assert!(validated.far_plane > validated.near_plane);
    assert!(validated.is_valid());
}

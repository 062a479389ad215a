use crate::config::ShadowSettingsOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const SUPPORTED_FLAGS: &str = "--settings, --splats, --seed, --resolution, --near, --far, --bias, --force";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    settings_path: Option<PathBuf>,
    splat_count: Option<u32>,
    seed: Option<u64>,
    resolution: Option<u32>,
    near_plane: Option<f32>,
    far_plane: Option<f32>,
    depth_bias: Option<f32>,
    force_render: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Supported flags: {SUPPORTED_FLAGS}.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "settings" => overrides.settings_path = Some(PathBuf::from(value)),
                "splats" => {
                    overrides.splat_count =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid splat count '{value}'"))?);
                }
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "resolution" => {
                    overrides.resolution =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid resolution '{value}'"))?);
                }
                "near" => overrides.near_plane = Some(parse_plane("near", &value)?),
                "far" => overrides.far_plane = Some(parse_plane("far", &value)?),
                "bias" => {
                    overrides.depth_bias =
                        Some(value.parse::<f32>().with_context(|| format!("Invalid bias '{value}'"))?);
                }
                "force" => overrides.force_render = Some(parse_bool_flag("force", &value)?),
                _ => bail!("Unknown flag '{flag}'. Supported flags: {SUPPORTED_FLAGS}."),
            }
        }
        Ok(overrides)
    }

    pub fn settings_path(&self) -> Option<&PathBuf> {
        self.settings_path.as_ref()
    }

    pub fn splat_count(&self) -> Option<u32> {
        self.splat_count
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn into_settings_overrides(self) -> ShadowSettingsOverrides {
        ShadowSettingsOverrides {
            resolution: self.resolution,
            near_plane: self.near_plane,
            far_plane: self.far_plane,
            depth_bias: self.depth_bias,
            force_render: self.force_render,
        }
    }
}

fn parse_plane(flag: &str, value: &str) -> Result<f32> {
    let plane = value.parse::<f32>().with_context(|| format!("Invalid {flag} plane '{value}'"))?;
    if !plane.is_finite() {
        bail!("Invalid {flag} plane '{value}'. Use a finite distance.");
    }
    Ok(plane)
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

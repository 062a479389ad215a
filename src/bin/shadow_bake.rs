use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use splat_shadows::cli::CliOverrides;
use splat_shadows::gpu::{coverage, read_depth_face, GpuContext, GpuSplatSet, WgpuShadowBackend};
use splat_shadows::shadow::ShadowContext;
use splat_shadows::splat::{encode_splats, SplatPoint};
use splat_shadows::{CubeFace, RenderOutcome, ShadowRenderer, ShadowSettings};

const DEFAULT_SPLAT_COUNT: u32 = 4096;
const DEFAULT_SEED: u64 = 0x5eed;

fn main() -> Result<()> {
    env_logger::init();
    let cli = CliOverrides::parse_from_env()?;
    let mut settings = cli.settings_path().map(ShadowSettings::load_or_default).unwrap_or_default();
    let splat_count = cli.splat_count().unwrap_or(DEFAULT_SPLAT_COUNT);
    let seed = cli.seed().unwrap_or(DEFAULT_SEED);
    let overrides = cli.into_settings_overrides();
    if !overrides.is_empty() {
        log::info!("Applying CLI overrides: {}", overrides.applied_fields().join(", "));
    }
    settings.apply_overrides(&overrides);

    let gpu = GpuContext::headless_blocking()?;
    log::info!("Baking {splat_count} splats on {} ({:?})", gpu.adapter_info.name, gpu.adapter_info.backend);
    let mut backend = WgpuShadowBackend::new(&gpu.device, &gpu.queue);
    let points = random_shell(splat_count, settings.light_position, seed);
    let splats = GpuSplatSet::upload(&gpu.device, &gpu.queue, &encode_splats(&points));

    let mut renderer = ShadowRenderer::new(settings);
    renderer.initialize(&mut backend, ShadowContext::default())?;
    let mut encoder = backend.create_encoder("Splat Shadow Bake");
    let outcome = renderer.render(&mut backend, &mut encoder, &splats)?;
    backend.submit(encoder);
    if let RenderOutcome::Skipped(reason) = outcome {
        log::warn!("Shadow render skipped: {reason:?}");
        return Ok(());
    }

    let targets = renderer.face_targets().context("Renderer has no face targets after rendering")?;
    for face in CubeFace::ALL {
        let depths = read_depth_face(&gpu.device, &gpu.queue, targets[face.index()])
            .with_context(|| format!("Failed to read back face {}", face.label()))?;
        let nearest = depths.iter().copied().fold(1.0f32, f32::min);
        println!("{:>3}  coverage {:>6.2}%  nearest {nearest:.5}", face.label(), coverage(&depths) * 100.0);
    }
    renderer.shutdown(&mut backend);
    Ok(())
}

/// Splats scattered on a thick shell around the light so every face sees casters.
fn random_shell(count: u32, center: Vec3, seed: u64) -> Vec<SplatPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let direction =
                Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
            let distance = rng.gen_range(3.0..8.0);
            let rotation = Quat::from_euler(
                glam::EulerRot::XYZ,
                rng.gen_range(0.0..std::f32::consts::TAU),
                rng.gen_range(0.0..std::f32::consts::TAU),
                rng.gen_range(0.0..std::f32::consts::TAU),
            );
            SplatPoint {
                position: center + direction * distance,
                rotation,
                scale: Vec3::new(rng.gen_range(0.05..0.3), rng.gen_range(0.05..0.3), rng.gen_range(0.02..0.1)),
                color: Vec3::new(rng.gen(), rng.gen(), rng.gen()),
                opacity: rng.gen_range(0.4..1.0),
            }
        })
        .collect()
}

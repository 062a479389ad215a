use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const MIN_RESOLUTION: u32 = 16;
/// Smallest gap kept between the near and far planes.
pub const MIN_PLANE_SEPARATION: f32 = 0.1;

/// Point light and cube shadow settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default)]
    pub light_position: Vec3,
    /// Carried for hosts that orient the light; cube faces are always world-axis aligned.
    #[serde(default = "ShadowSettings::default_light_rotation")]
    pub light_rotation: Quat,
    #[serde(default = "ShadowSettings::default_resolution")]
    pub resolution: u32,
    #[serde(default = "ShadowSettings::default_near_plane")]
    pub near_plane: f32,
    #[serde(default = "ShadowSettings::default_far_plane")]
    pub far_plane: f32,
    #[serde(default = "ShadowSettings::default_depth_bias")]
    pub depth_bias: f32,
    /// Footprint fragments whose Gaussian opacity falls below this write no depth.
    #[serde(default = "ShadowSettings::default_caster_alpha_cutoff")]
    pub caster_alpha_cutoff: f32,
    /// Debug: render every frame and never settle to clean.
    #[serde(default)]
    pub force_render: bool,
}

impl ShadowSettings {
    const fn default_light_rotation() -> Quat {
        Quat::IDENTITY
    }

    const fn default_resolution() -> u32 {
        1024
    }

    const fn default_near_plane() -> f32 {
        0.5
    }

    const fn default_far_plane() -> f32 {
        100.0
    }

    const fn default_depth_bias() -> f32 {
        0.005
    }

    const fn default_caster_alpha_cutoff() -> f32 {
        0.2
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            light_position: Vec3::ZERO,
            light_rotation: Self::default_light_rotation(),
            resolution: Self::default_resolution(),
            near_plane: Self::default_near_plane(),
            far_plane: Self::default_far_plane(),
            depth_bias: Self::default_depth_bias(),
            caster_alpha_cutoff: Self::default_caster_alpha_cutoff(),
            force_render: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowSettingsOverrides {
    pub resolution: Option<u32>,
    pub near_plane: Option<f32>,
    pub far_plane: Option<f32>,
    pub depth_bias: Option<f32>,
    pub force_render: Option<bool>,
}

impl ShadowSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read shadow settings {}", path.display()))?;
        let settings = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse shadow settings {}", path.display()))?;
        Ok(settings)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!(target: "splat_shadows::config", "{err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ShadowSettingsOverrides) {
        if let Some(resolution) = overrides.resolution {
            self.resolution = resolution;
        }
        if let Some(near) = overrides.near_plane {
            self.near_plane = near;
        }
        if let Some(far) = overrides.far_plane {
            self.far_plane = far;
        }
        if let Some(bias) = overrides.depth_bias {
            self.depth_bias = bias;
        }
        if let Some(force) = overrides.force_render {
            self.force_render = force;
        }
    }

    /// Copy with resolution and planes corrected into a usable range. Never fails.
    pub fn validated(&self) -> Self {
        let mut settings = *self;
        if settings.resolution < MIN_RESOLUTION {
            log::warn!(
                target: "splat_shadows::config",
                "shadow resolution {} below minimum, clamping to {MIN_RESOLUTION}",
                settings.resolution
            );
            settings.resolution = MIN_RESOLUTION;
        }
        if !settings.near_plane.is_finite() || settings.near_plane <= 0.0 {
            log::warn!(
                target: "splat_shadows::config",
                "near plane {} unusable, resetting to {}",
                settings.near_plane,
                Self::default_near_plane()
            );
            settings.near_plane = Self::default_near_plane();
        }
        if !settings.far_plane.is_finite() || settings.far_plane <= settings.near_plane {
            let far = settings.near_plane + MIN_PLANE_SEPARATION;
            log::warn!(
                target: "splat_shadows::config",
                "far plane {} does not exceed near plane {}, forcing {far}",
                settings.far_plane,
                settings.near_plane
            );
            settings.far_plane = far;
        }
        settings
    }

    pub fn is_valid(&self) -> bool {
        *self == self.validated()
    }
}

impl ShadowSettingsOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.resolution.is_some() {
            fields.push("resolution");
        }
        if self.near_plane.is_some() {
            fields.push("near");
        }
        if self.far_plane.is_some() {
            fields.push("far");
        }
        if self.depth_bias.is_some() {
            fields.push("bias");
        }
        if self.force_render.is_some() {
            fields.push("force");
        }
        fields
    }
}

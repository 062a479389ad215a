use glam::Vec3;

use crate::splat::ContentHash;

/// Everything that invalidates the six depth faces when it changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirtyInputs {
    pub light_position: Vec3,
    pub resolution: u32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub splat_scale: f32,
    /// Splats surviving filtering; shadow buffers are sized to it.
    pub active_splat_count: u32,
    /// `None` while no splat asset is bound.
    pub asset_version: Option<ContentHash>,
}

/// Change-detection gate in front of the shadow pipeline.
///
/// Starts dirty. Only [`DirtyTracker::complete_render`] cleans it, and never while
/// force-render is on.
#[derive(Clone, Debug)]
pub struct DirtyTracker {
    dirty: bool,
    snapshot: Option<DirtyInputs>,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self { dirty: true, snapshot: None }
    }
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn snapshot(&self) -> Option<&DirtyInputs> {
        self.snapshot.as_ref()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_render(&self, current: &DirtyInputs, force_render: bool) -> bool {
        self.dirty || force_render || self.has_changed(current)
    }

    pub fn has_changed(&self, current: &DirtyInputs) -> bool {
        let Some(previous) = self.snapshot.as_ref() else {
            return true;
        };
        // Without a bound asset this still reports a change when a version was recorded before.
        !positions_match(previous.light_position, current.light_position)
            || previous.resolution != current.resolution
            || !approximately(previous.near_plane, current.near_plane)
            || !approximately(previous.far_plane, current.far_plane)
            || !approximately(previous.splat_scale, current.splat_scale)
            || previous.active_splat_count != current.active_splat_count
            || previous.asset_version != current.asset_version
    }

    pub fn record_snapshot(&mut self, current: DirtyInputs) {
        self.snapshot = Some(current);
    }

    /// Commits a finished six-face render.
    pub fn complete_render(&mut self, current: DirtyInputs, force_render: bool) {
        if !force_render {
            self.dirty = false;
        }
        self.record_snapshot(current);
    }
}

fn positions_match(a: Vec3, b: Vec3) -> bool {
    a.distance_squared(b) < 1e-10
}

fn approximately(a: f32, b: f32) -> bool {
    (b - a).abs() < (1e-6 * a.abs().max(b.abs())).max(f32::EPSILON * 8.0)
}

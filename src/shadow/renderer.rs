use std::fmt;

use glam::Vec3;

use super::backend::{DepthShader, FaceTargetDescriptor, KernelInfo, ShadowBackend, ShadowKernel};
use super::dirty::{DirtyInputs, DirtyTracker};
use super::faces::{CubeFace, CUBE_FACE_COUNT};
use super::layout::material_property;
use super::resources::ShadowResources;
use super::stages::{run_shadow_stages, FaceTargets, ShadowFrame, StageSummary};
use crate::config::ShadowSettings;
use crate::splat::{MaterialParameters, SplatRenderState, SplatSource};

#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    /// Fatal; the renderer disables itself.
    #[error("splat shadow configuration error: {0}")]
    Configuration(String),
    #[error("expected {expected} shadow face targets, got {actual}")]
    FaceTargetCount { expected: usize, actual: usize },
    #[error("splat shadow renderer is disabled")]
    Disabled,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Why a requested render did no GPU work. A skip never cleans the dirty state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing changed since the last full render.
    Clean,
    NoSplats,
    /// The primary renderer's buffers are missing or were released.
    InputsUnavailable,
    /// Shadow buffers could not be allocated this frame; retried next frame.
    BuffersUnavailable,
    /// The depth program or the owned face targets could not be created; retried next frame.
    ResourcesUnavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered { splats: u32, summary: StageSummary },
    Skipped(SkipReason),
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered { .. })
    }
}

/// What the renderer needs at initialization.
#[derive(Clone, Debug)]
pub struct ShadowContext {
    pub depth_shader: Option<DepthShader>,
}

impl Default for ShadowContext {
    fn default() -> Self {
        Self { depth_shader: Some(DepthShader::builtin()) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Active { shared: KernelInfo, view: KernelInfo },
    Disabled,
}

/// Targets produced by [`ShadowRenderer::host_pass`], to be bound under their global names.
pub struct HostPassOutput<T> {
    pub targets: [T; CUBE_FACE_COUNT],
    pub outcome: RenderOutcome,
}

impl<T> HostPassOutput<T> {
    pub fn bindings(&self) -> impl Iterator<Item = (&'static str, &T)> + '_ {
        CubeFace::ALL.into_iter().map(move |face| (face.global_texture_name(), &self.targets[face.index()]))
    }
}

impl<T> fmt::Debug for HostPassOutput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostPassOutput").field("outcome", &self.outcome).finish_non_exhaustive()
    }
}

enum TargetSource<'a, T> {
    Host(&'a [T; CUBE_FACE_COUNT]),
    Owned,
}

/// Point-light cube shadows for one splat renderer.
///
/// Lifecycle is explicit: [`initialize`](Self::initialize) before the first frame,
/// [`shutdown`](Self::shutdown) to release everything. Settings may change at any time.
pub struct ShadowRenderer<B: ShadowBackend> {
    settings: ShadowSettings,
    tracker: DirtyTracker,
    resources: ShadowResources<B>,
    depth_shader: Option<DepthShader>,
    lifecycle: Lifecycle,
}

impl<B: ShadowBackend> ShadowRenderer<B> {
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            settings: settings.validated(),
            tracker: DirtyTracker::new(),
            resources: ShadowResources::new(),
            depth_shader: None,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn initialize(&mut self, backend: &mut B, context: ShadowContext) -> Result<(), ShadowError> {
        let shared = backend.kernel(ShadowKernel::SharedLightData);
        let view = backend.kernel(ShadowKernel::LightViewData);
        let (Some(shared), Some(view)) = (shared, view) else {
            let missing: Vec<_> = ShadowKernel::ALL
                .into_iter()
                .filter(|kernel| backend.kernel(*kernel).is_none())
                .map(ShadowKernel::entry_point)
                .collect();
            return Err(self.disable(backend, format!("compute kernels missing: {}", missing.join(", "))));
        };
        let Some(shader) = context.depth_shader else {
            return Err(self.disable(backend, "depth caster shader missing".to_string()));
        };
        self.depth_shader = Some(shader);
        self.lifecycle = Lifecycle::Active { shared, view };
        self.tracker.mark_dirty();
        log::debug!(
            target: "splat_shadows::renderer",
            "initialized (group widths {} / {})",
            shared.group_size_x,
            view.group_size_x
        );
        Ok(())
    }

    fn disable(&mut self, backend: &mut B, reason: String) -> ShadowError {
        log::error!(target: "splat_shadows::renderer", "disabling splat shadows: {reason}");
        self.resources.release_all(backend);
        self.lifecycle = Lifecycle::Disabled;
        ShadowError::Configuration(reason)
    }

    pub fn shutdown(&mut self, backend: &mut B) {
        self.resources.release_all(backend);
        self.lifecycle = Lifecycle::Uninitialized;
        self.tracker.mark_dirty();
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active { .. })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Clamps and stores new settings. Always invalidates the faces.
    pub fn validate(&mut self, settings: ShadowSettings) {
        self.settings = settings.validated();
        self.tracker.mark_dirty();
    }

    pub fn set_settings(&mut self, settings: ShadowSettings) {
        self.validate(settings);
    }

    pub fn set_light_position(&mut self, position: Vec3) {
        self.settings.light_position = position;
    }

    pub fn set_force_render(&mut self, force: bool) {
        self.settings.force_render = force;
    }

    /// Swaps the caster program; the instance is rebuilt on the next render.
    pub fn set_depth_shader(&mut self, shader: DepthShader) {
        self.depth_shader = Some(shader);
        self.tracker.mark_dirty();
    }

    pub fn mark_dirty(&mut self) {
        self.tracker.mark_dirty();
    }

    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    pub fn resources(&self) -> &ShadowResources<B> {
        &self.resources
    }

    pub fn face_descriptor(&self) -> FaceTargetDescriptor {
        FaceTargetDescriptor::for_resolution(self.settings.resolution)
    }

    /// Self-managed face targets from the last [`render`](Self::render).
    pub fn face_targets(&self) -> Option<[&B::Target; CUBE_FACE_COUNT]> {
        self.resources.face_targets()
    }

    pub fn dirty_inputs(&self, state: &SplatRenderState) -> DirtyInputs {
        DirtyInputs {
            light_position: self.settings.light_position,
            resolution: self.settings.resolution,
            near_plane: self.settings.near_plane,
            far_plane: self.settings.far_plane,
            splat_scale: state.splat_scale,
            active_splat_count: state.active_splat_count.min(state.splat_count),
            asset_version: state.content_version,
        }
    }

    pub fn needs_render(&self, source: &dyn SplatSource<B>) -> bool {
        let current = self.dirty_inputs(&source.render_state());
        self.tracker.needs_render(&current, self.settings.force_render)
    }

    /// Renders into six host-allocated targets built from [`face_descriptor`](Self::face_descriptor).
    pub fn render_to_targets(
        &mut self,
        backend: &mut B,
        stream: &mut B::Stream,
        source: &dyn SplatSource<B>,
        targets: &[B::Target],
    ) -> Result<RenderOutcome, ShadowError> {
        let Ok(targets) = <&[B::Target; CUBE_FACE_COUNT]>::try_from(targets) else {
            log::error!(
                target: "splat_shadows::renderer",
                "host supplied {} shadow face targets, expected {CUBE_FACE_COUNT}",
                targets.len()
            );
            return Err(ShadowError::FaceTargetCount { expected: CUBE_FACE_COUNT, actual: targets.len() });
        };
        self.render_frame(backend, stream, source, TargetSource::Host(targets))
    }

    /// Renders into the renderer's own six targets, (re)creating them at the current resolution.
    pub fn render(
        &mut self,
        backend: &mut B,
        stream: &mut B::Stream,
        source: &dyn SplatSource<B>,
    ) -> Result<RenderOutcome, ShadowError> {
        self.render_frame(backend, stream, source, TargetSource::Owned)
    }

    /// Writes light position, bias and planes. Runs every frame, rendered or not.
    pub fn push_final_parameters(&self, material: &mut dyn MaterialParameters) {
        material.set_vector(material_property::POINT_LIGHT_POSITION, self.settings.light_position.extend(1.0));
        material.set_float(material_property::SHADOW_BIAS, self.settings.depth_bias);
        material.set_float(material_property::LIGHT_FAR_PLANE, self.settings.far_plane);
        material.set_float(material_property::LIGHT_NEAR_PLANE, self.settings.near_plane);
    }

    /// Per-frame driver for the self-managed path.
    pub fn update(
        &mut self,
        backend: &mut B,
        stream: &mut B::Stream,
        source: &dyn SplatSource<B>,
        material: &mut dyn MaterialParameters,
    ) -> Result<RenderOutcome, ShadowError> {
        self.push_final_parameters(material);
        self.render(backend, stream, source)
    }

    /// Host render-pass integration: allocates six targets through `allocate` only when
    /// a render is due and the splats are usable, then renders into them. `None` means
    /// the host's previous targets are still current; targets from a skipped render are
    /// dropped undrawn.
    pub fn host_pass<F>(
        &mut self,
        backend: &mut B,
        stream: &mut B::Stream,
        source: &dyn SplatSource<B>,
        allocate: F,
    ) -> Result<Option<HostPassOutput<B::Target>>, ShadowError>
    where
        F: FnOnce(&mut B, &FaceTargetDescriptor) -> anyhow::Result<[B::Target; CUBE_FACE_COUNT]>,
    {
        if !self.is_enabled() {
            return Err(ShadowError::Disabled);
        }
        if !self.needs_render(source) {
            return Ok(None);
        }
        if let Some(reason) = unusable_splats(source) {
            log::debug!(target: "splat_shadows::renderer", "host shadow pass skipped: {reason:?}");
            return Ok(None);
        }
        let descriptor = self.face_descriptor();
        let targets = allocate(backend, &descriptor)?;
        match self.render_frame(backend, stream, source, TargetSource::Host(&targets))? {
            RenderOutcome::Skipped(reason) => {
                log::debug!(target: "splat_shadows::renderer", "host shadow pass skipped: {reason:?}");
                Ok(None)
            }
            outcome => Ok(Some(HostPassOutput { targets, outcome })),
        }
    }

    fn render_frame(
        &mut self,
        backend: &mut B,
        stream: &mut B::Stream,
        source: &dyn SplatSource<B>,
        target_source: TargetSource<'_, B::Target>,
    ) -> Result<RenderOutcome, ShadowError> {
        let Lifecycle::Active { shared: shared_kernel, view: view_kernel } = self.lifecycle else {
            return Err(ShadowError::Disabled);
        };
        let state = source.render_state();
        let current = self.dirty_inputs(&state);
        let force = self.settings.force_render;
        if !self.tracker.needs_render(&current, force) {
            return Ok(RenderOutcome::Skipped(SkipReason::Clean));
        }
        if let Some(reason) = unusable_splats(source) {
            log::debug!(target: "splat_shadows::renderer", "shadow render skipped: {reason:?}");
            return Ok(RenderOutcome::Skipped(reason));
        }
        let active = current.active_splat_count;
        let Some(inputs) = source.gpu_inputs() else {
            return Ok(RenderOutcome::Skipped(SkipReason::InputsUnavailable));
        };

        let shader = self
            .depth_shader
            .as_ref()
            .ok_or_else(|| ShadowError::Configuration("depth caster shader missing".to_string()))?;
        if let Err(err) = self.resources.ensure_program(backend, shader) {
            log::warn!(target: "splat_shadows::renderer", "shadow render skipped: {err:#}");
            return Ok(RenderOutcome::Skipped(SkipReason::ResourcesUnavailable));
        }
        if let Err(err) = self.resources.ensure_buffers(backend, active) {
            log::debug!(target: "splat_shadows::renderer", "shadow render skipped: {err:#}");
            return Ok(RenderOutcome::Skipped(SkipReason::BuffersUnavailable));
        }
        if matches!(target_source, TargetSource::Owned) {
            let descriptor = self.face_descriptor();
            if let Err(err) = self.resources.ensure_face_targets(backend, &descriptor) {
                log::warn!(target: "splat_shadows::renderer", "shadow render skipped: {err:#}");
                return Ok(RenderOutcome::Skipped(SkipReason::ResourcesUnavailable));
            }
        }

        let (Some((shared_data, view_data)), Some(program)) = (self.resources.buffers(), self.resources.program())
        else {
            log::debug!(target: "splat_shadows::renderer", "shadow buffers not ready, shadow render skipped");
            return Ok(RenderOutcome::Skipped(SkipReason::BuffersUnavailable));
        };
        let targets = match target_source {
            TargetSource::Host(targets) => FaceTargets::Host(targets),
            TargetSource::Owned => match self.resources.face_targets() {
                Some(targets) => FaceTargets::Owned(targets),
                None => return Ok(RenderOutcome::Skipped(SkipReason::ResourcesUnavailable)),
            },
        };
        let state = SplatRenderState { active_splat_count: active, ..state };
        let frame = ShadowFrame {
            settings: &self.settings,
            state: &state,
            inputs: &inputs,
            shared_data,
            view_data,
            program,
            shared_kernel,
            view_kernel,
        };
        let summary = run_shadow_stages(backend, stream, &frame, &targets)?;
        self.tracker.complete_render(current, force);
        Ok(RenderOutcome::Rendered { splats: active, summary })
    }
}

/// Why the bound splats cannot feed a render this frame, if they cannot.
fn unusable_splats<B: ShadowBackend>(source: &dyn SplatSource<B>) -> Option<SkipReason> {
    let state = source.render_state();
    if !state.has_asset() || state.active_splat_count.min(state.splat_count) == 0 {
        return Some(SkipReason::NoSplats);
    }
    if !source.gpu_inputs().is_some_and(|inputs| inputs.is_valid()) {
        return Some(SkipReason::InputsUnavailable);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::recording::{RecordedSplatSource, RecordedStream, RecordingBackend, RecordingOptions};
    use crate::splat::PropertyBlock;
    use glam::Vec4;

    fn active_renderer(backend: &mut RecordingBackend) -> ShadowRenderer<RecordingBackend> {
        let mut renderer = ShadowRenderer::new(ShadowSettings { resolution: 64, ..Default::default() });
        renderer.initialize(backend, ShadowContext::default()).unwrap();
        renderer
    }

    #[test]
    fn missing_kernel_disables_renderer() {
        let mut backend = RecordingBackend::with_options(RecordingOptions { view_kernel: false, ..Default::default() });
        let mut renderer = ShadowRenderer::new(ShadowSettings::default());
        let err = renderer.initialize(&mut backend, ShadowContext::default()).unwrap_err();
        assert!(matches!(err, ShadowError::Configuration(ref msg) if msg.contains("calc_light_view_data")));
        assert!(!renderer.is_enabled());
    }

    #[test]
    fn missing_depth_shader_disables_renderer() {
        let mut backend = RecordingBackend::new();
        let mut renderer = ShadowRenderer::new(ShadowSettings::default());
        let err = renderer.initialize(&mut backend, ShadowContext { depth_shader: None }).unwrap_err();
        assert!(matches!(err, ShadowError::Configuration(_)));
        assert!(!renderer.is_enabled());
    }

    #[test]
    fn render_before_initialize_is_rejected() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 8);
        let mut renderer = ShadowRenderer::new(ShadowSettings::default());
        let mut stream = RecordedStream::new();
        let err = renderer.render(&mut backend, &mut stream, &source).unwrap_err();
        assert!(matches!(err, ShadowError::Disabled));
        assert!(stream.is_empty());
    }

    #[test]
    fn second_frame_without_changes_records_nothing() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 100);
        let mut renderer = active_renderer(&mut backend);
        let mut stream = RecordedStream::new();
        assert!(renderer.render(&mut backend, &mut stream, &source).unwrap().is_rendered());
        assert_eq!((stream.dispatch_count(), stream.draw_count()), (7, 6));
        stream.clear();
        let outcome = renderer.render(&mut backend, &mut stream, &source).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::Clean));
        assert!(stream.is_empty());
    }

    #[test]
    fn settings_changes_are_clamped_and_invalidate() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 10);
        let mut renderer = active_renderer(&mut backend);
        let mut stream = RecordedStream::new();
        renderer.render(&mut backend, &mut stream, &source).unwrap();
        renderer.validate(ShadowSettings { resolution: 2, near_plane: 5.0, far_plane: 1.0, ..Default::default() });
        assert_eq!(renderer.settings().resolution, 16);
        assert!(renderer.settings().far_plane > 5.0);
        assert!(renderer.needs_render(&source));
        assert_eq!(renderer.face_descriptor().size, 16);
    }

    #[test]
    fn parameters_are_pushed_even_on_clean_frames() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 10);
        let mut renderer = active_renderer(&mut backend);
        renderer.set_light_position(Vec3::new(0.0, 4.0, 0.0));
        let mut stream = RecordedStream::new();
        let mut block = PropertyBlock::new();
        renderer.update(&mut backend, &mut stream, &source, &mut block).unwrap();
        block.clear();
        let outcome = renderer.update(&mut backend, &mut stream, &source, &mut block).unwrap();
        assert!(!outcome.is_rendered());
        assert_eq!(block.vector(material_property::POINT_LIGHT_POSITION), Some(Vec4::new(0.0, 4.0, 0.0, 1.0)));
        assert_eq!(block.float(material_property::SHADOW_BIAS), Some(0.005));
        assert_eq!(block.float(material_property::LIGHT_NEAR_PLANE), Some(0.5));
        assert_eq!(block.float(material_property::LIGHT_FAR_PLANE), Some(100.0));
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 10);
        let mut renderer = active_renderer(&mut backend);
        let mut stream = RecordedStream::new();
        renderer.render(&mut backend, &mut stream, &source).unwrap();
        renderer.shutdown(&mut backend);
        renderer.shutdown(&mut backend);
        assert!(renderer.resources().is_empty());
        assert!(!renderer.is_enabled());
        let stats = backend.stats();
        assert_eq!((stats.buffers_released, stats.targets_released), (2, 6));
    }

    #[test]
    fn host_pass_reports_named_bindings() {
        let mut backend = RecordingBackend::new();
        let source = RecordedSplatSource::new(&mut backend, 10);
        let mut renderer = active_renderer(&mut backend);
        let mut stream = RecordedStream::new();
        let output = renderer
            .host_pass(&mut backend, &mut stream, &source, |backend, descriptor| {
                Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
            })
            .unwrap()
            .expect("first frame renders");
        assert!(output.outcome.is_rendered());
        let names: Vec<_> = output.bindings().map(|(name, _)| name).collect();
        assert_eq!(names[0], "shadow_map_face_px");
        assert_eq!(names[5], "shadow_map_face_nz");
        assert!(output.targets.iter().all(|target| target.size == 64));
        let again = renderer
            .host_pass(&mut backend, &mut stream, &source, |_, _| anyhow::bail!("must not allocate"))
            .unwrap();
        assert!(again.is_none());
    }
}

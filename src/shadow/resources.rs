use anyhow::{Context, Result};

use super::backend::{DepthProgram, DepthShader, FaceTargetDescriptor, ShadowBackend, StructuredBuffer};
use super::faces::{CubeFace, CUBE_FACE_COUNT};
use super::layout::ElementLayout;

/// GPU resources owned exclusively by the shadow subsystem.
///
/// Buffers follow the active splat count exactly and are replaced wholesale whenever
/// the count or element layout changes. Face targets exist only on the self-managed path.
pub struct ShadowResources<B: ShadowBackend> {
    shared_data: Option<B::Buffer>,
    view_data: Option<B::Buffer>,
    face_targets: [Option<B::Target>; CUBE_FACE_COUNT],
    program: Option<B::Program>,
}

impl<B: ShadowBackend> Default for ShadowResources<B> {
    fn default() -> Self {
        Self { shared_data: None, view_data: None, face_targets: Default::default(), program: None }
    }
}

impl<B: ShadowBackend> ShadowResources<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers plus self-managed face targets.
    pub fn ensure(&mut self, backend: &mut B, active_splat_count: u32, resolution: u32) -> Result<()> {
        self.ensure_buffers(backend, active_splat_count)?;
        self.ensure_face_targets(backend, &FaceTargetDescriptor::for_resolution(resolution))
    }

    pub fn ensure_buffers(&mut self, backend: &mut B, active_splat_count: u32) -> Result<()> {
        let up_to_date = buffer_matches::<B>(self.shared_data.as_ref(), ElementLayout::SHARED_LIGHT_DATA, active_splat_count)
            && buffer_matches::<B>(self.view_data.as_ref(), ElementLayout::LIGHT_VIEW_DATA, active_splat_count);
        if up_to_date {
            return Ok(());
        }
        self.release_buffers(backend);
        if active_splat_count == 0 {
            return Ok(());
        }
        log::debug!(target: "splat_shadows::resources", "allocating shadow buffers for {active_splat_count} splats");
        let shared = backend
            .create_buffer(ElementLayout::SHARED_LIGHT_DATA, active_splat_count)
            .context("Failed to allocate shared light data buffer")?;
        let view = match backend.create_buffer(ElementLayout::LIGHT_VIEW_DATA, active_splat_count) {
            Ok(view) => view,
            Err(err) => {
                backend.release_buffer(shared);
                return Err(err.context("Failed to allocate light view data buffer"));
            }
        };
        self.shared_data = Some(shared);
        self.view_data = Some(view);
        Ok(())
    }

    pub fn ensure_face_targets(&mut self, backend: &mut B, descriptor: &FaceTargetDescriptor) -> Result<()> {
        for face in CubeFace::ALL {
            let slot = &mut self.face_targets[face.index()];
            if slot.as_ref().is_some_and(|target| descriptor.matches(target)) {
                continue;
            }
            if let Some(stale) = slot.take() {
                backend.release_depth_target(stale);
            }
            log::debug!(
                target: "splat_shadows::resources",
                "creating {}x{} shadow face {}",
                descriptor.size,
                descriptor.size,
                face.label()
            );
            let label = format!("Splat Shadow Face {}", face.label());
            let target = backend
                .create_depth_target(&label, descriptor)
                .with_context(|| format!("Failed to create shadow face target {}", face.label()))?;
            *slot = Some(target);
        }
        Ok(())
    }

    pub fn ensure_program(&mut self, backend: &mut B, shader: &DepthShader) -> Result<&B::Program> {
        let fingerprint = shader.fingerprint();
        let stale = self.program.as_ref().is_some_and(|program| program.fingerprint() != fingerprint);
        if stale {
            self.program = None;
        }
        if self.program.is_none() {
            log::debug!(target: "splat_shadows::resources", "instantiating depth program '{}'", shader.label);
            let program = backend.create_depth_program(shader).context("Failed to create shadow depth program")?;
            self.program = Some(program);
        }
        self.program.as_ref().context("Shadow depth program missing")
    }

    pub fn release_buffers(&mut self, backend: &mut B) {
        if let Some(buffer) = self.shared_data.take() {
            backend.release_buffer(buffer);
        }
        if let Some(buffer) = self.view_data.take() {
            backend.release_buffer(buffer);
        }
    }

    /// Safe from any state, including when nothing was ever allocated.
    pub fn release_all(&mut self, backend: &mut B) {
        self.release_buffers(backend);
        for slot in &mut self.face_targets {
            if let Some(target) = slot.take() {
                backend.release_depth_target(target);
            }
        }
        self.program = None;
    }

    /// Both buffers when allocated and still valid.
    pub fn buffers(&self) -> Option<(&B::Buffer, &B::Buffer)> {
        let shared = self.shared_data.as_ref().filter(|buffer| buffer.is_valid())?;
        let view = self.view_data.as_ref().filter(|buffer| buffer.is_valid())?;
        Some((shared, view))
    }

    pub fn face_targets(&self) -> Option<[&B::Target; CUBE_FACE_COUNT]> {
        let mut targets = Vec::with_capacity(CUBE_FACE_COUNT);
        for slot in &self.face_targets {
            targets.push(slot.as_ref()?);
        }
        targets.try_into().ok()
    }

    pub fn program(&self) -> Option<&B::Program> {
        self.program.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.shared_data.is_none()
            && self.view_data.is_none()
            && self.program.is_none()
            && self.face_targets.iter().all(Option::is_none)
    }
}

fn buffer_matches<B: ShadowBackend>(buffer: Option<&B::Buffer>, layout: ElementLayout, count: u32) -> bool {
    match buffer {
        Some(buffer) => buffer.is_valid() && buffer.element_count() == count && buffer.stride() == layout.stride,
        None => count == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::backend::DepthTarget;
    use crate::shadow::recording::{RecordingBackend, RecordingOptions};

    #[test]
    fn ensure_sizes_buffers_and_faces() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        resources.ensure(&mut backend, 1000, 256).unwrap();
        let (shared, view) = resources.buffers().unwrap();
        assert_eq!(shared.element_count(), 1000);
        assert_eq!(view.element_count(), 1000);
        assert_eq!(shared.stride(), 40);
        assert_eq!(view.stride(), 36);
        let faces = resources.face_targets().unwrap();
        assert!(faces.iter().all(|target| target.size() == 256));
    }

    #[test]
    fn repeated_ensure_allocates_once() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        resources.ensure(&mut backend, 64, 128).unwrap();
        resources.ensure(&mut backend, 64, 128).unwrap();
        assert_eq!(backend.stats().buffers_created, 2);
        assert_eq!(backend.stats().targets_created, 6);
    }

    #[test]
    fn count_change_replaces_both_buffers() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        resources.ensure_buffers(&mut backend, 64).unwrap();
        let before = resources.buffers().map(|(s, v)| (s.id, v.id)).unwrap();
        resources.ensure_buffers(&mut backend, 65).unwrap();
        let (shared, view) = resources.buffers().unwrap();
        assert_ne!((shared.id, view.id), before);
        assert_eq!((shared.element_count(), view.element_count()), (65, 65));
        assert_eq!(backend.stats().buffers_released, 2);
    }

    #[test]
    fn zero_splats_holds_no_buffers() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        resources.ensure_buffers(&mut backend, 8).unwrap();
        resources.ensure_buffers(&mut backend, 0).unwrap();
        assert!(resources.buffers().is_none());
        assert_eq!(backend.stats().buffers_released, 2);
    }

    #[test]
    fn resolution_change_recreates_targets() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        resources.ensure(&mut backend, 4, 128).unwrap();
        resources.ensure(&mut backend, 4, 64).unwrap();
        assert_eq!(backend.stats().targets_created, 12);
        assert_eq!(backend.stats().targets_released, 6);
        assert!(resources.face_targets().unwrap().iter().all(|target| target.size() == 64));
    }

    #[test]
    fn program_recreated_only_when_shader_changes() {
        let mut backend = RecordingBackend::new();
        let mut resources = ShadowResources::new();
        let shader = DepthShader::builtin();
        resources.ensure_program(&mut backend, &shader).unwrap();
        resources.ensure_program(&mut backend, &shader).unwrap();
        assert_eq!(backend.stats().programs_created, 1);
        let edited = DepthShader::new("edited", "// edited caster");
        resources.ensure_program(&mut backend, &edited).unwrap();
        assert_eq!(backend.stats().programs_created, 2);
    }

    #[test]
    fn release_all_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let mut resources: ShadowResources<RecordingBackend> = ShadowResources::new();
        resources.release_all(&mut backend);
        resources.ensure(&mut backend, 16, 32).unwrap();
        resources.ensure_program(&mut backend, &DepthShader::builtin()).unwrap();
        resources.release_all(&mut backend);
        resources.release_all(&mut backend);
        assert!(resources.is_empty());
        assert_eq!(backend.stats().buffers_released, 2);
        assert_eq!(backend.stats().targets_released, 6);
    }

    #[test]
    fn failed_allocation_leaves_nothing_behind() {
        let mut backend = RecordingBackend::with_options(RecordingOptions { fail_buffer_allocation: true, ..Default::default() });
        let mut resources = ShadowResources::new();
        assert!(resources.ensure_buffers(&mut backend, 16).is_err());
        assert!(resources.buffers().is_none());
    }
}

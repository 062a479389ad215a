use glam::{Vec3, Vec4};
use splat_shadows::shadow::layout::material_property;
use splat_shadows::shadow::recording::{
    RecordedCommand, RecordedSplatSource, RecordedStream, RecordedTarget, RecordingBackend, RecordingOptions,
};
use splat_shadows::shadow::{CubeFace, FaceTargetDescriptor, ShadowContext};
use splat_shadows::splat::PropertyBlock;
use splat_shadows::{RenderOutcome, ShadowError, ShadowRenderer, ShadowSettings, SkipReason};

fn settings() -> ShadowSettings {
    ShadowSettings { resolution: 128, light_position: Vec3::new(0.0, 2.0, 0.0), ..Default::default() }
}

fn renderer(backend: &mut RecordingBackend) -> ShadowRenderer<RecordingBackend> {
    let mut renderer = ShadowRenderer::new(settings());
    renderer.initialize(backend, ShadowContext::default()).expect("initialize shadow renderer");
    renderer
}

fn frame(
    renderer: &mut ShadowRenderer<RecordingBackend>,
    backend: &mut RecordingBackend,
    source: &RecordedSplatSource,
) -> (RenderOutcome, RecordedStream) {
    let mut stream = RecordedStream::new();
    let outcome = renderer.render(backend, &mut stream, source).expect("render frame");
    (outcome, stream)
}

#[test]
fn unchanged_frames_record_no_commands() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 1000);
    let mut renderer = renderer(&mut backend);

    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert!(outcome.is_rendered());
    assert_eq!(stream.dispatch_count(), 7);
    assert_eq!(stream.draw_count(), 6);
    assert!(!renderer.tracker().is_dirty());

    for _ in 0..3 {
        let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::Clean));
        assert!(stream.is_empty(), "clean frames must not touch the stream");
    }
}

#[test]
fn light_and_plane_changes_trigger_a_new_render() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 64);
    let mut renderer = renderer(&mut backend);
    frame(&mut renderer, &mut backend, &source);

    renderer.set_light_position(Vec3::new(1.0, 2.0, 0.0));
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());
    assert!(!frame(&mut renderer, &mut backend, &source).0.is_rendered());

    renderer.set_settings(ShadowSettings { far_plane: 30.0, ..*renderer.settings() });
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());

    renderer.mark_dirty();
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());
}

#[test]
fn force_render_keeps_rendering_without_cleaning() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 32);
    let mut renderer = renderer(&mut backend);
    renderer.set_force_render(true);

    for _ in 0..4 {
        let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
        assert!(outcome.is_rendered());
        assert_eq!(stream.len(), 13);
        assert!(renderer.tracker().is_dirty(), "force-render must never settle to clean");
    }

    renderer.set_force_render(false);
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());
    assert!(!renderer.tracker().is_dirty());
    assert_eq!(frame(&mut renderer, &mut backend, &source).0, RenderOutcome::Skipped(SkipReason::Clean));
}

#[test]
fn buffers_follow_the_active_splat_count() {
    let mut backend = RecordingBackend::new();
    let mut source = RecordedSplatSource::new(&mut backend, 1000);
    let mut renderer = renderer(&mut backend);
    frame(&mut renderer, &mut backend, &source);
    assert_eq!(backend.stats().buffers_created, 2);

    source.replace_asset(&mut backend, 300, b"second asset");
    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert!(matches!(outcome, RenderOutcome::Rendered { splats: 300, .. }));
    let stats = backend.stats();
    assert_eq!((stats.buffers_created, stats.buffers_released), (4, 2));
    let (shared, view) = renderer.resources().buffers().expect("shadow buffers");
    assert_eq!((shared.element_count, view.element_count), (300, 300));
    for command in &stream.commands {
        match command {
            RecordedCommand::DispatchShared { group_count, .. } | RecordedCommand::DispatchView { group_count, .. } => {
                assert_eq!(*group_count, 2)
            }
            RecordedCommand::DrawFace { instance_count, .. } => assert_eq!(*instance_count, 300),
        }
    }

    // Same asset, fewer splats surviving filtering. Nothing else changes.
    source.set_active(100);
    let (outcome, _) = frame(&mut renderer, &mut backend, &source);
    assert!(matches!(outcome, RenderOutcome::Rendered { splats: 100, .. }), "{outcome:?}");
    assert_eq!(backend.stats().buffers_created, 6);
    assert_eq!(renderer.resources().buffers().expect("shadow buffers").0.element_count, 100);

    // Nothing changed in shape: buffers stay.
    renderer.mark_dirty();
    frame(&mut renderer, &mut backend, &source);
    assert_eq!(backend.stats().buffers_created, 6);
}

#[test]
fn resolution_change_recreates_face_targets() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    frame(&mut renderer, &mut backend, &source);
    assert_eq!(backend.stats().targets_created, 6);

    renderer.set_settings(ShadowSettings { resolution: 256, ..*renderer.settings() });
    frame(&mut renderer, &mut backend, &source);
    let stats = backend.stats();
    assert_eq!((stats.targets_created, stats.targets_released), (12, 6));
    let targets = renderer.face_targets().expect("owned face targets");
    assert!(targets.iter().all(|target| target.size == 256));
}

#[test]
fn wrong_number_of_host_targets_is_rejected() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    let descriptor = renderer.face_descriptor();
    let targets: Vec<RecordedTarget> = (0..5).map(|_| backend.external_target(&descriptor)).collect();

    let mut stream = RecordedStream::new();
    let err = renderer.render_to_targets(&mut backend, &mut stream, &source, &targets).unwrap_err();
    assert!(matches!(err, ShadowError::FaceTargetCount { expected: 6, actual: 5 }));
    assert!(stream.is_empty());
    assert!(renderer.tracker().is_dirty());
}

#[test]
fn host_targets_receive_every_face_in_order() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    let descriptor = renderer.face_descriptor();
    let targets: Vec<RecordedTarget> = (0..6).map(|_| backend.external_target(&descriptor)).collect();

    let mut stream = RecordedStream::new();
    let outcome = renderer.render_to_targets(&mut backend, &mut stream, &source, &targets).expect("render");
    assert!(outcome.is_rendered());
    let drawn: Vec<(CubeFace, u64)> = stream
        .commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::DrawFace { face, target, .. } => Some((*face, *target)),
            _ => None,
        })
        .collect();
    let expected: Vec<(CubeFace, u64)> = CubeFace::ALL.into_iter().zip(targets.iter().map(|target| target.id)).collect();
    assert_eq!(drawn, expected);
    assert_eq!(backend.stats().targets_created, 0, "host path must not allocate its own targets");
}

#[test]
fn unusable_inputs_skip_without_cleaning() {
    let mut backend = RecordingBackend::new();
    let mut source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);

    source.gpu_ready = false;
    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::InputsUnavailable));
    assert!(stream.is_empty());

    source.gpu_ready = true;
    source.invalidate_inputs();
    assert_eq!(frame(&mut renderer, &mut backend, &source).0, RenderOutcome::Skipped(SkipReason::InputsUnavailable));

    source.unbind();
    assert_eq!(frame(&mut renderer, &mut backend, &source).0, RenderOutcome::Skipped(SkipReason::NoSplats));
    assert!(renderer.tracker().is_dirty());
}

#[test]
fn failed_allocation_is_retried_next_frame() {
    let mut backend = RecordingBackend::with_options(RecordingOptions { fail_buffer_allocation: true, ..Default::default() });
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);

    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::BuffersUnavailable));
    assert!(stream.is_empty());
    assert!(renderer.tracker().is_dirty());

    backend.options_mut().fail_buffer_allocation = false;
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());
}

#[test]
fn host_pass_allocates_only_when_a_render_is_due() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    let mut allocations = 0;

    let mut stream = RecordedStream::new();
    let output = renderer
        .host_pass(&mut backend, &mut stream, &source, |backend, descriptor: &FaceTargetDescriptor| {
            allocations += 1;
            Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
        })
        .expect("host pass")
        .expect("first frame renders");
    assert!(output.outcome.is_rendered());
    let names: Vec<&str> = output.bindings().map(|(name, _)| name).collect();
    assert_eq!(names[0], "shadow_map_face_px");
    assert_eq!(names[5], "shadow_map_face_nz");

    let second = renderer
        .host_pass(&mut backend, &mut stream, &source, |backend, descriptor| {
            allocations += 1;
            Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
        })
        .expect("host pass");
    assert!(second.is_none());
    assert_eq!(allocations, 1);
}

#[test]
fn host_pass_keeps_previous_targets_when_nothing_can_be_drawn() {
    let mut backend = RecordingBackend::new();
    let mut source = RecordedSplatSource::new(&mut backend, 16);
    source.unbind();
    let mut renderer = renderer(&mut backend);
    let mut allocations = 0;

    let mut stream = RecordedStream::new();
    for _ in 0..3 {
        let output = renderer
            .host_pass(&mut backend, &mut stream, &source, |backend, descriptor| {
                allocations += 1;
                Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
            })
            .expect("host pass");
        assert!(output.is_none());
    }
    assert_eq!(allocations, 0);
    assert!(stream.is_empty());
    assert!(renderer.tracker().is_dirty());
}

#[test]
fn host_pass_drops_targets_from_a_skipped_render() {
    let mut backend = RecordingBackend::with_options(RecordingOptions { fail_buffer_allocation: true, ..Default::default() });
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);

    let mut stream = RecordedStream::new();
    let output = renderer
        .host_pass(&mut backend, &mut stream, &source, |backend, descriptor| {
            Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
        })
        .expect("host pass");
    assert!(output.is_none(), "undrawn targets must not reach the host");
    assert!(stream.is_empty());

    backend.options_mut().fail_buffer_allocation = false;
    let output = renderer
        .host_pass(&mut backend, &mut stream, &source, |backend, descriptor| {
            Ok(std::array::from_fn(|_| backend.external_target(descriptor)))
        })
        .expect("host pass");
    assert!(output.is_some_and(|output| output.outcome.is_rendered()));
}

#[test]
fn program_and_target_failures_skip_and_retry() {
    let mut backend = RecordingBackend::with_options(RecordingOptions { fail_program_creation: true, ..Default::default() });
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);

    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::ResourcesUnavailable));
    assert!(stream.is_empty());
    assert!(renderer.is_enabled());

    backend.options_mut().fail_program_creation = false;
    backend.options_mut().fail_target_allocation = true;
    let (outcome, stream) = frame(&mut renderer, &mut backend, &source);
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::ResourcesUnavailable));
    assert!(stream.is_empty());
    assert!(renderer.tracker().is_dirty());

    backend.options_mut().fail_target_allocation = false;
    assert!(frame(&mut renderer, &mut backend, &source).0.is_rendered());
    assert!(!renderer.tracker().is_dirty());
}

#[test]
fn parameters_are_pushed_even_on_clean_frames() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    let mut stream = RecordedStream::new();
    renderer.update(&mut backend, &mut stream, &source, &mut PropertyBlock::new()).expect("first update");

    let mut block = PropertyBlock::new();
    let outcome = renderer.update(&mut backend, &mut stream, &source, &mut block).expect("second update");
    assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::Clean));
    assert_eq!(block.vector(material_property::POINT_LIGHT_POSITION), Some(Vec4::new(0.0, 2.0, 0.0, 1.0)));
    assert_eq!(block.float(material_property::SHADOW_BIAS), Some(settings().depth_bias));
    assert_eq!(block.float(material_property::LIGHT_NEAR_PLANE), Some(settings().near_plane));
    assert_eq!(block.float(material_property::LIGHT_FAR_PLANE), Some(settings().far_plane));
}

#[test]
fn shutdown_releases_everything() {
    let mut backend = RecordingBackend::new();
    let source = RecordedSplatSource::new(&mut backend, 16);
    let mut renderer = renderer(&mut backend);
    frame(&mut renderer, &mut backend, &source);
    renderer.shutdown(&mut backend);

    let stats = backend.stats();
    assert_eq!(stats.buffers_released, stats.buffers_created);
    assert_eq!(stats.targets_released, stats.targets_created);
    assert!(renderer.resources().is_empty());
    let mut stream = RecordedStream::new();
    assert!(matches!(renderer.render(&mut backend, &mut stream, &source), Err(ShadowError::Disabled)));
}

use anyhow::Result;

use super::backend::{FaceDraw, KernelInfo, SharedDispatch, ShadowBackend, ViewDispatch};
use super::faces::{face_projection, view_matrix_for_face, CubeFace, CUBE_FACE_COUNT};
use super::layout::{DrawParamsUniform, SharedParamsUniform, ViewParamsUniform};
use crate::config::ShadowSettings;
use crate::splat::{SplatInputs, SplatRenderState};

pub const SHARED_PROFILE_LABEL: &str = "SplatShadow.CalcSharedData";

/// 1-D grid covering `count` threads at the kernel's declared X width.
pub fn group_count(count: u32, group_size_x: u32) -> u32 {
    count.div_ceil(group_size_x.max(1))
}

/// Where the six faces are drawn.
pub enum FaceTargets<'a, T> {
    /// Handles allocated by the host from the face descriptor.
    Host(&'a [T; CUBE_FACE_COUNT]),
    /// Surfaces owned by the renderer.
    Owned([&'a T; CUBE_FACE_COUNT]),
}

impl<'a, T> FaceTargets<'a, T> {
    pub fn face(&self, face: CubeFace) -> &'a T {
        match self {
            FaceTargets::Host(targets) => &targets[face.index()],
            FaceTargets::Owned(targets) => targets[face.index()],
        }
    }
}

/// Everything one render needs, resolved and validated by the renderer beforehand.
pub struct ShadowFrame<'a, B: ShadowBackend> {
    pub settings: &'a ShadowSettings,
    pub state: &'a SplatRenderState,
    pub inputs: &'a SplatInputs<'a, B>,
    pub shared_data: &'a B::Buffer,
    pub view_data: &'a B::Buffer,
    pub program: &'a B::Program,
    pub shared_kernel: KernelInfo,
    pub view_kernel: KernelInfo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub dispatches: u32,
    pub draws: u32,
    pub shared_groups: u32,
    pub view_groups: u32,
}

/// Shared-data dispatch followed by six {view dispatch, depth draw} pairs, all on one stream.
pub fn run_shadow_stages<B: ShadowBackend>(
    backend: &mut B,
    stream: &mut B::Stream,
    frame: &ShadowFrame<'_, B>,
    targets: &FaceTargets<'_, B::Target>,
) -> Result<StageSummary> {
    let mut summary = StageSummary {
        shared_groups: dispatch_shared_stage(backend, stream, frame)?,
        dispatches: 1,
        ..Default::default()
    };
    for face in CubeFace::ALL {
        summary.view_groups = run_face_stage(backend, stream, frame, face, targets.face(face))?;
        summary.dispatches += 1;
        summary.draws += 1;
    }
    Ok(summary)
}

pub fn dispatch_shared_stage<B: ShadowBackend>(
    backend: &mut B,
    stream: &mut B::Stream,
    frame: &ShadowFrame<'_, B>,
) -> Result<u32> {
    let state = frame.state;
    let groups = group_count(state.active_splat_count, frame.shared_kernel.group_size_x);
    let params = SharedParamsUniform::new(
        state.object_to_world,
        state.splat_scale,
        state.opacity_scale,
        state.active_splat_count,
        state.splat_count,
        frame.inputs.chunk_count(),
        state.format.packed_word(),
    );
    backend.dispatch_shared(
        stream,
        SharedDispatch {
            label: SHARED_PROFILE_LABEL,
            inputs: frame.inputs,
            output: frame.shared_data,
            params,
            group_count: groups,
        },
    )?;
    Ok(groups)
}

pub fn view_params_for_face(
    settings: &ShadowSettings,
    state: &SplatRenderState,
    face: CubeFace,
    chunk_count: u32,
    bits_valid: bool,
) -> ViewParamsUniform {
    let view = view_matrix_for_face(settings.light_position, face);
    let model_view = view * state.object_to_world;
    let projection = face_projection(settings.near_plane, settings.far_plane);
    let size = settings.resolution as f32;
    ViewParamsUniform {
        light_view: view.to_cols_array_2d(),
        light_model_view: model_view.to_cols_array_2d(),
        light_proj: projection.to_cols_array_2d(),
        screen_params: [size, size, settings.near_plane, settings.far_plane],
        counts: [state.active_splat_count, chunk_count, state.format.packed_word(), bits_valid as u32],
    }
}

pub fn draw_params(settings: &ShadowSettings, state: &SplatRenderState) -> DrawParamsUniform {
    let size = settings.resolution as f32;
    DrawParamsUniform {
        screen_params: [size, size, settings.near_plane, settings.far_plane],
        scales: [state.splat_scale, state.opacity_scale, state.point_display_size, settings.caster_alpha_cutoff],
        counts: [state.active_splat_count, 0, 0, 0],
    }
}

fn run_face_stage<B: ShadowBackend>(
    backend: &mut B,
    stream: &mut B::Stream,
    frame: &ShadowFrame<'_, B>,
    face: CubeFace,
    target: &B::Target,
) -> Result<u32> {
    let active = frame.state.active_splat_count;
    let groups = group_count(active, frame.view_kernel.group_size_x);
    let params = view_params_for_face(
        frame.settings,
        frame.state,
        face,
        frame.inputs.chunk_count(),
        frame.inputs.edit_bits_valid(),
    );
    backend.dispatch_view(
        stream,
        ViewDispatch {
            face,
            inputs: frame.inputs,
            shared: frame.shared_data,
            output: frame.view_data,
            params,
            group_count: groups,
        },
    )?;
    backend.draw_face(
        stream,
        FaceDraw {
            face,
            target,
            program: frame.program,
            view_data: frame.view_data,
            order: frame.inputs.order,
            params: draw_params(frame.settings, frame.state),
            instance_count: active,
        },
    )?;
    Ok(groups)
}

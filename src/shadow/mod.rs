//! Point-light cube shadows for splat scenes.
//!
//! A frame runs one shared-data dispatch, then six `{view dispatch, depth draw}` pairs,
//! gated by [`DirtyTracker`] so unchanged frames record nothing.

pub mod backend;
pub mod dirty;
pub mod faces;
pub mod layout;
pub mod recording;
pub mod renderer;
pub mod resources;
pub mod stages;

pub use backend::{
    DepthFormat, DepthProgram, DepthShader, DepthTarget, FaceDraw, FaceTargetDescriptor, KernelInfo,
    SharedDispatch, ShadowBackend, ShadowKernel, StructuredBuffer, ViewDispatch, FAR_DEPTH_CLEAR,
    VERTICES_PER_SPLAT,
};
pub use dirty::{DirtyInputs, DirtyTracker};
pub use faces::{face_projection, project_to_face, view_matrix_for_face, CubeFace, FaceSample, CUBE_FACE_COUNT};
pub use renderer::{HostPassOutput, RenderOutcome, ShadowContext, ShadowError, ShadowRenderer, SkipReason};
pub use resources::ShadowResources;
pub use stages::{group_count, FaceTargets, StageSummary};

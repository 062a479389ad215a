//! wgpu backend for the shadow core, plus the pieces a host needs around it.

pub mod backend;
pub mod context;
pub mod readback;
pub mod sampling;
pub mod splat_set;

pub use backend::{GpuBuffer, GpuDepthProgram, GpuDepthTarget, WgpuShadowBackend, COMPUTE_SHADER_SOURCE};
pub use context::GpuContext;
pub use readback::{coverage, read_buffer_words, read_depth_face};
pub use sampling::{face_bind_group, face_bind_group_layout};
pub use splat_set::GpuSplatSet;

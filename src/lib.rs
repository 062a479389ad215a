pub mod cli;
pub mod config;
pub mod gpu;
pub mod modifier;
pub mod shadow;
pub mod splat;

pub use config::{ShadowSettings, ShadowSettingsOverrides};
pub use shadow::{
    CubeFace, DirtyTracker, RenderOutcome, ShadowBackend, ShadowError, ShadowRenderer, SkipReason,
    CUBE_FACE_COUNT,
};
pub use splat::{SplatInputs, SplatRenderState, SplatSource};

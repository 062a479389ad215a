use std::borrow::Cow;

use anyhow::Result;

use super::faces::CubeFace;
use super::layout::{
    DrawParamsUniform, ElementLayout, SharedParamsUniform, ViewParamsUniform, SHARED_KERNEL_ENTRY,
    VIEW_KERNEL_ENTRY,
};
use crate::splat::{ContentHash, SplatInputs};

pub const VERTICES_PER_SPLAT: u32 = 6;
pub const FAR_DEPTH_CLEAR: f32 = 1.0;

/// GPU structured buffer as seen by the shadow core.
pub trait StructuredBuffer {
    fn element_count(&self) -> u32;
    fn stride(&self) -> u32;

    fn is_valid(&self) -> bool {
        true
    }
}

/// One face's depth surface.
pub trait DepthTarget {
    fn size(&self) -> u32;
    fn format(&self) -> DepthFormat;

    fn is_valid(&self) -> bool {
        true
    }
}

/// Instantiated depth-only caster program.
pub trait DepthProgram {
    fn fingerprint(&self) -> ContentHash;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    #[default]
    Depth32Float,
    Depth16Unorm,
}

/// Everything a host needs to allocate a face target the renderer accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceTargetDescriptor {
    pub size: u32,
    pub depth_format: DepthFormat,
    pub has_color: bool,
    pub mip_level_count: u32,
    pub sample_count: u32,
    /// Faces are read with plain depth loads, never hardware comparison sampling.
    pub comparison_sampling: bool,
}

impl FaceTargetDescriptor {
    pub fn for_resolution(resolution: u32) -> Self {
        Self {
            size: resolution,
            depth_format: DepthFormat::Depth32Float,
            has_color: false,
            mip_level_count: 1,
            sample_count: 1,
            comparison_sampling: false,
        }
    }

    pub fn matches<T: DepthTarget + ?Sized>(&self, target: &T) -> bool {
        target.is_valid() && target.size() == self.size && target.format() == self.depth_format
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadowKernel {
    SharedLightData,
    LightViewData,
}

impl ShadowKernel {
    pub const ALL: [ShadowKernel; 2] = [ShadowKernel::SharedLightData, ShadowKernel::LightViewData];

    pub const fn entry_point(self) -> &'static str {
        match self {
            ShadowKernel::SharedLightData => SHARED_KERNEL_ENTRY,
            ShadowKernel::LightViewData => VIEW_KERNEL_ENTRY,
        }
    }
}

/// Reflection data for a compiled kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelInfo {
    pub entry_point: &'static str,
    pub group_size_x: u32,
}

/// Source of the depth-only caster program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthShader {
    pub label: Cow<'static, str>,
    pub source: Cow<'static, str>,
}

impl DepthShader {
    pub fn new(label: impl Into<Cow<'static, str>>, source: impl Into<Cow<'static, str>>) -> Self {
        Self { label: label.into(), source: source.into() }
    }

    pub fn builtin() -> Self {
        Self::new("splat shadow caster", include_str!("../../assets/shaders/splat_shadow_caster.wgsl"))
    }

    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::of(self.source.as_bytes())
    }
}

pub struct SharedDispatch<'a, B: ShadowBackend + ?Sized> {
    pub label: &'static str,
    pub inputs: &'a SplatInputs<'a, B>,
    pub output: &'a B::Buffer,
    pub params: SharedParamsUniform,
    pub group_count: u32,
}

pub struct ViewDispatch<'a, B: ShadowBackend + ?Sized> {
    pub face: CubeFace,
    pub inputs: &'a SplatInputs<'a, B>,
    pub shared: &'a B::Buffer,
    pub output: &'a B::Buffer,
    pub params: ViewParamsUniform,
    pub group_count: u32,
}

pub struct FaceDraw<'a, B: ShadowBackend + ?Sized> {
    pub face: CubeFace,
    pub target: &'a B::Target,
    pub program: &'a B::Program,
    pub view_data: &'a B::Buffer,
    pub order: &'a B::Buffer,
    pub params: DrawParamsUniform,
    pub instance_count: u32,
}

/// Command-stream seam between the shadow core and a graphics API.
///
/// Every dispatch and draw is appended to `Stream` in call order; the core relies on
/// stream order alone for producer/consumer ordering between stages.
pub trait ShadowBackend {
    type Buffer: StructuredBuffer;
    /// Read-only splat feature texture owned by the primary renderer.
    type Texture;
    type Target: DepthTarget;
    type Program: DepthProgram;
    type Stream;

    /// `None` when the compute program does not export the kernel.
    fn kernel(&self, kernel: ShadowKernel) -> Option<KernelInfo>;

    fn create_buffer(&mut self, layout: ElementLayout, element_count: u32) -> Result<Self::Buffer>;

    fn create_depth_target(&mut self, label: &str, descriptor: &FaceTargetDescriptor) -> Result<Self::Target>;

    fn create_depth_program(&mut self, shader: &DepthShader) -> Result<Self::Program>;

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        drop(buffer);
    }

    fn release_depth_target(&mut self, target: Self::Target) {
        drop(target);
    }

    fn dispatch_shared(&mut self, stream: &mut Self::Stream, dispatch: SharedDispatch<'_, Self>) -> Result<()>;

    fn dispatch_view(&mut self, stream: &mut Self::Stream, dispatch: ViewDispatch<'_, Self>) -> Result<()>;

    /// Clears the target to [`FAR_DEPTH_CLEAR`] and draws `instance_count` quads of
    /// [`VERTICES_PER_SPLAT`] vertices.
    fn draw_face(&mut self, stream: &mut Self::Stream, draw: FaceDraw<'_, Self>) -> Result<()>;
}

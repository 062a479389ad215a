//! A [`ShadowBackend`] that records commands instead of talking to a GPU.
//!
//! Hosts can use it for dry runs; the test-suite uses it to count dispatches and
//! draws per frame.

use anyhow::{bail, Result};

use super::backend::{
    DepthFormat, DepthProgram, DepthShader, DepthTarget, FaceDraw, FaceTargetDescriptor, KernelInfo, SharedDispatch,
    ShadowBackend, ShadowKernel, StructuredBuffer, ViewDispatch, FAR_DEPTH_CLEAR, VERTICES_PER_SPLAT,
};
use super::faces::CubeFace;
use super::layout::{ElementLayout, SharedParamsUniform, ViewParamsUniform, DEFAULT_WORKGROUP_SIZE};
use crate::splat::{ContentHash, EncodedSplats, SplatInputs, SplatRenderState, SplatSource, COLOR_TEXTURE_WIDTH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub id: u64,
    pub element_count: u32,
    pub stride: u32,
    pub valid: bool,
}

impl RecordedBuffer {
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }
}

impl StructuredBuffer for RecordedBuffer {
    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedTarget {
    pub id: u64,
    pub size: u32,
    pub format: DepthFormat,
}

impl DepthTarget for RecordedTarget {
    fn size(&self) -> u32 {
        self.size
    }

    fn format(&self) -> DepthFormat {
        self.format
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedProgram {
    pub id: u64,
    pub fingerprint: ContentHash,
}

impl DepthProgram for RecordedProgram {
    fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedTexture {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub enum RecordedCommand {
    DispatchShared {
        label: &'static str,
        group_count: u32,
        output: u64,
        params: SharedParamsUniform,
    },
    DispatchView {
        face: CubeFace,
        group_count: u32,
        shared: u64,
        output: u64,
        params: ViewParamsUniform,
    },
    DrawFace {
        face: CubeFace,
        label: &'static str,
        target: u64,
        view_data: u64,
        order: u64,
        instance_count: u32,
        vertices_per_instance: u32,
        clear_depth: f32,
    },
}

impl RecordedCommand {
    pub fn is_draw(&self) -> bool {
        matches!(self, RecordedCommand::DrawFace { .. })
    }

    pub fn is_dispatch(&self) -> bool {
        !self.is_draw()
    }
}

/// Ordered command log for one frame.
#[derive(Clone, Debug, Default)]
pub struct RecordedStream {
    pub commands: Vec<RecordedCommand>,
}

impl RecordedStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands.iter().filter(|command| command.is_dispatch()).count()
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|command| command.is_draw()).count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RecordingOptions {
    pub group_size_x: u32,
    pub shared_kernel: bool,
    pub view_kernel: bool,
    pub fail_buffer_allocation: bool,
    pub fail_target_allocation: bool,
    pub fail_program_creation: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            group_size_x: DEFAULT_WORKGROUP_SIZE,
            shared_kernel: true,
            view_kernel: true,
            fail_buffer_allocation: false,
            fail_target_allocation: false,
            fail_program_creation: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordingStats {
    pub buffers_created: u32,
    pub buffers_released: u32,
    pub targets_created: u32,
    pub targets_released: u32,
    pub programs_created: u32,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    options: RecordingOptions,
    stats: RecordingStats,
    next_id: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RecordingOptions) -> Self {
        Self { options, ..Self::default() }
    }

    pub fn options_mut(&mut self) -> &mut RecordingOptions {
        &mut self.options
    }

    pub fn stats(&self) -> RecordingStats {
        self.stats
    }

    /// Buffer standing in for one owned by another renderer; not counted in [`RecordingStats`].
    pub fn external_buffer(&mut self, element_count: u32, stride: u32) -> RecordedBuffer {
        RecordedBuffer { id: self.allocate_id(), element_count, stride, valid: true }
    }

    /// Host-allocated face target; not counted in [`RecordingStats`].
    pub fn external_target(&mut self, descriptor: &FaceTargetDescriptor) -> RecordedTarget {
        RecordedTarget { id: self.allocate_id(), size: descriptor.size, format: descriptor.depth_format }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl ShadowBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;
    type Target = RecordedTarget;
    type Program = RecordedProgram;
    type Stream = RecordedStream;

    fn kernel(&self, kernel: ShadowKernel) -> Option<KernelInfo> {
        let present = match kernel {
            ShadowKernel::SharedLightData => self.options.shared_kernel,
            ShadowKernel::LightViewData => self.options.view_kernel,
        };
        present.then(|| KernelInfo { entry_point: kernel.entry_point(), group_size_x: self.options.group_size_x })
    }

    fn create_buffer(&mut self, layout: ElementLayout, element_count: u32) -> Result<RecordedBuffer> {
        if self.options.fail_buffer_allocation {
            bail!("allocation of '{}' refused", layout.label);
        }
        self.stats.buffers_created += 1;
        Ok(self.external_buffer(element_count, layout.stride))
    }

    fn create_depth_target(&mut self, label: &str, descriptor: &FaceTargetDescriptor) -> Result<RecordedTarget> {
        if self.options.fail_target_allocation {
            bail!("allocation of '{label}' refused");
        }
        self.stats.targets_created += 1;
        Ok(self.external_target(descriptor))
    }

    fn create_depth_program(&mut self, shader: &DepthShader) -> Result<RecordedProgram> {
        if self.options.fail_program_creation {
            bail!("depth program '{}' rejected", shader.label);
        }
        self.stats.programs_created += 1;
        Ok(RecordedProgram { id: self.allocate_id(), fingerprint: shader.fingerprint() })
    }

    fn release_buffer(&mut self, _buffer: RecordedBuffer) {
        self.stats.buffers_released += 1;
    }

    fn release_depth_target(&mut self, _target: RecordedTarget) {
        self.stats.targets_released += 1;
    }

    fn dispatch_shared(&mut self, stream: &mut RecordedStream, dispatch: SharedDispatch<'_, Self>) -> Result<()> {
        stream.commands.push(RecordedCommand::DispatchShared {
            label: dispatch.label,
            group_count: dispatch.group_count,
            output: dispatch.output.id,
            params: dispatch.params,
        });
        Ok(())
    }

    fn dispatch_view(&mut self, stream: &mut RecordedStream, dispatch: ViewDispatch<'_, Self>) -> Result<()> {
        stream.commands.push(RecordedCommand::DispatchView {
            face: dispatch.face,
            group_count: dispatch.group_count,
            shared: dispatch.shared.id,
            output: dispatch.output.id,
            params: dispatch.params,
        });
        Ok(())
    }

    fn draw_face(&mut self, stream: &mut RecordedStream, draw: FaceDraw<'_, Self>) -> Result<()> {
        stream.commands.push(RecordedCommand::DrawFace {
            face: draw.face,
            label: draw.face.profile_label(),
            target: draw.target.id,
            view_data: draw.view_data.id,
            order: draw.order.id,
            instance_count: draw.instance_count,
            vertices_per_instance: VERTICES_PER_SPLAT,
            clear_depth: FAR_DEPTH_CLEAR,
        });
        Ok(())
    }
}

/// Stand-in for the primary splat renderer on top of a [`RecordingBackend`].
#[derive(Clone, Debug)]
pub struct RecordedSplatSource {
    pub state: SplatRenderState,
    pub positions: RecordedBuffer,
    pub other: RecordedBuffer,
    pub chunks: Option<RecordedBuffer>,
    pub color: RecordedTexture,
    pub order: RecordedBuffer,
    pub edit_selected: Option<RecordedBuffer>,
    pub edit_deleted: Option<RecordedBuffer>,
    /// When false, [`SplatSource::gpu_inputs`] reports no GPU setup.
    pub gpu_ready: bool,
}

impl RecordedSplatSource {
    pub fn new(backend: &mut RecordingBackend, splat_count: u32) -> Self {
        let format = EncodedSplats::format();
        Self {
            state: SplatRenderState {
                splat_count,
                active_splat_count: splat_count,
                format,
                content_version: Some(ContentHash::of(&splat_count.to_le_bytes())),
                ..Default::default()
            },
            positions: backend.external_buffer(splat_count * 3, 4),
            other: backend.external_buffer(splat_count * format.other_stride_words(), 4),
            chunks: None,
            color: RecordedTexture { width: COLOR_TEXTURE_WIDTH, height: splat_count.div_ceil(COLOR_TEXTURE_WIDTH) },
            order: backend.external_buffer(splat_count, 4),
            edit_selected: None,
            edit_deleted: None,
            gpu_ready: true,
        }
    }

    /// Replaces the asset with one of `splat_count` splats, as an asset swap in the primary renderer would.
    pub fn replace_asset(&mut self, backend: &mut RecordingBackend, splat_count: u32, version: &[u8]) {
        let mut next = Self::new(backend, splat_count);
        next.state.content_version = Some(ContentHash::of(version));
        next.state.object_to_world = self.state.object_to_world;
        next.state.splat_scale = self.state.splat_scale;
        *self = next;
    }

    pub fn set_active(&mut self, active_splat_count: u32) {
        self.state.active_splat_count = active_splat_count.min(self.state.splat_count);
    }

    pub fn unbind(&mut self) {
        self.state.content_version = None;
        self.state.splat_count = 0;
        self.state.active_splat_count = 0;
    }

    pub fn invalidate_inputs(&mut self) {
        self.positions = self.positions.invalidated();
    }
}

impl SplatSource<RecordingBackend> for RecordedSplatSource {
    fn render_state(&self) -> SplatRenderState {
        self.state
    }

    fn gpu_inputs(&self) -> Option<SplatInputs<'_, RecordingBackend>> {
        if !self.gpu_ready {
            return None;
        }
        Some(SplatInputs {
            positions: &self.positions,
            other: &self.other,
            chunks: self.chunks.as_ref(),
            color: &self.color,
            order: &self.order,
            edit_selected: self.edit_selected.as_ref(),
            edit_deleted: self.edit_deleted.as_ref(),
        })
    }
}

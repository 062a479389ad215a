use anyhow::{bail, Context, Result};
use wgpu::util::DeviceExt;

use crate::shadow::backend::{
    DepthFormat, DepthProgram, DepthShader, DepthTarget, FaceDraw, FaceTargetDescriptor, KernelInfo, SharedDispatch,
    ShadowBackend, ShadowKernel, StructuredBuffer, ViewDispatch, FAR_DEPTH_CLEAR, VERTICES_PER_SPLAT,
};
use crate::shadow::layout::{
    compute_slot, draw_slot, BindingKind, BindingSlot, ElementLayout, CASTER_BINDINGS, CASTER_FRAGMENT_ENTRY,
    CASTER_VERTEX_ENTRY, DEFAULT_WORKGROUP_SIZE, SHARED_KERNEL_BINDINGS, VIEW_KERNEL_BINDINGS, WORKGROUP_SIZE_CONSTANT,
};
use crate::splat::ContentHash;

pub const COMPUTE_SHADER_SOURCE: &str = include_str!("../../assets/shaders/splat_shadow_compute.wgsl");

/// Bound in place of absent optional inputs; large enough for one chunk record.
const DUMMY_STORAGE_SIZE: u64 = 64;

pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    element_count: u32,
    stride: u32,
}

impl GpuBuffer {
    pub fn new(buffer: wgpu::Buffer, element_count: u32, stride: u32) -> Self {
        Self { buffer, element_count, stride }
    }

    /// Read-only storage buffer of raw words, as the primary splat renderer uploads them.
    pub fn from_words(device: &wgpu::Device, label: &str, words: &[u32]) -> Self {
        let contents: &[u32] = if words.is_empty() { &[0] } else { words };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        });
        Self::new(buffer, words.len() as u32, 4)
    }

    pub fn from_records<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, records: &[T]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(records),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        Self::new(buffer, records.len() as u32, std::mem::size_of::<T>() as u32)
    }
}

impl StructuredBuffer for GpuBuffer {
    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn stride(&self) -> u32 {
        self.stride
    }
}

pub fn depth_format_to_wgpu(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        DepthFormat::Depth16Unorm => wgpu::TextureFormat::Depth16Unorm,
    }
}

pub fn depth_format_from_wgpu(format: wgpu::TextureFormat) -> Option<DepthFormat> {
    match format {
        wgpu::TextureFormat::Depth32Float => Some(DepthFormat::Depth32Float),
        wgpu::TextureFormat::Depth16Unorm => Some(DepthFormat::Depth16Unorm),
        _ => None,
    }
}

/// One face's depth surface. `texture` is `None` when only a view was handed over.
pub struct GpuDepthTarget {
    texture: Option<wgpu::Texture>,
    view: wgpu::TextureView,
    size: u32,
    format: DepthFormat,
}

impl GpuDepthTarget {
    pub fn create(device: &wgpu::Device, label: &str, descriptor: &FaceTargetDescriptor) -> Result<Self> {
        if descriptor.has_color || descriptor.sample_count != 1 || descriptor.mip_level_count != 1 {
            bail!("Shadow face targets must be single-sample, single-mip and depth-only");
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: descriptor.size, height: descriptor.size, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: depth_format_to_wgpu(descriptor.depth_format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self::from_texture(texture).context("Shadow face texture has no depth format")
    }

    /// Wraps a host-allocated square depth texture.
    pub fn from_texture(texture: wgpu::Texture) -> Option<Self> {
        let format = depth_format_from_wgpu(texture.format())?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(Self { size: texture.width(), format, view, texture: Some(texture) })
    }

    pub fn from_view(view: wgpu::TextureView, size: u32, format: DepthFormat) -> Self {
        Self { texture: None, view, size, format }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref()
    }
}

impl DepthTarget for GpuDepthTarget {
    fn size(&self) -> u32 {
        self.size
    }

    fn format(&self) -> DepthFormat {
        self.format
    }
}

pub struct GpuDepthProgram {
    pipeline: wgpu::RenderPipeline,
    format: DepthFormat,
    fingerprint: ContentHash,
}

impl DepthProgram for GpuDepthProgram {
    fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }
}

struct KernelPipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

/// wgpu implementation of the shadow command stream.
///
/// Every dispatch and draw binds its own freshly initialised uniform block, so any number
/// of renders may be recorded into one encoder before it is submitted.
pub struct WgpuShadowBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    group_size_x: u32,
    shared_kernel: Option<KernelPipeline>,
    view_kernel: Option<KernelPipeline>,
    caster_layout: wgpu::BindGroupLayout,
    caster_pipeline_layout: wgpu::PipelineLayout,
    dummy_storage: wgpu::Buffer,
}

impl WgpuShadowBackend {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::with_compute_source(device, queue, COMPUTE_SHADER_SOURCE, DEFAULT_WORKGROUP_SIZE)
    }

    /// Kernels the source does not export, or that fail validation, report as missing.
    pub fn with_compute_source(device: &wgpu::Device, queue: &wgpu::Queue, source: &str, group_size_x: u32) -> Self {
        let group_size_x = group_size_x.max(1);
        let module = build_compute_module(device, source);
        let shared_kernel = module.as_ref().and_then(|module| {
            build_kernel(device, module, source, ShadowKernel::SharedLightData, &SHARED_KERNEL_BINDINGS, group_size_x)
        });
        let view_kernel = module.as_ref().and_then(|module| {
            build_kernel(device, module, source, ShadowKernel::LightViewData, &VIEW_KERNEL_BINDINGS, group_size_x)
        });

        let caster_layout = create_bind_group_layout(
            device,
            "Splat Shadow Caster BGL",
            &CASTER_BINDINGS,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        );
        let caster_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Splat Shadow Caster Pipeline Layout"),
            bind_group_layouts: &[&caster_layout],
            push_constant_ranges: &[],
        });

        let dummy_storage = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Splat Shadow Dummy Storage"),
            size: DUMMY_STORAGE_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            group_size_x,
            shared_kernel,
            view_kernel,
            caster_layout,
            caster_pipeline_layout,
            dummy_storage,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) -> wgpu::SubmissionIndex {
        self.queue.submit(Some(encoder.finish()))
    }

    fn check_group_count(&self, groups: u32) -> Result<()> {
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        if groups > max {
            bail!("Splat shadow dispatch needs {groups} workgroups, device allows {max}");
        }
        Ok(())
    }

    fn optional_binding<'a>(&'a self, buffer: Option<&'a GpuBuffer>) -> wgpu::BindingResource<'a> {
        buffer.map(|buffer| &buffer.buffer).unwrap_or(&self.dummy_storage).as_entire_binding()
    }
}

impl ShadowBackend for WgpuShadowBackend {
    type Buffer = GpuBuffer;
    type Texture = wgpu::TextureView;
    type Target = GpuDepthTarget;
    type Program = GpuDepthProgram;
    type Stream = wgpu::CommandEncoder;

    fn kernel(&self, kernel: ShadowKernel) -> Option<KernelInfo> {
        let compiled = match kernel {
            ShadowKernel::SharedLightData => self.shared_kernel.as_ref(),
            ShadowKernel::LightViewData => self.view_kernel.as_ref(),
        };
        compiled.map(|_| KernelInfo { entry_point: kernel.entry_point(), group_size_x: self.group_size_x })
    }

    fn create_buffer(&mut self, layout: ElementLayout, element_count: u32) -> Result<GpuBuffer> {
        let size = layout.byte_size(element_count);
        let max = self.device.limits().max_storage_buffer_binding_size as u64;
        if size == 0 || size > max {
            bail!("'{}' needs {size} bytes, device allows 1..={max}", layout.label);
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(layout.label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(GpuBuffer::new(buffer, element_count, layout.stride))
    }

    fn create_depth_target(&mut self, label: &str, descriptor: &FaceTargetDescriptor) -> Result<GpuDepthTarget> {
        let max = self.device.limits().max_texture_dimension_2d;
        if descriptor.size > max {
            bail!("Shadow face resolution {} exceeds device limit {max}", descriptor.size);
        }
        GpuDepthTarget::create(&self.device, label, descriptor)
    }

    fn create_depth_program(&mut self, shader: &DepthShader) -> Result<GpuDepthProgram> {
        let format = DepthFormat::Depth32Float;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader.label.as_ref()),
            source: wgpu::ShaderSource::Wgsl(shader.source.clone()),
        });
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(shader.label.as_ref()),
            layout: Some(&self.caster_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(CASTER_VERTEX_ENTRY),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(CASTER_FRAGMENT_ENTRY),
                targets: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format_to_wgpu(format),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            bail!("Splat shadow caster '{}' failed validation: {err}", shader.label);
        }
        Ok(GpuDepthProgram { pipeline, format, fingerprint: shader.fingerprint() })
    }

    fn release_buffer(&mut self, buffer: GpuBuffer) {
        buffer.buffer.destroy();
    }

    fn release_depth_target(&mut self, target: GpuDepthTarget) {
        if let Some(texture) = target.texture {
            texture.destroy();
        }
    }

    fn dispatch_shared(&mut self, stream: &mut wgpu::CommandEncoder, dispatch: SharedDispatch<'_, Self>) -> Result<()> {
        let kernel = self.shared_kernel.as_ref().context("Shared light data kernel missing")?;
        self.check_group_count(dispatch.group_count)?;
        let params = create_uniform(&self.device, "Splat Shadow Shared Params", &dispatch.params);
        let inputs = dispatch.inputs;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Splat Shadow Shared BG"),
            layout: &kernel.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: compute_slot::SHARED_PARAMS.binding,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_POS.binding,
                    resource: inputs.positions.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_OTHER.binding,
                    resource: inputs.other.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_CHUNKS.binding,
                    resource: self.optional_binding(inputs.chunks),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_COLOR.binding,
                    resource: wgpu::BindingResource::TextureView(inputs.color),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SHARED_DATA_OUT.binding,
                    resource: dispatch.output.buffer.as_entire_binding(),
                },
            ],
        });
        let mut pass = stream.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(dispatch.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        if dispatch.group_count > 0 {
            pass.dispatch_workgroups(dispatch.group_count, 1, 1);
        }
        Ok(())
    }

    fn dispatch_view(&mut self, stream: &mut wgpu::CommandEncoder, dispatch: ViewDispatch<'_, Self>) -> Result<()> {
        let kernel = self.view_kernel.as_ref().context("Light view data kernel missing")?;
        self.check_group_count(dispatch.group_count)?;
        let params = create_uniform(&self.device, "Splat Shadow View Params", &dispatch.params);
        let inputs = dispatch.inputs;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Splat Shadow View BG"),
            layout: &kernel.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: compute_slot::VIEW_PARAMS.binding,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_POS.binding,
                    resource: inputs.positions.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_CHUNKS.binding,
                    resource: self.optional_binding(inputs.chunks),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SPLAT_COLOR.binding,
                    resource: wgpu::BindingResource::TextureView(inputs.color),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::SHARED_DATA_IN.binding,
                    resource: dispatch.shared.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::VIEW_DATA_OUT.binding,
                    resource: dispatch.output.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::EDIT_SELECTED.binding,
                    resource: self.optional_binding(inputs.edit_selected),
                },
                wgpu::BindGroupEntry {
                    binding: compute_slot::EDIT_DELETED.binding,
                    resource: self.optional_binding(inputs.edit_deleted),
                },
            ],
        });
        let mut pass = stream.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(dispatch.face.profile_label()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        if dispatch.group_count > 0 {
            pass.dispatch_workgroups(dispatch.group_count, 1, 1);
        }
        Ok(())
    }

    fn draw_face(&mut self, stream: &mut wgpu::CommandEncoder, draw: FaceDraw<'_, Self>) -> Result<()> {
        if draw.target.format != draw.program.format {
            bail!(
                "Shadow face {} is {:?}, caster expects {:?}",
                draw.face.label(),
                draw.target.format,
                draw.program.format
            );
        }
        let params = create_uniform(&self.device, "Splat Shadow Draw Params", &draw.params);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Splat Shadow Caster BG"),
            layout: &self.caster_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: draw_slot::DRAW_PARAMS.binding,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: draw_slot::VIEW_DATA.binding,
                    resource: draw.view_data.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry { binding: draw_slot::ORDER.binding, resource: draw.order.buffer.as_entire_binding() },
            ],
        });
        let mut pass = stream.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.face.profile_label()),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: draw.target.view(),
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(FAR_DEPTH_CLEAR), store: wgpu::StoreOp::Store }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        if draw.instance_count == 0 {
            return Ok(());
        }
        pass.set_pipeline(&draw.program.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..VERTICES_PER_SPLAT, 0..draw.instance_count);
        Ok(())
    }
}

fn build_compute_module(device: &wgpu::Device, source: &str) -> Option<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Splat Shadow Compute"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            log::error!(target: "splat_shadows::gpu", "splat shadow compute program failed to compile: {err}");
            None
        }
        None => Some(module),
    }
}

/// `entry_point` is declared as a `@compute` function outside any comment.
fn exports_entry_point(source: &str, entry_point: &str) -> bool {
    let code = strip_wgsl_comments(source);
    code.match_indices("@compute").any(|(at, attribute)| {
        let rest = &code[at + attribute.len()..];
        let Some(fn_at) = rest.find("fn ") else {
            return false;
        };
        let (attributes, declaration) = rest.split_at(fn_at);
        if attributes.contains([';', '{', '}']) {
            return false;
        }
        declaration["fn ".len()..]
            .trim_start()
            .strip_prefix(entry_point)
            .is_some_and(|tail| tail.trim_start().starts_with('('))
    })
}

/// WGSL block comments nest.
fn strip_wgsl_comments(source: &str) -> String {
    let mut code = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut depth = 0u32;
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) if depth == 0 => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        code.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                depth += 1;
            }
            ('*', Some('/')) if depth > 0 => {
                chars.next();
                depth -= 1;
                code.push(' ');
            }
            _ if depth > 0 => {}
            _ => code.push(c),
        }
    }
    code
}

fn build_kernel(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    source: &str,
    kernel: ShadowKernel,
    slots: &[BindingSlot],
    group_size_x: u32,
) -> Option<KernelPipeline> {
    let entry_point = kernel.entry_point();
    if !exports_entry_point(source, entry_point) {
        log::error!(target: "splat_shadows::gpu", "compute program does not export '{entry_point}'");
        return None;
    }
    let layout = create_bind_group_layout(device, entry_point, slots, wgpu::ShaderStages::COMPUTE);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(entry_point),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(&pipeline_layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: wgpu::PipelineCompilationOptions {
            constants: &[(WORKGROUP_SIZE_CONSTANT, group_size_x as f64)],
            zero_initialize_workgroup_memory: true,
        },
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        log::error!(target: "splat_shadows::gpu", "kernel '{entry_point}' failed validation: {err}");
        return None;
    }
    Some(KernelPipeline { pipeline, layout })
}

fn create_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    slots: &[BindingSlot],
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = slots
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility,
            ty: binding_type(slot.kind),
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label: Some(label), entries: &entries })
}

fn binding_type(kind: BindingKind) -> wgpu::BindingType {
    match kind {
        BindingKind::Uniform => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::StorageRead => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::StorageReadWrite => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
    }
}

/// Lives as long as the bind group recorded into the encoder.
fn create_uniform<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, params: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(params),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

use glam::Mat4;

use super::backend::{GpuBuffer, WgpuShadowBackend};
use crate::splat::{color_texel, EncodedSplats, SplatInputs, SplatRenderState, SplatSource, COLOR_TEXTURE_WIDTH};

/// GPU copy of an encoded splat set, standing in for a primary splat renderer.
pub struct GpuSplatSet {
    positions: GpuBuffer,
    other: GpuBuffer,
    order: GpuBuffer,
    edit_selected: Option<GpuBuffer>,
    edit_deleted: Option<GpuBuffer>,
    _color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    state: SplatRenderState,
}

impl GpuSplatSet {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, splats: &EncodedSplats) -> Self {
        let count = splats.len() as u32;
        let width = count.clamp(1, COLOR_TEXTURE_WIDTH);
        let height = count.div_ceil(width).max(1);
        let mut texels = vec![[0.0f32; 4]; (width * height) as usize];
        for (index, color) in splats.colors.iter().enumerate() {
            let (x, y) = color_texel(index as u32, width);
            texels[(y * width + x) as usize] = *color;
        }
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Splat Color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(width * 16), rows_per_image: Some(height) },
            size,
        );
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let state = SplatRenderState {
            splat_count: count,
            active_splat_count: count,
            format: EncodedSplats::format(),
            content_version: (count > 0).then(|| splats.content_hash()),
            ..SplatRenderState::default()
        };
        Self {
            positions: GpuBuffer::from_words(device, "Splat Positions", &splats.positions),
            other: GpuBuffer::from_words(device, "Splat Other", &splats.other),
            order: GpuBuffer::from_words(device, "Splat Order", &splats.order),
            edit_selected: None,
            edit_deleted: None,
            _color_texture: color_texture,
            color_view,
            state,
        }
    }

    pub fn state(&self) -> &SplatRenderState {
        &self.state
    }

    pub fn set_transform(&mut self, object_to_world: Mat4) {
        self.state.object_to_world = object_to_world;
    }

    pub fn set_splat_scale(&mut self, splat_scale: f32) {
        self.state.splat_scale = splat_scale;
    }

    /// Marks splats deleted by editing; they stop casting on the next render.
    pub fn set_deleted(&mut self, device: &wgpu::Device, deleted: &[u32]) {
        let words = edit_words(self.state.splat_count, deleted);
        self.edit_selected = Some(GpuBuffer::from_words(device, "Splat Edit Selected", &vec![0; words.len()]));
        self.edit_deleted = Some(GpuBuffer::from_words(device, "Splat Edit Deleted", &words));
    }

    pub fn clear_edits(&mut self) {
        self.edit_selected = None;
        self.edit_deleted = None;
    }
}

impl SplatSource<WgpuShadowBackend> for GpuSplatSet {
    fn render_state(&self) -> SplatRenderState {
        self.state
    }

    fn gpu_inputs(&self) -> Option<SplatInputs<'_, WgpuShadowBackend>> {
        if !self.state.has_asset() {
            return None;
        }
        Some(SplatInputs {
            positions: &self.positions,
            other: &self.other,
            chunks: None,
            color: &self.color_view,
            order: &self.order,
            edit_selected: self.edit_selected.as_ref(),
            edit_deleted: self.edit_deleted.as_ref(),
        })
    }
}

/// One bit per splat, 32 splats per word.
pub fn edit_words(splat_count: u32, flagged: &[u32]) -> Vec<u32> {
    let mut words = vec![0u32; splat_count.div_ceil(32).max(1) as usize];
    for &index in flagged.iter().filter(|index| **index < splat_count) {
        words[(index / 32) as usize] |= 1 << (index % 32);
    }
    words
}

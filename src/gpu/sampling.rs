use super::backend::GpuDepthTarget;
use crate::shadow::faces::{CubeFace, CUBE_FACE_COUNT};

/// Layout a receiver material uses to read the six faces with plain depth loads.
///
/// Binding `n` holds face `CubeFace::ALL[n]`; no comparison sampler is involved.
pub fn face_bind_group_layout(device: &wgpu::Device, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = CubeFace::ALL
        .iter()
        .map(|face| wgpu::BindGroupLayoutEntry {
            binding: face.index() as u32,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Splat Shadow Faces BGL"),
        entries: &entries,
    })
}

pub fn face_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    faces: [&GpuDepthTarget; CUBE_FACE_COUNT],
) -> wgpu::BindGroup {
    let entries: Vec<_> = CubeFace::ALL
        .iter()
        .map(|face| wgpu::BindGroupEntry {
            binding: face.index() as u32,
            resource: wgpu::BindingResource::TextureView(faces[face.index()].view()),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Splat Shadow Faces BG"),
        layout,
        entries: &entries,
    })
}

use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use super::backend::GpuDepthTarget;
use crate::shadow::backend::{DepthFormat, DepthTarget};
use crate::shadow::layout::align_up;

const READBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Copies one face back to the host as row-major normalized depth.
///
/// Blocks until the copy lands; meant for tools and tests, not the frame loop.
pub fn read_depth_face(device: &wgpu::Device, queue: &wgpu::Queue, target: &GpuDepthTarget) -> Result<Vec<f32>> {
    let texture = target.texture().context("Shadow face was handed over as a view and cannot be copied")?;
    let bytes_per_texel = match target.format() {
        DepthFormat::Depth32Float => 4u32,
        DepthFormat::Depth16Unorm => 2u32,
    };
    let size = target.size();
    let unpadded_row = size * bytes_per_texel;
    let padded_row = align_up(unpadded_row as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as u32;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Shadow Face Readback"),
        size: padded_row as u64 * size as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Shadow Face Readback Encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::DepthOnly,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(padded_row), rows_per_image: Some(size) },
        },
        wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    map_and_wait(device, &slice).context("Failed to read back shadow face")?;

    let mut depths = Vec::with_capacity((size * size) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded_row as usize) {
            let texels = &row[..unpadded_row as usize];
            match target.format() {
                DepthFormat::Depth32Float => depths.extend(
                    texels.chunks_exact(4).map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
                ),
                DepthFormat::Depth16Unorm => depths.extend(
                    texels.chunks_exact(2).map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / u16::MAX as f32),
                ),
            }
        }
    }
    buffer.unmap();
    Ok(depths)
}

/// Copies a storage buffer (it needs `COPY_SRC`) back to the host as 32-bit words.
pub fn read_buffer_words(device: &wgpu::Device, queue: &wgpu::Queue, source: &wgpu::Buffer) -> Result<Vec<u32>> {
    let size = source.size();
    if size % 4 != 0 {
        bail!("Buffer of {size} bytes is not word aligned");
    }
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Shadow Buffer Readback"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Shadow Buffer Readback Encoder") });
    encoder.copy_buffer_to_buffer(source, 0, &buffer, 0, size);
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    map_and_wait(device, &slice).context("Failed to read back buffer")?;
    let words = {
        let data = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, u32>(&data).to_vec()
    };
    buffer.unmap();
    Ok(words)
}

fn map_and_wait(device: &wgpu::Device, slice: &wgpu::BufferSlice<'_>) -> Result<()> {
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    let started = Instant::now();
    let mapped = loop {
        device.poll(wgpu::PollType::Poll).context("Device lost during readback")?;
        match receiver.try_recv() {
            Ok(result) => break result,
            Err(mpsc::TryRecvError::Empty) if started.elapsed() < READBACK_TIMEOUT => std::thread::yield_now(),
            Err(mpsc::TryRecvError::Empty) => bail!("Timed out waiting for readback"),
            Err(mpsc::TryRecvError::Disconnected) => bail!("Readback callback dropped"),
        }
    };
    mapped.map_err(|err| anyhow!("Failed to map readback buffer: {err}"))
}

/// Share of texels nearer than the clear value.
pub fn coverage(depths: &[f32]) -> f32 {
    if depths.is_empty() {
        return 0.0;
    }
    depths.iter().filter(|depth| **depth < 1.0).count() as f32 / depths.len() as f32
}

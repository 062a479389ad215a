use anyhow::{Context, Result};

/// Device and queue for running the shadow pipeline without a window.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub downlevel_flags: wgpu::DownlevelFlags,
}

impl GpuContext {
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request headless adapter")?;
        let adapter_info = adapter.get_info();
        let downlevel_flags = adapter.get_downlevel_capabilities().flags;
        let required_limits = adapter.limits();
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Splat Shadow Device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) =
            adapter.request_device(&device_desc).await.context("Failed to request headless device")?;
        log::debug!(
            target: "splat_shadows::gpu",
            "headless device on {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );
        Ok(Self { device, queue, adapter_info, downlevel_flags })
    }

    pub fn headless_blocking() -> Result<Self> {
        pollster::block_on(Self::headless())
    }

    /// Compute kernels plus storage reads in the caster's vertex stage.
    pub fn supports_splat_shadows(&self) -> bool {
        self.downlevel_flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS | wgpu::DownlevelFlags::VERTEX_STORAGE)
    }
}

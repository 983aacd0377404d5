use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::PhysicalSize;

use crate::types::{Antialiasing, InitError};

/// Instance, device and swapchain wiring for one window.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub sample_count: u32,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    /// The surface is created from raw handles, so `target` must outlive the
    /// returned context.
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| InitError::Surface(format!("failed to acquire window handle: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| InitError::Surface(format!("failed to acquire display handle: {err}")))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| InitError::Surface(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| InitError::Adapter(err.to_string()))?;

        let info = adapter.get_info();
        tracing::info!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );
        let is_software = info.device_type == wgpu::DeviceType::Cpu;

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            return Err(InitError::Surface(
                "surface reports no supported formats".into(),
            ));
        };
        // Colours are authored as gamma-encoded values, so prefer a non-sRGB swapchain.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                tracing::warn!(
                    ?first_format,
                    "no linear (non-sRGB) surface format available; colours will be brighter"
                );
                first_format
            });

        let format_features = adapter.get_texture_format_features(surface_format);
        let adapter_specific = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        // Counts above 4 need the adapter-specific format feature on the device.
        let supported_counts: Vec<u32> = format_features
            .flags
            .supported_sample_counts()
            .into_iter()
            .filter(|&count| adapter_specific || count <= 4)
            .collect();
        let sample_count = select_sample_count(
            antialiasing,
            &supported_counts,
            format_features
                .flags
                .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE),
            is_software,
        );

        let mut required_features = wgpu::Features::empty();
        if sample_count > 4 {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fakeupdate device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| InitError::Device(err.to_string()))?;

        // FIFO is the only mode every surface must support and is vsync-gated.
        let present_mode = wgpu::PresentMode::Fifo;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?surface_format, sample_count, ?present_mode, "configured surface");

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            sample_count,
            surface_format,
        })
    }

    /// Reconfigures the swapchain. Zero-sized requests (minimised windows) are ignored.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 {
            return false;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    /// Reapplies the current configuration after `Lost`/`Outdated`.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Resolves the MSAA sample count for the surface format.
pub(crate) fn select_sample_count(
    antialiasing: Antialiasing,
    supported: &[u32],
    supports_resolve: bool,
    is_software: bool,
) -> u32 {
    let mut supported = supported.to_vec();
    if !supported.contains(&1) {
        supported.push(1);
    }
    supported.sort_unstable();
    supported.dedup();

    let sample_count = match antialiasing {
        Antialiasing::Auto => supported.last().copied().unwrap_or(1),
        Antialiasing::Off => 1,
        Antialiasing::Samples(requested) => {
            if supported.contains(&requested) {
                requested
            } else {
                let fallback = supported
                    .iter()
                    .copied()
                    .filter(|&count| count <= requested)
                    .max()
                    .unwrap_or(1);
                tracing::warn!(
                    requested,
                    fallback,
                    ?supported,
                    "requested MSAA sample count not supported; falling back"
                );
                fallback
            }
        }
    };

    if sample_count > 1 && !supports_resolve {
        tracing::warn!("surface format does not support MSAA resolve; disabling MSAA");
        return 1;
    }
    if sample_count > 1 && is_software {
        tracing::warn!(
            sample_count,
            "software rasterizer detected; disabling MSAA for performance"
        );
        return 1;
    }
    sample_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_picks_highest_supported_count() {
        assert_eq!(
            select_sample_count(Antialiasing::Auto, &[1, 2, 4], true, false),
            4
        );
    }

    #[test]
    fn unsupported_request_falls_back_downwards() {
        assert_eq!(
            select_sample_count(Antialiasing::Samples(8), &[1, 4], true, false),
            4
        );
        assert_eq!(
            select_sample_count(Antialiasing::Samples(2), &[4], true, false),
            1
        );
    }

    #[test]
    fn msaa_is_disabled_without_resolve_or_on_cpu_adapters() {
        assert_eq!(
            select_sample_count(Antialiasing::Samples(4), &[1, 4], false, false),
            1
        );
        assert_eq!(
            select_sample_count(Antialiasing::Auto, &[1, 4], true, true),
            1
        );
        assert_eq!(
            select_sample_count(Antialiasing::Off, &[1, 4], true, false),
            1
        );
    }
}

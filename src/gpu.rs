//! Core GPU context and device management.
//!
//! This module provides [`GpuContext`], which holds the wgpu resources the
//! [`WgpuBackend`](crate::WgpuBackend) renders with: device, queue, surface
//! and surface configuration, plus the multisample counts the adapter
//! supports for the off-screen target formats.
//!
//! # Initialization
//!
//! A `GpuContext` is created from a winit [`Window`] and handles the wgpu
//! boilerplate: instance creation, adapter selection, device/queue creation,
//! and surface configuration.
//!
//! ```no_run
//! use std::sync::Arc;
//! use passchain::GpuContext;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> passchain::Result<()> {
//! let gpu = GpuContext::new(window)?;
//! println!("{}x{} (aspect: {})", gpu.width(), gpu.height(), gpu.aspect());
//! # Ok(())
//! # }
//! ```
//!
//! [`Window`]: winit::window::Window

use std::sync::Arc;

use winit::window::Window;

use crate::backend::{Capabilities, ColorFormat};
use crate::error::{ComposerError, Result};

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed,
/// e.g. for a [`SceneRenderer`](crate::SceneRenderer) building its pipelines.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
    sample_counts: [(ColorFormat, Vec<u32>); 2],
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// This performs all wgpu initialization:
    /// 1. Creates a wgpu instance with primary backends (Vulkan, Metal, DX12)
    /// 2. Creates a surface for the window
    /// 3. Requests a suitable GPU adapter
    /// 4. Creates the logical device and command queue
    /// 5. Configures the surface with a linear format and Fifo present mode
    ///
    /// The surface format is deliberately not sRGB: the color-correction
    /// pass encodes, and an sRGB surface would encode a second time.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| ComposerError::Backend(format!("failed to create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| ComposerError::Backend(format!("no suitable GPU adapter: {e}")))?;

        // Without this feature the device only honors the guaranteed sample counts.
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Passchain Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| ComposerError::Backend(format!("failed to create device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| ComposerError::Backend("surface reports no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let device_features = device.features();
        let sample_counts = [ColorFormat::Rgba8Unorm, ColorFormat::Rgba16Float]
            .map(|format| (format, target_sample_counts(&adapter, device_features, format)));

        log::info!(
            "GPU ready: {} ({:?}), surface {:?}, target sample counts {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            surface_format,
            sample_counts
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sample_counts,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Call this when the window is resized. Ignores zero-sized dimensions
    /// to avoid wgpu validation errors (which can occur during window minimize).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Sample counts a render target of `format` may be created with.
    /// Always contains 1.
    pub fn sample_counts(&self, format: ColorFormat) -> &[u32] {
        self.sample_counts
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, counts)| counts.as_slice())
            .unwrap_or(&[1])
    }

    /// Multisampling support common to every target format.
    pub fn capabilities(&self) -> Capabilities {
        let max_sample_count = self
            .sample_counts
            .iter()
            .map(|(_, counts)| counts.iter().copied().max().unwrap_or(1))
            .min()
            .unwrap_or(1);

        Capabilities {
            supports_native_multisample: max_sample_count > 1,
            max_sample_count,
        }
    }
}

/// Wgpu texture format backing a [`ColorFormat`].
pub(crate) fn texture_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

fn target_sample_counts(
    adapter: &wgpu::Adapter,
    device_features: wgpu::Features,
    format: ColorFormat,
) -> Vec<u32> {
    let format = texture_format(format);
    let features =
        if device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
            adapter.get_texture_format_features(format)
        } else {
            format.guaranteed_format_features(device_features)
        };

    // A multisampled target is useless if it cannot be resolved for sampling.
    if !features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
    {
        return vec![1];
    }

    let mut counts = features.flags.supported_sample_counts();
    if !counts.contains(&1) {
        counts.insert(0, 1);
    }
    counts
}

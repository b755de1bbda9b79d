//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device, queue and (when rendering to a
//! window) the surface. Every pass takes it by reference; nothing in the
//! pipeline owns its own device.
//!
//! Two constructors exist:
//!
//! - [`GpuContext::new`] binds to a winit [`Window`] and configures its surface.
//! - [`GpuContext::headless`] creates a device with no surface, for offscreen
//!   rendering and tests. The presentation view is then supplied by the caller.
//!
//! Both query the [`Capabilities`] table exactly once.
//!
//! [`Window`]: winit::window::Window

use std::sync::Arc;
use winit::window::Window;

use crate::capabilities::{self, Capabilities};
use crate::error::RenderError;

/// Presentation format used when there is no window surface.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed.
pub struct GpuContext {
    /// The surface for presenting rendered frames, if bound to a window.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The adapter the device was created from.
    pub adapter: wgpu::Adapter,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue every pass submits to, in program order.
    pub queue: wgpu::Queue,
    /// Presentation format and size. Headless contexts keep it as a record only.
    pub config: wgpu::SurfaceConfiguration,
    /// Optional features and limits, queried at creation.
    pub capabilities: Capabilities,
}

impl GpuContext {
    /// Create a GPU context presenting to a winit window.
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(HEADLESS_FORMAT);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let capabilities = Capabilities::query(&adapter, &device);

        Ok(Self {
            surface: Some(surface),
            adapter,
            device,
            queue,
            config,
            capabilities,
        })
    }

    /// Create a GPU context without a window.
    ///
    /// The presentation format is [`HEADLESS_FORMAT`]; callers render the
    /// presentation stages into a texture of that format.
    pub fn headless(width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = request_device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: HEADLESS_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let capabilities = Capabilities::query(&adapter, &device);

        Ok(Self {
            surface: None,
            adapter,
            device,
            queue,
            config,
            capabilities,
        })
    }

    /// Resize the presentation surface.
    ///
    /// Ignores zero-sized dimensions to avoid wgpu validation errors
    /// (which can occur during window minimize).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Returns the current presentation width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current presentation height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Format passes writing the presentation view must target.
    pub fn presentation_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}

/// Requests a device with every optional feature the adapter offers and the
/// color-attachment byte budget the G-buffer needs, where available.
fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    let defaults = wgpu::Limits::default();
    let required_limits = wgpu::Limits {
        max_color_attachment_bytes_per_sample: defaults
            .max_color_attachment_bytes_per_sample
            .max(adapter.limits().max_color_attachment_bytes_per_sample),
        ..defaults
    };

    let device = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Umbra Device"),
        required_features: adapter.features() & capabilities::optional_features(),
        required_limits,
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))?;

    Ok(device)
}

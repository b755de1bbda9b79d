//! Device capability table, queried once when the GPU context is created.
//!
//! The pipeline never queries the device mid-frame. Everything a pass needs to
//! branch on (float filtering, float blending, how many bytes of color
//! attachments one render pass may write) is captured here up front.

/// Features the pipeline enables when the adapter offers them.
pub fn optional_features() -> wgpu::Features {
    wgpu::Features::FLOAT32_FILTERABLE
}

/// Preferred format for G-buffer and intermediate color targets.
pub const HIGH_PRECISION_COLOR: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Format used when the device cannot write four 32-bit float attachments at once.
pub const FALLBACK_COLOR: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Depth attachment format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// What the device can do, as far as the render pipeline cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// 32-bit float textures may be sampled with linear filtering.
    pub float32_filterable: bool,
    /// The adapter reports `Rgba32Float` as blendable.
    pub float32_blendable: bool,
    /// `Rgba32Float` may be used as a render attachment at all.
    pub rgba32f_renderable: bool,
    /// Limit on the summed bytes of all color attachments of one pass.
    pub max_color_attachment_bytes_per_sample: u32,
    /// Limit on the number of color attachments of one pass.
    pub max_color_attachments: u32,
    /// Alignment for dynamic uniform buffer offsets.
    pub min_uniform_buffer_offset_alignment: u32,
}

impl Capabilities {
    /// Reads the table from a live adapter/device pair.
    pub fn query(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Self {
        let features = device.features();
        let limits = device.limits();
        let rgba32f = adapter.get_texture_format_features(HIGH_PRECISION_COLOR);

        Self {
            float32_filterable: features.contains(wgpu::Features::FLOAT32_FILTERABLE),
            float32_blendable: rgba32f
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE),
            rgba32f_renderable: rgba32f
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
            max_color_attachment_bytes_per_sample: limits.max_color_attachment_bytes_per_sample,
            max_color_attachments: limits.max_color_attachments,
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        }
    }

    /// Logs every missing optional capability at error level.
    ///
    /// Returns the number of problems found. Rendering proceeds regardless;
    /// the affected passes produce lower precision or unblended output.
    pub fn report_missing(&self) -> usize {
        let mut missing = 0;
        if !self.float32_filterable {
            log::error!("float32 linear filtering not available");
            missing += 1;
        }
        if !self.rgba32f_renderable {
            log::error!("float color buffers not available");
            missing += 1;
        }
        if !self.float32_blendable {
            log::error!("Rgba32Float not blendable, lighting accumulation disabled");
            missing += 1;
        }
        missing
    }

    /// Picks the color format for a framebuffer with `attachments` color slots.
    ///
    /// Falls back to half precision when full precision would exceed the
    /// per-sample byte budget or is not renderable.
    pub fn color_format_for(&self, attachments: u32) -> wgpu::TextureFormat {
        let full = bytes_per_sample(HIGH_PRECISION_COLOR) * attachments;
        if self.rgba32f_renderable && full <= self.max_color_attachment_bytes_per_sample {
            HIGH_PRECISION_COLOR
        } else {
            FALLBACK_COLOR
        }
    }

    /// Blend state for screen-space passes writing `format`.
    ///
    /// 32-bit float targets only accept a blend state when the adapter's
    /// format features list them as blendable.
    pub fn blend_for(&self, format: wgpu::TextureFormat) -> Option<wgpu::BlendState> {
        match format {
            wgpu::TextureFormat::Rgba32Float if !self.float32_blendable => None,
            _ => Some(wgpu::BlendState::REPLACE),
        }
    }

    /// Whether a texture of `format` can be bound to a filtering sampler.
    pub fn is_filterable(&self, format: wgpu::TextureFormat) -> bool {
        let features = if self.float32_filterable {
            wgpu::Features::FLOAT32_FILTERABLE
        } else {
            wgpu::Features::empty()
        };
        matches!(
            format.sample_type(None, Some(features)),
            Some(wgpu::TextureSampleType::Float { filterable: true })
        )
    }
}

/// Bytes one sample of `format` occupies in a color attachment.
pub fn bytes_per_sample(format: wgpu::TextureFormat) -> u32 {
    format.target_pixel_byte_cost().unwrap_or(0)
}

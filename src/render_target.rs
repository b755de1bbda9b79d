//! GPU-resident render targets and the G-buffer framebuffer.
//!
//! [`RenderTargetSet`] owns every texture a pass writes:
//!
//! - the G-buffer: four color attachments in [`GBufferSlot`] order plus one
//!   depth attachment,
//! - `Lit`, written by the lighting pass,
//! - `Shadow`, written by the shadow pass,
//! - `Reflection`, written by the reflection pass.
//!
//! Resizing destroys and recreates all of them together, so no pass ever sees
//! targets of mixed sizes.

use crate::capabilities::{self, Capabilities, DEPTH_FORMAT, HIGH_PRECISION_COLOR};
use crate::gpu::GpuContext;

/// Number of color attachments in the G-buffer.
pub const GBUFFER_ATTACHMENTS: usize = 4;

/// Fixed color attachment slots of the G-buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GBufferSlot {
    /// World-space position; `w` holds linear view depth.
    Position = 0,
    /// World-space normal; `w` is 1 where geometry was drawn.
    Normal = 1,
    /// Surface base color.
    Albedo = 2,
    /// Specular, diffuse, refraction and emittance coefficients.
    Material = 3,
}

impl GBufferSlot {
    pub const ALL: [GBufferSlot; GBUFFER_ATTACHMENTS] = [
        GBufferSlot::Position,
        GBufferSlot::Normal,
        GBufferSlot::Albedo,
        GBufferSlot::Material,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            GBufferSlot::Position => "GBuffer Position",
            GBufferSlot::Normal => "GBuffer Normal",
            GBufferSlot::Albedo => "GBuffer Albedo",
            GBufferSlot::Material => "GBuffer Material",
        }
    }
}

/// Size and format of a target, independent of the GPU resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// A texture passes render into and later passes read from.
#[derive(Debug)]
pub struct RenderTarget {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    info: TargetInfo,
}

impl RenderTarget {
    fn new(
        gpu: &GpuContext,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let usage = if format.is_depth_stencil_format() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        };

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            info: TargetInfo {
                label,
                width,
                height,
                format,
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.info.format
    }

    pub fn info(&self) -> &TargetInfo {
        &self.info
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Ordered color attachments plus exactly one depth attachment.
///
/// Slot order is fixed when the framebuffer is allocated.
#[derive(Debug)]
pub struct FramebufferConfig {
    colors: Vec<RenderTarget>,
    depth: RenderTarget,
}

impl FramebufferConfig {
    pub fn color(&self, slot: GBufferSlot) -> &RenderTarget {
        &self.colors[slot.index()]
    }

    pub fn colors(&self) -> &[RenderTarget] {
        &self.colors
    }

    pub fn depth(&self) -> &RenderTarget {
        &self.depth
    }

    pub fn attachment_count(&self) -> usize {
        self.colors.len()
    }

    /// Color attachments for a render pass, in slot order.
    pub fn color_attachments(
        &self,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        self.colors
            .iter()
            .map(|target| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect()
    }

    pub fn depth_attachment(
        &self,
        load: wgpu::LoadOp<f32>,
    ) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }

    fn destroy(&self) {
        for target in &self.colors {
            target.destroy();
        }
        self.depth.destroy();
    }
}

/// A problem found while validating freshly allocated targets.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompletenessIssue {
    #[error("framebuffer has {count} color attachments, at least {GBUFFER_ATTACHMENTS} required")]
    TooFewAttachments { count: usize },

    #[error("{label} is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        label: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("{label} has format {actual:?}, expected {expected:?}")]
    UnexpectedFormat {
        label: &'static str,
        expected: wgpu::TextureFormat,
        actual: wgpu::TextureFormat,
    },

    #[error("color attachments need {bytes} bytes per sample, device allows {limit}")]
    ByteBudgetExceeded { bytes: u32, limit: u32 },

    #[error("color attachments exceed the device limit of {limit}")]
    TooManyAttachments { limit: u32 },

    #[error("G-buffer allocated as {format:?}, full precision unavailable")]
    PrecisionFallback { format: wgpu::TextureFormat },

    #[error("validation: {0}")]
    Validation(String),
}

/// Result of the completeness checks run after every allocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletenessReport {
    issues: Vec<CompletenessIssue>,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[CompletenessIssue] {
        &self.issues
    }
}

/// Structural checks over a G-buffer description.
///
/// `colors` must be in slot order. `color_format` is the format the set
/// intended to allocate.
pub fn check_framebuffer(
    colors: &[TargetInfo],
    depth: &TargetInfo,
    extent: (u32, u32),
    color_format: wgpu::TextureFormat,
    caps: &Capabilities,
) -> Vec<CompletenessIssue> {
    let mut issues = Vec::new();

    if colors.len() < GBUFFER_ATTACHMENTS {
        issues.push(CompletenessIssue::TooFewAttachments {
            count: colors.len(),
        });
    }
    if colors.len() as u32 > caps.max_color_attachments {
        issues.push(CompletenessIssue::TooManyAttachments {
            limit: caps.max_color_attachments,
        });
    }

    for info in colors.iter().chain(std::iter::once(depth)) {
        if (info.width, info.height) != extent {
            issues.push(CompletenessIssue::SizeMismatch {
                label: info.label,
                expected: extent,
                actual: (info.width, info.height),
            });
        }
    }

    for info in colors {
        if info.format != color_format {
            issues.push(CompletenessIssue::UnexpectedFormat {
                label: info.label,
                expected: color_format,
                actual: info.format,
            });
        }
    }
    if depth.format != DEPTH_FORMAT {
        issues.push(CompletenessIssue::UnexpectedFormat {
            label: depth.label,
            expected: DEPTH_FORMAT,
            actual: depth.format,
        });
    }

    let bytes: u32 = colors
        .iter()
        .map(|info| capabilities::bytes_per_sample(info.format))
        .sum();
    if bytes > caps.max_color_attachment_bytes_per_sample {
        issues.push(CompletenessIssue::ByteBudgetExceeded {
            bytes,
            limit: caps.max_color_attachment_bytes_per_sample,
        });
    }

    issues
}

/// Every render target of the pipeline.
#[derive(Debug)]
pub struct RenderTargetSet {
    gbuffer: FramebufferConfig,
    lit: RenderTarget,
    shadow: RenderTarget,
    reflection: RenderTarget,
    width: u32,
    height: u32,
    report: CompletenessReport,
}

impl RenderTargetSet {
    /// Creates every target at `width` x `height` and validates the result.
    ///
    /// Zero dimensions are clamped to one pixel. Completeness problems are
    /// logged and kept in [`report`](Self::report); allocation still succeeds.
    pub fn allocate(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let caps = &gpu.capabilities;
        let gbuffer_format = caps.color_format_for(GBUFFER_ATTACHMENTS as u32);
        let single_format = caps.color_format_for(1);

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let colors = GBufferSlot::ALL
            .iter()
            .map(|slot| RenderTarget::new(gpu, slot.label(), width, height, gbuffer_format))
            .collect();
        let depth = RenderTarget::new(gpu, "GBuffer Depth", width, height, DEPTH_FORMAT);
        let gbuffer = FramebufferConfig { colors, depth };

        let lit = RenderTarget::new(gpu, "Lit Target", width, height, single_format);
        let shadow = RenderTarget::new(gpu, "Shadow Target", width, height, single_format);
        let reflection = RenderTarget::new(gpu, "Reflection Target", width, height, single_format);

        let validation = pollster::block_on(gpu.device.pop_error_scope());

        let mut issues = Vec::new();
        if gbuffer_format != HIGH_PRECISION_COLOR {
            issues.push(CompletenessIssue::PrecisionFallback {
                format: gbuffer_format,
            });
        }
        let color_infos: Vec<TargetInfo> =
            gbuffer.colors.iter().map(|t| t.info().clone()).collect();
        issues.extend(check_framebuffer(
            &color_infos,
            gbuffer.depth.info(),
            (width, height),
            gbuffer_format,
            caps,
        ));
        if let Some(error) = validation {
            issues.push(CompletenessIssue::Validation(error.to_string()));
        }

        for issue in &issues {
            log::error!("render target initialization: {issue}");
        }
        log::info!(
            "allocated render targets at {}x{} ({:?} G-buffer)",
            width,
            height,
            gbuffer_format
        );

        Self {
            gbuffer,
            lit,
            shadow,
            reflection,
            width,
            height,
            report: CompletenessReport { issues },
        }
    }

    /// Destroys every target and allocates replacements at the new size.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.destroy();
        *self = Self::allocate(gpu, width, height);
    }

    fn destroy(&self) {
        self.gbuffer.destroy();
        self.lit.destroy();
        self.shadow.destroy();
        self.reflection.destroy();
    }

    pub fn gbuffer(&self) -> &FramebufferConfig {
        &self.gbuffer
    }

    pub fn lit(&self) -> &RenderTarget {
        &self.lit
    }

    pub fn shadow(&self) -> &RenderTarget {
        &self.shadow
    }

    pub fn reflection(&self) -> &RenderTarget {
        &self.reflection
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn report(&self) -> &CompletenessReport {
        &self.report
    }

    /// Every target, G-buffer first.
    pub fn targets(&self) -> impl Iterator<Item = &RenderTarget> {
        self.gbuffer
            .colors
            .iter()
            .chain([&self.gbuffer.depth, &self.lit, &self.shadow, &self.reflection])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(bytes: u32) -> Capabilities {
        Capabilities {
            float32_filterable: true,
            float32_blendable: true,
            rgba32f_renderable: true,
            max_color_attachment_bytes_per_sample: bytes,
            max_color_attachments: 8,
            min_uniform_buffer_offset_alignment: 256,
        }
    }

    fn info(label: &'static str, w: u32, h: u32, format: wgpu::TextureFormat) -> TargetInfo {
        TargetInfo {
            label,
            width: w,
            height: h,
            format,
        }
    }

    fn gbuffer(w: u32, h: u32, format: wgpu::TextureFormat) -> Vec<TargetInfo> {
        GBufferSlot::ALL
            .iter()
            .map(|slot| info(slot.label(), w, h, format))
            .collect()
    }

    #[test]
    fn slots_are_in_attachment_order() {
        for (i, slot) in GBufferSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn complete_framebuffer_has_no_issues() {
        let colors = gbuffer(640, 480, HIGH_PRECISION_COLOR);
        let depth = info("depth", 640, 480, DEPTH_FORMAT);
        let issues = check_framebuffer(&colors, &depth, (640, 480), HIGH_PRECISION_COLOR, &caps(64));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn byte_budget_is_enforced() {
        let colors = gbuffer(8, 8, HIGH_PRECISION_COLOR);
        let depth = info("depth", 8, 8, DEPTH_FORMAT);
        let issues = check_framebuffer(&colors, &depth, (8, 8), HIGH_PRECISION_COLOR, &caps(32));
        assert_eq!(
            issues,
            vec![CompletenessIssue::ByteBudgetExceeded {
                bytes: 64,
                limit: 32
            }]
        );
    }

    #[test]
    fn half_precision_fits_default_budget() {
        let colors = gbuffer(8, 8, wgpu::TextureFormat::Rgba16Float);
        let depth = info("depth", 8, 8, DEPTH_FORMAT);
        let issues = check_framebuffer(
            &colors,
            &depth,
            (8, 8),
            wgpu::TextureFormat::Rgba16Float,
            &caps(32),
        );
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn mismatched_sizes_and_formats_are_reported() {
        let mut colors = gbuffer(100, 100, HIGH_PRECISION_COLOR);
        colors[2].width = 50;
        colors[3].format = wgpu::TextureFormat::Rgba8Unorm;
        let depth = info("depth", 100, 100, wgpu::TextureFormat::Depth24Plus);

        let issues = check_framebuffer(&colors, &depth, (100, 100), HIGH_PRECISION_COLOR, &caps(64));

        assert!(issues.contains(&CompletenessIssue::SizeMismatch {
            label: "GBuffer Albedo",
            expected: (100, 100),
            actual: (50, 100),
        }));
        assert!(issues.iter().any(|i| matches!(
            i,
            CompletenessIssue::UnexpectedFormat { label: "GBuffer Material", .. }
        )));
        assert!(issues.iter().any(|i| matches!(
            i,
            CompletenessIssue::UnexpectedFormat { label: "depth", .. }
        )));
    }

    #[test]
    fn too_few_attachments() {
        let colors = gbuffer(4, 4, HIGH_PRECISION_COLOR)[..2].to_vec();
        let depth = info("depth", 4, 4, DEPTH_FORMAT);
        let issues = check_framebuffer(&colors, &depth, (4, 4), HIGH_PRECISION_COLOR, &caps(64));
        assert_eq!(issues, vec![CompletenessIssue::TooFewAttachments { count: 2 }]);
    }
}

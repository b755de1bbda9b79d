use glam::Vec4;

/// Light position used when none is configured, in world space.
pub const DEFAULT_LIGHT_POSITION: Vec4 = Vec4::new(2.0, 10.0, 0.0, 1.0);

/// Startup configuration for a [`RenderPipeline`](crate::RenderPipeline).
///
/// Only the surface size, the clear color and the single light are
/// configurable. The animation clock is driven per frame through
/// [`RenderPipeline::update_time`](crate::RenderPipeline::update_time).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: wgpu::Color,
    pub light_position: Vec4,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            clear_color: wgpu::Color::BLACK,
            light_position: DEFAULT_LIGHT_POSITION,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn clear_color(mut self, r: f64, g: f64, b: f64, a: f64) -> Self {
        self.clear_color = wgpu::Color { r, g, b, a };
        self
    }

    pub fn light_position(mut self, position: Vec4) -> Self {
        self.light_position = position;
        self
    }

    /// Surface size with zero dimensions clamped to one pixel.
    pub fn extent(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_light_sits_above_the_scene() {
        let config = PipelineConfig::default();
        assert_eq!(config.light_position, Vec4::new(2.0, 10.0, 0.0, 1.0));
        assert_eq!(config.clear_color, wgpu::Color::BLACK);
        assert_eq!((config.width, config.height), (800, 600));
    }

    #[test]
    fn builder_overrides() {
        let config = PipelineConfig::new()
            .size(320, 0)
            .clear_color(0.1, 0.2, 0.3, 1.0)
            .light_position(Vec4::new(0.0, 5.0, 5.0, 1.0));

        assert_eq!(config.extent(), (320, 1));
        assert_eq!(config.clear_color.g, 0.2);
        assert_eq!(config.light_position.z, 5.0);
    }
}

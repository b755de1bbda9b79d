use std::sync::Arc;

use glam::Vec2;

use crate::binding::{BindingTable, PassId};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::shader::{ProgramDescriptor, ScreenQuad, ShaderProgram};

use super::input_views;

const SOURCE: &str = include_str!("../shaders/present.wgsl");

/// Copies one float target to the presentation surface.
///
/// The source is read with nearest-texel loads and scaled to the output size.
#[derive(Debug)]
pub struct PresentPass {
    program: ShaderProgram,
    bindings: BindingTable,
    exposure: f32,
}

impl PresentPass {
    pub fn new(
        gpu: &GpuContext,
        quad: Arc<ScreenQuad>,
        bindings: &BindingTable,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let program = ShaderProgram::new(
            gpu,
            quad,
            &ProgramDescriptor {
                label: "Present Pass",
                fragment: SOURCE,
                inputs: &bindings.variables(PassId::Present),
                format,
                blend: Some(wgpu::BlendState::REPLACE),
            },
        )?;
        Ok(Self {
            program,
            bindings: bindings.clone(),
            exposure: 1.0,
        })
    }

    /// Scales the source color before it is written.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        source: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let views = input_views(&self.bindings, PassId::Present, |name| {
            (name == "source").then_some(source)
        })?;
        let inputs = self.program.bind_inputs(gpu, &views);

        let uniforms = self.program.uniforms_mut();
        uniforms.set_f32("exposure", self.exposure);
        uniforms.set_vec2("resolution", Vec2::new(gpu.width() as f32, gpu.height() as f32));

        self.program.draw(
            gpu,
            encoder,
            output,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            inputs.as_ref(),
        );
        Ok(())
    }
}

//! Camera-only visualization written straight to the presentation surface.
//!
//! Traces a ground plane and a bobbing sphere analytically. It never reads
//! the G-buffer, so it can run in any frame, but it shares the presentation
//! surface with [`PresentPass`](super::PresentPass): whichever is submitted
//! last wins.

use std::sync::Arc;

use glam::Vec4;

use crate::camera::Camera;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::shader::{ProgramDescriptor, ScreenQuad, ShaderProgram};

const SOURCE: &str = include_str!("../shaders/raycast.wgsl");

/// The raycast pass.
#[derive(Debug)]
pub struct RaycastPass {
    program: ShaderProgram,
}

impl RaycastPass {
    pub fn new(
        gpu: &GpuContext,
        quad: Arc<ScreenQuad>,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let program = ShaderProgram::new(
            gpu,
            quad,
            &ProgramDescriptor {
                label: "Raycast Pass",
                fragment: SOURCE,
                inputs: &[],
                format,
                blend: Some(wgpu::BlendState::REPLACE),
            },
        )?;
        Ok(Self { program })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Renders the scene as seen by `camera` into `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        camera: &Camera,
        light_position: Vec4,
        clear_color: Vec4,
        time: f32,
    ) {
        let uniforms = self.program.uniforms_mut();
        uniforms.set_mat4("inv_view", camera.view_matrix().inverse());
        uniforms.set_mat4("inv_proj", camera.projection_matrix().inverse());
        uniforms.set_vec4("eye", camera.position.extend(1.0));
        uniforms.set_vec4("light_pos", light_position);
        uniforms.set_vec4("clear_color", clear_color);
        uniforms.set_f32("time", time);

        self.program
            .draw(gpu, encoder, output, wgpu::LoadOp::Load, None);
    }
}

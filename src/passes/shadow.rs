//! Direct-light visibility against the scene-geometry textures.
//!
//! Each covered pixel casts one ray toward the light and tests it against
//! every triangle in `scene_0`. Blocked pixels keep [`SHADOW_FLOOR`] of their
//! lit color; uncovered pixels pass the lit color through.

use std::sync::Arc;

use glam::{Vec2, Vec4};

use crate::binding::{BindingTable, PassId};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::shader::{ProgramDescriptor, ScreenQuad, ShaderProgram};
use crate::texture::Texture;

use super::{SceneSlots, SurfaceInputs, input_views, scene_size, surface_input};

const SOURCE: &str = include_str!("../shaders/shadow.wgsl");

/// Fraction of the lit color a shadowed pixel keeps.
pub const SHADOW_FLOOR: f32 = 0.3;

/// The shadow pass.
#[derive(Debug)]
pub struct ShadowPass {
    program: ShaderProgram,
    bindings: BindingTable,
    slots: SceneSlots,
}

impl ShadowPass {
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
                label: "Shadow Pass",
                fragment: SOURCE,
                inputs: &bindings.variables(PassId::Shadow),
                format,
                blend: gpu.capabilities.blend_for(format),
            },
        )?;
        Ok(Self {
            program,
            bindings: bindings.clone(),
            slots: SceneSlots::new(gpu),
        })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Writes lit color times light visibility into `target`.
    ///
    /// `scene` is bound to `scene_0..` in the order given.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        surface: &SurfaceInputs<'_>,
        scene: &[Texture],
        triangle_count: u32,
        light_position: Vec4,
        time: f32,
    ) -> Result<(), RenderError> {
        let scene_views = self.slots.views(scene)?;
        let views = input_views(&self.bindings, PassId::Shadow, |name| {
            surface_input(name, surface, &scene_views)
        })?;
        let inputs = self.program.bind_inputs(gpu, &views);

        let uniforms = self.program.uniforms_mut();
        uniforms.set_vec4("light_pos", light_position);
        uniforms.set_vec2("resolution", Vec2::new(surface.size.0 as f32, surface.size.1 as f32));
        uniforms.set_uvec2("scene_size", scene_size(scene));
        uniforms.set_u32("triangle_count", triangle_count);
        uniforms.set_f32("time", time);

        self.program.draw(
            gpu,
            encoder,
            target,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            inputs.as_ref(),
        );
        Ok(())
    }
}

//! Specular reflections against the scene-geometry textures.
//!
//! Same inputs as the shadow pass plus the G-buffer material attachment.
//! For each pixel with a specular coefficient, the eye ray is mirrored about
//! the surface normal and the nearest triangle it hits is shaded from
//! `scene_1` and blended over the lit color.

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use crate::binding::{BindingTable, PassId};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::shader::{ProgramDescriptor, ScreenQuad, ShaderProgram};
use crate::texture::Texture;

use super::{SceneSlots, SurfaceInputs, input_views, scene_size, surface_input};

const SOURCE: &str = include_str!("../shaders/reflection.wgsl");

/// Tuning uploaded as the pass's `material` uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReflectionSettings {
    /// Scales each surface's specular coefficient into a blend factor.
    pub strength: f32,
    /// Offset along the normal before tracing, and minimum hit distance.
    pub ray_bias: f32,
    /// Hits farther than this are ignored.
    pub max_distance: f32,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            strength: 0.5,
            ray_bias: 1e-3,
            max_distance: 100.0,
        }
    }
}

impl ReflectionSettings {
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.strength, self.ray_bias, self.max_distance, 0.0)
    }
}

/// The reflection pass.
#[derive(Debug)]
pub struct ReflectionPass {
    program: ShaderProgram,
    bindings: BindingTable,
    slots: SceneSlots,
    settings: ReflectionSettings,
}

impl ReflectionPass {
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
                label: "Reflection Pass",
                fragment: SOURCE,
                inputs: &bindings.variables(PassId::Reflection),
                format,
                blend: gpu.capabilities.blend_for(format),
            },
        )?;
        Ok(Self {
            program,
            bindings: bindings.clone(),
            slots: SceneSlots::new(gpu),
            settings: ReflectionSettings::default(),
        })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn settings(&self) -> ReflectionSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: ReflectionSettings) {
        self.settings = settings;
    }

    /// Writes the lit color with reflections blended in to `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        surface: &SurfaceInputs<'_>,
        scene: &[Texture],
        triangle_count: u32,
        eye: Vec3,
        light_position: Vec4,
        time: f32,
    ) -> Result<(), RenderError> {
        let scene_views = self.slots.views(scene)?;
        let views = input_views(&self.bindings, PassId::Reflection, |name| {
            surface_input(name, surface, &scene_views)
        })?;
        let inputs = self.program.bind_inputs(gpu, &views);

        let material = self.settings.to_vec4();
        let uniforms = self.program.uniforms_mut();
        uniforms.set_vec4("eye", eye.extend(1.0));
        uniforms.set_vec4("light_pos", light_position);
        uniforms.set_vec4("material", material);
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

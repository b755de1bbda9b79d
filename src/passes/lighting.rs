//! Deferred lighting over the G-buffer.
//!
//! Every pixel is redrawn. Pixels no mesh covered (normal `w` of zero) take
//! the pipeline's clear color; all others are shaded with one point light:
//!
//! ```text
//! rgb = albedo * (AMBIENT + diffuse * max(n.l, 0) + emittance)
//!     + specular * max(n.h, 0)^SHININESS
//! ```
//!
//! [`shade`] evaluates the same model on the CPU.

use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::binding::{BindingTable, PassId};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::render_target::{FramebufferConfig, GBufferSlot, RenderTarget};
use crate::shader::{ProgramDescriptor, ScreenQuad, ShaderProgram};

use super::input_views;

const SOURCE: &str = include_str!("../shaders/deferred.wgsl");

pub const AMBIENT: f32 = 0.1;
pub const SHININESS: f32 = 32.0;

/// One G-buffer texel, as the lighting model reads it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec4,
    /// Specular, diffuse, refraction, emittance.
    pub material: Vec4,
}

/// CPU evaluation of the lighting model for one covered pixel.
pub fn shade(surface: &SurfaceSample, light: Vec3, eye: Vec3) -> Vec4 {
    let n = surface.normal.normalize();
    let l = (light - surface.position).normalize();
    let v = (eye - surface.position).normalize();
    let h = (l + v).normalize();

    let diffuse = surface.material.y * n.dot(l).max(0.0);
    let specular = surface.material.x * n.dot(h).max(0.0).powf(SHININESS);
    let rgb = surface.albedo.truncate() * (AMBIENT + diffuse + surface.material.w)
        + Vec3::splat(specular);
    rgb.extend(surface.albedo.w)
}

/// The lighting pass.
#[derive(Debug)]
pub struct LightingPass {
    program: ShaderProgram,
    bindings: BindingTable,
}

impl LightingPass {
    pub fn new(
        gpu: &GpuContext,
        quad: Arc<ScreenQuad>,
        bindings: &BindingTable,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let blend = gpu.capabilities.blend_for(format);
        if blend.is_none() {
            log::error!("lighting target {format:?} is not blendable, accumulation disabled");
        }

        let program = ShaderProgram::new(
            gpu,
            quad,
            &ProgramDescriptor {
                label: "Lighting Pass",
                fragment: SOURCE,
                inputs: &bindings.variables(PassId::Lighting),
                format,
                blend,
            },
        )?;
        Ok(Self {
            program,
            bindings: bindings.clone(),
        })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Shades the G-buffer into `target`.
    ///
    /// The camera's inverse matrices are computed on every call.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        gbuffer: &FramebufferConfig,
        camera: &Camera,
        light_position: Vec4,
        clear_color: Vec4,
        time: f32,
    ) -> Result<(), RenderError> {
        let uniforms = self.program.uniforms_mut();
        uniforms.set_mat4("inv_view", camera.view_matrix().inverse());
        uniforms.set_mat4("inv_proj", camera.projection_matrix().inverse());
        uniforms.set_vec4("light_pos", light_position);
        uniforms.set_vec4("clear_color", clear_color);
        uniforms.set_f32("time", time);

        let views = input_views(&self.bindings, PassId::Lighting, |name| {
            let slot = match name {
                "position" => GBufferSlot::Position,
                "normal" => GBufferSlot::Normal,
                "albedo" => GBufferSlot::Albedo,
                "material" => GBufferSlot::Material,
                _ => return None,
            };
            Some(gbuffer.color(slot).view())
        })?;
        let inputs = self.program.bind_inputs(gpu, &views);

        self.program.draw(
            gpu,
            encoder,
            target.view(),
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            inputs.as_ref(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(material: Vec4) -> SurfaceSample {
        SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec4::new(0.5, 0.25, 1.0, 1.0),
            material,
        }
    }

    #[test]
    fn diffuse_light_overhead() {
        let lit = shade(&surface(Vec4::new(0.0, 1.0, 0.0, 0.0)), Vec3::Y * 10.0, Vec3::new(5.0, 5.0, 0.0));
        let expected = Vec4::new(0.5, 0.25, 1.0, 1.0).truncate() * (AMBIENT + 1.0);
        assert!((lit.truncate() - expected).length() < 1e-6);
        assert_eq!(lit.w, 1.0);
    }

    #[test]
    fn light_behind_surface_leaves_ambient() {
        let lit = shade(&surface(Vec4::new(0.0, 1.0, 0.0, 0.0)), Vec3::NEG_Y * 10.0, Vec3::Y);
        assert!((lit.x - 0.5 * AMBIENT).abs() < 1e-6);
    }

    #[test]
    fn mirror_highlight_adds_full_specular() {
        // Eye and light both straight above: the half vector is the normal.
        let lit = shade(&surface(Vec4::new(1.0, 0.0, 0.0, 0.0)), Vec3::Y * 4.0, Vec3::Y * 2.0);
        assert!((lit.x - (0.5 * AMBIENT + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn emittance_is_added_to_albedo() {
        let dark = shade(&surface(Vec4::ZERO), Vec3::NEG_Y, Vec3::Y);
        let glowing = shade(&surface(Vec4::new(0.0, 0.0, 0.0, 2.0)), Vec3::NEG_Y, Vec3::Y);
        assert!((glowing.z - dark.z - 2.0).abs() < 1e-6);
    }
}

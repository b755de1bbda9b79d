//! The frame orchestrator.
//!
//! [`RenderPipeline`] owns the render targets and every pass, and exposes the
//! frame-level API. A frame runs:
//!
//! ```text
//! clear_gbuffer -> render_to_gbuffer -> render_from_gbuffer
//!               -> shadow_stage -> reflection_stage -> present
//! ```
//!
//! Each stage records into its own command encoder and submits it to the
//! single queue before returning, so stages execute in call order. A stage
//! whose inputs were not produced earlier in the same frame returns
//! [`RenderError::StageOutOfOrder`] without recording anything.
//!
//! [`ray_cast`](RenderPipeline::ray_cast) is an alternative to the deferred
//! path and writes the presentation surface directly.

use std::sync::Arc;

use glam::Vec4;

use crate::binding::BindingTable;
use crate::camera::Camera;
use crate::capabilities::Capabilities;
use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::frame::{FrameState, Stage, TargetId};
use crate::gpu::GpuContext;
use crate::mesh::Mesh;
use crate::passes::{
    GeometryPass, LightingPass, PresentPass, RaycastPass, ReflectionPass, ReflectionSettings,
    ShadowPass, SurfaceInputs, TextureSet,
};
use crate::render_target::{CompletenessReport, GBufferSlot, RenderTargetSet};
use crate::scene_info::SceneInfo;
use crate::shader::ScreenQuad;
use crate::texture::Texture;

/// Target [`RenderPipeline::present`] copies to the presentation surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentSource {
    Lit,
    Shadow,
    Reflection,
    GBuffer(GBufferSlot),
}

impl PresentSource {
    fn target(self) -> TargetId {
        match self {
            PresentSource::Lit => TargetId::Lit,
            PresentSource::Shadow => TargetId::Shadow,
            PresentSource::Reflection => TargetId::Reflection,
            PresentSource::GBuffer(_) => TargetId::GBuffer,
        }
    }
}

/// Everything one call to [`RenderPipeline::render_frame`] needs.
#[derive(Clone, Copy, Debug)]
pub struct FrameRequest<'a> {
    pub camera: &'a Camera,
    pub meshes: &'a [Mesh],
    pub texture_sets: &'a [TextureSet<'a>],
    /// Scene geometry for the shadow and reflection stages. Both are skipped
    /// without it.
    pub scene: Option<&'a SceneInfo>,
    /// Presentation view and the target to show on it.
    pub present: Option<(&'a wgpu::TextureView, PresentSource)>,
}

/// Initialization results kept for inspection.
#[derive(Clone, Copy, Debug)]
pub struct Diagnostics<'a> {
    pub capabilities: Capabilities,
    /// Optional capabilities the device lacks.
    pub missing_capabilities: usize,
    pub completeness: &'a CompletenessReport,
    pub frame: u64,
}

/// The deferred render pipeline.
#[derive(Debug)]
pub struct RenderPipeline {
    targets: RenderTargetSet,
    bindings: BindingTable,
    geometry: GeometryPass,
    lighting: LightingPass,
    shadow: ShadowPass,
    reflection: ReflectionPass,
    raycast: RaycastPass,
    present: PresentPass,
    frame: FrameState,
    clear_color: wgpu::Color,
    light_position: Vec4,
    delta_time: f32,
    time: f32,
    capabilities: Capabilities,
    missing_capabilities: usize,
}

impl RenderPipeline {
    /// Allocates every target and builds every pass.
    ///
    /// Missing optional capabilities and incomplete targets are logged as
    /// errors; construction still succeeds. Only shader problems fail.
    pub fn new(gpu: &GpuContext, config: &PipelineConfig) -> Result<Self, RenderError> {
        let missing_capabilities = gpu.capabilities.report_missing();

        let (width, height) = config.extent();
        let targets = RenderTargetSet::allocate(gpu, width, height);
        let bindings = BindingTable::new();
        let quad = Arc::new(ScreenQuad::new(gpu));

        let gbuffer_format = targets.gbuffer().color(GBufferSlot::Position).format();
        let lit_format = targets.lit().format();
        let output_format = gpu.presentation_format();

        let geometry = GeometryPass::new(gpu, gbuffer_format)?;
        let lighting = LightingPass::new(gpu, quad.clone(), &bindings, lit_format)?;
        let shadow = ShadowPass::new(gpu, quad.clone(), &bindings, lit_format)?;
        let reflection = ReflectionPass::new(gpu, quad.clone(), &bindings, lit_format)?;
        let raycast = RaycastPass::new(gpu, quad.clone(), output_format)?;
        let present = PresentPass::new(gpu, quad, &bindings, output_format)?;

        log::info!(
            "render pipeline ready: {}x{}, G-buffer {:?}, output {:?}",
            width,
            height,
            gbuffer_format,
            output_format
        );

        Ok(Self {
            targets,
            bindings,
            geometry,
            lighting,
            shadow,
            reflection,
            raycast,
            present,
            frame: FrameState::new(),
            clear_color: config.clear_color,
            light_position: config.light_position,
            delta_time: 0.0,
            time: 0.0,
            capabilities: gpu.capabilities,
            missing_capabilities,
        })
    }

    /// Reallocates every target at the new size.
    ///
    /// The surface itself is resized through [`GpuContext::resize`]. Targets
    /// written before the resize no longer count as produced.
    pub fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.targets.resize(gpu, width, height);
        self.frame.invalidate();
        let (width, height) = self.targets.size();
        log::info!("render targets resized to {width}x{height}");
    }

    pub fn set_clear_color(&mut self, r: f64, g: f64, b: f64, a: f64) {
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    pub fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    pub fn set_light_position(&mut self, position: Vec4) {
        self.light_position = position;
    }

    pub fn light_position(&self) -> Vec4 {
        self.light_position
    }

    /// Advances the clock time-aware passes read.
    pub fn update_time(&mut self, delta_time: f32, current_time: f32) {
        self.delta_time = delta_time;
        self.time = current_time;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn reflection_settings(&self) -> ReflectionSettings {
        self.reflection.settings()
    }

    pub fn set_reflection_settings(&mut self, settings: ReflectionSettings) {
        self.reflection.set_settings(settings);
    }

    /// Scale applied to the presented color. Defaults to 1.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.present.set_exposure(exposure);
    }

    pub fn exposure(&self) -> f32 {
        self.present.exposure()
    }

    pub fn targets(&self) -> &RenderTargetSet {
        &self.targets
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.frame
    }

    pub fn diagnostics(&self) -> Diagnostics<'_> {
        Diagnostics {
            capabilities: self.capabilities,
            missing_capabilities: self.missing_capabilities,
            completeness: self.targets.report(),
            frame: self.frame.frame(),
        }
    }

    /// Clears the presentation surface to the clear color.
    pub fn clear(&mut self, gpu: &GpuContext, output: &wgpu::TextureView) {
        let mut encoder = create_encoder(gpu, "Clear Encoder");
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Output"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        submit(gpu, encoder, "clear");
        self.frame.clear_presentation();
    }

    /// Starts a frame: every G-buffer attachment goes to zero, depth to 1.
    pub fn clear_gbuffer(&mut self, gpu: &GpuContext) {
        let mut encoder = create_encoder(gpu, "Clear G-buffer Encoder");
        let gbuffer = self.targets.gbuffer();
        let color_attachments = gbuffer.color_attachments(wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT));
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear G-buffer"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(gbuffer.depth_attachment(wgpu::LoadOp::Clear(1.0))),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        submit(gpu, encoder, "clear_gbuffer");
        self.frame.begin();
    }

    /// Draws `meshes` into the G-buffer.
    ///
    /// `texture_sets[i]` applies to `meshes[i]`.
    pub fn render_to_gbuffer(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        meshes: &[Mesh],
        texture_sets: &[TextureSet<'_>],
    ) -> Result<(), RenderError> {
        self.check(Stage::Geometry)?;

        let mut encoder = create_encoder(gpu, "Geometry Encoder");
        self.geometry.draw_element(
            gpu,
            &mut encoder,
            self.targets.gbuffer(),
            camera,
            meshes,
            texture_sets,
        );
        submit(gpu, encoder, "geometry");
        log::debug!("geometry: {} meshes", meshes.len());

        self.frame.complete(Stage::Geometry);
        Ok(())
    }

    /// Shades the G-buffer into the lit target.
    pub fn render_from_gbuffer(&mut self, gpu: &GpuContext, camera: &Camera) -> Result<(), RenderError> {
        self.check(Stage::Lighting)?;

        let mut encoder = create_encoder(gpu, "Lighting Encoder");
        self.lighting.draw_element(
            gpu,
            &mut encoder,
            self.targets.lit(),
            self.targets.gbuffer(),
            camera,
            self.light_position,
            color_to_vec4(self.clear_color),
            self.time,
        )?;
        submit(gpu, encoder, "lighting");

        self.frame.complete(Stage::Lighting);
        Ok(())
    }

    /// Computes light visibility into the shadow target.
    ///
    /// `scene` is bound in the order given and must follow the scene-texture
    /// layout (see [`SceneInfo`]).
    pub fn shadow_stage(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        scene: &[Texture],
        triangle_count: u32,
    ) -> Result<(), RenderError> {
        self.check(Stage::Shadow)?;

        let mut encoder = create_encoder(gpu, "Shadow Encoder");
        let surface = surface_inputs(&self.targets);
        self.shadow.draw_element(
            gpu,
            &mut encoder,
            self.targets.shadow().view(),
            &surface,
            scene,
            triangle_count,
            self.light_position,
            self.time,
        )?;
        submit(gpu, encoder, "shadow");
        log::debug!(
            "shadow: {} triangles, eye at {:?}",
            triangle_count,
            camera.position
        );

        self.frame.complete(Stage::Shadow);
        Ok(())
    }

    /// Evaluates reflections into the reflection target.
    pub fn reflection_stage(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        scene: &[Texture],
        triangle_count: u32,
    ) -> Result<(), RenderError> {
        self.check(Stage::Reflection)?;

        let mut encoder = create_encoder(gpu, "Reflection Encoder");
        let surface = surface_inputs(&self.targets);
        self.reflection.draw_element(
            gpu,
            &mut encoder,
            self.targets.reflection().view(),
            &surface,
            scene,
            triangle_count,
            camera.position,
            self.light_position,
            self.time,
        )?;
        submit(gpu, encoder, "reflection");

        self.frame.complete(Stage::Reflection);
        Ok(())
    }

    /// Renders the camera-only raycast view straight into `output`.
    ///
    /// If the deferred result was already presented this frame, the raycast
    /// is submitted after it and replaces it.
    pub fn ray_cast(&mut self, gpu: &GpuContext, camera: &Camera, output: &wgpu::TextureView) {
        if let Some(previous) = self.frame.claim_presentation(Stage::Raycast) {
            log::warn!("raycast overwrites the {previous:?} output presented earlier this frame");
        }

        let mut encoder = create_encoder(gpu, "Raycast Encoder");
        self.raycast.draw_element(
            gpu,
            &mut encoder,
            output,
            camera,
            self.light_position,
            color_to_vec4(self.clear_color),
            self.time,
        );
        submit(gpu, encoder, "raycast");
        self.frame.complete(Stage::Raycast);
    }

    /// Copies `source` to `output`.
    pub fn present(
        &mut self,
        gpu: &GpuContext,
        output: &wgpu::TextureView,
        source: PresentSource,
    ) -> Result<(), RenderError> {
        let target = source.target();
        if !self.frame.is_written(target) {
            return Err(RenderError::StageOutOfOrder {
                stage: Stage::Present,
                missing: target,
            });
        }
        if let Some(previous) = self.frame.claim_presentation(Stage::Present) {
            log::warn!("presenting {source:?} overwrites the {previous:?} output of this frame");
        }

        let view = match source {
            PresentSource::Lit => self.targets.lit().view(),
            PresentSource::Shadow => self.targets.shadow().view(),
            PresentSource::Reflection => self.targets.reflection().view(),
            PresentSource::GBuffer(slot) => self.targets.gbuffer().color(slot).view(),
        };

        let mut encoder = create_encoder(gpu, "Present Encoder");
        self.present.draw_element(gpu, &mut encoder, output, view)?;
        submit(gpu, encoder, "present");
        self.frame.complete(Stage::Present);
        Ok(())
    }

    /// Runs one frame in the canonical stage order.
    pub fn render_frame(&mut self, gpu: &GpuContext, request: &FrameRequest<'_>) -> Result<(), RenderError> {
        self.clear_gbuffer(gpu);
        self.render_to_gbuffer(gpu, request.camera, request.meshes, request.texture_sets)?;
        self.render_from_gbuffer(gpu, request.camera)?;

        if let Some(scene) = request.scene {
            self.shadow_stage(gpu, request.camera, scene.textures(), scene.triangle_count())?;
            self.reflection_stage(gpu, request.camera, scene.textures(), scene.triangle_count())?;
        }

        if let Some((output, source)) = request.present {
            self.present(gpu, output, source)?;
        }
        Ok(())
    }

    fn check(&self, stage: Stage) -> Result<(), RenderError> {
        match self.frame.check(stage) {
            Some(missing) => Err(RenderError::StageOutOfOrder { stage, missing }),
            None => Ok(()),
        }
    }
}

fn surface_inputs(targets: &RenderTargetSet) -> SurfaceInputs<'_> {
    let gbuffer = targets.gbuffer();
    SurfaceInputs {
        normal: gbuffer.color(GBufferSlot::Normal).view(),
        position: gbuffer.color(GBufferSlot::Position).view(),
        lit: targets.lit().view(),
        material: gbuffer.color(GBufferSlot::Material).view(),
        size: targets.size(),
    }
}

fn create_encoder(gpu: &GpuContext, label: &str) -> wgpu::CommandEncoder {
    gpu.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
}

fn submit(gpu: &GpuContext, encoder: wgpu::CommandEncoder, stage: &str) {
    gpu.queue.submit(std::iter::once(encoder.finish()));
    log::trace!("submitted {stage}");
}

fn color_to_vec4(color: wgpu::Color) -> Vec4 {
    Vec4::new(color.r as f32, color.g as f32, color.b as f32, color.a as f32)
}

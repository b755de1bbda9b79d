//! # Umbra
//!
//! **A deferred multi-pass renderer on wgpu.**
//!
//! Geometry goes into a four-attachment G-buffer once; lighting, shadows and
//! reflections are then screen-space passes reading it back. Shadows and
//! reflections trace rays against the scene's triangles, which are packed
//! into float textures by [`SceneInfo`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use umbra::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     init_logging(LoggingConfig::default());
//!
//!     let gpu = GpuContext::headless(800, 600)?;
//!     let mut pipeline = RenderPipeline::new(&gpu, &PipelineConfig::new().size(800, 600))?;
//!
//!     let meshes = vec![
//!         Mesh::plane(&gpu, 20.0, 0.0),
//!         Mesh::cube(&gpu, Vec3::new(0.0, 1.0, 0.0), 2.0)
//!             .with_material(Material::new(0.6, 0.8, 0.0, 0.0)),
//!     ];
//!     let scene = SceneInfo::encode(&gpu, &meshes);
//!     let camera = Camera::new().at(0.0, 4.0, 8.0).looking_at(0.0, 0.0, 0.0);
//!
//!     pipeline.render_frame(
//!         &gpu,
//!         &FrameRequest {
//!             camera: &camera,
//!             meshes: &meshes,
//!             texture_sets: &[],
//!             scene: Some(&scene),
//!             present: None,
//!         },
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`RenderPipeline`]: the frame API and stage ordering.
//! - [`passes`]: one type per pass, usable on their own.
//! - [`shader`]: WGSL reflection and name-addressed uniforms.
//! - [`RenderTargetSet`]: G-buffer and intermediate targets.

pub mod binding;
mod camera;
pub mod capabilities;
mod config;
mod error;
pub mod frame;
mod gpu;
mod logging;
mod mesh;
pub mod passes;
mod pipeline;
pub mod render_target;
pub mod scene_info;
pub mod shader;
mod texture;

pub use binding::{Binding, BindingTable, PassId};
pub use camera::Camera;
pub use capabilities::Capabilities;
pub use config::{DEFAULT_LIGHT_POSITION, PipelineConfig};
pub use error::RenderError;
pub use frame::{FrameState, Stage, TargetId};
pub use gpu::{GpuContext, HEADLESS_FORMAT};
pub use logging::{LoggingConfig, init_logging};
pub use mesh::{Material, Mesh, Triangle, Vertex3d};
pub use passes::{
    GeometryPass, LightingPass, PresentPass, RaycastPass, ReflectionPass, ReflectionSettings,
    ShadingVariant, ShadowPass, SurfaceInputs, TextureSet,
};
pub use pipeline::{Diagnostics, FrameRequest, PresentSource, RenderPipeline};
pub use render_target::{
    CompletenessIssue, CompletenessReport, FramebufferConfig, GBufferSlot, RenderTarget,
    RenderTargetSet,
};
pub use scene_info::SceneInfo;
pub use texture::Texture;

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};

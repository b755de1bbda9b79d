//! The render passes, in the order a frame runs them.
//!
//! | Pass                | Reads                                            | Writes       |
//! |---------------------|--------------------------------------------------|--------------|
//! | [`GeometryPass`]    | meshes, texture sets                             | G-buffer     |
//! | [`LightingPass`]    | G-buffer                                         | Lit          |
//! | [`ShadowPass`]      | normal, position, lit, scene textures            | Shadow       |
//! | [`ReflectionPass`]  | normal, position, lit, material, scene textures  | Reflection   |
//! | [`RaycastPass`]     | camera only                                      | presentation |
//! | [`PresentPass`]     | any one target                                   | presentation |

pub mod geometry;
pub mod lighting;
pub mod present;
pub mod raycast;
pub mod reflection;
pub mod shadow;

pub use geometry::{GeometryPass, ShadingVariant, TextureSet};
pub use lighting::LightingPass;
pub use present::PresentPass;
pub use raycast::RaycastPass;
pub use reflection::{ReflectionPass, ReflectionSettings};
pub use shadow::ShadowPass;

use glam::UVec2;

use crate::binding::{BindingTable, PassId};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::scene_info::MAX_SCENE_TEXTURES;
use crate::texture::Texture;

/// Per-pixel surface inputs of the shadow and reflection passes.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceInputs<'a> {
    pub normal: &'a wgpu::TextureView,
    pub position: &'a wgpu::TextureView,
    pub lit: &'a wgpu::TextureView,
    pub material: &'a wgpu::TextureView,
    /// Width and height of the surface textures, in pixels.
    pub size: (u32, u32),
}

/// Scene-geometry texture slots, padded with an empty texture.
#[derive(Debug)]
pub(crate) struct SceneSlots {
    empty: Texture,
}

impl SceneSlots {
    pub(crate) fn new(gpu: &GpuContext) -> Self {
        Self {
            empty: Texture::from_rgba32f(gpu, &[0.0; 4], 1, 1, "Empty Scene Slot"),
        }
    }

    /// Views for `scene_0..scene_3`, in caller order.
    pub(crate) fn views<'a>(
        &'a self,
        scene: &'a [Texture],
    ) -> Result<[&'a wgpu::TextureView; MAX_SCENE_TEXTURES], RenderError> {
        if scene.len() > MAX_SCENE_TEXTURES {
            return Err(RenderError::TooManySceneTextures {
                given: scene.len(),
                max: MAX_SCENE_TEXTURES,
            });
        }
        Ok(std::array::from_fn(|i| {
            scene.get(i).map_or(&self.empty.view, |t| &t.view)
        }))
    }
}

/// Size of the first scene texture, or zero without one.
pub(crate) fn scene_size(scene: &[Texture]) -> UVec2 {
    scene
        .first()
        .map_or(UVec2::ZERO, |t| UVec2::new(t.width, t.height))
}

/// Collects the views `pass` binds, placed at their table units.
///
/// Every declared input must resolve; a gap would shift the remaining
/// views onto the wrong units.
pub(crate) fn input_views<'a, T: ?Sized>(
    bindings: &BindingTable,
    pass: PassId,
    lookup: impl Fn(&str) -> Option<&'a T>,
) -> Result<Vec<&'a T>, RenderError> {
    let missing = |message: String| RenderError::Shader {
        label: format!("{pass:?} pass"),
        message,
    };

    let mut slots: Vec<Option<&'a T>> = vec![None; pass.inputs().len()];
    for &name in pass.inputs() {
        let unit = bindings
            .unit(pass, name)
            .ok_or_else(|| missing(format!("input '{name}' has no unit")))?;
        let view = lookup(name).ok_or_else(|| missing(format!("no view for input '{name}'")))?;
        let slot = slots
            .get_mut(unit as usize)
            .ok_or_else(|| missing(format!("unit {unit} of '{name}' out of range")))?;
        *slot = Some(view);
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| missing("inputs do not cover every unit".to_owned()))
}

/// Resolves a shadow/reflection input by name.
pub(crate) fn surface_input<'a>(
    name: &str,
    surface: &SurfaceInputs<'a>,
    scene: &[&'a wgpu::TextureView; MAX_SCENE_TEXTURES],
) -> Option<&'a wgpu::TextureView> {
    match name {
        "normal" => Some(surface.normal),
        "position" => Some(surface.position),
        "lit" => Some(surface.lit),
        "material" => Some(surface.material),
        _ => {
            let index: usize = name.strip_prefix("scene_")?.parse().ok()?;
            scene.get(index).copied()
        }
    }
}

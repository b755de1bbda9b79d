//! Scene-geometry textures for GPU-side visibility and reflection tests.
//!
//! The shadow and reflection passes ray-test every pixel against the whole
//! scene. They read the scene from an ordered list of `Rgba32Float` textures
//! with this layout:
//!
//! | slot      | texel `3i + 0`         | texel `3i + 1`               | texel `3i + 2`                 |
//! |-----------|------------------------|------------------------------|--------------------------------|
//! | `scene_0` | v0 (xyz, w = 1)        | v1 (xyz, w = 1)              | v2 (xyz, w = 1)                |
//! | `scene_1` | base color (rgba)      | material (spec, diff, refr, emit) | face normal (xyz, w = id) |
//!
//! where `i` is the triangle index across all meshes in submission order.
//! Texel `t` lives at `(t % SCENE_TEXTURE_WIDTH, t / SCENE_TEXTURE_WIDTH)`.
//! Slot order is significant; the passes bind `scene_0` before `scene_1`.

use glam::Vec4;

use crate::gpu::GpuContext;
use crate::mesh::{Material, Mesh, Triangle};
use crate::texture::Texture;

/// Row width of every scene-geometry texture, in texels.
pub const SCENE_TEXTURE_WIDTH: u32 = 1024;

/// Texels each triangle occupies in each scene texture.
pub const TEXELS_PER_TRIANGLE: u32 = 3;

/// Scene texture slots the shadow and reflection passes bind.
pub const MAX_SCENE_TEXTURES: usize = 4;

/// Texture coordinate of texel `index` in a scene texture.
pub fn texel_coord(index: u32) -> (u32, u32) {
    (index % SCENE_TEXTURE_WIDTH, index / SCENE_TEXTURE_WIDTH)
}

/// CPU-side packed scene data, before upload.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedScene {
    pub width: u32,
    pub height: u32,
    pub triangle_count: u32,
    pub positions: Vec<f32>,
    pub attributes: Vec<f32>,
}

/// Surface of one mesh as the scene textures see it.
#[derive(Clone, Copy, Debug)]
pub struct SceneSurface<'a> {
    pub triangles: &'a [Triangle],
    pub base_color: Vec4,
    pub material: Material,
}

impl<'a> From<&'a Mesh> for SceneSurface<'a> {
    fn from(mesh: &'a Mesh) -> Self {
        Self {
            triangles: mesh.triangles(),
            base_color: mesh.base_color,
            material: mesh.material,
        }
    }
}

/// Packs surfaces into the documented texel layout.
pub fn pack<'a>(surfaces: impl IntoIterator<Item = SceneSurface<'a>>) -> PackedScene {
    let mut positions = Vec::new();
    let mut attributes = Vec::new();
    let mut triangle_count = 0u32;

    for surface in surfaces {
        for tri in surface.triangles {
            for v in tri.vertices {
                positions.extend_from_slice(&[v.x, v.y, v.z, 1.0]);
            }
            let n = tri.normal();
            attributes.extend_from_slice(&surface.base_color.to_array());
            attributes.extend_from_slice(&surface.material.to_vec4().to_array());
            attributes.extend_from_slice(&[n.x, n.y, n.z, triangle_count as f32]);
            triangle_count += 1;
        }
    }

    let texels = triangle_count * TEXELS_PER_TRIANGLE;
    let height = texels.div_ceil(SCENE_TEXTURE_WIDTH).max(1);
    let len = (SCENE_TEXTURE_WIDTH * height * 4) as usize;
    positions.resize(len, 0.0);
    attributes.resize(len, 0.0);

    PackedScene {
        width: SCENE_TEXTURE_WIDTH,
        height,
        triangle_count,
        positions,
        attributes,
    }
}

/// Uploaded scene-geometry textures, in slot order.
#[derive(Debug)]
pub struct SceneInfo {
    textures: Vec<Texture>,
    triangle_count: u32,
}

impl SceneInfo {
    /// Encodes every triangle of `meshes` into the two scene textures.
    pub fn encode(gpu: &GpuContext, meshes: &[Mesh]) -> Self {
        let packed = pack(meshes.iter().map(SceneSurface::from));
        let positions = Texture::from_rgba32f(
            gpu,
            &packed.positions,
            packed.width,
            packed.height,
            "Scene Positions",
        );
        let attributes = Texture::from_rgba32f(
            gpu,
            &packed.attributes,
            packed.width,
            packed.height,
            "Scene Attributes",
        );

        log::debug!(
            "encoded {} triangles into {}x{} scene textures",
            packed.triangle_count,
            packed.width,
            packed.height
        );

        Self {
            textures: vec![positions, attributes],
            triangle_count: packed.triangle_count,
        }
    }

    /// Wraps textures produced elsewhere. Their order must match the layout
    /// the shaders were written for.
    pub fn from_textures(textures: Vec<Texture>, triangle_count: u32) -> Self {
        Self {
            textures,
            triangle_count,
        }
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn tri(id: u32, z: f32) -> Triangle {
        Triangle {
            vertices: [
                Vec3::new(0.0, 0.0, z),
                Vec3::new(1.0, 0.0, z),
                Vec3::new(0.0, 1.0, z),
            ],
            id,
        }
    }

    #[test]
    fn texel_coords_wrap_rows() {
        assert_eq!(texel_coord(0), (0, 0));
        assert_eq!(texel_coord(SCENE_TEXTURE_WIDTH - 1), (SCENE_TEXTURE_WIDTH - 1, 0));
        assert_eq!(texel_coord(SCENE_TEXTURE_WIDTH + 2), (2, 1));
    }

    #[test]
    fn empty_scene_still_has_one_row() {
        let packed = pack(std::iter::empty());
        assert_eq!(packed.triangle_count, 0);
        assert_eq!(packed.height, 1);
        assert_eq!(packed.positions.len(), (SCENE_TEXTURE_WIDTH * 4) as usize);
        assert!(packed.positions.iter().all(|&f| f == 0.0));
    }

    #[test]
    fn triangles_are_numbered_across_meshes() {
        let first = [tri(0, 0.0)];
        let second = [tri(0, -2.0), tri(1, -3.0)];
        let material = Material::new(0.5, 0.25, 0.0, 0.0);
        let packed = pack([
            SceneSurface {
                triangles: &first,
                base_color: Vec4::new(1.0, 0.0, 0.0, 1.0),
                material: Material::default(),
            },
            SceneSurface {
                triangles: &second,
                base_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
                material,
            },
        ]);

        assert_eq!(packed.triangle_count, 3);

        // Third triangle, second vertex: texel 7.
        let texel = |data: &[f32], t: usize| [data[t * 4], data[t * 4 + 1], data[t * 4 + 2], data[t * 4 + 3]];
        assert_eq!(texel(&packed.positions, 7), [1.0, 0.0, -3.0, 1.0]);

        // Second triangle's attributes start at texel 3.
        assert_eq!(texel(&packed.attributes, 3), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(texel(&packed.attributes, 4), [0.5, 0.25, 0.0, 0.0]);
        assert_eq!(texel(&packed.attributes, 5), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn height_grows_with_triangle_count() {
        let many: Vec<Triangle> = (0..400).map(|i| tri(i, 0.0)).collect();
        let packed = pack([SceneSurface {
            triangles: &many,
            base_color: Vec4::ONE,
            material: Material::default(),
        }]);

        // 1200 texels over 1024-wide rows.
        assert_eq!(packed.height, 2);
    }
}

//! Mesh geometry handed to the pipeline in final form.
//!
//! Loading and parsing model files happens elsewhere; this module only owns
//! the GPU upload of already-built vertex and index data, plus the per-mesh
//! surface description the geometry pass writes into the G-buffer:
//!
//! - [`Vertex3d`]: position, normal, uv and vertex color
//! - [`Material`]: specular, diffuse, refraction and emittance coefficients
//! - [`Mesh`]: GPU buffers, base color, material and the triangle list used
//!   to build scene-geometry textures
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |
//! | color     | Float32x4 | 32     | 3               |

use glam::{Vec3, Vec4};

use crate::gpu::GpuContext;

/// A vertex with position, normal, texture coordinates and color.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex3d {
    /// The wgpu vertex buffer layout for this vertex type.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };

    /// Creates a white vertex.
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            color: [1.0; 4],
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

/// Per-mesh surface coefficients, uploaded once per draw.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Material {
    pub specular: f32,
    pub diffuse: f32,
    pub refraction: f32,
    pub emittance: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            specular: 0.0,
            diffuse: 1.0,
            refraction: 0.0,
            emittance: 0.0,
        }
    }
}

impl Material {
    pub fn new(specular: f32, diffuse: f32, refraction: f32, emittance: f32) -> Self {
        Self {
            specular,
            diffuse,
            refraction,
            emittance,
        }
    }

    /// Packs the coefficients the way the material attachment stores them.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.specular, self.diffuse, self.refraction, self.emittance)
    }
}

/// One triangle of a mesh, in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
    /// Index of the triangle within its mesh.
    pub id: u32,
}

impl Triangle {
    /// Unit face normal following the winding order, or zero for degenerate triangles.
    pub fn normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(c - a).normalize_or_zero()
    }
}

/// Extracts the triangle list from indexed vertex data.
///
/// Trailing indices that do not form a full triangle are ignored, as are
/// triangles referencing out-of-range vertices.
pub fn triangles(vertices: &[Vertex3d], indices: &[u32]) -> Vec<Triangle> {
    indices
        .chunks_exact(3)
        .enumerate()
        .filter_map(|(id, tri)| {
            let fetch = |i: u32| vertices.get(i as usize).map(|v| Vec3::from(v.position));
            Some(Triangle {
                vertices: [fetch(tri[0])?, fetch(tri[1])?, fetch(tri[2])?],
                id: id as u32,
            })
        })
        .collect()
}

/// GPU-resident mesh geometry with its surface description.
///
/// Vertex positions are in world space; the pipeline applies no per-mesh
/// transform.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
    /// Color written to the albedo attachment when the mesh is not textured.
    pub base_color: Vec4,
    pub material: Material,
    triangles: Vec<Triangle>,
}

impl Mesh {
    /// Uploads vertex and index data. Indices are u32, three per triangle.
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            base_color: Vec4::ONE,
            material: Material::default(),
            triangles: triangles(vertices, indices),
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// The mesh's triangles, in index order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// An axis-aligned cube with the given center and edge length.
    pub fn cube(gpu: &GpuContext, center: Vec3, size: f32) -> Self {
        let (vertices, indices) = cube_geometry(center, size);
        Self::new(gpu, &vertices, &indices)
    }

    /// A square on the XZ plane at `height`, facing +Y.
    pub fn plane(gpu: &GpuContext, size: f32, height: f32) -> Self {
        let (vertices, indices) = plane_geometry(size, height);
        Self::new(gpu, &vertices, &indices)
    }
}

fn cube_geometry(center: Vec3, size: f32) -> (Vec<Vertex3d>, Vec<u32>) {
    let h = size * 0.5;
    let v = |p: [f32; 3], n: [f32; 3], uv: [f32; 2]| {
        Vertex3d::new(
            [center.x + p[0] * h, center.y + p[1] * h, center.z + p[2] * h],
            n,
            uv,
        )
    };

    // Each face has its own vertices for correct normals
    #[rustfmt::skip]
    let vertices = vec![
        // Front face (Z+)
        v([-1.0, -1.0,  1.0], [ 0.0,  0.0,  1.0], [0.0, 0.0]),
        v([ 1.0, -1.0,  1.0], [ 0.0,  0.0,  1.0], [1.0, 0.0]),
        v([ 1.0,  1.0,  1.0], [ 0.0,  0.0,  1.0], [1.0, 1.0]),
        v([-1.0,  1.0,  1.0], [ 0.0,  0.0,  1.0], [0.0, 1.0]),
        // Back face (Z-)
        v([ 1.0, -1.0, -1.0], [ 0.0,  0.0, -1.0], [0.0, 0.0]),
        v([-1.0, -1.0, -1.0], [ 0.0,  0.0, -1.0], [1.0, 0.0]),
        v([-1.0,  1.0, -1.0], [ 0.0,  0.0, -1.0], [1.0, 1.0]),
        v([ 1.0,  1.0, -1.0], [ 0.0,  0.0, -1.0], [0.0, 1.0]),
        // Top face (Y+)
        v([-1.0,  1.0,  1.0], [ 0.0,  1.0,  0.0], [0.0, 0.0]),
        v([ 1.0,  1.0,  1.0], [ 0.0,  1.0,  0.0], [1.0, 0.0]),
        v([ 1.0,  1.0, -1.0], [ 0.0,  1.0,  0.0], [1.0, 1.0]),
        v([-1.0,  1.0, -1.0], [ 0.0,  1.0,  0.0], [0.0, 1.0]),
        // Bottom face (Y-)
        v([-1.0, -1.0, -1.0], [ 0.0, -1.0,  0.0], [0.0, 0.0]),
        v([ 1.0, -1.0, -1.0], [ 0.0, -1.0,  0.0], [1.0, 0.0]),
        v([ 1.0, -1.0,  1.0], [ 0.0, -1.0,  0.0], [1.0, 1.0]),
        v([-1.0, -1.0,  1.0], [ 0.0, -1.0,  0.0], [0.0, 1.0]),
        // Right face (X+)
        v([ 1.0, -1.0,  1.0], [ 1.0,  0.0,  0.0], [0.0, 0.0]),
        v([ 1.0, -1.0, -1.0], [ 1.0,  0.0,  0.0], [1.0, 0.0]),
        v([ 1.0,  1.0, -1.0], [ 1.0,  0.0,  0.0], [1.0, 1.0]),
        v([ 1.0,  1.0,  1.0], [ 1.0,  0.0,  0.0], [0.0, 1.0]),
        // Left face (X-)
        v([-1.0, -1.0, -1.0], [-1.0,  0.0,  0.0], [0.0, 0.0]),
        v([-1.0, -1.0,  1.0], [-1.0,  0.0,  0.0], [1.0, 0.0]),
        v([-1.0,  1.0,  1.0], [-1.0,  0.0,  0.0], [1.0, 1.0]),
        v([-1.0,  1.0, -1.0], [-1.0,  0.0,  0.0], [0.0, 1.0]),
    ];

    #[rustfmt::skip]
    let indices: Vec<u32> = vec![
        0,  1,  2,  2,  3,  0,  // front
        4,  5,  6,  6,  7,  4,  // back
        8,  9,  10, 10, 11, 8,  // top
        12, 13, 14, 14, 15, 12, // bottom
        16, 17, 18, 18, 19, 16, // right
        20, 21, 22, 22, 23, 20, // left
    ];

    (vertices, indices)
}

fn plane_geometry(size: f32, height: f32) -> (Vec<Vertex3d>, Vec<u32>) {
    let half = size * 0.5;
    let vertices = vec![
        Vertex3d::new([-half, height, half], [0.0, 1.0, 0.0], [0.0, 0.0]),
        Vertex3d::new([half, height, half], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex3d::new([half, height, -half], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex3d::new([-half, height, -half], [0.0, 1.0, 0.0], [0.0, 1.0]),
    ];

    let indices = vec![0, 1, 2, 2, 3, 0];

    (vertices, indices)
}

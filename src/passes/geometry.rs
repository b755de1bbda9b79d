//! Rasterizes meshes into the G-buffer.
//!
//! One indexed draw per mesh. Per-draw uniforms (shading discriminator, base
//! color, material) are packed into a single buffer and addressed with
//! dynamic offsets, so every draw of a pass sees its own values.
//!
//! | Attachment | Written value                                   |
//! |------------|-------------------------------------------------|
//! | Position   | world position, `w` = linear view depth         |
//! | Normal     | world normal, `w` = 1                           |
//! | Albedo     | base color or `albedo_map` sample, times vertex color |
//! | Material   | material coefficients, times `material_map` when textured |

use std::num::NonZeroU64;

use glam::Vec4;

use crate::camera::Camera;
use crate::capabilities::{Capabilities, DEPTH_FORMAT};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};
use crate::render_target::{FramebufferConfig, GBUFFER_ATTACHMENTS};
use crate::shader::{ProgramLayout, UniformBlock};
use crate::texture::Texture;

const SOURCE: &str = include_str!("../shaders/gbuffer.wgsl");

/// Names a [`TextureSet`] recognizes.
pub const TEXTURE_NAMES: [&str; 2] = ["albedo_map", "material_map"];

/// Named surface textures for one mesh.
///
/// Missing entries fall back to a 1x1 white texture.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextureSet<'a> {
    albedo_map: Option<&'a Texture>,
    material_map: Option<&'a Texture>,
}

impl<'a> TextureSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the texture for `name`. Unknown names are ignored.
    pub fn with(mut self, name: &str, texture: &'a Texture) -> Self {
        match name {
            "albedo_map" => self.albedo_map = Some(texture),
            "material_map" => self.material_map = Some(texture),
            other => log::debug!("ignoring texture '{other}', expected one of {TEXTURE_NAMES:?}"),
        }
        self
    }

    pub fn albedo_map(self, texture: &'a Texture) -> Self {
        self.with("albedo_map", texture)
    }

    pub fn material_map(self, texture: &'a Texture) -> Self {
        self.with("material_map", texture)
    }

    pub fn is_empty(&self) -> bool {
        self.albedo_map.is_none() && self.material_map.is_none()
    }

    /// Drops textures the filtering samplers of the geometry pass cannot
    /// read on this device. A dropped entry is treated as never set.
    pub fn sampleable(self, capabilities: &Capabilities) -> Self {
        let keep = |name: &str, texture: Option<&'a Texture>| {
            texture.filter(|t| {
                let filterable = capabilities.is_filterable(t.format);
                if !filterable {
                    log::warn!("dropping {name}: {:?} cannot be filtered on this device", t.format);
                }
                filterable
            })
        };
        Self {
            albedo_map: keep("albedo_map", self.albedo_map),
            material_map: keep("material_map", self.material_map),
        }
    }
}

/// How a mesh's albedo is produced.
#[derive(Clone, Copy, Debug)]
pub enum ShadingVariant<'a> {
    Constant(Vec4),
    Textured(TextureSet<'a>),
}

impl<'a> ShadingVariant<'a> {
    /// A non-empty texture set wins over the mesh's base color.
    pub fn resolve(mesh: &Mesh, textures: Option<&TextureSet<'a>>) -> Self {
        match textures {
            Some(set) if !set.is_empty() => ShadingVariant::Textured(*set),
            _ => ShadingVariant::Constant(mesh.base_color),
        }
    }

    /// Value of the shader's `use_texture` discriminator.
    pub fn discriminator(&self) -> u32 {
        match self {
            ShadingVariant::Constant(_) => 0,
            ShadingVariant::Textured(_) => 1,
        }
    }
}

/// Rounds `size` up to a multiple of `alignment`.
pub fn aligned_stride(size: u32, alignment: u32) -> u64 {
    let alignment = alignment.max(1) as u64;
    (size as u64).div_ceil(alignment) * alignment
}

/// The geometry pass.
#[derive(Debug)]
pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    layout: ProgramLayout,
    camera: UniformBlock,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    draw: UniformBlock,
    draw_layout: wgpu::BindGroupLayout,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_stride: u64,
    draw_capacity: usize,
    texture_layout: wgpu::BindGroupLayout,
    default_textures: wgpu::BindGroup,
    white: Texture,
}

impl GeometryPass {
    pub fn new(gpu: &GpuContext, color_format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        let device = &gpu.device;
        let layout = ProgramLayout::reflect("Geometry Pass", SOURCE)?;

        let missing = |name: &str| RenderError::Shader {
            label: "Geometry Pass".to_string(),
            message: format!("uniform block '{name}' is not declared"),
        };
        let camera = UniformBlock::new(layout.block("camera").ok_or_else(|| missing("camera"))?);
        let draw = UniformBlock::new(layout.block("draw").ok_or_else(|| missing("draw"))?);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(SOURCE.into()),
        });

        // Camera uniforms (group 0)
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Camera Uniforms"),
            size: camera.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geometry Camera Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geometry Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Per-draw uniforms (group 1), one aligned slot per mesh
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geometry Draw Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(draw.size() as u64),
                },
                count: None,
            }],
        });

        let draw_stride = aligned_stride(
            draw.size(),
            gpu.capabilities.min_uniform_buffer_offset_alignment,
        );
        let draw_capacity = 16;
        let (draw_buffer, draw_bind_group) =
            Self::create_draw_buffer(gpu, &draw_layout, &draw, draw_stride, draw_capacity);

        // Surface textures (group 2)
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geometry Texture Layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });

        let white = Texture::solid(gpu, [255, 255, 255, 255], "Default White Texture");
        let default_textures = Self::texture_bind_group(gpu, &texture_layout, &white, &white);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geometry Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &draw_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let targets: Vec<Option<wgpu::ColorTargetState>> = (0..GBUFFER_ATTACHMENTS)
            .map(|_| {
                Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Geometry Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            layout,
            camera,
            camera_buffer,
            camera_bind_group,
            draw,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_stride,
            draw_capacity,
            texture_layout,
            default_textures,
            white,
        })
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    fn create_draw_buffer(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        draw: &UniformBlock,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Draw Uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geometry Draw Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(draw.size() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn texture_bind_group(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        albedo: &Texture,
        material: &Texture,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geometry Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&albedo.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&albedo.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&material.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&material.sampler),
                },
            ],
        })
    }

    fn ensure_capacity(&mut self, gpu: &GpuContext, count: usize) {
        if count <= self.draw_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        log::debug!("growing geometry draw uniforms to {capacity} slots");
        let (buffer, bind_group) = Self::create_draw_buffer(
            gpu,
            &self.draw_layout,
            &self.draw,
            self.draw_stride,
            capacity,
        );
        self.draw_buffer = buffer;
        self.draw_bind_group = bind_group;
        self.draw_capacity = capacity;
    }

    /// Records one indexed draw per mesh into `gbuffer`.
    ///
    /// `texture_sets[i]` belongs to `meshes[i]`; meshes past the end of
    /// `texture_sets`, or with an empty set, use their base color. Textures
    /// the device cannot filter are left out of their set. The
    /// G-buffer is loaded, not cleared, so uncovered pixels keep whatever the
    /// last clear wrote.
    pub fn draw_element(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &FramebufferConfig,
        camera: &Camera,
        meshes: &[Mesh],
        texture_sets: &[TextureSet<'_>],
    ) {
        if meshes.is_empty() {
            return;
        }
        self.ensure_capacity(gpu, meshes.len());

        let view = camera.view_matrix();
        self.camera.set_mat4("view_proj", camera.projection_matrix() * view);
        self.camera.set_mat4("view", view);
        gpu.queue
            .write_buffer(&self.camera_buffer, 0, self.camera.bytes());

        let mut staging = vec![0u8; self.draw_stride as usize * meshes.len()];
        let mut texture_groups = Vec::with_capacity(meshes.len());

        for (i, mesh) in meshes.iter().enumerate() {
            let set = texture_sets.get(i).map(|set| set.sampleable(&gpu.capabilities));
            let variant = ShadingVariant::resolve(mesh, set.as_ref());

            self.draw.reset();
            self.draw.set_u32("use_texture", variant.discriminator());
            self.draw.set_vec4("base_color", mesh.base_color);
            self.draw.set_vec4("material", mesh.material.to_vec4());

            let start = i * self.draw_stride as usize;
            staging[start..start + self.draw.bytes().len()].copy_from_slice(self.draw.bytes());

            texture_groups.push(match variant {
                ShadingVariant::Constant(_) => None,
                ShadingVariant::Textured(set) => Some(Self::texture_bind_group(
                    gpu,
                    &self.texture_layout,
                    set.albedo_map.unwrap_or(&self.white),
                    set.material_map.unwrap_or(&self.white),
                )),
            });
        }
        gpu.queue.write_buffer(&self.draw_buffer, 0, &staging);

        let color_attachments = gbuffer.color_attachments(wgpu::LoadOp::Load);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(gbuffer.depth_attachment(wgpu::LoadOp::Load)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

        for (i, (mesh, textures)) in meshes.iter().zip(&texture_groups).enumerate() {
            let offset = (i as u64 * self.draw_stride) as u32;
            render_pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
            render_pass.set_bind_group(2, textures.as_ref().unwrap_or(&self.default_textures), &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);

            log::trace!("geometry draw {i}: {} indices", mesh.index_count);
        }
    }
}

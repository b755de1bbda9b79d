use std::sync::Arc;

use crate::error::RenderError;
use crate::gpu::GpuContext;

use super::reflect::ProgramLayout;
use super::screen_quad::{SCREEN_QUAD_WGSL, ScreenQuad};
use super::uniforms::UniformBlock;

/// Bind group holding the program's uniform block at binding 0.
pub const UNIFORM_GROUP: u32 = 0;

/// Bind group holding the program's texture inputs, one per binding.
pub const INPUT_GROUP: u32 = 1;

/// Describes a screen-space program.
#[derive(Clone, Copy, Debug)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    /// Fragment stage source. The quad vertex stage is prepended, so it may
    /// take `QuadOut` as input and must define `fs`.
    pub fragment: &'a str,
    /// Texture variables in binding order.
    pub inputs: &'a [&'a str],
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

/// A compiled screen-space program.
///
/// Owns the render pipeline, the staging for its uniform block, and a handle
/// to the shared [`ScreenQuad`]. The program's layout is reflected once at
/// construction; uploads never query the shader again.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    layout: ProgramLayout,
    quad: Arc<ScreenQuad>,
    uniforms: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    input_layout: Option<wgpu::BindGroupLayout>,
    input_count: usize,
}

impl ShaderProgram {
    pub fn new(
        gpu: &GpuContext,
        quad: Arc<ScreenQuad>,
        desc: &ProgramDescriptor<'_>,
    ) -> Result<Self, RenderError> {
        let device = &gpu.device;
        let source = format!("{SCREEN_QUAD_WGSL}\n{}", desc.fragment);
        let layout = ProgramLayout::reflect(desc.label, &source)?;

        let shader_error = |message: String| RenderError::Shader {
            label: desc.label.to_string(),
            message,
        };

        let block = layout
            .block_at(UNIFORM_GROUP, 0)
            .ok_or_else(|| shader_error(format!("no uniform block at @group({UNIFORM_GROUP}) @binding(0)")))?;

        for (unit, name) in desc.inputs.iter().enumerate() {
            match layout.texture(name) {
                Some(t) if t.group == INPUT_GROUP && t.binding == unit as u32 => {}
                Some(t) => {
                    return Err(shader_error(format!(
                        "input '{name}' declared at @group({}) @binding({}), expected @group({INPUT_GROUP}) @binding({unit})",
                        t.group, t.binding
                    )));
                }
                None => return Err(shader_error(format!("input '{name}' is not declared"))),
            }
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniforms = UniformBlock::new(block);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Uniforms", desc.label)),
            size: uniforms.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} Uniform Layout", desc.label)),
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

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Uniform Bind Group", desc.label)),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Float inputs are read with textureLoad, so no sampler and no
        // filtering requirement.
        let input_layout = (!desc.inputs.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..desc.inputs.len() as u32)
                .map(|binding| wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} Input Layout", desc.label)),
                entries: &entries,
            })
        });

        let mut bind_group_layouts = vec![&uniform_layout];
        if let Some(input_layout) = &input_layout {
            bind_group_layouts.push(input_layout);
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", desc.label)),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[ScreenQuad::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.format,
                    blend: desc.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!(
            "built program '{}' ({} inputs, {:?})",
            desc.label,
            desc.inputs.len(),
            desc.format
        );

        Ok(Self {
            label: desc.label.to_string(),
            pipeline,
            layout,
            quad,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            input_layout,
            input_count: desc.inputs.len(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformBlock {
        &mut self.uniforms
    }

    /// Binds `views` to the program's inputs, in binding order.
    ///
    /// Returns `None` for programs without inputs.
    pub fn bind_inputs(
        &self,
        gpu: &GpuContext,
        views: &[&wgpu::TextureView],
    ) -> Option<wgpu::BindGroup> {
        let layout = self.input_layout.as_ref()?;
        debug_assert_eq!(views.len(), self.input_count, "{}", self.label);

        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();

        Some(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Inputs", self.label)),
            layout,
            entries: &entries,
        }))
    }

    /// Uploads the staged uniforms and draws the quad into `target`.
    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        inputs: Option<&wgpu::BindGroup>,
    ) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes());

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(UNIFORM_GROUP, &self.uniform_bind_group, &[]);
        if let Some(inputs) = inputs {
            render_pass.set_bind_group(INPUT_GROUP, inputs, &[]);
        }
        self.quad.draw(&mut render_pass);
    }
}

//! End-to-end checks against a real device.
//!
//! Every test creates a headless context and returns early when the machine
//! has no usable adapter. Float targets are read back in whichever format
//! the device gave them and compared with a matching tolerance.

use std::sync::Arc;

use umbra::passes::lighting::{SurfaceSample, shade};
use umbra::passes::shadow::SHADOW_FLOOR;
use umbra::shader::ScreenQuad;
use umbra::{
    BindingTable, Camera, FrameRequest, GBufferSlot, GpuContext, HEADLESS_FORMAT, Material, Mesh,
    PipelineConfig, PresentSource, ReflectionPass, RenderError, RenderPipeline, SceneInfo,
    ShadowPass, Stage, SurfaceInputs, TargetId, TextureSet, Texture, Vec3, Vec4,
};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

fn gpu() -> Option<GpuContext> {
    match GpuContext::headless(WIDTH, HEIGHT) {
        Ok(gpu) => Some(gpu),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

fn pipeline(gpu: &GpuContext) -> RenderPipeline {
    let config = PipelineConfig::new()
        .size(WIDTH, HEIGHT)
        .clear_color(0.25, 0.5, 0.75, 1.0)
        .light_position(Vec4::new(0.0, 10.0, 4.0, 1.0));
    RenderPipeline::new(gpu, &config).unwrap()
}

fn camera() -> Camera {
    Camera::new()
        .at(0.0, 5.0, 3.0)
        .looking_at(0.0, 0.0, 0.0)
        .with_aspect(WIDTH as f32 / HEIGHT as f32)
}

fn render_target(
    gpu: &GpuContext,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Copies a whole texture back to the CPU, row padding removed.
fn read_bytes(gpu: &GpuContext, texture: &wgpu::Texture, bytes_per_pixel: u32) -> Vec<u8> {
    let (width, height) = (texture.width(), texture.height());
    let row_bytes = width * bytes_per_pixel;
    let bytes_per_row = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).unwrap();
    });
    let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv().unwrap().unwrap();

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
    for row in 0..height {
        let start = (row * bytes_per_row) as usize;
        pixels.extend_from_slice(&data[start..start + row_bytes as usize]);
    }
    drop(data);
    buffer.unmap();
    pixels
}

/// Reads a float color texture as one `Vec4` per pixel, row-major.
fn read_vec4(gpu: &GpuContext, texture: &wgpu::Texture) -> Vec<Vec4> {
    match texture.format() {
        wgpu::TextureFormat::Rgba32Float => read_bytes(gpu, texture, 16)
            .chunks_exact(16)
            .map(|texel| {
                let mut c = [0.0f32; 4];
                for (value, bytes) in c.iter_mut().zip(texel.chunks_exact(4)) {
                    *value = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
                Vec4::from_array(c)
            })
            .collect(),
        wgpu::TextureFormat::Rgba16Float => read_bytes(gpu, texture, 8)
            .chunks_exact(8)
            .map(|texel| {
                let mut c = [0.0f32; 4];
                for (value, bytes) in c.iter_mut().zip(texel.chunks_exact(2)) {
                    *value = half::f16::from_ne_bytes([bytes[0], bytes[1]]).to_f32();
                }
                Vec4::from_array(c)
            })
            .collect(),
        other => panic!("no float readback for {other:?}"),
    }
}

/// Largest per-channel difference accepted for values stored in `format`.
fn tolerance(format: wgpu::TextureFormat) -> f32 {
    match format {
        wgpu::TextureFormat::Rgba16Float => 2e-3,
        _ => 1e-5,
    }
}

fn assert_close(actual: Vec4, expected: Vec4, format: wgpu::TextureFormat) {
    assert!(
        (actual - expected).abs().max_element() <= tolerance(format),
        "got {actual:?}, expected {expected:?} ({format:?})"
    );
}

fn ground(gpu: &GpuContext) -> Vec<Mesh> {
    vec![Mesh::plane(gpu, 100.0, 0.0).with_base_color(Vec4::new(0.8, 0.6, 0.4, 1.0))]
}

#[test]
fn targets_match_requested_size_and_follow_resize() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);

    assert_eq!(pipeline.targets().size(), (WIDTH, HEIGHT));
    assert_eq!(pipeline.targets().gbuffer().attachment_count(), 4);
    for target in pipeline.targets().targets() {
        assert_eq!((target.width(), target.height()), (WIDTH, HEIGHT));
    }
    assert_eq!(
        pipeline.targets().gbuffer().depth().format(),
        wgpu::TextureFormat::Depth32Float
    );

    pipeline.set_size(&gpu, 64, 16);
    assert_eq!(pipeline.targets().size(), (64, 16));
    for target in pipeline.targets().targets() {
        assert_eq!((target.width(), target.height()), (64, 16));
    }
}

#[test]
fn empty_scene_lights_to_clear_color() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);

    let camera = camera();
    pipeline
        .render_frame(
            &gpu,
            &FrameRequest {
                camera: &camera,
                meshes: &[],
                texture_sets: &[],
                scene: None,
                present: None,
            },
        )
        .unwrap();

    let expected = Vec4::new(0.25, 0.5, 0.75, 1.0);
    let lit_texture = pipeline.targets().lit().texture();
    let lit = read_vec4(&gpu, lit_texture);
    assert_eq!(lit.len(), (WIDTH * HEIGHT) as usize);
    for pixel in lit {
        assert_close(pixel, expected, lit_texture.format());
    }
}

#[test]
fn lighting_is_deterministic() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let meshes = ground(&gpu);
    let camera = camera();

    let run = |pipeline: &mut RenderPipeline| {
        pipeline.clear_gbuffer(&gpu);
        pipeline
            .render_to_gbuffer(&gpu, &camera, &meshes, &[])
            .unwrap();
        pipeline.render_from_gbuffer(&gpu, &camera).unwrap();
        let lit = pipeline.targets().lit().texture();
        let bytes_per_pixel = lit.format().target_pixel_byte_cost().unwrap();
        read_bytes(&gpu, lit, bytes_per_pixel)
    };

    let first = run(&mut pipeline);
    let second = run(&mut pipeline);
    assert_eq!(first, second);
}

#[test]
fn covered_pixels_match_cpu_shading() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let meshes = ground(&gpu);
    let camera = camera();

    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();

    let gbuffer = pipeline.targets().gbuffer();
    let read = |slot| read_vec4(&gpu, gbuffer.color(slot).texture());
    let positions = read(GBufferSlot::Position);
    let normals = read(GBufferSlot::Normal);
    let albedo = read(GBufferSlot::Albedo);
    let materials = read(GBufferSlot::Material);
    let lit_texture = pipeline.targets().lit().texture();
    let lit = read_vec4(&gpu, lit_texture);

    // The plane fills the whole view.
    assert!(normals.iter().all(|n| n.w == 1.0));

    let center = ((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize;
    let expected = shade(
        &SurfaceSample {
            position: positions[center].truncate(),
            normal: normals[center].truncate(),
            albedo: albedo[center],
            material: materials[center],
        },
        pipeline.light_position().truncate(),
        camera.position,
    );
    assert_close(lit[center], expected, lit_texture.format());
    assert!(positions[center].w > 0.0);
    assert!((normals[center].truncate() - Vec3::Y).length() < 1e-3);
}

#[test]
fn uncovered_pixels_keep_cleared_gbuffer() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let meshes = vec![Mesh::cube(&gpu, Vec3::ZERO, 1.0)];
    let camera = camera();

    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();

    let gbuffer = pipeline.targets().gbuffer();
    let positions = read_vec4(&gpu, gbuffer.color(GBufferSlot::Position).texture());
    let normals = read_vec4(&gpu, gbuffer.color(GBufferSlot::Normal).texture());
    let lit_texture = pipeline.targets().lit().texture();
    let lit = read_vec4(&gpu, lit_texture);

    let center = ((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize;
    assert_eq!(normals[center].w, 1.0);

    // The cube is far smaller than the view; the corner sees nothing.
    let corner = 0;
    assert_eq!(normals[corner], Vec4::ZERO);
    assert_eq!(positions[corner], Vec4::ZERO);
    assert_close(lit[corner], Vec4::new(0.25, 0.5, 0.75, 1.0), lit_texture.format());
    assert!(normals.iter().any(|n| n.w == 0.0));
}

#[test]
fn textured_meshes_sample_their_albedo_map() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let meshes = vec![Mesh::plane(&gpu, 100.0, 0.0).with_base_color(Vec4::new(0.2, 0.3, 0.4, 1.0))];
    let magenta = Texture::solid(&gpu, [255, 0, 255, 255], "magenta");
    let sets = [TextureSet::new().albedo_map(&magenta)];
    let camera = camera();

    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &sets)
        .unwrap();

    let albedo_texture = pipeline.targets().gbuffer().color(GBufferSlot::Albedo).texture();
    let albedo = read_vec4(&gpu, albedo_texture);
    let center = ((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize;
    assert_close(albedo[center], Vec4::new(1.0, 0.0, 1.0, 1.0), albedo_texture.format());

    // No material map: the mesh's coefficients pass through unscaled.
    let materials = read_vec4(&gpu, pipeline.targets().gbuffer().color(GBufferSlot::Material).texture());
    assert_close(
        materials[center],
        Material::default().to_vec4(),
        albedo_texture.format(),
    );
}

#[test]
fn float_albedo_map_is_dropped_when_unfilterable() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let base = Vec4::new(0.2, 0.3, 0.4, 1.0);
    let meshes = vec![Mesh::plane(&gpu, 100.0, 0.0).with_base_color(base)];
    let texel = Vec4::new(0.5, 0.25, 1.0, 1.0);
    let float_map = Texture::from_rgba32f(&gpu, &texel.to_array(), 1, 1, "float albedo");
    let sets = [TextureSet::new().albedo_map(&float_map)];
    let camera = camera();

    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &sets)
        .unwrap();
    let error = pollster::block_on(gpu.device.pop_error_scope());
    assert!(error.is_none(), "{error:?}");

    let albedo_texture = pipeline.targets().gbuffer().color(GBufferSlot::Albedo).texture();
    let albedo = read_vec4(&gpu, albedo_texture);
    let center = ((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize;
    let expected = if gpu.capabilities.is_filterable(wgpu::TextureFormat::Rgba32Float) {
        texel
    } else {
        base
    };
    assert_close(albedo[center], expected, albedo_texture.format());
}

/// Screen-space pass inputs for a 2x1 surface.
///
/// Pixel 0 is a covered, fully specular floor at the origin facing up.
/// Pixel 1 is background and holds `sentinel` as its lit color.
struct TwoPixelSurface {
    normal: Texture,
    position: Texture,
    lit: Texture,
    material: Texture,
}

const SENTINEL: [f32; 4] = [0.2, 0.4, 0.6, 1.0];
const FLOOR_LIT: Vec4 = Vec4::new(1.0, 0.5, 0.25, 1.0);

impl TwoPixelSurface {
    fn new(gpu: &GpuContext) -> Self {
        Self {
            normal: Texture::from_rgba32f(gpu, &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 2, 1, "normal"),
            position: Texture::from_rgba32f(gpu, &[0.0; 8], 2, 1, "position"),
            lit: Texture::from_rgba32f(gpu, &[FLOOR_LIT.to_array(), SENTINEL].concat(), 2, 1, "lit"),
            material: Texture::from_rgba32f(gpu, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 2, 1, "material"),
        }
    }

    fn inputs(&self) -> SurfaceInputs<'_> {
        SurfaceInputs {
            normal: self.normal.view(),
            position: self.position.view(),
            lit: self.lit.view(),
            material: self.material.view(),
            size: (2, 1),
        }
    }
}

/// One triangle at `y = 1` covering the origin, facing up, green and fully
/// diffuse.
fn overhead_triangle(gpu: &GpuContext) -> [Texture; 2] {
    [
        Texture::from_rgba32f(
            gpu,
            &[-1.0, 1.0, -1.0, 1.0, 1.0, 1.0, -1.0, 1.0, 0.0, 1.0, 2.0, 1.0],
            3,
            1,
            "scene positions",
        ),
        Texture::from_rgba32f(
            gpu,
            &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            3,
            1,
            "scene attributes",
        ),
    ]
}

#[test]
fn shadow_inputs_bind_in_declared_order() {
    let Some(gpu) = gpu() else { return };

    let bindings = BindingTable::new();
    let quad = Arc::new(ScreenQuad::new(&gpu));
    let format = gpu.capabilities.color_format_for(1);
    let mut pass = ShadowPass::new(&gpu, quad, &bindings, format).unwrap();

    let surface = TwoPixelSurface::new(&gpu);
    let scene = overhead_triangle(&gpu);
    let target = render_target(&gpu, 2, 1, format);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let light = Vec4::new(0.0, 5.0, 0.0, 1.0);

    let mut draw = |triangle_count| {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        pass.draw_element(
            &gpu,
            &mut encoder,
            &view,
            &surface.inputs(),
            &scene[..1],
            triangle_count,
            light,
            0.0,
        )
        .unwrap();
        gpu.queue.submit(std::iter::once(encoder.finish()));
        read_vec4(&gpu, &target)
    };

    let shadowed = draw(1);
    let expected = (FLOOR_LIT.truncate() * SHADOW_FLOOR).extend(1.0);
    assert_close(shadowed[0], expected, format);
    assert_close(shadowed[1], Vec4::from_array(SENTINEL), format);

    let unoccluded = draw(0);
    assert_close(unoccluded[0], FLOOR_LIT, format);
    assert_close(unoccluded[1], Vec4::from_array(SENTINEL), format);
}

#[test]
fn reflection_inputs_bind_in_declared_order() {
    let Some(gpu) = gpu() else { return };

    let bindings = BindingTable::new();
    let quad = Arc::new(ScreenQuad::new(&gpu));
    let format = gpu.capabilities.color_format_for(1);
    let mut pass = ReflectionPass::new(&gpu, quad, &bindings, format).unwrap();
    let settings = pass.settings();

    let surface = TwoPixelSurface::new(&gpu);
    let scene = overhead_triangle(&gpu);
    let target = render_target(&gpu, 2, 1, format);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut draw = |triangle_count| {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        pass.draw_element(
            &gpu,
            &mut encoder,
            &view,
            &surface.inputs(),
            &scene,
            triangle_count,
            Vec3::new(0.0, 5.0, 0.0),
            Vec4::new(0.0, 5.0, 0.0, 1.0),
            0.0,
        )
        .unwrap();
        gpu.queue.submit(std::iter::once(encoder.finish()));
        read_vec4(&gpu, &target)
    };

    // The mirrored eye ray goes straight up into the triangle's underside,
    // which faces away from the light and only gets ambient.
    let reflected = draw(1);
    let hit = Vec3::new(0.0, 1.0, 0.0) * umbra::passes::lighting::AMBIENT;
    let expected = FLOOR_LIT.truncate().lerp(hit, settings.strength).extend(1.0);
    assert_close(reflected[0], expected, format);
    assert_close(reflected[1], Vec4::from_array(SENTINEL), format);

    let missed = draw(0);
    assert_close(missed[0], FLOOR_LIT, format);
    assert_close(missed[1], Vec4::from_array(SENTINEL), format);
}

#[test]
fn too_many_scene_textures_are_rejected() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let camera = camera();
    let meshes = ground(&gpu);
    let scene: Vec<Texture> = (0..5)
        .map(|i| Texture::from_rgba32f(&gpu, &[0.0; 4], 1, 1, &format!("scene {i}")))
        .collect();

    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();

    assert!(matches!(
        pipeline.shadow_stage(&gpu, &camera, &scene, 0),
        Err(RenderError::TooManySceneTextures { given: 5, max: 4 })
    ));
    assert!(matches!(
        pipeline.reflection_stage(&gpu, &camera, &scene, 0),
        Err(RenderError::TooManySceneTextures { given: 5, max: 4 })
    ));
    assert!(!pipeline.frame_state().is_written(TargetId::Shadow));
    pipeline
        .shadow_stage(&gpu, &camera, &scene[..4], 0)
        .unwrap();
}

#[test]
fn geometry_rerun_requires_relighting() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let camera = camera();
    let meshes = ground(&gpu);
    let scene = SceneInfo::encode(&gpu, &meshes);

    pipeline.clear_gbuffer(&gpu);
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();
    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();

    assert!(matches!(
        pipeline.shadow_stage(&gpu, &camera, scene.textures(), scene.triangle_count()),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Shadow,
            missing: TargetId::Lit
        })
    ));
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();
    pipeline
        .shadow_stage(&gpu, &camera, scene.textures(), scene.triangle_count())
        .unwrap();
}

#[test]
fn zero_exposure_presents_black() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let camera = camera();
    let meshes = ground(&gpu);
    let output = render_target(&gpu, WIDTH, HEIGHT, HEADLESS_FORMAT);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());

    assert_eq!(pipeline.exposure(), 1.0);
    pipeline.set_exposure(0.0);
    pipeline
        .render_frame(
            &gpu,
            &FrameRequest {
                camera: &camera,
                meshes: &meshes,
                texture_sets: &[],
                scene: None,
                present: Some((&view, PresentSource::Lit)),
            },
        )
        .unwrap();

    let pixels = read_bytes(&gpu, &output, 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

#[test]
fn blendable_flag_matches_adapter_format_features() {
    let Some(gpu) = gpu() else { return };
    let caps = gpu.capabilities;
    let format = wgpu::TextureFormat::Rgba32Float;
    assert_eq!(caps.blend_for(format).is_some(), caps.float32_blendable);
    assert!(caps.blend_for(wgpu::TextureFormat::Rgba16Float).is_some());
}

#[test]
fn full_frame_after_resize_presents() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let meshes = vec![
        Mesh::plane(&gpu, 100.0, 0.0),
        Mesh::cube(&gpu, Vec3::new(0.0, 1.0, 0.0), 1.0),
    ];
    let scene = SceneInfo::encode(&gpu, &meshes);
    assert_eq!(scene.triangle_count(), 14);

    pipeline.set_size(&gpu, 48, 40);
    let output = render_target(&gpu, 48, 40, HEADLESS_FORMAT);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    let camera = camera().with_aspect(48.0 / 40.0);

    pipeline.update_time(0.016, 1.0);
    pipeline
        .render_frame(
            &gpu,
            &FrameRequest {
                camera: &camera,
                meshes: &meshes,
                texture_sets: &[],
                scene: Some(&scene),
                present: Some((&view, PresentSource::Reflection)),
            },
        )
        .unwrap();

    let state = pipeline.frame_state();
    for target in [TargetId::GBuffer, TargetId::Lit, TargetId::Shadow, TargetId::Reflection] {
        assert!(state.is_written(target), "{target:?} not written");
    }
    assert!(state.is_written(TargetId::Presentation));

    let pixels = read_bytes(&gpu, &output, 4);
    assert_eq!(pixels.len(), 48 * 40 * 4);
    assert!(pixels.chunks_exact(4).any(|p| p[..3] != [0, 0, 0]));
}

#[test]
fn stages_refuse_to_run_out_of_order() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let camera = camera();
    let meshes = ground(&gpu);
    let scene = SceneInfo::encode(&gpu, &meshes);

    assert!(matches!(
        pipeline.render_to_gbuffer(&gpu, &camera, &meshes, &[]),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Geometry,
            missing: TargetId::GBuffer
        })
    ));

    pipeline.clear_gbuffer(&gpu);
    assert!(matches!(
        pipeline.render_from_gbuffer(&gpu, &camera),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Lighting,
            missing: TargetId::GBuffer
        })
    ));

    pipeline
        .render_to_gbuffer(&gpu, &camera, &meshes, &[])
        .unwrap();
    assert!(matches!(
        pipeline.shadow_stage(&gpu, &camera, scene.textures(), scene.triangle_count()),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Shadow,
            missing: TargetId::Lit
        })
    ));

    let output = render_target(&gpu, WIDTH, HEIGHT, HEADLESS_FORMAT);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    assert!(matches!(
        pipeline.present(&gpu, &view, PresentSource::Shadow),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Present,
            missing: TargetId::Shadow
        })
    ));

    // A resize drops everything the frame had produced.
    pipeline.render_from_gbuffer(&gpu, &camera).unwrap();
    pipeline.set_size(&gpu, WIDTH * 2, HEIGHT);
    assert!(matches!(
        pipeline.reflection_stage(&gpu, &camera, scene.textures(), scene.triangle_count()),
        Err(RenderError::StageOutOfOrder {
            stage: Stage::Reflection,
            missing: TargetId::GBuffer
        })
    ));
}

#[test]
fn raycast_needs_no_gbuffer() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline = pipeline(&gpu);
    let output = render_target(&gpu, WIDTH, HEIGHT, HEADLESS_FORMAT);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());

    pipeline.update_time(0.0, 2.5);
    pipeline.clear(&gpu, &view);
    pipeline.ray_cast(&gpu, &camera(), &view);

    assert!(pipeline.frame_state().is_written(TargetId::Presentation));
    assert_eq!(read_bytes(&gpu, &output, 4).len(), (WIDTH * HEIGHT * 4) as usize);
}

use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use umbra::{
    Camera, FrameRequest, GpuContext, LoggingConfig, Material, Mesh, PipelineConfig,
    PresentSource, RenderError, RenderPipeline, SceneInfo, Vec3, Vec4, init_logging,
};

/// What the window shows. Cycled with Tab; R toggles the raycast view.
const VIEWS: [PresentSource; 3] = [
    PresentSource::Reflection,
    PresentSource::Shadow,
    PresentSource::Lit,
];

struct Scene {
    gpu: GpuContext,
    pipeline: RenderPipeline,
    meshes: Vec<Mesh>,
    info: SceneInfo,
}

struct App {
    window: Option<Arc<Window>>,
    scene: Option<Scene>,
    start_time: Instant,
    last_frame: Instant,
    view: usize,
    raycast: bool,
}

impl Default for App {
    fn default() -> Self {
        Self {
            window: None,
            scene: None,
            start_time: Instant::now(),
            last_frame: Instant::now(),
            view: 0,
            raycast: false,
        }
    }
}

impl Scene {
    fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let gpu = GpuContext::new(window)?;
        let config = PipelineConfig::new()
            .size(gpu.width(), gpu.height())
            .clear_color(0.05, 0.05, 0.08, 1.0);
        let pipeline = RenderPipeline::new(&gpu, &config)?;

        let meshes = vec![
            Mesh::plane(&gpu, 20.0, 0.0)
                .with_base_color(Vec4::new(0.8, 0.8, 0.8, 1.0))
                .with_material(Material::new(0.4, 0.9, 0.0, 0.0)),
            Mesh::cube(&gpu, Vec3::new(0.0, 1.0, 0.0), 2.0)
                .with_base_color(Vec4::new(0.9, 0.3, 0.2, 1.0))
                .with_material(Material::new(0.2, 0.8, 0.0, 0.0)),
            Mesh::cube(&gpu, Vec3::new(3.0, 0.5, -2.0), 1.0)
                .with_base_color(Vec4::new(0.2, 0.5, 0.9, 1.0))
                .with_material(Material::new(0.8, 0.6, 0.0, 0.1)),
        ];
        let info = SceneInfo::encode(&gpu, &meshes);
        log::info!("scene: {} triangles", info.triangle_count());

        Ok(Self {
            gpu,
            pipeline,
            meshes,
            info,
        })
    }

    fn render(&mut self, time: f32, view: PresentSource, raycast: bool) -> Result<(), RenderError> {
        let Some(surface) = &self.gpu.surface else {
            return Ok(());
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let angle = time * 0.3;
        let camera = Camera::new()
            .at(8.0 * angle.cos(), 5.0, 8.0 * angle.sin())
            .looking_at(0.0, 0.5, 0.0)
            .with_aspect(self.gpu.aspect());

        if raycast {
            self.pipeline.clear(&self.gpu, &target);
            self.pipeline.ray_cast(&self.gpu, &camera, &target);
        } else {
            self.pipeline.render_frame(
                &self.gpu,
                &FrameRequest {
                    camera: &camera,
                    meshes: &self.meshes,
                    texture_sets: &[],
                    scene: Some(&self.info),
                    present: Some((&target, view)),
                },
            )?;
        }

        output.present();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = Arc::new(
            event_loop
                .create_window(Window::default_attributes().with_title("umbra"))
                .expect("failed to create window"),
        );

        match Scene::new(window.clone()) {
            Ok(scene) => {
                self.scene = Some(scene);
                self.window = Some(window);
            }
            Err(err) => {
                log::error!("failed to initialize renderer: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(scene) = &mut self.scene {
                    scene.gpu.resize(size.width, size.height);
                    scene.pipeline.set_size(&scene.gpu, size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Tab => {
                    self.view = (self.view + 1) % VIEWS.len();
                    log::info!("showing {:?}", VIEWS[self.view]);
                }
                KeyCode::KeyR => {
                    self.raycast = !self.raycast;
                    log::info!("raycast view {}", if self.raycast { "on" } else { "off" });
                }
                KeyCode::Escape => event_loop.exit(),
                _ => (),
            },
            WindowEvent::RedrawRequested => {
                if let Some(scene) = &mut self.scene {
                    let now = Instant::now();
                    let delta = now.duration_since(self.last_frame).as_secs_f32();
                    let time = now.duration_since(self.start_time).as_secs_f32();
                    self.last_frame = now;
                    scene.pipeline.update_time(delta, time);

                    if let Err(err) = scene.render(time, VIEWS[self.view], self.raycast) {
                        log::error!("frame failed: {err}");
                        event_loop.exit();
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}

fn main() -> Result<(), winit::error::EventLoopError> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    event_loop.run_app(&mut app)
}

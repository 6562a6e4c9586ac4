//! N-Body Gravity Simulation
//!
//! A disc of bodies orbiting a heavy central mass, stepped on the GPU and drawn
//! as a point cloud. `--headless` runs without a window and reports throughput.

mod config;

use config::{ConfigError, Mode, RunConfig};
use nbody_physics::{mean_planar_radius, SceneParams};
use nbody_renderer::{Camera, PointRenderer};
use nbody_simulation::{GpuContext, Simulation, SimulationError, VERTEX_SIZE};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_SPEED: f32 = 0.2;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    context: GpuContext,
    simulation: Simulation,
    vertex_buffer: wgpu::Buffer,
    renderer: PointRenderer,
    camera: Camera,

    dt: f32,
    paused: bool,

    // Frame timing
    frames_since_report: u32,
    last_report: Instant,
}

impl GpuState {
    async fn new(window: Arc<Window>, run: &RunConfig) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let context = GpuContext::new(&instance, Some(&surface)).await?;

        // Configure surface
        let surface_caps = surface.get_capabilities(&context.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(AppError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);

        let scene = SceneParams::default().with_body_count(run.body_count);
        let simulation = Simulation::new(context.device.clone(), context.queue.clone(), scene)?;
        log::info!("✓ Simulation initialized");

        // Written by the projection pass, read as vertices by the renderer
        let vertex_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Body Vertex Buffer"),
            size: simulation.body_count() as u64 * VERTEX_SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        simulation.copy_positions_to_buffer(&vertex_buffer)?;

        let renderer = PointRenderer::new(&context.device, &config);
        log::info!("✓ Renderer initialized");

        let camera = Camera::new(config.width, config.height);

        Ok(Self {
            surface,
            config,
            context,
            simulation,
            vertex_buffer,
            renderer,
            camera,
            dt: run.dt,
            paused: false,
            frames_since_report: 0,
            last_report: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.context.device, &self.config);
            self.renderer.resize(&self.context.device, &self.config);
            self.camera.resize(new_size.width, new_size.height);
        }
    }

    /// Step (unless paused), then project into the vertex buffer
    fn advance(&mut self) -> Result<(), SimulationError> {
        if !self.paused {
            self.simulation.step(self.dt)?;
        }
        self.simulation.copy_positions_to_buffer(&self.vertex_buffer)
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.render(
            &self.context.device,
            &self.context.queue,
            &view,
            &self.camera,
            &self.vertex_buffer,
            self.simulation.body_count(),
        );

        output.present();
        self.frames_since_report += 1;
        Ok(())
    }

    /// Window title with the frame rate, refreshed once per second
    fn frame_report(&mut self) -> Option<String> {
        let elapsed = self.last_report.elapsed().as_secs_f32();
        if elapsed < 1.0 {
            return None;
        }
        let fps = self.frames_since_report as f32 / elapsed;
        self.frames_since_report = 0;
        self.last_report = Instant::now();

        Some(format!(
            "N-Body - {:.0} FPS - {} bodies - tick {}{}",
            fps,
            self.simulation.body_count(),
            self.simulation.ticks(),
            if self.paused { " (paused)" } else { "" }
        ))
    }

    fn shutdown(self) {
        self.vertex_buffer.destroy();
        self.simulation.end();
    }
}

struct App {
    run: RunConfig,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    error: Option<AppError>,
}

impl App {
    fn new(run: RunConfig) -> Self {
        Self {
            run,
            window: None,
            gpu_state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    /// Keep the first fatal error for `main` to report, then stop
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attributes = Window::default_attributes()
            .with_title("N-Body Simulation")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let gpu_state = pollster::block_on(GpuState::new(window.clone(), &self.run))?;
        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(error) = self.init(event_loop) {
                self.fail(event_loop, error);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Space),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.paused = !gpu_state.paused;
                    log::info!(
                        "{} at tick {}",
                        if gpu_state.paused { "Paused" } else { "Resumed" },
                        gpu_state.simulation.ticks()
                    );
                }
            }

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Right {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let (Some((last_x, last_y)), Some(gpu_state)) =
                        (self.last_mouse_pos, &mut self.gpu_state)
                    {
                        let delta_x = (position.x - last_x) as f32;
                        let delta_y = (position.y - last_y) as f32;
                        gpu_state
                            .camera
                            .rotate(-delta_x * ROTATE_SPEED, -delta_y * ROTATE_SPEED);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    let scroll = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(position) => position.y as f32 * 0.01,
                    };
                    gpu_state.camera.zoom(-scroll * ZOOM_SPEED);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(gpu_state) = &mut self.gpu_state else {
                    return;
                };

                if let Err(error) = gpu_state.advance() {
                    self.fail(event_loop, error.into());
                    return;
                }

                match gpu_state.render() {
                    Ok(()) => {
                        if let (Some(title), Some(window)) =
                            (gpu_state.frame_report(), &self.window)
                        {
                            window.set_title(&title);
                        }
                    }
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(window) = &self.window {
                            gpu_state.resize(window.inner_size());
                        }
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Surface out of memory");
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("Render error: {e:?}"),
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu_state) = self.gpu_state.take() {
            gpu_state.shutdown();
        }
    }
}

/// Run `ticks` steps without a window and report throughput and orbit drift
fn run_headless(run: &RunConfig, ticks: u64) -> Result<(), AppError> {
    let context = GpuContext::headless()?;
    let scene = SceneParams::default().with_body_count(run.body_count);
    let mut simulation = Simulation::new(context.device.clone(), context.queue.clone(), scene)?;

    let initial_radius = mean_planar_radius(&simulation.read_positions()?);

    let start = Instant::now();
    for _ in 0..ticks {
        simulation.step(run.dt)?;
    }
    // Readback waits for every queued tick
    let positions = simulation.read_positions()?;
    let elapsed = start.elapsed();

    let final_radius = mean_planar_radius(&positions);
    log::info!(
        "✓ {} ticks of {} bodies in {:.2?} ({:.1} ticks/s)",
        ticks,
        simulation.body_count(),
        elapsed,
        ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    log::info!(
        "Mean planar radius: {:.3} -> {:.3} ({:+.3}%)",
        initial_radius,
        final_radius,
        (final_radius / initial_radius - 1.0) * 100.0
    );

    simulation.end();
    Ok(())
}

fn run() -> Result<(), AppError> {
    let run = RunConfig::from_env()?;
    log::info!(
        "Starting N-body simulation: {} bodies, dt = {}",
        run.body_count,
        run.dt
    );

    match run.mode {
        Mode::Headless { ticks } => run_headless(&run, ticks),
        Mode::Interactive => {
            let event_loop = EventLoop::new()?;
            event_loop.set_control_flow(ControlFlow::Poll);

            let mut app = App::new(run);
            event_loop.run_app(&mut app)?;

            match app.error {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }
}

fn main() -> ExitCode {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

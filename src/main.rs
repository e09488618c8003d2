//! Opens a window and renders a small test world: a colored diamond beside a lit sphere.
//!
//! Usage: `pegasus3d [config.toml]`. Set `RUST_LOG` to change verbosity.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use pegasus3d::backend::{Viewport, WgpuBackend};
use pegasus3d::{
    AttributeBuffer, COLORS, Camera, Color, GpuContext, Group, Light, NORMALS, POSITIONS,
    Placement, Quat, RenderConfig, RenderResources, ShaderDef, Shape, Vec3, World, geometry,
};

const DIAMOND_POINTS: [f32; 12] = [
    0.0, 1.0, 0.0, // top
    1.0, 0.0, 0.0, // right
    0.0, -1.0, 0.0, // bottom
    -1.0, 0.0, 0.0, // left
];

const DIAMOND_COLORS: [f32; 16] = [
    1.0, 0.0, 0.0, 1.0, // red
    0.0, 1.0, 0.0, 1.0, // green
    0.0, 0.0, 1.0, 1.0, // blue
    1.0, 1.0, 1.0, 1.0, // white
];

fn test_world() -> World {
    let color_shader = Rc::new(
        ShaderDef::new(
            include_str!("shaders/color.vert.wgsl"),
            include_str!("shaders/color.frag.wgsl"),
        )
        .attributes([POSITIONS, COLORS])
        .uniforms(["mvpmatrix"]),
    );
    let lit_shader = Rc::new(
        ShaderDef::new(
            include_str!("shaders/lit.vert.wgsl"),
            include_str!("shaders/lit.frag.wgsl"),
        )
        .attributes([POSITIONS, NORMALS])
        .uniforms(["mvpmatrix", "mvmatrix", "lightOrigin", "lightColor", "ambient"]),
    );

    let diamond = Shape::new()
        .with_attribute(POSITIONS, AttributeBuffer::f32(3, DIAMOND_POINTS.to_vec()))
        .with_attribute(COLORS, AttributeBuffer::f32(4, DIAMOND_COLORS.to_vec()))
        .with_indices(vec![0, 1, 2, 0, 2, 3])
        .with_shader(color_shader)
        .at(Placement::new().origin(Vec3::new(-1.5, 0.0, 0.0)));

    let mut scene = Group::new()
        .with(
            Light::new()
                .at(Vec3::new(3.0, 4.0, 4.0))
                .with_color(Color::gray(0.9))
                .with_ambient(Color::gray(0.1)),
        )
        .with(diamond);
    match geometry::sphere(1.0, 32) {
        Ok(sphere) => {
            scene.add(
                sphere
                    .with_shader(lit_shader)
                    .at(Placement::new().origin(Vec3::new(1.5, 0.0, 0.0))),
            );
        }
        Err(err) => log::error!("no sphere in test world: {err}"),
    }
    World::new(scene)
}

struct App {
    config: RenderConfig,
    window: Option<Arc<Window>>,
    backend: Option<WgpuBackend>,
    resources: RenderResources,
    world: World,
    camera: Camera,
    start_time: Instant,
}

impl App {
    fn new(config: RenderConfig) -> Self {
        let camera = Camera::from_config(&config.camera).with_background(config.background());
        Self {
            config,
            window: None,
            backend: None,
            resources: RenderResources::new(),
            world: test_world(),
            camera,
            start_time: Instant::now(),
        }
    }

    fn fit_viewport(&mut self, width: u32, height: u32) {
        if self.config.camera.viewport.is_none() {
            self.camera.viewport = Some(Viewport::new(0, 0, width, height));
        }
    }

    fn animate(&mut self) {
        let angle = self.start_time.elapsed().as_secs_f32();
        // Child 1 is the diamond.
        if let Some(diamond) = self.world.scene.as_mut().and_then(|s| s.child_mut(1)) {
            diamond.placement_mut().orientation = Some(Quat::from_rotation_y(angle));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes().with_title("Pegasus3d");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match GpuContext::new(window.clone()) {
            Ok(gpu) => {
                self.fit_viewport(gpu.width(), gpu.height());
                self.backend = Some(WgpuBackend::new(gpu));
            }
            Err(err) => {
                log::error!("failed to initialize GPU: {err}");
                event_loop.exit();
                return;
            }
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(backend) = &mut self.backend {
                    backend.resize(size.width, size.height);
                }
                self.fit_viewport(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                self.animate();
                if let Some(backend) = &mut self.backend {
                    match self
                        .camera
                        .render(&mut self.world, backend, &mut self.resources)
                    {
                        Ok(report) => log::trace!("frame: {:?}", report.stats),
                        Err(err) => log::warn!("frame not rendered: {err}"),
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

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(&path).unwrap_or_else(|err| {
            log::error!("{path}: {err}; using defaults");
            RenderConfig::default()
        }),
        None => RenderConfig::default(),
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {err}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop exited with error: {err}");
    }
}

use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use orbit_mesh::app::{
    demo_camera, demo_scene, print_camera, print_frame, print_scene_summary, BACKGROUND,
};
use orbit_mesh::{
    Mesh, MouseButton, OrbitControls, RecordingContext, Renderer, Settings, ShaderLibrary,
    WgpuContext, WindowSettings,
};

/// Radius change per scroll line.
const SCROLL_LINE_STEP: f32 = 0.1;
/// Radius change per scrolled pixel.
const SCROLL_PIXEL_STEP: f32 = 0.005;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let settings = Settings::load(&options.config)?;
    let shaders = ShaderLibrary::new(&options.shaders);
    let meshes = demo_scene(&shaders)?;
    print_scene_summary(&meshes);

    let window = settings.main_window;
    if options.summary_only {
        return run_headless(&window, meshes, options.frames.unwrap_or(1));
    }

    match run_interactive(&window, meshes.clone(), options.frames) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&window, meshes, options.frames.unwrap_or(1))
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(window: &WindowSettings, meshes: Vec<Mesh>, frames: usize) -> Result<()> {
    let ctx = RecordingContext::new();
    let mut renderer = Renderer::new(
        ctx.clone(),
        window.window_size,
        meshes,
        BACKGROUND,
        demo_camera(window),
    )
    .context("failed to set up renderer")?;
    print_camera(renderer.camera());

    for frame in 1..=frames {
        ctx.take_commands();
        renderer.render();
        print_frame(frame, &ctx.draw_calls());
    }
    Ok(())
}

fn run_interactive(window: &WindowSettings, meshes: Vec<Mesh>, frames: Option<usize>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut viewer = Viewer {
        settings: window.clone(),
        meshes: Some(meshes),
        renderer: None,
        controls: OrbitControls::new(),
        frames_left: frames,
        failure: None,
    };
    event_loop
        .run_app(&mut viewer)
        .context("event loop terminated with error")?;

    match viewer.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Viewer {
    settings: WindowSettings,
    meshes: Option<Vec<Mesh>>,
    renderer: Option<Renderer<WgpuContext>>,
    controls: OrbitControls,
    frames_left: Option<usize>,
    failure: Option<anyhow::Error>,
}

impl Viewer {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.settings.window_size;
        let attributes = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(LogicalSize::new(f64::from(width), f64::from(height)))
            .with_resizable(self.settings.resizable);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let ctx = block_on(WgpuContext::new(Arc::clone(&window)))
            .context("failed to initialize GPU context")?;
        let size = window.inner_size();
        let meshes = self.meshes.take().unwrap_or_default();
        let renderer = Renderer::new(
            ctx,
            (size.width, size.height),
            meshes,
            BACKGROUND,
            demo_camera(&self.settings),
        )
        .context("failed to set up renderer")?;

        info!(
            "window {}x{} ready (requested API {}.{})",
            size.width, size.height, self.settings.gl_version.0, self.settings.gl_version.1
        );
        window.request_redraw();
        self.renderer = Some(renderer);
        Ok(())
    }

    fn window_id(&self) -> Option<WindowId> {
        self.renderer
            .as_ref()
            .map(|renderer| renderer.context().window_id())
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() || self.failure.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.failure = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window_id() != Some(window_id) {
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => renderer.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = renderer.context().window().inner_size();
                renderer.resize(size.width, size.height);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_mouse_button(button);
                match state {
                    ElementState::Pressed => self.controls.set_mouse_button_down(button),
                    ElementState::Released => self.controls.set_mouse_button_up(button),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                self.controls.cursor_moved(renderer.camera_mut(), position);
            }
            WindowEvent::CursorLeft { .. } => self.controls.cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * SCROLL_LINE_STEP,
                    MouseScrollDelta::PixelDelta(offset) => offset.y as f32 * SCROLL_PIXEL_STEP,
                };
                self.controls.scroll(renderer.camera_mut(), amount);
            }
            WindowEvent::RedrawRequested => {
                renderer.render();
                if let Some(left) = self.frames_left.as_mut() {
                    *left = left.saturating_sub(1);
                    if *left == 0 {
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(renderer) = self.renderer.as_ref() {
            renderer.context().window().request_redraw();
        }
    }
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::LEFT,
        WinitMouseButton::Right => MouseButton::RIGHT,
        WinitMouseButton::Middle => MouseButton::MIDDLE,
        WinitMouseButton::Back => MouseButton::new(3),
        WinitMouseButton::Forward => MouseButton::new(4),
        WinitMouseButton::Other(value) => MouseButton::new(value.min(u16::from(u8::MAX)) as u8),
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

const USAGE: &str =
    "Usage: orbit-mesh [--config <file>] [--shaders <dir>] [--summary-only] [--frames <n>]";

struct CliOptions {
    config: PathBuf,
    shaders: PathBuf,
    summary_only: bool,
    frames: Option<usize>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::from_args(env::args().skip(1))
    }

    fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            config: PathBuf::from("config.toml"),
            shaders: PathBuf::from("shaders"),
            summary_only: false,
            frames: None,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => options.config = PathBuf::from(value_for(&arg, args.next())?),
                "--shaders" => options.shaders = PathBuf::from(value_for(&arg, args.next())?),
                "--summary-only" => options.summary_only = true,
                "--frames" => {
                    let value = value_for(&arg, args.next())?;
                    let frames = value
                        .parse::<usize>()
                        .with_context(|| format!("invalid frame count `{value}`"))?;
                    options.frames = Some(frames);
                }
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
pub use winit::window::{Window, WindowId};

use super::Input;
use crate::errors::Result;
use crate::renderer::settings::RenderSettings;
use crate::renderer::wgpu_backend::WgpuDevice;
use crate::scene::Graph;
use crate::utils::time::{Clock, FramePacing};

/// Trait for defining application behavior.
///
/// # Lifecycle
///
/// 1. [`init`](Self::init) - once, after the window and device exist
/// 2. [`on_event`](Self::on_event) - for each window event
/// 3. [`update`](Self::update) - each tick, before the graph is drawn
pub trait AppHandler: Sized + 'static {
    /// Builds the scene. An error here is fatal and closes the application.
    fn init(graph: &mut Graph, clock: &mut Clock, window: &Arc<Window>) -> Result<Self>;

    /// Return `true` to consume the event and skip the default handling.
    #[allow(unused_variables)]
    fn on_event(&mut self, graph: &mut Graph, window: &Arc<Window>, event: &WindowEvent) -> bool {
        false
    }

    /// Advances application state by `dt` seconds.
    #[allow(unused_variables)]
    fn update(&mut self, graph: &mut Graph, input: &Input, clock: &Clock, dt: f32) {}
}

/// Application builder.
///
/// ```rust,ignore
/// App::new()
///     .with_title("Terrain")
///     .with_pacing(FramePacing::fallback())
///     .run::<Terrain>()?;
/// ```
pub struct App {
    title: String,
    size: (u32, u32),
    pacing: FramePacing,
    render_settings: RenderSettings,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: "Arbor".into(),
            size: (1280, 720),
            pacing: FramePacing::Display,
            render_settings: RenderSettings::default(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial inner size in logical pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: FramePacing) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.render_settings = settings;
        self
    }

    /// Runs the event loop until the window closes.
    pub fn run<H: AppHandler>(self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut runner = AppRunner::<H>::new(self);
        event_loop.run_app(&mut runner)?;
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

struct AppRunner<H: AppHandler> {
    config: App,
    window: Option<Arc<Window>>,
    graph: Option<Graph>,
    user_state: Option<H>,
    clock: Clock,
    input: Input,
}

impl<H: AppHandler> AppRunner<H> {
    fn new(config: App) -> Self {
        let clock = Clock::new(config.pacing);
        Self {
            config,
            window: None,
            graph: None,
            user_state: None,
            clock,
            input: Input::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.config.size;
        let attributes = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(width, height));
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| crate::errors::ArborError::WindowCreateFailed(e.to_string()))?;
        let window = Arc::new(window);
        self.window = Some(Arc::clone(&window));

        log::info!("Initializing Renderer Backend...");
        let size = window.inner_size();
        let device = pollster::block_on(WgpuDevice::new(
            Arc::clone(&window),
            size.width,
            size.height,
            &self.config.render_settings,
        ))?;
        let mut graph = Graph::new(Box::new(device))
            .with_clear_color(self.config.render_settings.clear_color);
        self.input.handle_resize(size.width, size.height);

        let user_state = H::init(&mut graph, &mut self.clock, &window)?;
        self.graph = Some(graph);
        self.user_state = Some(user_state);
        self.clock.start();
        Ok(())
    }

    fn frame(&mut self) -> Result<()> {
        let (Some(graph), Some(user_state)) = (&mut self.graph, &mut self.user_state) else {
            return Ok(());
        };
        let Some(dt) = self.clock.tick() else {
            return Ok(());
        };

        user_state.update(graph, &self.input, &self.clock, dt);
        self.input.end_frame();

        let frame = self.clock.xr_frame();
        graph.draw(frame.as_ref())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.clock.stop();
        event_loop.exit();
    }
}

impl<H: AppHandler> ApplicationHandler for AppRunner<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("Fatal Renderer Error: {e}");
            self.shutdown(event_loop);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(graph), Some(user_state)) =
            (&self.window, &mut self.graph, &mut self.user_state)
        else {
            return;
        };

        if user_state.on_event(graph, window, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                graph.device().resize(size.width, size.height);
                self.input.handle_resize(size.width, size.height);
            }
            WindowEvent::Focused(focused) => self.input.handle_focus(focused),
            WindowEvent::CursorMoved { position, .. } => {
                self.input.handle_cursor_move(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.handle_mouse_input(state, button);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.input.handle_key(event.state, code);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    log::error!("Frame failed: {e}");
                    self.shutdown(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = &self.window else {
            return;
        };
        if !self.clock.is_running() {
            return;
        }
        match self.clock.next_deadline() {
            None => window.request_redraw(),
            Some(deadline) => {
                if Instant::now() >= deadline {
                    window.request_redraw();
                }
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
    }
}

//! winit window driven by `pump_app_events`

use ember_engine::ember::device::Extent2D;
use ember_engine::ember::render::{ResizeFlag, WindowSystem};
use ember_engine::{engine_debug, engine_error, engine_info};
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

/// Event handler state
struct DemoApp {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    resize_flag: ResizeFlag,
    close_requested: bool,
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                let size = window.inner_size();
                engine_info!("ember_demo", "Window created ({}x{})", size.width, size.height);
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                engine_error!("ember_demo", "Failed to create window: {}", e);
                self.close_requested = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                engine_info!("ember_demo", "Close requested, shutting down");
                self.close_requested = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                engine_debug!("ember_demo", "Window resized to {}x{}", size.width, size.height);
                self.resize_flag.mark();
            }
            _ => {}
        }
    }
}

/// Window and event loop handed to the frame loop
pub struct DemoWindow {
    event_loop: EventLoop<()>,
    app: DemoApp,
}

impl DemoWindow {
    /// Create the event loop and pump it until the window exists
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self, winit::error::EventLoopError> {
        let event_loop = EventLoop::new()?;
        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height));

        let mut demo = Self {
            event_loop,
            app: DemoApp {
                attributes,
                window: None,
                resize_flag: ResizeFlag::new(),
                close_requested: false,
            },
        };

        while demo.app.window.is_none() && !demo.app.close_requested {
            demo.pump(Some(Duration::from_millis(10)));
        }
        Ok(demo)
    }

    /// Process pending events, waiting at most `timeout`
    pub fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.app) {
            engine_debug!("ember_demo", "Event loop exited with code {}", code);
            self.app.close_requested = true;
        }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.app.window.as_ref()
    }

    /// Forward resize events to `flag` (the frame loop's)
    pub fn attach_resize_flag(&mut self, flag: ResizeFlag) {
        if self.app.resize_flag.is_set() {
            flag.mark();
        }
        self.app.resize_flag = flag;
    }
}

impl WindowSystem for DemoWindow {
    fn framebuffer_size(&self) -> Extent2D {
        self.app
            .window
            .as_ref()
            .map(|window| {
                let size = window.inner_size();
                Extent2D::new(size.width, size.height)
            })
            .unwrap_or_default()
    }

    fn wait_events(&mut self) {
        self.pump(Some(Duration::from_millis(16)));
    }

    fn close_requested(&self) -> bool {
        self.app.close_requested
    }
}

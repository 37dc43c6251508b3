use std::path::PathBuf;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::device::{Extent, RenderConfig, WgpuBackend};
use crate::frame::{HostWindow, LoopEvent, LoopState, RenderApplication};
use crate::input::Key;
use crate::shader::DiskSource;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,

    /// Initial client size. Afterwards the render size tracks the window.
    pub initial_size: PhysicalSize<u32>,

    /// Compute shader polled for changes every frame.
    pub shader_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: PhysicalSize::new(1280, 720),
            shader_path: PathBuf::from("shaders/pathtracer.wgsl"),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and runs the render loop until it shuts down.
    ///
    /// Returns the fatal error that ended the loop, if any.
    pub fn run(config: RuntimeConfig, render: RenderConfig) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, render);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl HostWindow for Window {
    fn client_size(&self) -> Extent {
        self.inner_size().into()
    }

    fn hide_cursor(&self) {
        self.set_cursor_visible(false);
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[not_covariant]
    app: RenderApplication<WgpuBackend<'this>, DiskSource>,
}

struct AppState {
    config: RuntimeConfig,
    render: RenderConfig,

    entry: Option<WindowEntry>,

    /// Events received since the last iteration.
    pending: Vec<LoopEvent>,

    error: Option<anyhow::Error>,
}

impl AppState {
    fn new(config: RuntimeConfig, render: RenderConfig) -> Self {
        Self {
            config,
            render,
            entry: None,
            pending: Vec::new(),
            error: None,
        }
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let render = self.render.clone();
        let source = DiskSource::new(self.config.shader_path.clone());

        let mut entry = WindowEntryBuilder {
            window,
            app_builder: |w| RenderApplication::new(WgpuBackend::new(w, render), source),
        }
        .build();

        entry.with_mut(|fields| fields.app.initialize(fields.window))?;

        Ok(entry)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(entry) => self.entry = Some(entry),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        if let Some(ev) = translate_event(&event) {
            self.pending.push(ev);
        }
    }

    /// All pending events have been delivered: run one iteration.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let events = std::mem::take(&mut self.pending);
        let result = entry.with_mut(|fields| fields.app.run_iteration(fields.window, events));

        match result {
            Ok(LoopState::ShuttingDown) => event_loop.exit(),
            Ok(_) => {}
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn exiting(&mut self, _: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            entry.with_app_mut(|app| app.shutdown());
        }
    }
}

fn translate_event(event: &WindowEvent) -> Option<LoopEvent> {
    match event {
        WindowEvent::CloseRequested => Some(LoopEvent::CloseRequested),
        WindowEvent::Destroyed => Some(LoopEvent::Destroyed),
        WindowEvent::Resized(size) => Some(LoopEvent::Resized((*size).into())),
        WindowEvent::KeyboardInput { event, .. }
            if event.state == ElementState::Pressed && !event.repeat =>
        {
            Some(LoopEvent::KeyDown(map_key(event.physical_key)))
        }
        WindowEvent::CursorEntered { .. } => Some(LoopEvent::SetCursor),
        _ => None,
    }
}

fn map_key(pk: PhysicalKey) -> Key {
    match pk {
        PhysicalKey::Code(KeyCode::Escape) => Key::Escape,
        PhysicalKey::Code(other) => Key::Unknown(other as u32),

        // NativeKeyCode is not a u32 in winit 0.30.
        PhysicalKey::Unidentified(_) => Key::Unknown(0),
    }
}

use anyhow::{Context, Result};

use super::{DispatchGrid, FrameConstants};
use crate::device::{Extent, RenderBackend, RenderTargetSet, SwapChainManager};
use crate::input::Key;
use crate::shader::{ShaderHotReload, ShaderProgram, ShaderSource};
use crate::time::{Clock, FrameStats};

/// Lifecycle of the render loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    Initializing,
    Running,
    /// Terminal.
    ShuttingDown,
}

/// Window-system events the loop reacts to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopEvent {
    CloseRequested,
    /// The window was destroyed by the platform.
    Destroyed,
    /// Informational; the client size is re-queried every iteration.
    Resized(Extent),
    KeyDown(Key),
    /// The cursor entered the client area.
    SetCursor,
}

/// The parts of the window the loop needs.
pub trait HostWindow {
    /// Current client area in physical pixels.
    fn client_size(&self) -> Extent;

    fn hide_cursor(&self);
}

/// Drives one frame per iteration.
///
/// Per iteration, in order:
/// 1. drain pending events (quit requests end the loop before any rendering)
/// 2. keep the render target set in step with the client size
/// 3. hot-reload the compute shader
/// 4. upload `FrameConstants`
/// 5. acquire, dispatch, present
///
/// The frame counter restarts at 0 whenever the accumulation history becomes
/// invalid: on a shader swap and on every target rebuild.
pub struct RenderApplication<B: RenderBackend, S> {
    backend: B,
    swap_chain: SwapChainManager<B>,
    shader: ShaderHotReload<S>,
    program: Option<ShaderProgram<B::Program>>,
    clock: Clock,
    stats: FrameStats,
    frame_count: u32,
    target_generation: u64,
    state: LoopState,
}

impl<B: RenderBackend, S: ShaderSource> RenderApplication<B, S> {
    pub fn new(backend: B, source: S) -> Self {
        Self {
            backend,
            swap_chain: SwapChainManager::new(),
            shader: ShaderHotReload::new(source),
            program: None,
            clock: Clock::new(),
            stats: FrameStats::default(),
            frame_count: 0,
            target_generation: 0,
            state: LoopState::Initializing,
        }
    }

    /// Builds the first render context and compiles the shader.
    ///
    /// A minimized window defers both to the first iteration with a usable
    /// client size.
    pub fn initialize(&mut self, window: &impl HostWindow) -> Result<LoopState> {
        if self.state == LoopState::Initializing {
            self.prepare(window)?;
            self.state = LoopState::Running;
            log::info!("render loop running");
        }
        Ok(self.state)
    }

    /// Runs one iteration of the loop and returns the resulting state.
    ///
    /// Errors are fatal: render resources could not be created.
    pub fn run_iteration<I>(&mut self, window: &impl HostWindow, events: I) -> Result<LoopState>
    where
        I: IntoIterator<Item = LoopEvent>,
    {
        if self.state == LoopState::ShuttingDown {
            return Ok(self.state);
        }

        self.drain(window, events);
        if self.state == LoopState::ShuttingDown {
            self.shutdown();
            return Ok(self.state);
        }

        self.initialize(window)?;

        if let Some(extent) = self.prepare(window)? {
            self.render_frame(extent)?;
        }

        Ok(self.state)
    }

    fn drain<I>(&mut self, window: &impl HostWindow, events: I)
    where
        I: IntoIterator<Item = LoopEvent>,
    {
        for event in events {
            match event {
                LoopEvent::CloseRequested => self.request_quit("close requested"),
                LoopEvent::KeyDown(key) if key.is_quit() => self.request_quit("quit key pressed"),
                LoopEvent::KeyDown(_) => {}
                LoopEvent::Destroyed => {
                    if self.state != LoopState::ShuttingDown {
                        log::error!("window destroyed while the render loop was still running");
                    }
                    self.state = LoopState::ShuttingDown;
                }
                LoopEvent::Resized(size) => {
                    log::debug!("window resized to {}x{}", size.width, size.height);
                }
                LoopEvent::SetCursor => window.hide_cursor(),
            }
        }
    }

    fn request_quit(&mut self, reason: &str) {
        if self.state != LoopState::ShuttingDown {
            log::info!("{reason}; shutting down");
            self.state = LoopState::ShuttingDown;
        }
    }

    /// Steps 2 and 3. Returns the extent to render at, or `None` while the
    /// client area is empty.
    fn prepare(&mut self, window: &impl HostWindow) -> Result<Option<Extent>> {
        let client = window.client_size();
        let Some(set) = self
            .swap_chain
            .ensure_render_target(&mut self.backend, client)?
        else {
            return Ok(None);
        };

        let (extent, generation) = (set.extent(), set.generation());
        if generation != self.target_generation {
            self.target_generation = generation;
            self.frame_count = 0;
        }

        self.reload_shader();

        Ok(Some(extent))
    }

    fn reload_shader(&mut self) {
        let backend = &mut self.backend;
        let Some(next) = self
            .shader
            .poll_and_maybe_recompile(|source, origin| backend.compile_program(source, origin))
        else {
            return;
        };

        // The old program is released only once its replacement exists.
        if let Some(previous) = self.program.replace(next) {
            self.backend.release_program(previous.into_inner());
        }
        self.frame_count = 0;
    }

    fn render_frame(&mut self, extent: Extent) -> Result<()> {
        let time = self.clock.tick();
        let constants = FrameConstants::new(self.frame_count, time.elapsed, extent);
        self.frame_count = self.frame_count.wrapping_add(1);

        self.backend
            .upload_constants(&constants)
            .context("failed to upload frame constants")?;

        if let Some(mut frame) = self.backend.acquire_frame()? {
            if let (Some(program), Some(targets)) = (&self.program, self.swap_chain.current()) {
                self.backend.dispatch(
                    &mut frame,
                    program.program(),
                    targets.resources(),
                    DispatchGrid::covering(extent),
                );
            }
            self.backend.present(frame);
        }

        if let Some(report) = self.stats.record(&time) {
            log::debug!(
                "{} frames, {:.2} ms/frame ({:.1} fps), tick {} at {:.3}s",
                report.frames,
                report.mean_dt * 1000.0,
                report.fps(),
                time.frame_index,
                time.elapsed_micros as f64 / 1e6
            );
        }

        Ok(())
    }
}

impl<B: RenderBackend, S> RenderApplication<B, S> {
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Value the next `FrameConstants.frame` will carry.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn render_targets(&self) -> Option<&RenderTargetSet<B::Targets>> {
        self.swap_chain.current()
    }

    pub fn program(&self) -> Option<&ShaderProgram<B::Program>> {
        self.program.as_ref()
    }

    /// Releases targets, then the program, then the render context.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        self.state = LoopState::ShuttingDown;
        self.swap_chain.teardown(&mut self.backend);
        if let Some(program) = self.program.take() {
            self.backend.release_program(program.into_inner());
        }
        if self.backend.has_context() {
            log::info!("releasing render context");
            self.backend.release_context();
        }
    }
}

impl<B: RenderBackend, S> Drop for RenderApplication<B, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::{Call, FakeBackend};
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::time::{Duration, SystemTime};

    struct FakeWindow {
        size: Cell<Extent>,
        cursor_hidden: Cell<bool>,
    }

    impl FakeWindow {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: Cell::new(Extent::new(width, height)),
                cursor_hidden: Cell::new(false),
            }
        }

        fn resize(&self, width: u32, height: u32) {
            self.size.set(Extent::new(width, height));
        }
    }

    impl HostWindow for FakeWindow {
        fn client_size(&self) -> Extent {
            self.size.get()
        }

        fn hide_cursor(&self) {
            self.cursor_hidden.set(true);
        }
    }

    struct TestSource {
        text: RefCell<String>,
        secs: Cell<u64>,
    }

    impl TestSource {
        fn new(text: &str) -> Self {
            Self {
                text: RefCell::new(text.to_string()),
                secs: Cell::new(1),
            }
        }

        fn save(&self, text: &str) {
            *self.text.borrow_mut() = text.to_string();
            self.secs.set(self.secs.get() + 1);
        }
    }

    impl ShaderSource for TestSource {
        fn origin(&self) -> String {
            "test.wgsl".to_string()
        }

        fn modified(&self) -> io::Result<SystemTime> {
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(self.secs.get()))
        }

        fn read_to_string(&self) -> io::Result<String> {
            Ok(self.text.borrow().clone())
        }
    }

    type App = RenderApplication<FakeBackend, TestSource>;

    fn app(text: &str) -> App {
        RenderApplication::new(FakeBackend::default(), TestSource::new(text))
    }

    fn step(app: &mut App, window: &FakeWindow) -> LoopState {
        app.run_iteration(window, Vec::new()).unwrap()
    }

    fn save(app: &App, text: &str) {
        app.shader.source().save(text);
    }

    fn calls(app: &App) -> &[Call] {
        &app.backend().calls
    }

    fn clear(app: &mut App) {
        app.backend.calls.clear();
    }

    fn kinds(calls: &[Call]) -> Vec<&'static str> {
        calls
            .iter()
            .map(|c| match c {
                Call::CreateContext(_) => "create_context",
                Call::ResizeSwapChain(_) => "resize",
                Call::CreateTargets(_) => "create_targets",
                Call::ReleaseTargets(_) => "release_targets",
                Call::Compile(_) => "compile",
                Call::ReleaseProgram(_) => "release_program",
                Call::Upload(_) => "upload",
                Call::Acquire => "acquire",
                Call::Dispatch { .. } => "dispatch",
                Call::Present { .. } => "present",
                Call::ReleaseContext => "release_context",
            })
            .collect()
    }

    fn uploads(app: &App) -> Vec<FrameConstants> {
        calls(app)
            .iter()
            .filter_map(|c| match c {
                Call::Upload(constants) => Some(*constants),
                _ => None,
            })
            .collect()
    }

    fn dispatched_programs(app: &App) -> Vec<u32> {
        calls(app)
            .iter()
            .filter_map(|c| match c {
                Call::Dispatch { program, .. } => Some(*program),
                _ => None,
            })
            .collect()
    }

    fn frames(app: &App) -> Vec<u32> {
        uploads(app).iter().map(|c| c.frame).collect()
    }

    // ── initialization ────────────────────────────────────────────────────

    #[test]
    fn initialize_builds_context_and_compiles() {
        let window = FakeWindow::new(1280, 720);
        let mut app = app("shader");

        assert_eq!(app.state(), LoopState::Initializing);
        assert_eq!(app.initialize(&window).unwrap(), LoopState::Running);

        assert_eq!(kinds(calls(&app)), ["create_context", "create_targets", "compile"]);
        assert!(app.program().is_some());
        assert_eq!(app.render_targets().unwrap().extent(), Extent::new(1280, 720));
    }

    #[test]
    fn initialize_twice_is_noop() {
        let window = FakeWindow::new(1280, 720);
        let mut app = app("shader");
        app.initialize(&window).unwrap();
        clear(&mut app);

        app.initialize(&window).unwrap();
        assert!(calls(&app).is_empty());
    }

    #[test]
    fn context_failure_is_fatal() {
        let window = FakeWindow::new(1280, 720);
        let backend = FakeBackend {
            fail_context: true,
            ..FakeBackend::default()
        };
        let mut app = RenderApplication::new(backend, TestSource::new("shader"));

        let err = app.run_iteration(&window, Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to create render context"));
    }

    // ── iteration order ───────────────────────────────────────────────────

    #[test]
    fn first_iteration_renders_a_frame() {
        let window = FakeWindow::new(1280, 720);
        let mut app = app("shader");

        assert_eq!(step(&mut app, &window), LoopState::Running);

        assert_eq!(
            kinds(calls(&app)),
            [
                "create_context",
                "create_targets",
                "compile",
                "upload",
                "acquire",
                "dispatch",
                "present"
            ]
        );
        assert!(calls(&app).contains(&Call::Present { dispatched: true }));
    }

    #[test]
    fn order_is_targets_then_shader_then_frame() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("v1");
        step(&mut app, &window);
        clear(&mut app);

        window.resize(1024, 768);
        save(&app, "v2");
        step(&mut app, &window);

        assert_eq!(
            kinds(calls(&app)),
            [
                "release_targets",
                "resize",
                "create_targets",
                "compile",
                "release_program",
                "upload",
                "acquire",
                "dispatch",
                "present"
            ]
        );
    }

    #[test]
    fn steady_state_only_renders() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        clear(&mut app);

        step(&mut app, &window);
        step(&mut app, &window);

        assert_eq!(
            kinds(calls(&app)),
            ["upload", "acquire", "dispatch", "present", "upload", "acquire", "dispatch", "present"]
        );
    }

    // ── dispatch ──────────────────────────────────────────────────────────

    #[test]
    fn grid_covers_render_target() {
        let window = FakeWindow::new(1281, 721);
        let mut app = app("shader");
        step(&mut app, &window);

        let grid = calls(&app).iter().find_map(|c| match c {
            Call::Dispatch { grid, .. } => Some(*grid),
            _ => None,
        });
        assert_eq!(grid, Some(DispatchGrid { x: 81, y: 91, z: 1 }));
    }

    #[test]
    fn constants_carry_render_size() {
        let window = FakeWindow::new(1280, 720);
        let mut app = app("shader");
        step(&mut app, &window);

        let constants = uploads(&app)[0];
        assert_eq!(constants.render_width, 1280.0);
        assert_eq!(constants.render_height, 720.0);
    }

    #[test]
    fn no_program_presents_without_dispatch() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("ERROR");
        step(&mut app, &window);

        assert!(app.program().is_none());
        assert!(dispatched_programs(&app).is_empty());
        assert!(calls(&app).contains(&Call::Present { dispatched: false }));
    }

    #[test]
    fn skipped_acquire_skips_present() {
        let window = FakeWindow::new(800, 600);
        let backend = FakeBackend {
            skip_acquire: true,
            ..FakeBackend::default()
        };
        let mut app = RenderApplication::new(backend, TestSource::new("shader"));
        step(&mut app, &window);

        assert_eq!(app.backend().count(|c| matches!(c, Call::Present { .. })), 0);
        assert_eq!(app.backend().count(|c| matches!(c, Call::Dispatch { .. })), 0);
        assert_eq!(app.frame_count(), 1);
    }

    // ── frame counter ─────────────────────────────────────────────────────

    #[test]
    fn frame_counter_increments() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        for _ in 0..4 {
            step(&mut app, &window);
        }
        assert_eq!(frames(&app), [0, 1, 2, 3]);
    }

    #[test]
    fn shader_swap_resets_counter_and_binds_new_program() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("v1");
        step(&mut app, &window);
        step(&mut app, &window);
        let old = dispatched_programs(&app)[0];

        save(&app, "v2");
        step(&mut app, &window);

        assert_eq!(frames(&app), [0, 1, 0]);
        let programs = dispatched_programs(&app);
        let new = programs[2];
        assert_ne!(new, old);
        assert_eq!(app.backend().live_programs(), [new]);
        assert!(calls(&app).contains(&Call::ReleaseProgram(old)));
    }

    #[test]
    fn failed_compile_keeps_counter_and_program() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("v1");
        step(&mut app, &window);
        step(&mut app, &window);
        let bound = dispatched_programs(&app)[0];

        save(&app, "v2 ERROR");
        step(&mut app, &window);

        assert_eq!(frames(&app), [0, 1, 2]);
        assert_eq!(dispatched_programs(&app), [bound, bound, bound]);
        assert_eq!(app.backend().count(|c| matches!(c, Call::ReleaseProgram(_))), 0);
    }

    #[test]
    fn unchanged_source_compiles_once() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        for _ in 0..10 {
            step(&mut app, &window);
        }
        assert_eq!(app.backend().count(|c| matches!(c, Call::Compile(_))), 1);
    }

    #[test]
    fn resize_resets_counter() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        step(&mut app, &window);

        window.resize(640, 480);
        step(&mut app, &window);

        assert_eq!(frames(&app), [0, 1, 0]);
    }

    #[test]
    fn time_is_non_decreasing() {
        let window = FakeWindow::new(64, 64);
        let mut app = app("shader");
        for _ in 0..20 {
            step(&mut app, &window);
        }

        let times: Vec<f32> = uploads(&app).iter().map(|c| c.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    // ── minimized ─────────────────────────────────────────────────────────

    #[test]
    fn zero_size_skips_frame() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        clear(&mut app);

        window.resize(0, 0);
        save(&app, "v2");
        assert_eq!(step(&mut app, &window), LoopState::Running);
        assert!(calls(&app).is_empty());

        window.resize(800, 600);
        step(&mut app, &window);
        assert_eq!(kinds(calls(&app))[0], "compile");
    }

    #[test]
    fn starting_minimized_defers_context() {
        let window = FakeWindow::new(0, 0);
        let mut app = app("shader");

        assert_eq!(step(&mut app, &window), LoopState::Running);
        assert!(!app.backend().has_context());

        window.resize(320, 200);
        step(&mut app, &window);
        assert!(app.backend().has_context());
        assert_eq!(frames(&app), [0]);
    }

    // ── events ────────────────────────────────────────────────────────────

    #[test]
    fn close_shuts_down_without_rendering() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        let targets = app.backend().live_targets()[0];
        let program = app.backend().live_programs()[0];
        clear(&mut app);

        let state = app.run_iteration(&window, [LoopEvent::CloseRequested]).unwrap();

        assert_eq!(state, LoopState::ShuttingDown);
        assert_eq!(
            calls(&app),
            [
                Call::ReleaseTargets(targets),
                Call::ReleaseProgram(program),
                Call::ReleaseContext,
            ]
        );
    }

    #[test]
    fn nothing_runs_after_shutdown() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        app.run_iteration(&window, [LoopEvent::KeyDown(Key::Escape)]).unwrap();
        clear(&mut app);

        assert_eq!(step(&mut app, &window), LoopState::ShuttingDown);
        app.shutdown();
        assert!(calls(&app).is_empty());
    }

    #[test]
    fn escape_quits_other_keys_do_not() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");

        let events = [LoopEvent::KeyDown(Key::Unknown(13)), LoopEvent::KeyDown(Key::Unknown(32))];
        assert_eq!(app.run_iteration(&window, events).unwrap(), LoopState::Running);

        let events = [LoopEvent::KeyDown(Key::Escape)];
        assert_eq!(app.run_iteration(&window, events).unwrap(), LoopState::ShuttingDown);
    }

    #[test]
    fn drain_completes_after_quit() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");

        let events = [LoopEvent::CloseRequested, LoopEvent::SetCursor];
        app.run_iteration(&window, events).unwrap();

        assert!(window.cursor_hidden.get());
        assert_eq!(app.backend().count(|c| matches!(c, Call::Acquire)), 0);
    }

    #[test]
    fn destroyed_shuts_down() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);

        let state = app.run_iteration(&window, [LoopEvent::Destroyed]).unwrap();

        assert_eq!(state, LoopState::ShuttingDown);
        assert!(!app.backend().has_context());
    }

    #[test]
    fn resized_event_is_informational() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);
        clear(&mut app);

        let events = [LoopEvent::Resized(Extent::new(1920, 1080))];
        app.run_iteration(&window, events).unwrap();

        assert_eq!(app.backend().count(|c| matches!(c, Call::CreateTargets(_))), 0);
    }

    #[test]
    fn set_cursor_hides_cursor() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        app.run_iteration(&window, [LoopEvent::SetCursor]).unwrap();
        assert!(window.cursor_hidden.get());
    }

    // ── teardown ──────────────────────────────────────────────────────────

    #[test]
    fn drop_releases_everything() {
        let window = FakeWindow::new(800, 600);
        let mut app = app("shader");
        step(&mut app, &window);

        app.shutdown();
        assert!(app.backend().live_targets().is_empty());
        assert!(app.backend().live_programs().is_empty());
        assert!(!app.backend().has_context());
        assert_eq!(app.backend().count(|c| matches!(c, Call::ReleaseContext)), 1);

        app.shutdown();
        assert_eq!(app.backend().count(|c| matches!(c, Call::ReleaseContext)), 1);
    }
}

//! Per-frame orchestration.
//!
//! `RenderApplication` drives one iteration per frame: drain window events,
//! keep render targets in step with the window, hot-reload the shader, upload
//! `FrameConstants`, dispatch, present.

mod constants;
mod orchestrator;

pub use constants::{DispatchGrid, FrameConstants, TILE_HEIGHT, TILE_WIDTH};
pub use orchestrator::{HostWindow, LoopEvent, LoopState, RenderApplication};

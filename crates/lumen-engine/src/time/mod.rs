//! Time subsystem.
//!
//! Provides stable, testable frame timing utilities without coupling to the runtime.
//! Intended usage:
//! - one `Clock` per render loop
//! - call `tick()` once per rendered frame to obtain `FrameTime`

mod clock;
mod stats;

pub use clock::{Clock, FrameTime};
pub use stats::{FrameReport, FrameStats};

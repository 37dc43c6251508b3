//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! Runtime code is responsible for translating platform key codes into `Key`s.

mod types;

pub use types::Key;

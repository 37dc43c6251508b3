//! Compute shader compilation and hot reload.
//!
//! The shader is a WGSL file on disk. `ShaderHotReload` polls its modification
//! time once per frame and recompiles on change; `FrameLayout` checks a source
//! against the resources the frame loop binds before any GPU object is built.

mod compile;
mod error;
mod reload;

pub use compile::{FrameLayout, ENTRY_POINT};
pub use error::CompileError;
pub use reload::{DiskSource, ShaderHotReload, ShaderProgram, ShaderSource};

/// Log target for reload and compile messages.
pub const SHADER_LOG_TARGET: &str = "lumen::shader";

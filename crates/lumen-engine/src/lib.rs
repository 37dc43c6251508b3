//! Lumen engine crate.
//!
//! This crate owns the GPU path-tracing runtime: device + surface lifetime,
//! compute shader hot reload, and the per-frame orchestration loop.

pub mod device;
pub mod frame;
pub mod input;
pub mod shader;
pub mod time;
pub mod window;

pub mod logging;

//! GPU device + surface management.
//!
//! This module is responsible for:
//! - the `RenderBackend` capability trait the frame loop is written against
//! - the wgpu implementation (Instance/Adapter/Device/Queue + Surface)
//! - keeping size-dependent render targets in step with the window

mod backend;
mod context;
mod init;
mod surface;
mod targets;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{Extent, RenderBackend};
pub use context::{GpuFrame, GpuProgram, GpuTargets, WgpuBackend};
pub use init::{FeatureLevel, RenderConfig};
pub use surface::{
    choose_present_mode, choose_storage_format, negotiate_feature_level, SurfaceErrorAction,
};
pub use targets::{RenderTargetSet, SwapChainManager};

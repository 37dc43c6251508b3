use anyhow::Result;
use winit::dpi::PhysicalSize;

use crate::frame::{DispatchGrid, FrameConstants};
use crate::shader::CompileError;

/// Size of a render target in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` when either dimension is zero (e.g. a minimized window).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl From<PhysicalSize<u32>> for Extent {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Graphics capabilities the frame loop is written against.
///
/// The backend owns the device + swap chain (the render context). Everything
/// size- or shader-dependent is returned to the caller, who owns it and hands
/// it back through the `release_*` hooks so teardown order stays explicit.
pub trait RenderBackend {
    /// Size-dependent resources (depth view, accumulation storage).
    type Targets;
    /// A compiled compute program.
    type Program;
    /// One acquired back buffer with its views.
    type Frame;

    fn has_context(&self) -> bool;

    /// Creates device, queue and swap chain with back buffers of `size`.
    fn create_context(&mut self, size: Extent) -> Result<()>;

    /// Resizes the swap chain's back buffers in place.
    fn resize_swap_chain(&mut self, size: Extent) -> Result<()>;

    fn create_targets(&mut self, size: Extent) -> Result<Self::Targets>;

    fn release_targets(&mut self, targets: Self::Targets) {
        drop(targets);
    }

    /// Compiles compute shader `source`; `origin` names it in diagnostics.
    fn compile_program(
        &mut self,
        source: &str,
        origin: &str,
    ) -> std::result::Result<Self::Program, CompileError>;

    fn release_program(&mut self, program: Self::Program) {
        drop(program);
    }

    /// Rewrites the entire constant buffer.
    fn upload_constants(&mut self, constants: &FrameConstants) -> Result<()>;

    /// Acquires the next back buffer. `Ok(None)` means skip this frame.
    fn acquire_frame(&mut self) -> Result<Option<Self::Frame>>;

    fn dispatch(
        &mut self,
        frame: &mut Self::Frame,
        program: &Self::Program,
        targets: &Self::Targets,
        grid: DispatchGrid,
    );

    fn present(&mut self, frame: Self::Frame);

    /// Releases the swap chain, then the device. Idempotent.
    fn release_context(&mut self);
}

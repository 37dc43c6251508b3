//! Recording backend used by the frame-loop tests.

use anyhow::{bail, Result};

use super::{Extent, RenderBackend};
use crate::frame::{DispatchGrid, FrameConstants};
use crate::shader::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateContext(Extent),
    ResizeSwapChain(Extent),
    CreateTargets(Extent),
    ReleaseTargets(u32),
    Compile(String),
    ReleaseProgram(u32),
    Upload(FrameConstants),
    Acquire,
    Dispatch {
        program: u32,
        targets: u32,
        grid: DispatchGrid,
    },
    Present {
        dispatched: bool,
    },
    ReleaseContext,
}

#[derive(Debug)]
pub(crate) struct FakeTargets {
    pub id: u32,
}

#[derive(Debug)]
pub(crate) struct FakeProgram {
    pub id: u32,
}

#[derive(Debug)]
pub(crate) struct FakeFrame {
    dispatched: bool,
}

/// Records every call instead of touching a GPU.
///
/// Sources containing `ERROR` fail to compile.
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    pub calls: Vec<Call>,
    pub fail_context: bool,
    pub skip_acquire: bool,
    pub context: bool,
    pub next_id: u32,
    pub live_targets: Vec<u32>,
    pub live_programs: Vec<u32>,
}

impl FakeBackend {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn live_targets(&self) -> &[u32] {
        &self.live_targets
    }

    pub fn live_programs(&self) -> &[u32] {
        &self.live_programs
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for FakeBackend {
    type Targets = FakeTargets;
    type Program = FakeProgram;
    type Frame = FakeFrame;

    fn has_context(&self) -> bool {
        self.context
    }

    fn create_context(&mut self, size: Extent) -> Result<()> {
        if self.fail_context {
            bail!("no adapter");
        }
        self.calls.push(Call::CreateContext(size));
        self.context = true;
        Ok(())
    }

    fn resize_swap_chain(&mut self, size: Extent) -> Result<()> {
        self.calls.push(Call::ResizeSwapChain(size));
        Ok(())
    }

    fn create_targets(&mut self, size: Extent) -> Result<FakeTargets> {
        self.calls.push(Call::CreateTargets(size));
        let id = self.next_id();
        self.live_targets.push(id);
        Ok(FakeTargets { id })
    }

    fn release_targets(&mut self, targets: FakeTargets) {
        self.calls.push(Call::ReleaseTargets(targets.id));
        self.live_targets.retain(|id| *id != targets.id);
    }

    fn compile_program(
        &mut self,
        source: &str,
        origin: &str,
    ) -> std::result::Result<FakeProgram, CompileError> {
        self.calls.push(Call::Compile(source.to_string()));
        if source.contains("ERROR") {
            return Err(CompileError::new(origin, "unexpected token `ERROR`"));
        }
        let id = self.next_id();
        self.live_programs.push(id);
        Ok(FakeProgram { id })
    }

    fn release_program(&mut self, program: FakeProgram) {
        self.calls.push(Call::ReleaseProgram(program.id));
        self.live_programs.retain(|id| *id != program.id);
    }

    fn upload_constants(&mut self, constants: &FrameConstants) -> Result<()> {
        self.calls.push(Call::Upload(*constants));
        Ok(())
    }

    fn acquire_frame(&mut self) -> Result<Option<FakeFrame>> {
        self.calls.push(Call::Acquire);
        if self.skip_acquire {
            return Ok(None);
        }
        Ok(Some(FakeFrame { dispatched: false }))
    }

    fn dispatch(
        &mut self,
        frame: &mut FakeFrame,
        program: &FakeProgram,
        targets: &FakeTargets,
        grid: DispatchGrid,
    ) {
        self.calls.push(Call::Dispatch {
            program: program.id,
            targets: targets.id,
            grid,
        });
        frame.dispatched = true;
    }

    fn present(&mut self, frame: FakeFrame) {
        self.calls.push(Call::Present {
            dispatched: frame.dispatched,
        });
    }

    fn release_context(&mut self) {
        if self.context {
            self.calls.push(Call::ReleaseContext);
            self.context = false;
        }
    }
}

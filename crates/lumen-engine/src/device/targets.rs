use anyhow::{Context, Result};

use super::{Extent, RenderBackend};

/// Size-dependent resources built for one swap-chain size.
///
/// `generation` increases every time a set is built, so two sets with the same
/// extent are still distinguishable.
#[derive(Debug)]
pub struct RenderTargetSet<T> {
    extent: Extent,
    generation: u64,
    resources: T,
}

impl<T> RenderTargetSet<T> {
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resources(&self) -> &T {
        &self.resources
    }
}

/// Keeps the render context and its target set in step with the window.
///
/// The backend owns the context (device + swap chain); this type owns the
/// zero-or-one `RenderTargetSet` derived from it.
pub struct SwapChainManager<B: RenderBackend> {
    current: Option<RenderTargetSet<B::Targets>>,
    generation: u64,
}

impl<B: RenderBackend> SwapChainManager<B> {
    pub fn new() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }

    pub fn current(&self) -> Option<&RenderTargetSet<B::Targets>> {
        self.current.as_ref()
    }

    /// Returns a target set matching `client`, creating or rebuilding as needed.
    ///
    /// - zero-area client (minimized): nothing is touched, returns `None`
    /// - no context yet: creates device + swap chain, then the set
    /// - size changed: releases the old set, resizes the swap chain in place,
    ///   builds a new set
    /// - size unchanged: returns the existing set
    ///
    /// Any creation failure is fatal for the caller.
    pub fn ensure_render_target(
        &mut self,
        backend: &mut B,
        client: Extent,
    ) -> Result<Option<&RenderTargetSet<B::Targets>>> {
        if client.is_empty() {
            return Ok(None);
        }

        if !backend.has_context() {
            self.teardown(backend);
            backend
                .create_context(client)
                .context("failed to create render context")?;
        } else if self.current.as_ref().is_some_and(|set| set.extent == client) {
            return Ok(self.current.as_ref());
        } else {
            self.teardown(backend);
            backend.resize_swap_chain(client).with_context(|| {
                format!("failed to resize swap chain to {}x{}", client.width, client.height)
            })?;
        }

        let resources = backend.create_targets(client).with_context(|| {
            format!("failed to create render targets for {}x{}", client.width, client.height)
        })?;

        self.generation += 1;
        log::info!(
            "render targets #{} built at {}x{}",
            self.generation,
            client.width,
            client.height
        );

        self.current = Some(RenderTargetSet {
            extent: client,
            generation: self.generation,
            resources,
        });

        Ok(self.current.as_ref())
    }

    /// Releases the current target set, keeping the render context alive.
    pub fn teardown(&mut self, backend: &mut B) {
        if let Some(set) = self.current.take() {
            log::debug!("releasing render targets #{}", set.generation);
            backend.release_targets(set.resources);
        }
    }
}

impl<B: RenderBackend> Default for SwapChainManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

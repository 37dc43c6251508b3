use bytemuck::{Pod, Zeroable};

use crate::device::Extent;

/// Threads per work group along X. Must match the shader's `@workgroup_size`.
pub const TILE_WIDTH: u32 = 16;
/// Threads per work group along Y.
pub const TILE_HEIGHT: u32 = 8;

/// Per-frame values uploaded to the compute shader's uniform buffer.
///
/// Field order and size mirror the `FrameConstants` struct declared in the
/// shader prelude. Uniform buffers are bound in 16-byte units.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    /// Frames rendered since the last shader swap or target rebuild.
    pub frame: u32,
    /// Seconds since the loop started.
    pub time: f32,
    pub render_width: f32,
    pub render_height: f32,
}

const _: () = assert!(std::mem::size_of::<FrameConstants>() % 16 == 0);

impl FrameConstants {
    pub const SIZE: u64 = std::mem::size_of::<FrameConstants>() as u64;

    pub fn new(frame: u32, time: f32, extent: Extent) -> Self {
        Self {
            frame,
            time,
            render_width: extent.width as f32,
            render_height: extent.height as f32,
        }
    }
}

/// Work-group counts for one compute dispatch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchGrid {
    /// Smallest grid of `TILE_WIDTH`×`TILE_HEIGHT` groups covering `extent`.
    ///
    /// Rounds up, so edge groups may run threads outside the target; the
    /// shader is expected to bounds-check.
    pub fn covering(extent: Extent) -> Self {
        Self {
            x: extent.width.div_ceil(TILE_WIDTH),
            y: extent.height.div_ceil(TILE_HEIGHT),
            z: 1,
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use lumen_engine::device::RenderConfig;
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::window::{Runtime, RuntimeConfig};
use winit::dpi::PhysicalSize;

const TITLE: &str = "lumen";

/// Initial render size. Afterwards the render size tracks the window.
const TARGET_RENDER_W: u32 = 1280;
const TARGET_RENDER_H: u32 = 720;

/// Present immediately (tearing allowed) instead of on vertical blank.
const DO_NOT_WAIT_FOR_VSYNC: bool = false;

/// The path tracer is read from the source tree so edits hot-reload.
fn shader_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("shaders")
        .join("pathtracer.wgsl")
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: TITLE.to_string(),
        initial_size: PhysicalSize::new(TARGET_RENDER_W, TARGET_RENDER_H),
        shader_path: shader_path(),
    };

    let render = RenderConfig {
        wait_for_vsync: !DO_NOT_WAIT_FOR_VSYNC,
        ..RenderConfig::default()
    };

    log::info!("watching {}", config.shader_path.display());

    Runtime::run(config, render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_engine::shader::FrameLayout;

    #[test]
    fn shipped_shader_validates_for_every_target_format() {
        let source = std::fs::read_to_string(shader_path()).unwrap();
        let formats = [
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba16Float,
        ];

        for format in formats {
            let layout = FrameLayout::new(format).unwrap();
            if let Err(err) = layout.prepare(&source, "pathtracer.wgsl") {
                panic!("{format:?}: {err}");
            }
        }
    }
}

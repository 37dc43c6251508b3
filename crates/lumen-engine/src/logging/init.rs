use std::sync::Once;

use crate::shader::SHADER_LOG_TARGET;

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter in `env_logger` syntax (e.g. "lumen_engine=debug,wgpu_core=warn").
    /// When `None`, `RUST_LOG` is used, then `default_level`.
    pub env_filter: Option<String>,

    /// Level for everything not otherwise filtered when no filter string is set.
    pub default_level: log::LevelFilter,

    /// Keep shader reload messages (compile diagnostics included) at info
    /// level regardless of the filter.
    pub shader_diagnostics: bool,

    /// ANSI coloring behavior.
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            shader_diagnostics: true,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

/// Modules whose info-level output drowns out the frame loop's own messages.
const NOISY_MODULES: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let env = std::env::var("RUST_LOG").ok();
        builder(&config, env.as_deref()).init();

        log::debug!("logging initialized");
    });
}

fn builder(config: &LoggingConfig, env: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    match config.env_filter.as_deref().or(env) {
        Some(filter) => {
            builder.parse_filters(filter);
        }
        None => {
            builder.filter_level(config.default_level);
            for module in NOISY_MODULES {
                builder.filter_module(module, log::LevelFilter::Warn);
            }
        }
    }

    if config.shader_diagnostics {
        builder.filter_module(SHADER_LOG_TARGET, log::LevelFilter::Info);
    }

    builder.write_style(config.write_style);
    builder
}

use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use super::{CompileError, SHADER_LOG_TARGET};

/// Where shader text comes from.
pub trait ShaderSource {
    /// Human-readable name used in diagnostics.
    fn origin(&self) -> String;

    /// Last-write timestamp of the source.
    fn modified(&self) -> io::Result<SystemTime>;

    fn read_to_string(&self) -> io::Result<String>;
}

/// A shader file on disk.
#[derive(Debug, Clone)]
pub struct DiskSource {
    path: PathBuf,
}

impl DiskSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ShaderSource for DiskSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> io::Result<SystemTime> {
        std::fs::metadata(&self.path)?.modified()
    }

    fn read_to_string(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// A compiled program and the source timestamp it was built from.
#[derive(Debug)]
pub struct ShaderProgram<P> {
    program: P,
    modified: SystemTime,
}

impl<P> ShaderProgram<P> {
    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn into_inner(self) -> P {
        self.program
    }
}

/// Recompiles a shader whenever its source timestamp changes.
///
/// Detection is a plain timestamp comparison, polled once per frame. A save
/// that leaves the timestamp unchanged (coarse filesystem resolution) goes
/// unnoticed until the next distinct timestamp.
pub struct ShaderHotReload<S> {
    source: S,
    last_modified: Option<SystemTime>,

    /// Operation of the failure streak in progress, if any.
    source_error: Option<&'static str>,
}

impl<S: ShaderSource> ShaderHotReload<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_modified: None,
            source_error: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Timestamp of the last source that was handed to the compiler.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Returns a freshly compiled program if the source changed since the last
    /// poll and compiled cleanly.
    ///
    /// An unchanged timestamp returns `None` without reading or compiling.
    /// Compile failures are logged and also return `None`; the timestamp is
    /// still recorded, so the same broken text is not recompiled every frame.
    pub fn poll_and_maybe_recompile<P, F>(&mut self, compile: F) -> Option<ShaderProgram<P>>
    where
        F: FnOnce(&str, &str) -> Result<P, CompileError>,
    {
        let modified = match self.source.modified() {
            Ok(modified) => modified,
            Err(err) => {
                self.report_source_error("stat", &err);
                return None;
            }
        };

        if self.source_error == Some("stat") {
            self.source_error = None;
        }

        if self.last_modified == Some(modified) {
            return None;
        }

        let text = match self.source.read_to_string() {
            Ok(text) => text,
            Err(err) => {
                self.report_source_error("read", &err);
                return None;
            }
        };

        self.source_error = None;
        self.last_modified = Some(modified);

        let origin = self.source.origin();
        match compile(&text, &origin) {
            Ok(program) => {
                log::info!(target: SHADER_LOG_TARGET, "compiled {origin}");
                Some(ShaderProgram { program, modified })
            }
            Err(err) => {
                log::warn!(target: SHADER_LOG_TARGET, "{err}");
                None
            }
        }
    }

    // Logged on the first failure only; the file is polled every frame.
    fn report_source_error(&mut self, op: &'static str, err: &io::Error) {
        if self.source_error != Some(op) {
            log::warn!(
                target: SHADER_LOG_TARGET,
                "cannot {op} {}: {err}",
                self.source.origin()
            );
            self.source_error = Some(op);
        }
    }
}

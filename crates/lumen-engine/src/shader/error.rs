use std::fmt;

/// A compute shader that failed to compile.
///
/// Compile failures are recoverable: the previous program stays bound.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// Where the source came from (usually a file path).
    pub origin: String,
    /// Compiler diagnostic, possibly multi-line.
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader compile error in {}:\n{}", self.origin, self.message)
    }
}

impl std::error::Error for CompileError {}

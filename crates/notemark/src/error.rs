use std::fmt;

use thiserror::Error;

/// High-level error type shared across Notemark components.
#[derive(Debug, Error)]
pub enum NotemarkError {
    /// The cached line number no longer exists in the document.
    #[error("stale reference: {path} has {line_count} lines, line {line} is out of range")]
    StaleReference {
        path: String,
        line: usize,
        line_count: usize,
    },
    /// The line exists but no longer carries the marker state the operation needs.
    #[error("precondition mismatch at {path}:{line}: {reason}")]
    PreconditionMismatch {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NotemarkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for NotemarkError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl NotemarkError {
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            NotemarkError::PreconditionMismatch { path, line, reason } => {
                NotemarkError::PreconditionMismatch {
                    path,
                    line,
                    reason: format!("{ctx}: {reason}"),
                }
            }
            NotemarkError::Workspace(msg) => NotemarkError::Workspace(format!("{ctx}: {msg}")),
            NotemarkError::Storage(msg) => NotemarkError::Storage(format!("{ctx}: {msg}")),
            NotemarkError::Config(msg) => NotemarkError::Config(format!("{ctx}: {msg}")),
            NotemarkError::Serialization(msg) => {
                NotemarkError::Serialization(format!("{ctx}: {msg}"))
            }
            other => other,
        }
    }

    /// True for failures caused by the document moving under a cached item.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            NotemarkError::StaleReference { .. } | NotemarkError::PreconditionMismatch { .. }
        )
    }
}

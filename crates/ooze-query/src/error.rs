//! Error taxonomy shared by the query layer and every source adapter.

use std::path::Path;

pub type Result<T> = std::result::Result<T, OozeError>;

#[derive(Debug, thiserror::Error)]
pub enum OozeError {
    #[error("field `{field}` not found on {on}")]
    FieldNotFound { field: String, on: String },

    #[error("field `{field}` holds {found}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected {expected}, collection has {len} element(s)")]
    Shape { expected: &'static str, len: usize },

    #[error("index {index} out of range for collection of length {len}")]
    Index { index: usize, len: usize },

    #[error("cannot bind `{key}` as {tag}: {matches} matching record(s)")]
    Bind {
        key: String,
        tag: String,
        matches: usize,
    },

    #[error("cannot resolve `{key}`: {reason}")]
    Resolution { key: String, reason: String },

    #[error("{}", render_load(.origin, .line, .message))]
    Load {
        origin: String,
        line: Option<usize>,
        message: String,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn render_load(origin: &str, line: &Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("failed to load {origin}:{line}: {message}"),
        None => format!("failed to load {origin}: {message}"),
    }
}

impl OozeError {
    pub fn load(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            origin: origin.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn load_at(origin: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Load {
            origin: origin.into(),
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::load(path.display().to_string(), err.to_string())
    }

    pub fn resolution(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

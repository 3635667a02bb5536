use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse library RON: {0}")]
    LibraryParseError(String),
    #[error("Failed to parse model RON: {0}")]
    ModelParseError(String),
    #[error("Part '{name}' is invalid: {reason}")]
    InvalidPart { name: String, reason: String },
    #[error("Part '{0}' is defined more than once")]
    DuplicatePart(String),
}

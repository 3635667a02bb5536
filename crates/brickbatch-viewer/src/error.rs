use std::path::PathBuf;

use brickbatch_core::RenderError;
use brickbatch_library::LoadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to read config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No model loaded")]
    NoModel,
}

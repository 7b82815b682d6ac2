use std::path::PathBuf;

use crate::semantic::{EmbeddingError, TrainingError};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("malformed dataset {path}: {message}")]
    DataFormat { path: String, message: String },

    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("project {0:?} has no labelled sentences")]
    EmptyCorpus(String),

    #[error("project {0:?} is not present in metadata")]
    Lookup(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn data_format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Maps a `NotFound` io error on `path` to `MissingArtifact`.
    pub fn from_io_at(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::MissingArtifact(path.to_path_buf()),
            _ => Self::IO(err),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

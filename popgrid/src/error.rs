//! Error types.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PopgridError {
    #[error("Population dataset has no rows to probe the resolution from.")]
    EmptyDataset,
    #[error("Invalid cell id: {0}")]
    InvalidCell(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Dataset access failed: {0}")]
    JoinIO(#[from] polars::error::PolarsError),
    #[error("Failed to write {}: {message}", .path.display())]
    ArtifactIO { path: PathBuf, message: String },
    #[error("Failed to read boundaries: {0}")]
    Boundaries(String),
    #[error("Wrapped serde JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Worker task did not complete: {0}")]
    Worker(String),
}

impl PopgridError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ArtifactIO {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<geojson::Error> for PopgridError {
    fn from(err: geojson::Error) -> Self {
        Self::Boundaries(err.to_string())
    }
}

impl From<h3o::error::InvalidGeometry> for PopgridError {
    fn from(err: h3o::error::InvalidGeometry) -> Self {
        Self::Geometry(err.to_string())
    }
}

pub type PopgridResult<T> = Result<T, PopgridError>;

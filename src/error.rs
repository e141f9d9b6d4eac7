use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing a dataset.
///
/// Per-file variants (`Decode`, `Encode`, `Io`, `SameFile`, `EmptyImage`) are recorded in a
/// [`StageReport`](crate::types::StageReport) and never abort a batch.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{action} failed for {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to copy {} onto itself", path.display())]
    SameFile { path: PathBuf },

    #[error("image {} has no pixels", path.display())]
    EmptyImage { path: PathBuf },

    #[error("invalid color band: {0}")]
    InvalidBand(String),
}

impl PrepError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrepError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        PrepError::Decode {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

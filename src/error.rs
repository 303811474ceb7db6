//! Top-level error type for the segtool library.
//!
//! Every module keeps its own error enum; [`Error`] wraps them so callers
//! driving a [`crate::session::Session`] handle a single type, and
//! [`Error::kind`] maps any of them onto the coarse taxonomy a host reports.

use segtool_raster::RasterError;

use crate::config::ConfigError;
use crate::inference::PredictError;
use crate::workspace::WorkspaceError;

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An image or mask file could not be decoded.
    Decode,
    /// Reading or writing a file failed.
    Io,
    /// The configuration file was missing, unreadable or invalid.
    Config,
    /// The operation was not valid in the current state.
    Validation,
    /// Model loading or prediction failed.
    Predict,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Raster(e) => raster_kind(e),
            Self::Workspace(e) => match e {
                WorkspaceError::Mask(inner) => raster_kind(inner),
                WorkspaceError::Record { .. } => ErrorKind::Decode,
                WorkspaceError::MissingSource(_) | WorkspaceError::MaskExists(_) => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::Io,
            },
            Self::Config(_) => ErrorKind::Config,
            Self::Predict(_) => ErrorKind::Predict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

fn raster_kind(error: &RasterError) -> ErrorKind {
    match error {
        RasterError::Decode { .. } => ErrorKind::Decode,
        RasterError::Io { .. } | RasterError::Encode { .. } => ErrorKind::Io,
        RasterError::InvalidSize { .. } | RasterError::SizeMismatch { .. } => {
            ErrorKind::Validation
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

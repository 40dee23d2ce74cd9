//! Errors raised by filter and estimator operations.
//!
//! Construction and structure-operation errors are programmer errors and are
//! returned to the immediate caller. Per-item invalidity during classification
//! is not an error; it is reported as [`Status::Invalid`](crate::classifier::Status::Invalid).

use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Constructor parameter outside of its accepted range.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: String,
    },

    /// Item passed to a filter operation is not usable text.
    #[error("invalid item type: {0}")]
    TypeInvalid(&'static str),

    /// Token source could not be opened.
    #[error("failed to open token source {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Estimators with different precision cannot be merged.
    #[error("incompatible merge: expected precision {expected}, found {found}")]
    IncompatibleMerge { expected: u8, found: u8 },
}

impl Error {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

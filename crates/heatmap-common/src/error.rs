//! Error taxonomy for loading raster layers.
//!
//! All errors here are `Clone`: one load outcome is broadcast to every caller
//! waiting on the same layer key.

use thiserror::Error;

/// Result type alias for a layer load attempt.
pub type LoadResult<T> = Result<T, LoadError>;

/// The byte buffer is not a raster container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("buffer of {len} bytes is smaller than the minimum raster size of {min} bytes")]
    TooSmall { len: usize, min: usize },

    #[error("source returned markup instead of raster data (found '{marker}')")]
    LooksLikeMarkupError { marker: String },

    #[error("invalid byte-order marker 0x{first:02X} 0x{second:02X}, expected 'II' or 'MM'")]
    InvalidMagicBytes { first: u8, second: u8 },
}

/// The decoder could not turn validated bytes into a grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported raster feature: {0}")]
    Unsupported(String),

    #[error("malformed raster: {0}")]
    Malformed(String),

    #[error("raster has no readable band")]
    NoBands,
}

impl DecodeError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// The source bytes could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source '{locator}' is unavailable: {reason}")]
    Unavailable { locator: String, reason: String },

    #[error("source '{locator}' responded with HTTP {status}")]
    HttpStatus { locator: String, status: u16 },

    #[error("timed out fetching '{locator}'")]
    Timeout { locator: String },
}

impl SourceError {
    pub fn unavailable(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}

/// Why a layer failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// The load task ended without producing an outcome (panic or runtime
    /// shutdown).
    #[error("layer load interrupted: {0}")]
    Interrupted(String),
}

impl LoadError {
    /// The bytes arrived but are not a usable raster. Retrying the same source
    /// will not help.
    pub fn is_bad_file(&self) -> bool {
        matches!(self, LoadError::Format(_) | LoadError::Decode(_))
    }

    /// The source could not be reached; a later retry may succeed.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, LoadError::Source(_))
    }

    /// Short machine-readable category for logs and UI messages.
    pub fn category(&self) -> &'static str {
        match self {
            LoadError::Format(FormatError::TooSmall { .. }) => "too_small",
            LoadError::Format(FormatError::LooksLikeMarkupError { .. }) => "markup_response",
            LoadError::Format(FormatError::InvalidMagicBytes { .. }) => "invalid_magic",
            LoadError::Decode(_) => "decode_failed",
            LoadError::Source(_) => "source_unavailable",
            LoadError::Interrupted(_) => "interrupted",
        }
    }
}

//! Error types for video-to-ASCII conversion.

use std::path::PathBuf;

/// Errors raised by the conversion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Bad arguments, caught before any decoding starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The video exists but cannot be probed, opened or yields no frames.
    #[error("cannot read video {}: {reason}", .path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The decoder process failed after it started producing frames.
    #[error("decoder failed: {0}")]
    Decode(String),

    /// A frame could not be decoded, rendered or persisted.
    #[error("frame {index} failed: {source}")]
    Frame {
        index: u64,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ConvertError::InvalidInput(msg.into())
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConvertError::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        ConvertError::Decode(reason.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConvertError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn at_frame(self, index: u64) -> Self {
        ConvertError::Frame {
            index,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

use std::collections::TryReserveError;
use std::time::Duration;

use crate::clock::ClockError;
use crate::format::FORMAT_CHUNK_LEN;

/// The byte stream is not a RIFF/WAVE container this player can decode.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Found a data chunk before any fmt chunk")]
    MissingFormat,

    #[error("Found a second fmt chunk")]
    DuplicateFormat,

    #[error("The fmt chunk declares {size} bytes, but the format layout needs {}", FORMAT_CHUNK_LEN)]
    FormatTooShort { size: u32 },

    #[error("The stream ends inside the fmt chunk")]
    TruncatedFormat,

    #[error("Unsupported compression code {0:#06x}")]
    UnsupportedCompression(u16),

    #[error("Unsupported sample width of {0} bits")]
    UnsupportedBitsPerSample(u16),

    #[error("The format declares zero channels")]
    ZeroChannels,

    #[error("Sample rate of {0} Hz cannot be clocked")]
    InvalidSampleRate(u32),

    #[error("The format declares a block alignment of zero")]
    ZeroBlockAlign,

    #[error("Block alignment of {block_align} bytes cannot hold {channels} channels of {bits_per_sample}-bit samples")]
    BlockAlignTooSmall {
        block_align: u16,
        channels: u16,
        bits_per_sample: u16,
    },

    #[error("Data chunk declares {declared_frames} frames but the stream ends after {read_frames}")]
    Truncated {
        declared_frames: u64,
        read_frames: u64,
    },
}

/// A buffer the decoder needs could not be allocated.
#[derive(Debug, thiserror::Error)]
#[error("Unable to allocate a {size} byte frame buffer")]
pub struct ResourceError {
    pub(crate) size: usize,
    pub(crate) source: TryReserveError,
}

/// The output clock was running but did not free a FIFO slot in time.
#[derive(Debug, thiserror::Error)]
#[error("No FIFO slot was freed within {timeout:?}")]
pub struct StallError {
    pub(crate) timeout: Duration,
}

#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
enum ErrorPayload {
    #[display(fmt = "Malformed container: {}", _0)]
    Container(ContainerError),

    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),

    #[display(fmt = "Resource exhausted: {}", _0)]
    Resource(ResourceError),

    #[display(fmt = "Output clock error: {}", _0)]
    Clock(ClockError),

    #[display(fmt = "Output stalled: {}", _0)]
    Stall(StallError),
}

/// Why a playback session ended early.
///
/// Every error is fatal to the session it came from, never to the player: the session is torn down, the clock is
/// detached, and the same [crate::Player] can play the next stream.
#[derive(Debug, thiserror::Error)]
#[error("{payload}")]
pub struct Error {
    payload: ErrorPayload,
}

macro_rules! conv {
    ($variant: ident, $from_err: path) => {
        impl From<$from_err> for Error {
            fn from(value: $from_err) -> Error {
                Error {
                    payload: ErrorPayload::$variant(value),
                }
            }
        }
    };
}

conv!(Container, ContainerError);
conv!(Io, std::io::Error);
conv!(Resource, ResourceError);
conv!(Clock, ClockError);
conv!(Stall, StallError);

impl Error {
    /// Is the input not a decodable RIFF/WAVE stream?
    pub fn is_malformed(&self) -> bool {
        self.payload.is_container()
    }

    /// Did a data chunk promise more frames than the stream holds?
    pub fn is_truncated(&self) -> bool {
        matches!(
            self.payload,
            ErrorPayload::Container(ContainerError::Truncated { .. })
        )
    }

    pub fn is_resource_exhausted(&self) -> bool {
        self.payload.is_resource()
    }

    pub fn is_io(&self) -> bool {
        self.payload.is_io()
    }

    pub fn is_clock(&self) -> bool {
        self.payload.is_clock()
    }

    pub fn is_stalled(&self) -> bool {
        self.payload.is_stall()
    }

    /// The container problem, if that is what this is.
    pub fn container_error(&self) -> Option<&ContainerError> {
        match &self.payload {
            ErrorPayload::Container(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let truncated: Error = ContainerError::Truncated {
            declared_frames: 8,
            read_frames: 3,
        }
        .into();
        assert!(truncated.is_malformed());
        assert!(truncated.is_truncated());
        assert!(!truncated.is_io());

        let missing: Error = ContainerError::MissingFormat.into();
        assert!(missing.is_malformed());
        assert!(!missing.is_truncated());
        assert!(matches!(
            missing.container_error(),
            Some(ContainerError::MissingFormat)
        ));

        let io: Error = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(io.is_io());
        assert!(io.container_error().is_none());

        let stall: Error = StallError {
            timeout: Duration::from_millis(5),
        }
        .into();
        assert!(stall.is_stalled());
    }

    #[test]
    fn test_display_mentions_cause() {
        let err: Error = ContainerError::UnsupportedBitsPerSample(24).into();
        assert_eq!(
            err.to_string(),
            "Malformed container: Unsupported sample width of 24 bits"
        );
    }
}

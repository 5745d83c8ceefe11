//! Crate-specific error types for mmap-buffer.

use std::io;
use thiserror::Error;

/// Result alias for mmap-buffer operations.
pub type Result<T> = std::result::Result<T, MmapBufferError>;

/// Error type covering argument validation, mapping, access and lifecycle failures.
#[derive(Debug, Error)]
pub enum MmapBufferError {
    /// Rejected before any system resource was touched (non-positive length,
    /// misaligned offset, malformed numeric input).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The mapping primitive refused the request. The OS error is passed through unchanged.
    #[error("{op} failed: {source}")]
    MappingFailed {
        /// Primitive call that failed (`mmap` or `munmap`).
        op: &'static str,
        /// Error reported by the primitive.
        #[source]
        source: io::Error,
    },

    /// Access not granted by the mapping's protection flags.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// Byte index outside `[0, len)`.
    #[error("index out of range: index={index}, len={len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Length of the buffer.
        len: usize,
    },

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Total length of the buffer.
        total: usize,
    },

    /// An encode would write past the end of the buffer.
    #[error("buffer overflow: offset={offset}, needed={needed}, available={available}")]
    BufferOverflow {
        /// Write offset.
        offset: usize,
        /// Bytes the transcoded text occupies.
        needed: usize,
        /// Bytes left between `offset` and the end of the buffer.
        available: usize,
    },

    /// Encoding name outside the supported set.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Operation attempted on a buffer that has been closed.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Wrapper for `std::io::Error` from the convenience layer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MmapBufferError {
    /// Platform error code associated with this failure, if any.
    ///
    /// Argument validation failures report `EINVAL`, protection violations
    /// report `EACCES`, and primitive failures report whatever the OS returned.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::InvalidArgument(_) => Some(libc::EINVAL),
            Self::PermissionDenied(_) => Some(libc::EACCES),
            Self::MappingFailed { source, .. } | Self::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }

    pub(crate) fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

//! High-level convenience functions.
//!
//! Thin wrappers for callers that already hold an open `File`. Descriptors are
//! borrowed, never opened or closed here.

use std::fs::File;
use std::os::unix::io::AsRawFd;

use crate::args::{CreateArgs, LooseArg};
use crate::buffer::MmapBuffer;
use crate::encoding::Encoding;
use crate::errors::{MmapBufferError, Result};
use crate::flags::{Protection, Sharing};

/// Map the whole of `file`, using its current length.
///
/// # Errors
///
/// Returns `MmapBufferError::Io` if the metadata query fails,
/// `MmapBufferError::InvalidArgument` for an empty file or one too large to
/// address, and errors from [`MmapBuffer::create`].
pub fn map_file(file: &File, protection: Protection, sharing: Sharing) -> Result<MmapBuffer> {
    let size = file.metadata()?.len();
    let len = usize::try_from(size)
        .map_err(|_| MmapBufferError::invalid(format!("file of {size} bytes cannot be mapped")))?;
    MmapBuffer::create(len, protection, sharing, file.as_raw_fd(), 0)
}

/// Map from dynamically typed `(size, protection, flags, fd[, offset])` arguments.
///
/// # Errors
///
/// Returns errors from [`CreateArgs::from_loose`] and [`MmapBuffer::create`].
pub fn map_loose(args: &[LooseArg]) -> Result<MmapBuffer> {
    MmapBuffer::from_args(CreateArgs::from_loose(args)?)
}

/// Human-readable summary of a buffer, e.g. `<MmapBuffer 4096>`. Not meant to be parsed.
#[must_use]
pub fn inspect(buffer: &MmapBuffer) -> String {
    buffer.to_string()
}

/// Number of bytes `text` occupies once encoded.
#[must_use]
pub fn byte_length(text: &str, encoding: Encoding) -> usize {
    encoding.byte_length(text)
}

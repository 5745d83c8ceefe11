//! Builder for mapping parameters.

use std::os::unix::io::RawFd;

use log::debug;

use crate::args::CreateArgs;
use crate::buffer::MmapBuffer;
use crate::errors::{MmapBufferError, Result};
use crate::flags::{Protection, Sharing};
use crate::mapper::{MapRequest, Mapper, SystemMapper};
use crate::region::Region;
use crate::utils::{align_up, is_page_aligned, page_size};

// Error message constants
const ERR_ZERO_LENGTH: &str = "length must be greater than zero";
const ERR_LENGTH_TOO_LARGE: &str = "length exceeds the maximum mapping size";
const ERR_OFFSET_TOO_LARGE: &str = "offset does not fit in off_t";

/// Mapping parameters, validated before the mapping primitive is called.
///
/// Defaults: read-only, shared, offset 0. The length has no default and must be set.
///
/// ```no_run
/// use std::os::unix::io::AsRawFd;
/// use mmap_buffer::{MmapOptions, Protection, Sharing};
///
/// let file = std::fs::File::open("data.bin")?;
/// let buf = MmapOptions::new()
///     .len(4096)
///     .protection(Protection::READ)
///     .sharing(Sharing::Private)
///     .map(file.as_raw_fd())?;
/// assert_eq!(buf.len(), 4096);
/// # Ok::<(), mmap_buffer::MmapBufferError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapOptions {
    len: usize,
    protection: Protection,
    sharing: Sharing,
    offset: u64,
}

impl Default for MmapOptions {
    fn default() -> Self {
        Self {
            len: 0,
            protection: Protection::READ,
            sharing: Sharing::Shared,
            offset: 0,
        }
    }
}

impl MmapOptions {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes to map.
    #[must_use]
    pub fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Protection for the mapped pages.
    #[must_use]
    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    /// Shared or private mapping.
    #[must_use]
    pub fn sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = sharing;
        self
    }

    /// Offset into the descriptor. Must be page aligned.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Check the parameters without touching any system resource.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` for a zero or oversized
    /// length and for offsets that are not page aligned.
    pub fn validate(&self) -> Result<()> {
        if self.len == 0 {
            return Err(MmapBufferError::invalid(ERR_ZERO_LENGTH));
        }
        if isize::try_from(self.len).is_err() {
            return Err(MmapBufferError::invalid(ERR_LENGTH_TOO_LARGE));
        }
        if i64::try_from(self.offset).is_err() {
            return Err(MmapBufferError::invalid(ERR_OFFSET_TOO_LARGE));
        }
        if !is_page_aligned(self.offset) {
            return Err(MmapBufferError::invalid(format!(
                "offset {} is not a multiple of the page size ({})",
                self.offset,
                page_size()
            )));
        }
        Ok(())
    }

    /// Map `fd` with `mmap(2)`.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` if validation fails and
    /// `MmapBufferError::MappingFailed` if the kernel refuses the mapping.
    pub fn map(&self, fd: RawFd) -> Result<MmapBuffer> {
        self.map_with(SystemMapper, fd)
    }

    /// Map `fd` through a caller-supplied primitive.
    ///
    /// # Errors
    ///
    /// Same as [`map`](Self::map); the primitive's error is passed through unchanged.
    pub fn map_with<M: Mapper + 'static>(&self, mapper: M, fd: RawFd) -> Result<MmapBuffer> {
        self.validate()?;
        let request = MapRequest {
            len: self.len,
            protection: self.protection,
            sharing: self.sharing,
            fd,
            offset: self.offset,
        };
        let addr = mapper
            .map(&request)
            .map_err(|source| MmapBufferError::MappingFailed { op: "mmap", source })?;
        debug!(
            "mapped {} bytes ({} reserved) of fd {} at offset {}: {:?} {:?}",
            self.len,
            align_up(self.len, page_size()),
            fd,
            self.offset,
            self.protection,
            self.sharing
        );
        // SAFETY: `addr` was just returned by a successful map of `self.len` bytes.
        let region = unsafe { Region::from_raw(addr, self.len, Box::new(mapper)) };
        Ok(MmapBuffer::from_region(region, self.protection, self.sharing))
    }
}

impl From<CreateArgs> for MmapOptions {
    fn from(args: CreateArgs) -> Self {
        MmapOptions::new()
            .len(args.len)
            .protection(args.protection)
            .sharing(args.sharing)
            .offset(args.offset)
    }
}

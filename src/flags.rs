//! Protection and sharing flags passed to the mapping primitive.

use bitflags::bitflags;

use crate::errors::{MmapBufferError, Result};

bitflags! {
    /// Capabilities granted to a mapping. The bit values are the platform's `PROT_*` constants.
    ///
    /// ```
    /// use mmap_buffer::Protection;
    ///
    /// let rw = Protection::READ | Protection::WRITE;
    /// assert!(rw.can_write());
    /// assert!(!Protection::NONE.can_read());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: i32 {
        /// Pages may be read.
        const READ = libc::PROT_READ;
        /// Pages may be written.
        const WRITE = libc::PROT_WRITE;
        /// Pages may be executed.
        const EXEC = libc::PROT_EXEC;
    }
}

impl Protection {
    /// Pages may not be accessed (`PROT_NONE`).
    pub const NONE: Self = Self::empty();

    /// Returns `true` if the mapping is readable.
    #[must_use]
    pub fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns `true` if the mapping is writable.
    #[must_use]
    pub fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns `true` if the mapping is executable.
    #[must_use]
    pub fn can_exec(self) -> bool {
        self.contains(Self::EXEC)
    }

    /// Convert raw `PROT_*` bits, rejecting bits this crate does not know.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` for unknown bits.
    pub fn from_raw(bits: i32) -> Result<Self> {
        Self::from_bits(bits)
            .ok_or_else(|| MmapBufferError::invalid(format!("unknown protection bits: {bits:#x}")))
    }
}

/// Whether writes propagate to the backing store and other mappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sharing {
    /// Writes are visible to other mappers and reach the backing file (`MAP_SHARED`).
    #[default]
    Shared,
    /// Private copy-on-write mapping (`MAP_PRIVATE`).
    Private,
}

impl Sharing {
    /// Platform `MAP_*` flag for this mode.
    #[must_use]
    pub fn as_flag(self) -> i32 {
        match self {
            Sharing::Shared => libc::MAP_SHARED,
            Sharing::Private => libc::MAP_PRIVATE,
        }
    }

    /// Convert a raw `MAP_SHARED`/`MAP_PRIVATE` value.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` for any other value.
    pub fn from_raw(flags: i32) -> Result<Self> {
        match flags {
            f if f == libc::MAP_SHARED => Ok(Sharing::Shared),
            f if f == libc::MAP_PRIVATE => Ok(Sharing::Private),
            other => Err(MmapBufferError::invalid(format!(
                "sharing flags must be MAP_SHARED or MAP_PRIVATE, got {other:#x}"
            ))),
        }
    }
}

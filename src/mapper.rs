//! The mapping primitive: establishes and tears down virtual-memory mappings.
//!
//! [`MmapBuffer`](crate::MmapBuffer) only validates arguments and tracks state; the
//! actual page-table work is delegated to a [`Mapper`]. [`SystemMapper`] calls
//! `mmap(2)`/`munmap(2)` directly. Other implementations can be injected through
//! [`MmapOptions::map_with`](crate::MmapOptions::map_with).

use std::io;
use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};

use crate::flags::{Protection, Sharing};

/// Fully resolved arguments for one mapping call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRequest {
    /// Number of bytes to map. Always greater than zero.
    pub len: usize,
    /// Capabilities requested for the pages.
    pub protection: Protection,
    /// Shared or private mapping.
    pub sharing: Sharing,
    /// Caller-owned descriptor of the backing file or shared memory object.
    pub fd: RawFd,
    /// Byte offset into `fd`. Always a multiple of the page size.
    pub offset: u64,
}

/// Contract between the buffer and the platform's mapping facility.
///
/// # Safety
///
/// A successful [`map`](Mapper::map) must return the base address of at least
/// `request.len` contiguous bytes that stay valid, with the requested
/// protection, until [`unmap`](Mapper::unmap) is called for that address.
pub unsafe trait Mapper {
    /// Establish a mapping.
    ///
    /// # Errors
    ///
    /// Returns the platform error unchanged; callers do not retry.
    fn map(&self, request: &MapRequest) -> io::Result<NonNull<u8>>;

    /// Release a mapping previously returned by [`map`](Mapper::map).
    ///
    /// # Safety
    ///
    /// `addr` and `len` must come from a single successful `map` call on this
    /// mapper, and the region must not be accessed afterwards.
    ///
    /// # Errors
    ///
    /// Returns the platform error unchanged.
    unsafe fn unmap(&self, addr: NonNull<u8>, len: usize) -> io::Result<()>;
}

/// `mmap(2)`/`munmap(2)` via libc.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMapper;

// SAFETY: the kernel guarantees a successful mmap covers `len` bytes until munmap.
unsafe impl Mapper for SystemMapper {
    fn map(&self, request: &MapRequest) -> io::Result<NonNull<u8>> {
        let offset = libc::off_t::try_from(request.offset)
            .map_err(|_| io::Error::from_raw_os_error(libc::EOVERFLOW))?;

        // SAFETY: a null hint lets the kernel choose the address; all other
        // arguments are plain values and the call has no memory preconditions.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                request.len,
                request.protection.bits(),
                request.sharing.as_flag(),
                request.fd,
                offset,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(addr.cast::<u8>()).ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
    }

    unsafe fn unmap(&self, addr: NonNull<u8>, len: usize) -> io::Result<()> {
        // SAFETY: caller guarantees (addr, len) came from our own mmap call.
        let result = unsafe { libc::munmap(addr.as_ptr().cast::<libc::c_void>(), len) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

//! Owned handle to one mapping obtained from a [`Mapper`].

use std::fmt;
use std::io;
use std::ops::Range;
use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::errors::Result;
use crate::mapper::Mapper;
use crate::utils::ensure_in_bounds;

/// A live mapping. Unmapped exactly once, by [`Region::release`] or on drop.
///
/// All byte access goes through raw pointers and short-lived slices that never
/// escape a method, so several buffers may share one region (see
/// `MmapBuffer::slice`) without creating overlapping Rust references.
pub(crate) struct Region {
    addr: NonNull<u8>,
    len: usize,
    mapped: bool,
    mapper: Box<dyn Mapper>,
}

impl Region {
    /// Take ownership of `len` bytes at `addr` produced by `mapper`.
    ///
    /// # Safety
    ///
    /// `(addr, len)` must be the result of a successful `mapper.map` call that
    /// has not been unmapped.
    pub(crate) unsafe fn from_raw(addr: NonNull<u8>, len: usize, mapper: Box<dyn Mapper>) -> Self {
        Self {
            addr,
            len,
            mapped: true,
            mapper,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the region.
    pub(crate) fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        ensure_in_bounds(offset, dst.len(), self.len)?;
        // SAFETY: bounds validated above; `dst` is ordinary memory and cannot
        // overlap the mapping.
        unsafe {
            ptr::copy_nonoverlapping(self.addr.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    /// Copy `src` into the region at `offset`.
    pub(crate) fn write(&self, offset: usize, src: &[u8]) -> Result<()> {
        ensure_in_bounds(offset, src.len(), self.len)?;
        // SAFETY: bounds validated above. Writes go through the raw base
        // pointer; no reference into the region is alive at this point.
        unsafe {
            ptr::copy(src.as_ptr(), self.addr.as_ptr().add(offset), src.len());
        }
        Ok(())
    }

    /// Run `f` over a borrowed view of `range`.
    pub(crate) fn with_bytes<T>(&self, range: Range<usize>, f: impl FnOnce(&[u8]) -> T) -> Result<T> {
        ensure_in_bounds(range.start, range.len(), self.len)?;
        // SAFETY: bounds validated above; the slice does not outlive this call.
        let bytes = unsafe {
            std::slice::from_raw_parts(self.addr.as_ptr().add(range.start), range.len())
        };
        Ok(f(bytes))
    }

    /// memmove `len` bytes from `self[src_offset..]` into `dst[dst_offset..]`.
    /// `dst` may be the same region.
    pub(crate) fn copy_to(&self, src_offset: usize, dst: &Region, dst_offset: usize, len: usize) -> Result<()> {
        ensure_in_bounds(src_offset, len, self.len)?;
        ensure_in_bounds(dst_offset, len, dst.len)?;
        // SAFETY: both ranges validated; ptr::copy handles overlap.
        unsafe {
            ptr::copy(
                self.addr.as_ptr().add(src_offset),
                dst.addr.as_ptr().add(dst_offset),
                len,
            );
        }
        Ok(())
    }

    /// Unmap now and report the primitive's result.
    pub(crate) fn release(mut self) -> io::Result<()> {
        self.unmap_once()
    }

    fn unmap_once(&mut self) -> io::Result<()> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;
        debug!("unmapping {} bytes at {:p}", self.len, self.addr);
        // SAFETY: `mapped` was true, so (addr, len) is a live mapping from
        // `mapper` and this is the only unmap call for it.
        unsafe { self.mapper.unmap(self.addr, self.len) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Err(err) = self.unmap_once() {
            warn!("munmap of {} bytes at {:p} failed: {err}", self.len, self.addr);
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("mapped", &self.mapped)
            .finish()
    }
}

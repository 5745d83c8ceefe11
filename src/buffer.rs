//! The memory-mapped byte buffer.

use std::fmt;
use std::ops::RangeBounds;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use log::trace;

use crate::args::{normalize_decode_args, normalize_write_args, CreateArgs, LooseArg};
use crate::encoding::Encoding;
use crate::errors::{MmapBufferError, Result};
use crate::flags::{Protection, Sharing};
use crate::mapper::Mapper;
use crate::options::MmapOptions;
use crate::region::Region;
use crate::utils::{endpoints, ensure_in_bounds, resolve_range};

// Error message constants
const ERR_CLOSED: &str = "buffer has been closed";
const ERR_NOT_READABLE: &str = "mapping was created without PROT_READ";
const ERR_NOT_WRITABLE: &str = "mapping was created without PROT_WRITE";
const ERR_EMPTY_SLICE: &str = "slice must not be empty";

/// Byte buffer backed by a memory-mapped region.
///
/// The buffer reads and writes the mapping directly; with [`Sharing::Shared`]
/// every mutation is visible to other mappings of the same file. Access is
/// bounds checked and gated on the mapping's [`Protection`], so a write to a
/// read-only mapping is an error instead of a segfault.
///
/// The region is unmapped by [`close`](Self::close) or on drop. Buffers
/// produced by [`slice`](Self::slice) share the region; it is unmapped once
/// the last of them is released.
///
/// A buffer is meant for use from one thread; it is neither `Send` nor `Sync`.
/// Writers in other processes sharing the file are not synchronized with.
///
/// # Examples
///
/// ```no_run
/// use std::os::unix::io::AsRawFd;
/// use mmap_buffer::{Encoding, MmapBuffer, Protection, Sharing};
///
/// let file = std::fs::OpenOptions::new().read(true).write(true).open("data.bin")?;
/// let mut buf = MmapBuffer::create(
///     4096,
///     Protection::READ | Protection::WRITE,
///     Sharing::Shared,
///     file.as_raw_fd(),
///     0,
/// )?;
///
/// buf.encode("hello world", 0, Encoding::Utf8)?;
/// assert_eq!(buf.decode(Encoding::Utf8, 0..11)?, "hello world");
/// assert_eq!(buf.get(0)?, b'h');
/// buf.close()?;
/// # Ok::<(), mmap_buffer::MmapBufferError>(())
/// ```
pub struct MmapBuffer {
    region: Option<Rc<Region>>,
    // Offset of this view inside the region.
    start: usize,
    len: usize,
    protection: Protection,
    sharing: Sharing,
}

impl MmapBuffer {
    /// Map `len` bytes of `fd` starting at `offset`.
    ///
    /// `fd` stays owned by the caller; it may be closed once this returns.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` (EINVAL) if `len` is zero or
    /// `offset` is not a multiple of the page size, and
    /// `MmapBufferError::MappingFailed` with the OS error if `mmap` fails.
    pub fn create(
        len: usize,
        protection: Protection,
        sharing: Sharing,
        fd: RawFd,
        offset: u64,
    ) -> Result<Self> {
        Self::options()
            .len(len)
            .protection(protection)
            .sharing(sharing)
            .offset(offset)
            .map(fd)
    }

    /// Like [`create`](Self::create), with a caller-supplied mapping primitive.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn create_with<M: Mapper + 'static>(
        mapper: M,
        len: usize,
        protection: Protection,
        sharing: Sharing,
        fd: RawFd,
        offset: u64,
    ) -> Result<Self> {
        Self::options()
            .len(len)
            .protection(protection)
            .sharing(sharing)
            .offset(offset)
            .map_with(mapper, fd)
    }

    /// Map from already normalized loose arguments.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn from_args(args: CreateArgs) -> Result<Self> {
        MmapOptions::from(args).map(args.fd)
    }

    /// Builder with default options.
    #[must_use]
    pub fn options() -> MmapOptions {
        MmapOptions::new()
    }

    pub(crate) fn from_region(region: Region, protection: Protection, sharing: Sharing) -> Self {
        Self {
            start: 0,
            len: region.len(),
            region: Some(Rc::new(region)),
            protection,
            sharing,
        }
    }

    /// Length in bytes, exactly as requested at construction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false` for a constructed buffer; zero-length mappings are rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Protection the region was mapped with.
    #[must_use]
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Sharing mode the region was mapped with.
    #[must_use]
    pub fn sharing(&self) -> Sharing {
        self.sharing
    }

    /// Whether the buffer still holds its region (not yet closed).
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.region.is_some()
    }

    fn region(&self) -> Result<&Region> {
        self.region
            .as_deref()
            .ok_or(MmapBufferError::InvalidState(ERR_CLOSED))
    }

    fn readable(&self) -> Result<&Region> {
        let region = self.region()?;
        if !self.protection.can_read() {
            return Err(MmapBufferError::PermissionDenied(ERR_NOT_READABLE));
        }
        Ok(region)
    }

    fn writable(&self) -> Result<&Region> {
        let region = self.region()?;
        if !self.protection.can_write() {
            return Err(MmapBufferError::PermissionDenied(ERR_NOT_WRITABLE));
        }
        Ok(region)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(MmapBufferError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Read the byte at `index`.
    ///
    /// # Errors
    ///
    /// `InvalidState` after close, `PermissionDenied` without `PROT_READ`,
    /// `IndexOutOfRange` if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<u8> {
        let region = self.readable()?;
        self.check_index(index)?;
        let mut byte = [0u8; 1];
        region.read(self.start + index, &mut byte)?;
        Ok(byte[0])
    }

    /// Write `value` at `index` and return it.
    ///
    /// # Errors
    ///
    /// `InvalidState` after close, `PermissionDenied` without `PROT_WRITE`
    /// (the region is left untouched), `IndexOutOfRange` if `index >= len()`.
    pub fn set(&mut self, index: usize, value: u8) -> Result<u8> {
        let region = self.writable()?;
        self.check_index(index)?;
        region.write(self.start + index, &[value])?;
        Ok(value)
    }

    /// Decode the bytes in `range` as text.
    ///
    /// An empty range returns `""` without reading the region.
    ///
    /// # Errors
    ///
    /// `InvalidState` after close, `PermissionDenied` without `PROT_READ`,
    /// `InvalidArgument` if the range is reversed, `OutOfBounds` if it ends
    /// past `len()`.
    pub fn decode<R: RangeBounds<usize>>(&self, encoding: Encoding, range: R) -> Result<String> {
        self.region()?;
        let (start, stop) = endpoints(&range, self.len);
        if start == stop {
            return Ok(String::new());
        }
        let region = self.readable()?;
        let range = resolve_range(&range, self.len)?;
        region.with_bytes(self.start + range.start..self.start + range.end, |bytes| {
            encoding.decode(bytes)
        })
    }

    /// [`decode`](Self::decode) with dynamically typed arguments.
    ///
    /// Missing arguments default to UTF-8 and the whole buffer.
    ///
    /// # Errors
    ///
    /// Argument coercion errors, `UnsupportedEncoding`, and everything
    /// [`decode`](Self::decode) returns.
    pub fn decode_loose(
        &self,
        encoding: impl Into<LooseArg>,
        start: impl Into<LooseArg>,
        stop: impl Into<LooseArg>,
    ) -> Result<String> {
        let (encoding, range) =
            normalize_decode_args(&encoding.into(), &start.into(), &stop.into(), self.len)?;
        self.decode(encoding, range)
    }

    /// Transcode `text` and write it at `offset`. Returns the number of bytes written.
    ///
    /// Nothing is written unless the whole payload fits.
    ///
    /// # Errors
    ///
    /// `InvalidState` after close, `PermissionDenied` without `PROT_WRITE`,
    /// `InvalidArgument` for malformed base64, `BufferOverflow` if the bytes
    /// do not fit between `offset` and the end of the buffer.
    pub fn encode(&mut self, text: &str, offset: usize, encoding: Encoding) -> Result<usize> {
        let region = self.writable()?;
        let bytes = encoding.encode(text)?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let available = self.len.saturating_sub(offset);
        if bytes.len() > available {
            return Err(MmapBufferError::BufferOverflow {
                offset,
                needed: bytes.len(),
                available,
            });
        }
        region.write(self.start + offset, &bytes)?;
        Ok(bytes.len())
    }

    /// [`encode`](Self::encode) accepting `(offset, encoding)` in either order.
    ///
    /// Compatibility shim for callers using the legacy `(text, encoding,
    /// offset)` form; see [`normalize_write_args`].
    ///
    /// # Errors
    ///
    /// Argument coercion errors and everything [`encode`](Self::encode) returns.
    pub fn encode_loose(
        &mut self,
        text: &str,
        first: impl Into<LooseArg>,
        second: impl Into<LooseArg>,
    ) -> Result<usize> {
        let (offset, encoding) = normalize_write_args(&first.into(), &second.into())?;
        self.encode(text, offset, encoding)
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// `InvalidState`, `PermissionDenied`, or `OutOfBounds` if the range exceeds the buffer.
    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let region = self.readable()?;
        ensure_in_bounds(offset, buf.len(), self.len)?;
        region.read(self.start + offset, buf)
    }

    /// Copy the whole buffer into a `Vec`.
    ///
    /// # Errors
    ///
    /// `InvalidState` or `PermissionDenied`.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        self.read_into(0, &mut out)?;
        Ok(out)
    }

    /// A zero-copy view of `[start, end)` sharing this buffer's region.
    ///
    /// # Errors
    ///
    /// `InvalidState` after close, `InvalidArgument` if `start >= end`,
    /// `OutOfBounds` if `end > len()`.
    pub fn slice(&self, start: usize, end: usize) -> Result<MmapBuffer> {
        let region = self.region.as_ref().ok_or(MmapBufferError::InvalidState(ERR_CLOSED))?;
        let range = resolve_range(&(start..end), self.len)?;
        if range.is_empty() {
            return Err(MmapBufferError::invalid(ERR_EMPTY_SLICE));
        }
        trace!("slicing [{start}, {end}) from a {}-byte buffer", self.len);
        Ok(MmapBuffer {
            region: Some(Rc::clone(region)),
            start: self.start + range.start,
            len: range.len(),
            protection: self.protection,
            sharing: self.sharing,
        })
    }

    /// Copy bytes from `range` of this buffer into `target` at `target_start`.
    ///
    /// Copies `min(range.len(), target.len() - target_start)` bytes and returns
    /// that count. Overlapping regions (slices of the same mapping) are handled.
    ///
    /// # Errors
    ///
    /// `InvalidState` if either buffer is closed, `PermissionDenied` if this
    /// buffer is not readable or `target` not writable, `OutOfBounds` for a
    /// source range past the end or `target_start >= target.len()`.
    pub fn copy_to<R: RangeBounds<usize>>(
        &self,
        target: &mut MmapBuffer,
        target_start: usize,
        range: R,
    ) -> Result<usize> {
        let source = self.readable()?;
        let dest = target.writable()?;
        let range = resolve_range(&range, self.len)?;
        if range.is_empty() {
            return Ok(0);
        }
        if target_start >= target.len {
            return Err(MmapBufferError::OutOfBounds {
                offset: target_start,
                len: range.len(),
                total: target.len,
            });
        }
        let count = range.len().min(target.len - target_start);
        source.copy_to(self.start + range.start, dest, target.start + target_start, count)?;
        Ok(count)
    }

    /// Read unsigned integers starting at `index` according to `format`.
    ///
    /// | char | value                             |
    /// |------|-----------------------------------|
    /// | `N`  | 32-bit unsigned, network byte order |
    /// | `n`  | 16-bit unsigned, network byte order |
    /// | `o`  | 8-bit unsigned                    |
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for any other format character, `OutOfBounds` when a
    /// value would extend past the end of the buffer.
    pub fn unpack(&self, format: &str, index: usize) -> Result<Vec<u32>> {
        let region = self.readable()?;
        let mut values = Vec::with_capacity(format.len());
        let mut pos = index;
        for c in format.chars() {
            let width = match c {
                'N' => 4,
                'n' => 2,
                'o' => 1,
                other => {
                    return Err(MmapBufferError::invalid(format!(
                        "unknown format character {other:?}"
                    )))
                }
            };
            ensure_in_bounds(pos, width, self.len)?;
            let mut raw = [0u8; 4];
            region.read(self.start + pos, &mut raw[4 - width..])?;
            values.push(u32::from_be_bytes(raw));
            pos += width;
        }
        Ok(values)
    }

    /// Release this buffer's hold on the region.
    ///
    /// Unmaps the region if no slice still shares it. Calling `close` again is a no-op.
    ///
    /// # Errors
    ///
    /// `MappingFailed` (op `munmap`) if the primitive fails to unmap.
    pub fn close(&mut self) -> Result<()> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        match Rc::try_unwrap(region) {
            Ok(region) => region
                .release()
                .map_err(|source| MmapBufferError::MappingFailed { op: "munmap", source }),
            Err(shared) => {
                trace!(
                    "closed a {}-byte view; region still held by {} other buffer(s)",
                    self.len,
                    Rc::strong_count(&shared) - 1
                );
                Ok(())
            }
        }
    }
}

impl fmt::Display for MmapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<MmapBuffer {}>", self.len)
    }
}

impl fmt::Debug for MmapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapBuffer")
            .field("len", &self.len)
            .field("start", &self.start)
            .field("protection", &self.protection)
            .field("sharing", &self.sharing)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

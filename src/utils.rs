//! Utility helpers for page size, alignment and safe range calculations.

use std::ops::{Bound, Range, RangeBounds};

use crate::errors::{MmapBufferError, Result};

/// Get the system page size in bytes.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE is safe to call.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    // A failed query (-1) falls back to 1 so alignment checks stay well defined.
    page_size.max(1) as usize
}

/// Whether `offset` is a multiple of the system page size.
#[must_use]
pub fn is_page_aligned(offset: u64) -> bool {
    offset % page_size() as u64 == 0
}

/// Align a value up to the nearest multiple of `alignment`.
#[must_use]
pub fn align_up(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    // Fast path for power-of-2 alignments (common case for page sizes)
    if alignment.is_power_of_two() {
        let mask = alignment - 1;
        value.saturating_add(mask) & !mask
    } else {
        value.div_ceil(alignment).saturating_mul(alignment)
    }
}

/// Ensure the requested [offset, offset+len) range is within [0, total).
///
/// # Errors
///
/// Returns `MmapBufferError::OutOfBounds` if the range exceeds bounds.
pub fn ensure_in_bounds(offset: usize, len: usize, total: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(MmapBufferError::OutOfBounds { offset, len, total }),
    }
}

/// Half-open `(start, end)` of `range`, with unbounded ends filled from `0..total`.
/// Performs no validation.
#[must_use]
pub fn endpoints<R: RangeBounds<usize>>(range: &R, total: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => total,
    };
    (start, end)
}

/// Resolve any `RangeBounds` against a buffer of `total` bytes.
///
/// # Errors
///
/// Returns `MmapBufferError::InvalidArgument` if start exceeds end and
/// `MmapBufferError::OutOfBounds` if end exceeds `total`.
pub fn resolve_range<R: RangeBounds<usize>>(range: &R, total: usize) -> Result<Range<usize>> {
    let (start, end) = endpoints(range, total);
    if start > end {
        return Err(MmapBufferError::invalid(format!(
            "start ({start}) must not exceed end ({end})"
        )));
    }
    ensure_in_bounds(start, end - start, total)?;
    Ok(start..end)
}

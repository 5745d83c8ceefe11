//! Normalization of dynamically typed arguments.
//!
//! Callers bridging from loosely typed environments (scripting bindings,
//! config files, RPC) pass [`LooseArg`] values. Every coercion happens here,
//! once, at the API boundary; the buffer itself only sees typed arguments.
//!
//! Numbers must be finite, integral and (where an index is expected)
//! non-negative. Numeric strings count as numbers. Anything else is an
//! `InvalidArgument` error rather than a silent default.

use std::ops::Range;
use std::os::unix::io::RawFd;

use crate::encoding::Encoding;
use crate::errors::{MmapBufferError, Result};
use crate::flags::{Protection, Sharing};

// Largest integer an f64 represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A dynamically typed argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LooseArg {
    /// Argument not supplied.
    #[default]
    Missing,
    /// Numeric argument.
    Number(f64),
    /// String argument.
    Text(String),
}

impl LooseArg {
    /// The finite numeric value of this argument, if it has one.
    #[must_use]
    pub fn as_finite(&self) -> Option<f64> {
        let n = match self {
            LooseArg::Missing => return None,
            LooseArg::Number(n) => *n,
            LooseArg::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Whether the argument was omitted.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, LooseArg::Missing)
    }

    fn is_text(&self) -> bool {
        matches!(self, LooseArg::Text(_))
    }

    fn integer(&self, what: &str) -> Result<f64> {
        match self.as_finite() {
            Some(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => Ok(n),
            Some(n) => Err(MmapBufferError::invalid(format!("{what} must be an integer, got {n}"))),
            None => Err(MmapBufferError::invalid(format!(
                "{what} must be a finite number, got {self:?}"
            ))),
        }
    }

    /// Coerce to a non-negative index; `Missing` yields `default`.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` for non-numeric, non-finite,
    /// fractional or negative values.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_index(&self, what: &str, default: usize) -> Result<usize> {
        if self.is_missing() {
            return Ok(default);
        }
        let n = self.integer(what)?;
        if n < 0.0 {
            return Err(MmapBufferError::invalid(format!("{what} must not be negative, got {n}")));
        }
        usize::try_from(n as u64)
            .map_err(|_| MmapBufferError::invalid(format!("{what} does not fit in usize: {n}")))
    }

    /// Coerce to a C `int`.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` if missing, non-integral or
    /// outside the `i32` range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_int(&self, what: &str) -> Result<i32> {
        if self.is_missing() {
            return Err(MmapBufferError::invalid(format!("{what} is required")));
        }
        let n = self.integer(what)?;
        i32::try_from(n as i64)
            .map_err(|_| MmapBufferError::invalid(format!("{what} out of range: {n}")))
    }

    /// Interpret as an encoding name; `Missing` yields UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::UnsupportedEncoding` for unknown names and numbers.
    pub fn to_encoding(&self) -> Result<Encoding> {
        match self {
            LooseArg::Missing => Ok(Encoding::Utf8),
            LooseArg::Text(name) => name.parse(),
            LooseArg::Number(n) => Err(MmapBufferError::UnsupportedEncoding(n.to_string())),
        }
    }
}

impl From<f64> for LooseArg {
    fn from(n: f64) -> Self {
        LooseArg::Number(n)
    }
}

impl From<i32> for LooseArg {
    fn from(n: i32) -> Self {
        LooseArg::Number(f64::from(n))
    }
}

impl From<u32> for LooseArg {
    fn from(n: u32) -> Self {
        LooseArg::Number(f64::from(n))
    }
}

impl From<i64> for LooseArg {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        LooseArg::Number(n as f64)
    }
}

impl From<usize> for LooseArg {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        LooseArg::Number(n as f64)
    }
}

impl From<&str> for LooseArg {
    fn from(s: &str) -> Self {
        LooseArg::Text(s.to_owned())
    }
}

impl From<String> for LooseArg {
    fn from(s: String) -> Self {
        LooseArg::Text(s)
    }
}

impl<T: Into<LooseArg>> From<Option<T>> for LooseArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(LooseArg::Missing, Into::into)
    }
}

/// Resolve the two trailing arguments of a write into `(offset, encoding)`.
///
/// Compatibility shim: both `(offset, encoding)` and the legacy
/// `(encoding, offset)` orders are accepted. The finite-numeric argument is
/// the offset and the text argument is the encoding; omitted arguments
/// default to offset 0 and UTF-8.
///
/// ```
/// use mmap_buffer::{args::{normalize_write_args, LooseArg}, Encoding};
///
/// let a = normalize_write_args(&LooseArg::from(8_i32), &LooseArg::from("ascii")).unwrap();
/// let b = normalize_write_args(&LooseArg::from("ascii"), &LooseArg::from(8_i32)).unwrap();
/// assert_eq!(a, (8, Encoding::Ascii));
/// assert_eq!(a, b);
/// ```
///
/// # Errors
///
/// Returns `MmapBufferError::InvalidArgument` when the offset is malformed or
/// both arguments are numbers, and `MmapBufferError::UnsupportedEncoding` for
/// unknown encoding names.
pub fn normalize_write_args(first: &LooseArg, second: &LooseArg) -> Result<(usize, Encoding)> {
    let swap = first.as_finite().is_none() && (second.as_finite().is_some() || first.is_text());
    let (offset, encoding) = if swap { (second, first) } else { (first, second) };
    if encoding.as_finite().is_some() {
        return Err(MmapBufferError::invalid(
            "write takes one offset and one encoding, got two numbers",
        ));
    }
    Ok((offset.to_index("offset", 0)?, encoding.to_encoding()?))
}

/// Resolve `(encoding, start, stop)` for a decode over a buffer of `len` bytes.
///
/// Omitted values default to UTF-8, 0 and `len`.
///
/// # Errors
///
/// Propagates coercion errors; range validation is left to the buffer.
pub fn normalize_decode_args(
    encoding: &LooseArg,
    start: &LooseArg,
    stop: &LooseArg,
    len: usize,
) -> Result<(Encoding, Range<usize>)> {
    let encoding = encoding.to_encoding()?;
    let start = start.to_index("start", 0)?;
    let stop = stop.to_index("stop", len)?;
    Ok((encoding, start..stop))
}

/// Typed construction arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateArgs {
    /// Requested mapping length in bytes.
    pub len: usize,
    /// Requested protection.
    pub protection: Protection,
    /// Shared or private.
    pub sharing: Sharing,
    /// Caller-owned descriptor.
    pub fd: RawFd,
    /// Page-aligned offset into `fd`.
    pub offset: u64,
}

impl CreateArgs {
    /// Build from `(size, protection bits, MAP_* flags, fd[, offset])`.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` when fewer than four
    /// arguments are given or any of them is malformed.
    pub fn from_loose(args: &[LooseArg]) -> Result<Self> {
        let [len, protection, flags, fd, rest @ ..] = args else {
            return Err(MmapBufferError::invalid(
                "constructor takes 4 arguments: size, protection, flags, fd and offset",
            ));
        };
        let offset = rest.first().unwrap_or(&LooseArg::Missing);
        Ok(Self {
            len: len.to_index("size", 0)?,
            protection: Protection::from_raw(protection.to_int("protection")?)?,
            sharing: Sharing::from_raw(flags.to_int("flags")?)?,
            fd: fd.to_int("fd")?,
            offset: offset.to_index("offset", 0)? as u64,
        })
    }
}

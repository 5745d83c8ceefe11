//! Text encodings supported by [`MmapBuffer::decode`](crate::MmapBuffer::decode)
//! and [`MmapBuffer::encode`](crate::MmapBuffer::encode).

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::errors::{MmapBufferError, Result};

// Accepts unpadded input and non-zero trailing bits, like the legacy buffer writer.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Transcoding scheme between raw bytes and text.
///
/// Names parse case-insensitively:
///
/// ```
/// use mmap_buffer::Encoding;
///
/// assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
/// assert!("ucs2".parse::<Encoding>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// UTF-8. Malformed input decodes to U+FFFD replacement characters.
    #[default]
    Utf8,
    /// 7-bit ASCII; the high bit of every byte or code point is masked off.
    Ascii,
    /// One byte per code point (Latin-1), no validation.
    Binary,
    /// Standard base64 alphabet with `=` padding.
    Base64,
}

impl Encoding {
    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Binary => "binary",
            Encoding::Base64 => "base64",
        }
    }

    /// Turn raw bytes into text.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|&b| char::from(b & 0x7f)).collect(),
            Encoding::Binary => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Base64 => STANDARD.encode(bytes),
        }
    }

    /// Turn text into the bytes that would be stored in a buffer.
    ///
    /// # Errors
    ///
    /// Returns `MmapBufferError::InvalidArgument` if base64 input contains
    /// characters outside the alphabet.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => Ok(text.chars().map(|c| (u32::from(c) & 0x7f) as u8).collect()),
            Encoding::Binary => Ok(text.chars().map(|c| (u32::from(c) & 0xff) as u8).collect()),
            Encoding::Base64 => LENIENT
                .decode(base64_payload(text))
                .map_err(|e| MmapBufferError::invalid(format!("malformed base64 input: {e}"))),
        }
    }

    /// Number of bytes [`encode`](Self::encode) produces for `text`.
    ///
    /// For base64 the count is computed from the input length and assumes
    /// well-formed input; text that `encode` rejects still yields a count.
    #[must_use]
    pub fn byte_length(self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Ascii | Encoding::Binary => text.chars().count(),
            Encoding::Base64 => {
                let n = base64_payload(text).len();
                n / 4 * 3 + (n % 4).saturating_sub(1)
            }
        }
    }
}

/// The part of a base64 string that carries data: every byte before the first
/// `=`, minus a dangling sixth-bit character that cannot form a byte.
///
/// Works on bytes so non-ASCII input reaches the decoder and is rejected there.
fn base64_payload(text: &str) -> &[u8] {
    let bytes = text.as_bytes();
    let data = bytes
        .iter()
        .position(|&b| b == b'=')
        .map_or(bytes, |pos| &bytes[..pos]);
    if data.len() % 4 == 1 {
        &data[..data.len() - 1]
    } else {
        data
    }
}

impl FromStr for Encoding {
    type Err = MmapBufferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            "binary" => Ok(Encoding::Binary),
            "base64" => Ok(Encoding::Base64),
            _ => Err(MmapBufferError::UnsupportedEncoding(s.to_owned())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

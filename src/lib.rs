//! # mmap-buffer: a byte buffer on top of a memory-mapped region
//!
//! This crate wraps one `mmap(2)` region in a buffer object with bounds-checked
//! byte access and text transcoding, and unmaps it exactly once.
//!
//! ## Features
//!
//! - **Zero-copy access**: reads and writes go straight to the mapped pages
//! - **Validated construction**: zero lengths and misaligned offsets fail with
//!   `EINVAL` before the kernel is involved
//! - **Protection aware**: writes to read-only mappings are errors, not segfaults
//! - **Transcoding**: `utf8`, `ascii`, `binary` and `base64` decode/encode over byte ranges
//! - **Pluggable primitive**: the mapping syscall sits behind the [`Mapper`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::os::unix::io::AsRawFd;
//! use mmap_buffer::{Encoding, MmapBuffer, Protection, Sharing};
//!
//! let file = std::fs::File::open("data.bin")?;
//! let buf = MmapBuffer::create(4096, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)?;
//!
//! let head = buf.decode(Encoding::Utf8, 0..11)?;
//! println!("{head} ({buf})");
//! # Ok::<(), mmap_buffer::MmapBufferError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error type and platform error codes
//! - [`flags`]: Protection and sharing flags
//! - [`mapper`]: The mapping primitive contract and its `libc` implementation
//! - [`options`]: Builder for mapping parameters
//! - [`buffer`]: Core `MmapBuffer` implementation
//! - [`encoding`]: Supported text encodings
//! - [`args`]: Normalization of loosely typed arguments
//! - [`manager`]: High-level convenience functions
//! - [`utils`]: Page size and range helpers

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub mod args;
        pub mod buffer;
        pub mod encoding;
        pub mod errors;
        pub mod flags;
        pub mod manager;
        pub mod mapper;
        pub mod options;
        mod region;
        pub mod utils;

        pub use buffer::MmapBuffer;
        pub use encoding::Encoding;
        pub use errors::MmapBufferError;
        pub use flags::{Protection, Sharing};
        pub use manager::{byte_length, inspect, map_file, map_loose};
        pub use mapper::{MapRequest, Mapper, SystemMapper};
        pub use options::MmapOptions;
        pub use utils::page_size;
    } else {
        compile_error!("mmap-buffer maps memory with mmap(2) and requires a unix target");
    }
}

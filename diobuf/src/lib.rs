//! Buffered writing for Linux `O_DIRECT` descriptors.
//!
//! `O_DIRECT` demands that every write start at a block-aligned memory
//! address and cover a whole number of blocks. [`DirectWriter`] hides both
//! constraints: callers hand it chunks of any size and alignment, full
//! blocks leave through the cache-bypassing descriptor (zero-copy when the
//! input is already aligned), and the sub-block tail is drained at close
//! through a bounded buffered fallback that is synced and then evicted from
//! the page cache.
//!
//! ```no_run
//! use std::{fs::OpenOptions, os::unix::fs::OpenOptionsExt};
//!
//! use diobuf::{DirectFile, DirectWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = OpenOptions::new()
//!     .write(true)
//!     .create(true)
//!     .truncate(true)
//!     .custom_flags(libc::O_DIRECT)
//!     .open("data.bin")?;
//!
//! let mut writer = DirectWriter::new(DirectFile::new(&file))?;
//! writer.write(b"any size, any alignment")?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! The writer borrows the descriptor and never closes it; dropping the
//! writer without calling [`DirectWriter::close`] loses the staged tail.

pub mod error;
pub mod io;
pub mod util;

pub use crate::error::Error;
pub use crate::io::device::Device;
#[cfg(target_os = "linux")]
pub use crate::io::device::DirectFile;
pub use crate::io::writer::DirectWriter;

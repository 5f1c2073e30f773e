//! Abstract backing store interfaces.
//!
//! Concrete implementations live in `stagebuf-io`. We keep only traits here so
//! the staging buffer can be tested against an in-memory fake without touching
//! real disk.

use std::fmt;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// A byte-addressable random-access resource holding the actual staged bytes.
///
/// Sequential `Read`/`Write`/`Seek` share one cursor. The positioned calls
/// (`read_at`, `write_at`) must leave that cursor where it was.
pub trait BackingStore: Read + Write + Seek + Send + fmt::Debug {
    /// Read up to `buf.len()` bytes starting at `offset`. Short reads are allowed;
    /// `Ok(0)` means `offset` is at or past the end of content.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write `buf` starting at `offset`, zero-filling any gap past the current end.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Grow (with zero bytes) or shrink the content to exactly `size` bytes.
    /// The cursor is not moved.
    fn set_len(&mut self, size: u64) -> io::Result<()>;

    /// Current content length in bytes. Must not move the cursor.
    fn size(&self) -> io::Result<u64>;

    /// Release the store's resources. After this the store is gone.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Allocates fresh, empty backing stores.
///
/// `dir` is a directory on whose filesystem the store should live; `None`
/// means the platform default temporary location.
pub trait StoreFactory: Send + Sync {
    fn allocate(&self, dir: Option<&Path>) -> io::Result<Box<dyn BackingStore>>;
}

// NOTE: no blanket impls for `File` here. The io crate decides how a file
// becomes anonymous and how positioned I/O is done per platform.

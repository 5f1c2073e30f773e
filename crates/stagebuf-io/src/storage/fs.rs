//! Anonymous local-file backing store.
//!
//! The file is created already unlinked (`tempfile::tempfile_in`), so closing
//! it is the only cleanup there is; nothing is left in the directory even if
//! the process dies.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use stagebuf_core::store::{BackingStore, StoreFactory};

/// Allocates [`AnonymousFileStore`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousFileFactory;

impl AnonymousFileFactory {
    pub fn new() -> Self {
        Self
    }
}

impl StoreFactory for AnonymousFileFactory {
    fn allocate(&self, dir: Option<&Path>) -> io::Result<Box<dyn BackingStore>> {
        Ok(Box::new(AnonymousFileStore::new_in(dir)?))
    }
}

#[derive(Debug)]
pub struct AnonymousFileStore {
    file: File,
}

impl AnonymousFileStore {
    /// Create an empty anonymous file on the filesystem holding `dir`, or in
    /// the platform temp dir when `dir` is `None` or empty.
    pub fn new_in(dir: Option<&Path>) -> io::Result<Self> {
        let file = match dir {
            Some(d) if !d.as_os_str().is_empty() => tempfile::tempfile_in(d)?,
            _ => tempfile::tempfile()?,
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(dir = ?dir, "allocated anonymous file");
        Ok(Self { file })
    }
}

impl Read for AnonymousFileStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for AnonymousFileStore {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for AnonymousFileStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BackingStore for AnonymousFileStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        // Fill as much of `buf` as the file allows; stop early only at EOF.
        let mut filled = 0;
        while filled < buf.len() {
            match pread(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            match pwrite(&self.file, &buf[written..], offset + written as u64) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        // std reports no error from close(2); the unlinked inode goes with the fd.
        drop(self.file);
        Ok(())
    }
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

// Windows positioned I/O moves the file cursor, so put it back afterwards.
#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    let mut f = file;
    let pos = f.stream_position()?;
    let res = file.seek_read(buf, offset);
    f.seek(SeekFrom::Start(pos))?;
    res
}

#[cfg(windows)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    let mut f = file;
    let pos = f.stream_position()?;
    let res = file.seek_write(buf, offset);
    f.seek(SeekFrom::Start(pos))?;
    res
}

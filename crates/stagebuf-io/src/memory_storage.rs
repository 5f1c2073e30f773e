//! In-memory backing store for testing.
//!
//! The bytes live behind a shared handle so tests can inspect them after the
//! store has been moved into a staging buffer. Failpoints make chosen
//! operations return an error, which is how the error paths get exercised
//! without a misbehaving disk.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use stagebuf_core::store::{BackingStore, StoreFactory};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Read,
    Write,
    Seek,
    ReadAt,
    WriteAt,
    SetLen,
    Size,
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    data: Vec<u8>,
    closed: bool,
    failpoints: HashSet<StoreOp>,
}

/// Shared view onto a [`MemoryStore`]'s bytes and failpoints.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    inner: Arc<Mutex<Shared>>,
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current content.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// True once the owning store has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Make every later call of `op` fail until cleared.
    pub fn fail_on(&self, op: StoreOp) {
        self.lock().failpoints.insert(op);
    }

    pub fn clear_failpoints(&self) {
        self.lock().failpoints.clear();
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: MemoryHandle,
    pos: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate content (cursor at 0).
    pub fn with_contents(bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store.shared.lock().data = bytes;
        store
    }

    pub fn handle(&self) -> MemoryHandle {
        self.shared.clone()
    }

    fn enter(&self, op: StoreOp) -> io::Result<MutexGuard<'_, Shared>> {
        let guard = self.shared.lock();
        if guard.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "memory store closed"));
        }
        if guard.failpoints.contains(&op) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("failpoint triggered: {op:?}"),
            ));
        }
        Ok(guard)
    }
}

/// Largest content the fake will hold; beyond this writes and resizes fail
/// instead of aborting on allocation.
pub const MAX_LEN: u64 = 1 << 30;

fn check_len(len: usize) -> io::Result<()> {
    if len as u64 > MAX_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {len} exceeds memory store cap {MAX_LEN}"),
        ));
    }
    Ok(())
}

fn to_index(offset: u64) -> io::Result<usize> {
    usize::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space"))
}

fn read_into(data: &[u8], buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let start = to_index(offset)?;
    if start >= data.len() {
        return Ok(0);
    }
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    Ok(n)
}

fn write_into(data: &mut Vec<u8>, buf: &[u8], offset: u64) -> io::Result<usize> {
    let start = to_index(offset)?;
    let end = start
        .checked_add(buf.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write overflows"))?;
    check_len(end)?;
    if end > data.len() {
        data.resize(end, 0);
    }
    data[start..end].copy_from_slice(buf);
    Ok(buf.len())
}

impl Read for MemoryStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let guard = self.enter(StoreOp::Read)?;
            read_into(&guard.data, buf, self.pos)?
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryStore {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = {
            let mut guard = self.enter(StoreOp::Write)?;
            write_into(&mut guard.data, buf, self.pos)?
        };
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let next = {
            let guard = self.enter(StoreOp::Seek)?;
            let (base, delta) = match pos {
                SeekFrom::Start(n) => (n, 0i64),
                SeekFrom::Current(d) => (self.pos, d),
                SeekFrom::End(d) => (guard.data.len() as u64, d),
            };
            base.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to a negative or overflowing position",
                )
            })?
        };
        self.pos = next;
        Ok(next)
    }
}

impl BackingStore for MemoryStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let guard = self.enter(StoreOp::ReadAt)?;
        read_into(&guard.data, buf, offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut guard = self.enter(StoreOp::WriteAt)?;
        write_into(&mut guard.data, buf, offset)
    }

    fn set_len(&mut self, size: u64) -> io::Result<()> {
        let size = to_index(size)?;
        check_len(size)?;
        let mut guard = self.enter(StoreOp::SetLen)?;
        guard.data.resize(size, 0);
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        let guard = self.enter(StoreOp::Size)?;
        Ok(guard.data.len() as u64)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut guard = self.shared.lock();
        if guard.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "memory store closed"));
        }
        // Released either way; the failpoint only changes what is reported.
        guard.closed = true;
        guard.data = Vec::new();
        if guard.failpoints.contains(&StoreOp::Close) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("failpoint triggered: {:?}", StoreOp::Close),
            ));
        }
        Ok(())
    }
}

/// Allocates [`MemoryStore`]s and remembers a handle to each one.
#[derive(Debug, Default)]
pub struct MemoryStoreFactory {
    allocated: Mutex<Vec<MemoryHandle>>,
    armed: Mutex<HashSet<StoreOp>>,
    fail_allocate: AtomicBool,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `allocate` calls fail (or succeed again).
    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocate.store(fail, Ordering::Relaxed);
    }

    /// Stores allocated from now on start with `op` failing.
    pub fn arm(&self, op: StoreOp) {
        self.armed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }

    /// Handles to every store allocated so far, oldest first.
    pub fn allocated(&self) -> Vec<MemoryHandle> {
        self.allocated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<MemoryHandle> {
        self.allocated().pop()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn allocate(&self, _dir: Option<&Path>) -> io::Result<Box<dyn BackingStore>> {
        if self.fail_allocate.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "memory store allocation disabled",
            ));
        }
        let store = MemoryStore::new();
        let handle = store.handle();
        for op in self
            .armed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
        {
            handle.fail_on(*op);
        }
        self.allocated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        #[cfg(feature = "tracing")]
        tracing::trace!("allocated memory store");
        Ok(Box::new(store))
    }
}

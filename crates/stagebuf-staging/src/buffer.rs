//! The staging buffer: a backing store plus dirty-offset and mtime tracking.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use stagebuf_core::clock::Clock;
use stagebuf_core::config::StagingConfig;
use stagebuf_core::error::{Error, Result};
use stagebuf_core::stat::StatResult;
use stagebuf_core::store::{BackingStore, StoreFactory};
use stagebuf_io::storage::{build_factory_from_config, AnonymousFileFactory};

use crate::verify;

/// A temporary local copy of an object's content that remembers the lowest
/// offset at which it has been modified.
///
/// Reads go through `std::io::Read`/`Seek` (shared cursor) or [`read_at`].
/// Mutations go through [`write_at`] and [`truncate`], each of which lowers the
/// dirty threshold to its offset and stamps the mtime from the clock *before*
/// touching the store.
///
/// Not safe for concurrent access. There is no internal locking: callers that
/// share one buffer must serialize access themselves (e.g. behind a `Mutex`).
///
/// The buffer must be released with [`destroy`] exactly once. Any use after
/// that, including a second `destroy`, panics. Dropping a buffer that was
/// never destroyed also releases its store, with the same best-effort close.
///
/// [`read_at`]: StagingBuffer::read_at
/// [`write_at`]: StagingBuffer::write_at
/// [`truncate`]: StagingBuffer::truncate
/// [`destroy`]: StagingBuffer::destroy
pub struct StagingBuffer {
    clock: Arc<dyn Clock>,

    // `None` once destroyed.
    store: Option<Box<dyn BackingStore>>,

    // INVARIANT: dirty_threshold <= stat().size
    dirty_threshold: u64,

    // INVARIANT: mtime.is_none() => dirty_threshold == stat().size
    mtime: Option<SystemTime>,

    check_after_mutation: bool,
}

impl StagingBuffer {
    /// Create a buffer backed by an anonymous file on the filesystem holding
    /// `dir` (or the platform temp dir), seeded with everything `content`
    /// yields.
    ///
    /// The cursor starts at offset 0, so a sequential `read` returns the seed
    /// content from the beginning.
    pub fn create<R: Read>(
        content: R,
        dir: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::create_with(&AnonymousFileFactory::new(), content, dir, clock)
    }

    /// Like [`create`](Self::create) but with the store allocated from `factory`.
    pub fn create_with<R: Read>(
        factory: &dyn StoreFactory,
        mut content: R,
        dir: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let dir = dir.filter(|d| !d.as_os_str().is_empty());
        let mut store = factory.allocate(dir).map_err(Error::Allocation)?;

        let size = match seed(&mut *store, &mut content) {
            Ok(n) => n,
            Err(e) => {
                discard(store);
                return Err(Error::Copy(e));
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(size, dir = ?dir, "created staging buffer");

        Ok(Self {
            clock,
            store: Some(store),
            dirty_threshold: size,
            mtime: None,
            check_after_mutation: false,
        })
    }

    /// Create a buffer using the store and directory chosen by `cfg`.
    pub fn create_from_config<R: Read>(
        cfg: &StagingConfig,
        content: R,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let factory = build_factory_from_config(cfg)?;
        let dir = cfg.dir_hint();
        let buf = Self::create_with(factory.as_ref(), content, dir.as_deref(), clock)?;
        Ok(buf.with_invariant_checks(cfg.check_invariants))
    }

    /// Run [`check_invariants`](Self::check_invariants) after every mutating call.
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_after_mutation = enabled;
        self
    }

    /// Positioned read; the cursor is not used or moved.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.live().read_at(buf, offset)
    }

    /// Positioned write; the cursor is not used or moved.
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.assert_live();
        self.mark_dirty(offset);

        let res = self.live_mut().write_at(buf, offset);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            offset,
            len = buf.len(),
            dirty_threshold = self.dirty_threshold,
            ok = res.is_ok(),
            "write_at"
        );

        self.after_mutation();
        res
    }

    /// Grow with zero bytes or shrink to exactly `size` bytes.
    pub fn truncate(&mut self, size: u64) -> io::Result<()> {
        self.assert_live();
        self.mark_dirty(size);

        let res = self.live_mut().set_len(size);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            size,
            dirty_threshold = self.dirty_threshold,
            ok = res.is_ok(),
            "truncate"
        );

        self.after_mutation();
        res
    }

    /// Current size, dirty threshold and mtime. Does not move the cursor.
    pub fn stat(&self) -> Result<StatResult> {
        let size = self.live().size().map_err(|e| Error::io("stat", e))?;
        Ok(StatResult {
            size,
            dirty_threshold: self.dirty_threshold,
            mtime: self.mtime,
        })
    }

    /// Explicitly set the mtime reported by `stat`. It sticks until the next
    /// `write_at` or `truncate`.
    pub fn set_mtime(&mut self, mtime: SystemTime) {
        self.assert_live();
        self.mtime = Some(mtime);
    }

    /// Panic if any internal invariant is violated, or if the buffer has been
    /// destroyed. Leaves the cursor where it was.
    pub fn check_invariants(&self) {
        let sr = match self.stat() {
            Ok(sr) => sr,
            Err(e) => panic!("stat: {e}"),
        };
        verify::assert_stat_invariants(&sr);
    }

    /// Throw away the backing store. The buffer must not be used again.
    pub fn destroy(&mut self) {
        let store = match self.store.take() {
            Some(s) => s,
            None => panic!("staging buffer destroyed twice"),
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(
            dirty_threshold = self.dirty_threshold,
            "destroying staging buffer"
        );
        discard(store);
    }

    pub fn is_destroyed(&self) -> bool {
        self.store.is_none()
    }

    pub fn dirty_threshold(&self) -> u64 {
        self.dirty_threshold
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    fn mark_dirty(&mut self, offset: u64) {
        self.dirty_threshold = self.dirty_threshold.min(offset);
        self.mtime = Some(self.clock.now());
    }

    fn after_mutation(&self) {
        if self.check_after_mutation {
            self.check_invariants();
        }
    }

    fn assert_live(&self) {
        if self.store.is_none() {
            panic!("use of destroyed staging buffer");
        }
    }

    fn live(&self) -> &dyn BackingStore {
        match self.store.as_deref() {
            Some(s) => s,
            None => panic!("use of destroyed staging buffer"),
        }
    }

    fn live_mut(&mut self) -> &mut dyn BackingStore {
        match self.store.as_deref_mut() {
            Some(s) => s,
            None => panic!("use of destroyed staging buffer"),
        }
    }
}

impl Read for StagingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.live_mut().read(buf)
    }
}

impl Seek for StagingBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.live_mut().seek(pos)
    }
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("store", &self.store)
            .field("dirty_threshold", &self.dirty_threshold)
            .field("mtime", &self.mtime)
            .finish_non_exhaustive()
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!("staging buffer dropped without destroy");
            discard(store);
        }
    }
}

/// Copy all of `content` into a fresh store and rewind it.
fn seed(store: &mut dyn BackingStore, content: &mut dyn Read) -> io::Result<u64> {
    let n = io::copy(content, store)?;
    store.flush()?;
    store.seek(SeekFrom::Start(0))?;
    Ok(n)
}

/// Best-effort close; failures are logged and dropped.
fn discard(store: Box<dyn BackingStore>) {
    if let Err(_e) = store.close() {
        #[cfg(feature = "tracing")]
        tracing::debug!(error = %_e, "closing backing store failed");
    }
}

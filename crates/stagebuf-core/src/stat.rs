use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Snapshot of a staging buffer's content state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResult {
    /// The current size in bytes of the content.
    pub size: u64,

    /// The largest value T such that the range of bytes `[0, T)` is known to be
    /// unmodified from the content the buffer was created with.
    pub dirty_threshold: u64,

    /// Time of the last modifying call, or of the last explicit `set_mtime`.
    /// `None` if neither has happened, which implies `dirty_threshold == size`.
    pub mtime: Option<SystemTime>,
}

impl StatResult {
    /// True if nothing has been modified since creation.
    pub fn is_clean(&self) -> bool {
        self.dirty_threshold == self.size
    }

    /// Number of bytes from the dirty threshold to the end of content.
    pub fn dirty_len(&self) -> u64 {
        self.size.saturating_sub(self.dirty_threshold)
    }
}

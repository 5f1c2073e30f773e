//! Debug-time verification helpers for staging buffer state.
//!
//! These panic on violation. They are for tests and debug builds, to catch
//! bookkeeping bugs early; callers never handle them as errors.

use stagebuf_core::stat::StatResult;

/// Assert the two invariants every observable snapshot must satisfy.
pub fn assert_stat_invariants(sr: &StatResult) {
    assert!(
        sr.dirty_threshold <= sr.size,
        "dirty threshold {} exceeds size {}",
        sr.dirty_threshold,
        sr.size
    );

    assert!(
        sr.mtime.is_some() || sr.dirty_threshold == sr.size,
        "no mtime recorded but dirty threshold {} != size {}",
        sr.dirty_threshold,
        sr.size
    );
}

/// Assert that `later` could have followed `earlier` through mutations alone:
/// the dirty threshold never moves up.
pub fn assert_threshold_monotonic(earlier: &StatResult, later: &StatResult) {
    assert!(
        later.dirty_threshold <= earlier.dirty_threshold,
        "dirty threshold grew from {} to {}",
        earlier.dirty_threshold,
        later.dirty_threshold
    );
}

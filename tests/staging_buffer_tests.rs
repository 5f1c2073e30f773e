//! Staging buffer behaviour against a real anonymous file and a simulated clock.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use stagebuf::verify::{assert_stat_invariants, assert_threshold_monotonic};
use stagebuf::{
    ErrorKind, MemoryStoreFactory, SimulatedClock, StagingBuffer, StatResult, StoreOp,
};

fn t(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn new_buffer(content: &[u8]) -> (StagingBuffer, Arc<SimulatedClock>) {
    let clock = Arc::new(SimulatedClock::new(t(1_000)));
    let buf = StagingBuffer::create(content, None, clock.clone()).expect("create");
    (buf, clock)
}

fn stat(buf: &StagingBuffer) -> StatResult {
    let sr = buf.stat().expect("stat");
    assert_stat_invariants(&sr);
    sr
}

#[test]
fn test_scenarios_a_through_d() {
    let (mut buf, clock) = new_buffer(b"0123456789");

    // A: fresh buffer is clean.
    assert_eq!(
        stat(&buf),
        StatResult {
            size: 10,
            dirty_threshold: 10,
            mtime: None
        }
    );

    // B: write inside the content lowers the threshold.
    let t1 = t(1_001);
    clock.set_time(t1);
    assert_eq!(buf.write_at(b"abcde", 3).unwrap(), 5);
    assert_eq!(
        stat(&buf),
        StatResult {
            size: 10,
            dirty_threshold: 3,
            mtime: Some(t1)
        }
    );

    // C: write above the threshold leaves it alone but bumps mtime.
    let t2 = t(1_002);
    clock.set_time(t2);
    assert_eq!(buf.write_at(b"XY", 7).unwrap(), 2);
    assert_eq!(
        stat(&buf),
        StatResult {
            size: 10,
            dirty_threshold: 3,
            mtime: Some(t2)
        }
    );

    // D: truncating below the threshold caps it at the new size.
    let t3 = t(1_003);
    clock.set_time(t3);
    buf.truncate(2).unwrap();
    assert_eq!(
        stat(&buf),
        StatResult {
            size: 2,
            dirty_threshold: 2,
            mtime: Some(t3)
        }
    );

    let mut content = [0u8; 2];
    assert_eq!(buf.read_at(&mut content, 0).unwrap(), 2);
    assert_eq!(&content, b"01");

    buf.check_invariants();
    buf.destroy();
}

#[test]
fn test_content_reflects_writes() {
    let (mut buf, _) = new_buffer(b"0123456789");
    buf.write_at(b"abcde", 3).unwrap();
    buf.write_at(b"XY", 7).unwrap();

    let mut all = Vec::new();
    buf.seek(SeekFrom::Start(0)).unwrap();
    buf.read_to_end(&mut all).unwrap();
    assert_eq!(all, b"012abcdXY9");
    buf.destroy();
}

#[test]
fn test_set_mtime_sticks_until_next_mutation() {
    let (mut buf, clock) = new_buffer(b"0123456789");
    let custom = t(42);

    buf.set_mtime(custom);
    let sr = stat(&buf);
    assert_eq!(sr.mtime, Some(custom));
    assert_eq!(sr.size, 10);
    assert_eq!(sr.dirty_threshold, 10);

    clock.set_time(t(2_000));
    buf.write_at(b"!", 9).unwrap();
    let sr = stat(&buf);
    assert_eq!(sr.mtime, Some(t(2_000)));
    assert_eq!(sr.dirty_threshold, 9);
    buf.destroy();
}

#[test]
fn test_truncate_above_threshold_and_growth() {
    let (mut buf, clock) = new_buffer(b"abcd");

    clock.advance_time(Duration::from_secs(5));
    buf.truncate(8).unwrap();
    let sr = stat(&buf);
    assert_eq!(sr.size, 8);
    assert_eq!(sr.dirty_threshold, 4);
    assert_eq!(sr.mtime, Some(t(1_005)));

    let mut grown = [0xffu8; 8];
    assert_eq!(buf.read_at(&mut grown, 0).unwrap(), 8);
    assert_eq!(&grown, b"abcd\0\0\0\0");

    // Truncating to the current size still counts as a modification.
    clock.advance_time(Duration::from_secs(5));
    buf.truncate(8).unwrap();
    assert_eq!(stat(&buf).mtime, Some(t(1_010)));
    assert_eq!(stat(&buf).dirty_threshold, 4);
    buf.destroy();
}

#[test]
fn test_write_past_end_keeps_threshold_at_old_size() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.write_at(b"zz", 6).unwrap();
    let sr = stat(&buf);
    assert_eq!(sr.size, 8);
    assert_eq!(sr.dirty_threshold, 3);
    buf.destroy();
}

#[test]
fn test_threshold_never_increases() {
    let (mut buf, clock) = new_buffer(&[7u8; 64]);
    let ops: &[(&str, u64)] = &[
        ("write", 40),
        ("write", 50),
        ("truncate", 60),
        ("write", 10),
        ("truncate", 100),
        ("write", 90),
        ("truncate", 5),
        ("truncate", 30),
        ("write", 0),
        ("write", 25),
    ];

    let mut prev = stat(&buf);
    for (op, arg) in ops {
        clock.advance_time(Duration::from_millis(10));
        match *op {
            "write" => {
                buf.write_at(b"data", *arg).unwrap();
            }
            _ => buf.truncate(*arg).unwrap(),
        }
        let next = stat(&buf);
        assert_threshold_monotonic(&prev, &next);
        assert!(next.mtime.is_some());
        prev = next;
    }
    assert_eq!(prev.dirty_threshold, 0);
    buf.destroy();
}

#[test]
fn test_reads_do_not_dirty() {
    let (mut buf, clock) = new_buffer(b"hello world");
    clock.advance_time(Duration::from_secs(60));

    let mut small = [0u8; 5];
    buf.read_exact(&mut small).unwrap();
    buf.seek(SeekFrom::End(-3)).unwrap();
    buf.seek(SeekFrom::Current(-1)).unwrap();
    let mut at = [0u8; 4];
    buf.read_at(&mut at, 2).unwrap();
    let _ = buf.stat().unwrap();
    buf.check_invariants();

    let sr = stat(&buf);
    assert_eq!(sr.dirty_threshold, 11);
    assert_eq!(sr.mtime, None);
    buf.destroy();
}

#[test]
fn test_stat_between_reads_preserves_cursor() {
    let (mut buf, _) = new_buffer(b"abcdefghij");

    let mut first = [0u8; 4];
    buf.read_exact(&mut first).unwrap();
    assert_eq!(&first, b"abcd");

    let _ = buf.stat().unwrap();
    buf.check_invariants();

    let mut second = [0u8; 4];
    buf.read_exact(&mut second).unwrap();
    assert_eq!(&second, b"efgh");
    buf.destroy();
}

#[test]
fn test_read_at_does_not_move_cursor() {
    let (mut buf, _) = new_buffer(b"abcdefghij");
    buf.seek(SeekFrom::Start(6)).unwrap();

    let mut at = [0u8; 3];
    assert_eq!(buf.read_at(&mut at, 0).unwrap(), 3);
    assert_eq!(&at, b"abc");
    buf.write_at(b"Z", 1).unwrap();

    let mut rest = String::new();
    buf.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "ghij");
    buf.destroy();
}

#[test]
fn test_sequential_read_hits_eof() {
    let (mut buf, _) = new_buffer(b"xyz");
    let mut big = [0u8; 16];
    assert_eq!(buf.read(&mut big).unwrap(), 3);
    assert_eq!(buf.read(&mut big).unwrap(), 0);
    buf.destroy();
}

#[test]
fn test_empty_content() {
    let (mut buf, _) = new_buffer(b"");
    assert_eq!(
        stat(&buf),
        StatResult {
            size: 0,
            dirty_threshold: 0,
            mtime: None
        }
    );
    buf.write_at(b"new", 0).unwrap();
    assert_eq!(stat(&buf).dirty_threshold, 0);
    assert_eq!(stat(&buf).size, 3);
    buf.destroy();
}

#[test]
fn test_create_in_explicit_dir() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(SimulatedClock::default());
    let mut buf = StagingBuffer::create(&b"payload"[..], Some(dir.path()), clock).unwrap();
    assert_eq!(stat(&buf).size, 7);
    buf.destroy();
}

#[test]
fn test_create_fails_for_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let clock = Arc::new(SimulatedClock::default());
    let err = StagingBuffer::create(&b"payload"[..], Some(&missing), clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Allocation);
    assert!(err.to_string().starts_with("anonymous file: "));
}

/// Yields some bytes, then fails.
struct BrokenReader {
    remaining: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "source went away"));
        }
        let n = buf.len().min(self.remaining);
        buf[..n].fill(b'x');
        self.remaining -= n;
        Ok(n)
    }
}

#[test]
fn test_copy_failure_releases_partial_store() {
    let factory = MemoryStoreFactory::new();
    let clock = Arc::new(SimulatedClock::default());
    let err = StagingBuffer::create_with(&factory, BrokenReader { remaining: 5 }, None, clock)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Copy);
    assert_eq!(
        err.io_error().map(|e| e.kind()),
        Some(io::ErrorKind::ConnectionReset)
    );
    let handle = factory.last().expect("store was allocated");
    assert!(handle.is_closed());
}

#[test]
fn test_store_write_failure_is_copy_error() {
    let factory = MemoryStoreFactory::new();
    factory.arm(StoreOp::Write);
    let clock = Arc::new(SimulatedClock::default());
    let err = StagingBuffer::create_with(&factory, &b"abc"[..], None, clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Copy);
    assert!(factory.last().unwrap().is_closed());
}

#[test]
fn test_allocation_failure() {
    let factory = MemoryStoreFactory::new();
    factory.fail_allocations(true);
    let clock = Arc::new(SimulatedClock::default());
    let err = StagingBuffer::create_with(&factory, &b"abc"[..], None, clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Allocation);
    assert!(factory.allocated().is_empty());
}

#[test]
fn test_truncate_failure_is_surfaced_verbatim() {
    let factory = MemoryStoreFactory::new();
    let clock = Arc::new(SimulatedClock::new(t(5)));
    let mut buf = StagingBuffer::create_with(&factory, &b"abcdef"[..], None, clock).unwrap();
    factory.last().unwrap().fail_on(StoreOp::SetLen);

    let err = buf.truncate(2).unwrap_err();
    assert!(err.to_string().contains("failpoint triggered: SetLen"));
    // Bookkeeping happened before the store was asked.
    let sr = stat(&buf);
    assert_eq!(sr.size, 6);
    assert_eq!(sr.dirty_threshold, 2);
    assert_eq!(sr.mtime, Some(t(5)));
    buf.destroy();
}

#[test]
fn test_buffer_moves_across_threads() {
    let (buf, _) = new_buffer(b"shared");
    let shared = Arc::new(std::sync::Mutex::new(buf));

    let worker = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            let mut buf = shared.lock().unwrap();
            buf.write_at(b"S", 0).unwrap();
        })
    };
    worker.join().unwrap();

    let mut buf = shared.lock().unwrap();
    assert_eq!(stat(&buf).dirty_threshold, 0);
    buf.destroy();
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_read_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let mut out = [0u8; 1];
    let _ = buf.read(&mut out);
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_write_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let _ = buf.write_at(b"x", 0);
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_stat_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let _ = buf.stat();
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_check_invariants_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    buf.check_invariants();
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_set_mtime_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    buf.set_mtime(t(1));
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_seek_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let _ = buf.seek(SeekFrom::Start(0));
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_truncate_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let _ = buf.truncate(0);
}

#[test]
#[should_panic(expected = "use of destroyed staging buffer")]
fn test_read_at_after_destroy_panics() {
    let (mut buf, _) = new_buffer(b"abc");
    buf.destroy();
    let mut out = [0u8; 1];
    let _ = buf.read_at(&mut out, 0);
}

//! Integration tests for size-triggered rotation and retention.
//!
//! These walk through the sequential write scenarios end to end: segment
//! contents, segment sizes, pruning with and without a cap, oversize
//! records and reopening an existing sink.

use std::fs;
use std::path::Path;

use logroll::{LogSink, SinkConfig, SinkState};
use tempfile::tempdir;

/// A 30-byte record tagged with its index, newline-terminated.
fn record(i: usize) -> Vec<u8> {
    let mut line = format!("record-{i:02}-").into_bytes();
    line.resize(29, b'.');
    line.push(b'\n');
    line
}

fn segment_seqs(sink: &LogSink) -> Vec<u64> {
    sink.segments().unwrap().iter().map(|s| s.seq).collect()
}

fn active(dir: &Path) -> Vec<u8> {
    fs::read(dir.join("app.log")).unwrap()
}

#[test]
fn test_five_records_one_rotation() {
    let temp_dir = tempdir().unwrap();
    let config = SinkConfig::new(temp_dir.path().join("app.log"), 100).with_max_backups(2);
    let sink = LogSink::open(config).unwrap();

    for i in 1..=3 {
        sink.write(&record(i)).unwrap();
    }
    assert_eq!(sink.current_size(), 90);
    assert!(sink.segments().unwrap().is_empty());

    // Record 4 would make 120 bytes: rotate first.
    sink.write(&record(4)).unwrap();
    assert_eq!(sink.current_size(), 30);

    sink.write(&record(5)).unwrap();
    assert_eq!(sink.current_size(), 60);

    let segments = sink.segments().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].path, temp_dir.path().join("app.log.000001"));
    assert_eq!(segments[0].size, 90);
    assert_eq!(
        fs::read(&segments[0].path).unwrap(),
        [record(1), record(2), record(3)].concat()
    );
    assert_eq!(active(temp_dir.path()), [record(4), record(5)].concat());
    assert_eq!(sink.stats().pruned, 0);

    sink.close().unwrap();
}

#[test]
fn test_third_rotation_prunes_oldest() {
    let temp_dir = tempdir().unwrap();
    let config = SinkConfig::new(temp_dir.path().join("app.log"), 100).with_max_backups(2);
    let sink = LogSink::open(config).unwrap();

    // Rotations happen before records 4, 7 and 10.
    for i in 1..=10 {
        sink.write(&record(i)).unwrap();
    }

    assert_eq!(sink.stats().rotations, 3);
    assert_eq!(sink.stats().pruned, 1);
    assert_eq!(segment_seqs(&sink), vec![2, 3]);
    assert!(!temp_dir.path().join("app.log.000001").exists());

    let segments = sink.segments().unwrap();
    assert_eq!(
        fs::read(&segments[0].path).unwrap(),
        [record(4), record(5), record(6)].concat()
    );
    assert_eq!(
        fs::read(&segments[1].path).unwrap(),
        [record(7), record(8), record(9)].concat()
    );
    assert_eq!(active(temp_dir.path()), record(10));

    sink.close().unwrap();
}

#[test]
fn test_zero_backups_never_prunes() {
    let temp_dir = tempdir().unwrap();
    let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), 100)).unwrap();

    for i in 1..=40 {
        sink.write(&record(i)).unwrap();
    }

    // 40 records, 3 per segment: 13 full segments and one record active.
    assert_eq!(segment_seqs(&sink), (1..=13).collect::<Vec<u64>>());
    assert_eq!(sink.stats().pruned, 0);
    assert_eq!(sink.current_size(), 30);

    sink.close().unwrap();
}

#[test]
fn test_retention_keeps_most_recent() {
    for max_backups in 1..=4 {
        let temp_dir = tempdir().unwrap();
        let sink = LogSink::open(
            SinkConfig::new(temp_dir.path().join("app.log"), 50).with_max_backups(max_backups),
        )
        .unwrap();

        let rotations = 7;
        for _ in 0..rotations {
            sink.write(&[b'x'; 40]).unwrap();
            sink.rotate().unwrap();
        }

        let expected: Vec<u64> =
            ((rotations - max_backups as u64 + 1)..=rotations).collect();
        assert_eq!(segment_seqs(&sink), expected, "max_backups = {max_backups}");
    }
}

#[test]
fn test_fewer_rotations_than_cap() {
    let temp_dir = tempdir().unwrap();
    let config = SinkConfig::new(temp_dir.path().join("app.log"), 50).with_max_backups(5);
    let sink = LogSink::open(config).unwrap();

    for _ in 0..3 {
        sink.write(&[b'x'; 10]).unwrap();
        sink.rotate().unwrap();
    }
    assert_eq!(segment_seqs(&sink), vec![1, 2, 3]);
}

#[test]
fn test_segments_never_exceed_limit() {
    let temp_dir = tempdir().unwrap();
    let max = 100;
    let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), max)).unwrap();

    let mut total = 0u64;
    for i in 0..500usize {
        let len = (i * 37) % 60 + 1;
        let data = vec![b'a' + (i % 26) as u8; len];
        sink.write(&data).unwrap();
        total += len as u64;
        assert!(sink.current_size() <= max);
    }
    sink.close().unwrap();

    let segments = sink.segments().unwrap();
    assert!(segments.len() > 1);
    for segment in &segments {
        assert!(segment.size <= max, "segment {} is {} bytes", segment.seq, segment.size);
        assert!(segment.size > 0);
    }

    let active_len = active(temp_dir.path()).len() as u64;
    let stored: u64 = segments.iter().map(|s| s.size).sum::<u64>() + active_len;
    assert_eq!(stored, total);
}

#[test]
fn test_oversize_write_lands_whole_in_fresh_segment() {
    let temp_dir = tempdir().unwrap();
    let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), 100)).unwrap();

    sink.write(&record(1)).unwrap();
    let big = vec![b'B'; 250];
    assert_eq!(sink.write(&big).unwrap(), 250);

    // The small record was retired; the big one is whole in the active file.
    assert_eq!(segment_seqs(&sink), vec![1]);
    assert_eq!(sink.current_size(), 250);
    assert_eq!(active(temp_dir.path()), big);

    // The next write retires the oversize file as a segment of its own.
    sink.write(&record(2)).unwrap();
    let segments = sink.segments().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].size, 250);
    assert_eq!(sink.current_size(), 30);
}

#[test]
fn test_oversize_write_into_empty_file_does_not_rotate() {
    let temp_dir = tempdir().unwrap();
    let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), 10)).unwrap();

    sink.write(&[b'Z'; 25]).unwrap();
    assert!(sink.segments().unwrap().is_empty());
    assert_eq!(sink.current_size(), 25);
}

#[test]
fn test_reopen_continues_size_and_sequence() {
    let temp_dir = tempdir().unwrap();
    let config = SinkConfig::new(temp_dir.path().join("app.log"), 100).with_max_backups(3);

    {
        let sink = LogSink::open(config.clone()).unwrap();
        for i in 1..=5 {
            sink.write(&record(i)).unwrap();
        }
        sink.close().unwrap();
    }

    let sink = LogSink::open(config).unwrap();
    assert_eq!(sink.current_size(), 60);
    assert_eq!(segment_seqs(&sink), vec![1]);

    sink.write(&record(6)).unwrap();
    sink.write(&record(7)).unwrap();
    assert_eq!(segment_seqs(&sink), vec![1, 2]);
    assert_eq!(
        fs::read(temp_dir.path().join("app.log.000002")).unwrap(),
        [record(4), record(5), record(6)].concat()
    );

    sink.close().unwrap();
}

#[test]
fn test_reopen_applies_smaller_cap() {
    let temp_dir = tempdir().unwrap();
    let base = temp_dir.path().join("app.log");

    {
        let sink = LogSink::open(SinkConfig::new(&base, 10)).unwrap();
        for _ in 0..6 {
            sink.write(&[b'x'; 10]).unwrap();
        }
        sink.close().unwrap();
    }

    let sink = LogSink::open(SinkConfig::new(&base, 10).with_max_backups(2)).unwrap();
    assert_eq!(segment_seqs(&sink), vec![4, 5]);
    assert_eq!(sink.stats().pruned, 3);
}

#[test]
fn test_drop_closes_sink() {
    let temp_dir = tempdir().unwrap();
    {
        let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), 100)).unwrap();
        sink.write(b"written before drop\n").unwrap();
    }
    assert_eq!(active(temp_dir.path()), b"written before drop\n");
}

#[test]
fn test_independent_sinks_share_a_directory() {
    let temp_dir = tempdir().unwrap();
    let a = LogSink::open(SinkConfig::new(temp_dir.path().join("a.log"), 10).with_max_backups(1))
        .unwrap();
    let b = LogSink::open(SinkConfig::new(temp_dir.path().join("b.log"), 10).with_max_backups(1))
        .unwrap();

    for _ in 0..4 {
        a.write(&[b'a'; 10]).unwrap();
    }
    b.write(&[b'b'; 10]).unwrap();
    b.write(&[b'b'; 10]).unwrap();

    assert_eq!(segment_seqs(&a), vec![3]);
    assert_eq!(segment_seqs(&b), vec![1]);
    assert_eq!(a.state(), SinkState::Active);
    assert_eq!(b.state(), SinkState::Active);
}

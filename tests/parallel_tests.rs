mod common;
use common::*;

use anyhow::anyhow;
use crossbeam_channel::unbounded;
use logmerge::{
    run_merge, Action, CancelSignal, FilterStrategy, MergeConfig, MergeError, MergeMode,
    ParallelConfig, Source, TimePrefix, UnorderedWorkerPool,
};
use std::fs;
use std::io::{self, BufRead, Cursor, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn pool(workers: usize, queue_size: usize) -> UnorderedWorkerPool {
    UnorderedWorkerPool::new(ParallelConfig {
        num_workers: workers,
        queue_size,
    })
}

fn numbered(label: &str, count: usize) -> Source {
    let text: String = (0..count).map(|i| format!("{}-{}\n", label, i)).collect();
    Source::from_reader(label, Cursor::new(text.into_bytes()))
}

#[test]
fn test_unordered_completeness() {
    let (errors, error_rx) = unbounded();
    let sources: Vec<Source> = (0..8).map(|i| numbered(&format!("s{}", i), 250)).collect();

    let mut out = Vec::new();
    let stats = pool(3, 16)
        .with_error_sink(errors)
        .run(sources, &mut out)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    let mut expected: Vec<String> = (0..8)
        .flat_map(|s| (0..250).map(move |i| format!("s{}-{}", s, i)))
        .collect();
    expected.sort();
    assert_eq!(sorted_lines(&text), expected);
    assert_eq!(stats.records_written, 2000);
    assert!(error_rx.try_recv().is_err());
}

#[test]
fn test_per_source_order_is_preserved() {
    let (errors, _error_rx) = unbounded();
    let sources = vec![numbered("a", 500), numbered("b", 500)];

    let mut out = Vec::new();
    pool(2, 4).with_error_sink(errors).run(sources, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let a_order: Vec<&str> = text.lines().filter(|l| l.starts_with("a-")).collect();
    let expected: Vec<String> = (0..500).map(|i| format!("a-{}", i)).collect();
    assert_eq!(a_order, expected);
}

#[test]
fn test_failed_source_does_not_stop_others() {
    let (errors, error_rx) = unbounded();
    let sources = vec![
        numbered("good", 10),
        Source::from_fn("unreadable", || {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }),
        numbered("other", 5),
    ];

    let mut out = Vec::new();
    let stats = pool(2, 4).with_error_sink(errors).run(sources, &mut out).unwrap();

    assert_eq!(stats.records_written, 15);
    assert_eq!(stats.sources_failed, 1);
    let reported: Vec<MergeError> = error_rx.try_iter().collect();
    assert_eq!(reported.len(), 1);
    assert!(matches!(
        reported[0],
        MergeError::SourceAccess { ref label, .. } if label == "unreadable"
    ));
}

#[test]
fn test_filter_stop_reported_per_source() {
    let (errors, error_rx) = unbounded();
    let filter: Arc<dyn FilterStrategy> =
        Arc::new(|source: &str, line: Vec<u8>| -> Action<Vec<u8>> {
            if source == "bad" && line.ends_with(b"-3") {
                Action::Stop(anyhow!("test for stop"))
            } else {
                Action::Accept(line)
            }
        });

    let mut out = Vec::new();
    let stats = pool(2, 8)
        .with_error_sink(errors)
        .with_filter(Some(filter))
        .run(vec![numbered("bad", 10), numbered("good", 10)], &mut out)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("bad-")).count(), 3);
    assert_eq!(text.lines().filter(|l| l.starts_with("good-")).count(), 10);
    assert_eq!(stats.sources_failed, 1);

    let err = error_rx.try_recv().unwrap();
    assert_eq!(err.abort_cause().unwrap().to_string(), "test for stop");
}

#[test]
fn test_missing_error_sink_rejected_before_work() {
    let opened = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&opened);
    let source = Source::from_fn("watched", move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(Box::new(Cursor::new(b"x\n".to_vec())) as Box<dyn BufRead + Send>)
    });

    let mut out = Vec::new();
    let err = pool(2, 4).run(vec![source], &mut out).unwrap_err();

    assert!(matches!(err, MergeError::Configuration(_)));
    assert!(!opened.load(std::sync::atomic::Ordering::SeqCst));
}

/// Endless source that produces one line every millisecond
struct Trickle {
    n: u64,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(1));
        let line = format!("tick-{}\n", self.n);
        self.n += 1;
        let len = line.len().min(buf.len());
        buf[..len].copy_from_slice(&line.as_bytes()[..len]);
        Ok(len)
    }
}

#[test]
fn test_cancellation_stops_endless_sources() {
    let (errors, _error_rx) = unbounded();
    let cancel = CancelSignal::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });

    let sources = vec![
        Source::from_reader("t1", io::BufReader::new(Trickle { n: 0 })),
        Source::from_reader("t2", io::BufReader::new(Trickle { n: 0 })),
    ];
    let mut out = Vec::new();
    let stats = pool(2, 2)
        .with_error_sink(errors)
        .with_cancel(cancel)
        .run(sources, &mut out)
        .unwrap();
    canceller.join().unwrap();

    assert!(stats.cancelled);
    assert!(!stats.is_complete());
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().all(|l| l.starts_with("tick-")));
}

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let (errors, _error_rx) = unbounded();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let mut out = Vec::new();
    let stats = pool(2, 4)
        .with_error_sink(errors)
        .with_cancel(cancel)
        .run(vec![numbered("a", 100)], &mut out)
        .unwrap();

    assert!(out.is_empty());
    assert!(stats.cancelled);
}

#[test]
fn test_run_merge_unordered_mode() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "base1.log", BASE1);
    let b = write_gzip(dir.path(), "base2.log.gz", BASE2);
    let out = dir.path().join("output.log");
    let (errors, error_rx) = unbounded();

    let mut config = MergeConfig::new(vec![a, b], Arc::new(TimePrefix::default()));
    config.source_compressed = true;
    config.destination = Some(out.clone());
    config.mode = MergeMode::Unordered(ParallelConfig {
        num_workers: 2,
        queue_size: 2,
    });
    config.error_sink = Some(errors);

    // base1.log is plain text, so `source_compressed` rejects it per source
    let stats = run_merge(config).unwrap();
    assert_eq!(stats.sources_failed, 1);
    assert_eq!(sorted_lines(&fs::read_to_string(&out).unwrap()), sorted_lines(BASE2));
    assert!(matches!(
        error_rx.try_recv().unwrap(),
        MergeError::SourceAccess { ref label, .. } if label == "base1.log"
    ));
}

#[test]
fn test_run_merge_unordered_deletes_sources_only_when_complete() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "base1.log", BASE1);
    let b = write_file(dir.path(), "base2.log", BASE2);
    let out = dir.path().join("output.log");
    let (errors, _error_rx) = unbounded();

    let mut config = MergeConfig::new(vec![a.clone(), b.clone()], Arc::new(TimePrefix::default()));
    config.destination = Some(out.clone());
    config.delete_sources = true;
    config.mode = MergeMode::Unordered(ParallelConfig::default());
    config.error_sink = Some(errors);

    let stats = run_merge(config).unwrap();
    assert_eq!(stats.records_written, 8);
    assert_eq!(sorted_lines(&fs::read_to_string(&out).unwrap()), sorted_lines(BASE_MERGED));
    assert!(!a.exists());
    assert!(!b.exists());
}

mod common;

use chemtrails::archive;
use chemtrails::domain::HubError;
use chemtrails::hub::{Hub, HubConfig, HubStats};
use chemtrails::spans::SpanTracker;
use chemtrails::trails::Archived;
use chemtrails::{Record, Snapshot};
use std::collections::HashSet;
use std::fs::File;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use common::{files_in, files_with_extension, fixed_inspector, GatedStorage};

fn gated_hub(dir: &std::path::Path, max_in_flight: usize, workers: usize) -> (Hub, crossbeam_channel::Sender<()>) {
    let (storage, gate) = GatedStorage::new(dir);
    let hub = Hub::builder(HubConfig::new(dir).with_max_in_flight(max_in_flight).with_num_workers(workers))
        .with_storage(storage)
        .with_inspector(fixed_inspector())
        .with_tracker(Arc::new(SpanTracker::new()))
        .build()
        .expect("Failed to build hub");
    (hub, gate)
}

#[test]
fn test_admission_limit_one_drops_second_object() {
    let dir = tempfile::tempdir().unwrap();
    let (hub, gate) = gated_hub(dir.path(), 1, 2);

    let first = Snapshot::new(hub.id(), Vec::new());
    let first_oid = first.base().oid().clone();
    assert!(hub.send_object(first));
    assert!(!hub.send_object(Snapshot::new(hub.id(), Vec::new())));
    assert_eq!(hub.in_flight(), 1);

    drop(gate);
    hub.shutdown();

    let files = files_in(dir.path());
    assert_eq!(files.len(), 1, "exactly one archive expected: {files:?}");
    let record = archive::load_any(File::open(&files[0]).unwrap()).unwrap();
    assert_eq!(record.oid(), &first_oid);
    assert_eq!(hub.stats(), HubStats { accepted: 1, dropped: 1, persisted: 1, failed: 0 });
}

#[test]
fn test_permit_is_released_after_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let (hub, gate) = gated_hub(dir.path(), 1, 1);

    assert!(hub.send_object(Snapshot::new(hub.id(), Vec::new())));
    gate.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while hub.in_flight() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(hub.in_flight(), 0);
    assert!(hub.send_object(Snapshot::new(hub.id(), Vec::new())));

    drop(gate);
    hub.shutdown();
    assert_eq!(files_in(dir.path()).len(), 2);
}

#[test]
fn test_permit_held_across_close_stays_taken() {
    let dir = tempfile::tempdir().unwrap();
    let (hub, gate) = gated_hub(dir.path(), 2, 1);

    assert!(hub.send_object(Snapshot::new(hub.id(), Vec::new())));
    let closer = {
        let hub = hub.clone();
        std::thread::spawn(move || hub.shutdown())
    };
    let deadline = Instant::now() + Duration::from_secs(10);
    while !hub.is_closed() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(hub.is_closed());

    drop(gate);
    closer.join().unwrap();
    assert_eq!(hub.stats().persisted, 1);
    assert_eq!(hub.in_flight(), 1);
}

#[test]
fn test_concurrent_sends_admit_exactly_the_limit() {
    const SENDERS: usize = 32;
    const LIMIT: usize = 5;

    let dir = tempfile::tempdir().unwrap();
    let (hub, gate) = gated_hub(dir.path(), LIMIT, 3);
    let barrier = Arc::new(Barrier::new(SENDERS));

    let handles: Vec<_> = (0..SENDERS)
        .map(|_| {
            let hub = hub.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let snapshot = Snapshot::new(hub.id(), Vec::new());
                barrier.wait();
                let started = Instant::now();
                let admitted = hub.send_object(snapshot);
                (admitted, started.elapsed())
            })
        })
        .collect();
    let results: Vec<(bool, Duration)> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let admitted = results.iter().filter(|(ok, _)| *ok).count();
    assert_eq!(admitted, LIMIT);
    let slowest = results.iter().map(|(_, d)| *d).max().unwrap();
    assert!(slowest < Duration::from_secs(1), "send_object blocked for {slowest:?}");

    let stats = hub.stats();
    assert_eq!(stats.accepted, LIMIT as u64);
    assert_eq!(stats.dropped, (SENDERS - LIMIT) as u64);

    drop(gate);
    hub.shutdown();

    let files = files_in(dir.path());
    assert_eq!(files.len(), LIMIT);
    let oids: HashSet<String> = files
        .iter()
        .map(|path| archive::load_any(File::open(path).unwrap()).unwrap().oid().to_string())
        .collect();
    assert_eq!(oids.len(), LIMIT);
    assert_eq!(hub.stats().persisted, LIMIT as u64);
}

#[test]
fn test_double_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::builder(HubConfig::new(dir.path()).with_num_workers(2))
        .with_inspector(fixed_inspector())
        .build()
        .unwrap();
    hub.take_snapshot().unwrap();

    hub.shutdown();
    hub.shutdown();
    assert!(hub.is_closed());
    assert!(!hub.is_working());
    assert_eq!(files_with_extension(dir.path(), "snapshot").len(), 1);

    // The clone shares state; dropping both after shutdown is a no-op.
    let clone = hub.clone();
    drop(hub);
    clone.shutdown();
    assert_eq!(clone.stats().persisted, 1);
}

#[test]
fn test_shutdown_drains_admitted_work() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::builder(HubConfig::new(dir.path()).with_num_workers(1).with_compress(false))
        .with_inspector(fixed_inspector())
        .build()
        .unwrap();
    for _ in 0..20 {
        hub.take_snapshot().unwrap();
    }
    hub.shutdown();
    assert_eq!(files_in(dir.path()).len(), 20);
    assert_eq!(hub.stats().persisted, 20);
}

#[test]
fn test_persistence_failure_is_swallowed_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::builder(HubConfig::new(dir.path()).with_num_workers(1))
        .with_inspector(fixed_inspector())
        .build()
        .unwrap();

    let snapshot = Snapshot::new(hub.id(), Vec::new());
    let duplicate = snapshot.clone();
    assert!(hub.send_object(snapshot));
    assert!(hub.send_object(duplicate));
    hub.shutdown();

    let stats = hub.stats();
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(files_in(dir.path()).len(), 1);
}

#[test]
fn test_construction_requires_writable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain-file");
    std::fs::write(&file, b"").unwrap();
    assert!(matches!(Hub::new(HubConfig::new(&file)), Err(HubError::NotADirectory(_))));
    assert!(matches!(
        Hub::new(HubConfig::new(dir.path().join("missing"))),
        Err(HubError::NotADirectory(_))
    ));
}

#[test]
fn test_snapshot_file_name_and_contents() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::builder(HubConfig::new(dir.path()))
        .with_inspector(fixed_inspector())
        .build()
        .unwrap();
    hub.take_snapshot().unwrap();
    hub.shutdown();

    let files = files_with_extension(dir.path(), "snapshot");
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(&format!("{}_", hub.id())));

    let record = archive::load_any(File::open(&files[0]).unwrap()).unwrap();
    let Record::Snapshot(snapshot) = record else {
        panic!("expected a snapshot");
    };
    assert_eq!(snapshot.process().map(|p| p.utime), Some(10));
    assert_eq!(snapshot.memory().map(|m| m.uss()), Some(1 << 20));
}

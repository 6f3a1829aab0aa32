use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use gesturehub::sensor::SessionBuffer;
use gesturehub::types::Sample;

fn numbered(i: usize) -> Sample {
    Sample::new(i as f32, 0.0, 0.0, 0.0, 0.0, 0.0)
}

/// Appends race with snapshots; every sample must land in exactly one
/// snapshot, in order.
#[test]
fn snapshots_partition_the_appended_stream() {
    let mut rng = rand::rng();

    for _ in 0..20 {
        let total = rng.random_range(500..3000);
        let buffer = SessionBuffer::new();
        let done = Arc::new(AtomicBool::new(false));

        let producer = {
            let buffer = buffer.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut rng = rand::rng();
                for i in 0..total {
                    buffer.append(numbered(i));
                    if rng.random_bool(0.01) {
                        thread::yield_now();
                    }
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut collected = Vec::new();
        while !done.load(Ordering::Acquire) {
            collected.extend(buffer.snapshot_and_reset());
            if rng.random_bool(0.5) {
                thread::sleep(Duration::from_micros(rng.random_range(0..200)));
            }
        }
        producer.join().unwrap();
        collected.extend(buffer.snapshot_and_reset());

        assert_eq!(collected.len(), total);
        for (i, sample) in collected.iter().enumerate() {
            assert_eq!(sample.ax, i as f32);
        }
        assert!(buffer.is_empty());
    }
}

#[test]
fn snapshot_during_append_burst_never_sees_partial_state() {
    let buffer = SessionBuffer::new();
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    buffer.append(numbered(p * 1000 + i));
                }
            })
        })
        .collect();

    let mut snapshots = Vec::new();
    for _ in 0..50 {
        snapshots.push(buffer.snapshot_and_reset());
        thread::yield_now();
    }
    for producer in producers {
        producer.join().unwrap();
    }
    snapshots.push(buffer.snapshot_and_reset());

    let mut all: Vec<usize> = snapshots.iter().flatten().map(|s| s.ax as usize).collect();
    assert_eq!(all.len(), 4000);
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 4000);

    // each producer's own samples stay in order across snapshots
    for p in 0..4 {
        let mine: Vec<usize> = snapshots
            .iter()
            .flatten()
            .map(|s| s.ax as usize)
            .filter(|v| v / 1000 == p)
            .collect();
        assert!(mine.windows(2).all(|w| w[0] < w[1]));
    }
}

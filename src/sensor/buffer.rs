use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::Sample;

#[derive(Debug, Default)]
struct BufferInner {
    samples: Vec<Sample>,
    latest: Option<Sample>,
}

/// Append-only, resettable sample sequence for one gesture session.
///
/// Cloning yields another handle to the same buffer, so the notification
/// pump and the user-action path can share it. Every operation holds the
/// lock for its whole duration, so `append` and `snapshot_and_reset` never
/// interleave partially.
#[derive(Debug, Clone, Default)]
pub struct SessionBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferInner {
                samples: Vec::with_capacity(capacity),
                latest: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        // 持锁线程 panic 不会破坏 Vec 的结构，继续使用即可
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, sample: Sample) {
        let mut inner = self.lock();
        inner.samples.push(sample);
        inner.latest = Some(sample);
    }

    /// Take the whole sequence and leave the buffer empty, in one step.
    pub fn snapshot_and_reset(&self) -> Vec<Sample> {
        let mut inner = self.lock();
        let capacity = inner.samples.capacity();
        std::mem::replace(&mut inner.samples, Vec::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent sample, for live display. Survives snapshots, cleared by
    /// [`SessionBuffer::reset`].
    pub fn latest(&self) -> Option<Sample> {
        self.lock().latest
    }

    /// Drop everything, including the live sample.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.samples.clear();
        inner.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f32) -> Sample {
        Sample::new(v, v, v, v, v, v)
    }

    #[test]
    fn snapshot_returns_arrival_order_and_empties() {
        let buffer = SessionBuffer::new();
        for i in 0..5 {
            buffer.append(sample(i as f32));
        }
        assert_eq!(buffer.len(), 5);

        let snap = buffer.snapshot_and_reset();
        assert_eq!(snap.iter().map(|s| s.ax).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_snapshot_is_empty() {
        let buffer = SessionBuffer::new();
        assert!(buffer.snapshot_and_reset().is_empty());
    }

    #[test]
    fn appends_after_snapshot_go_to_next_session() {
        let buffer = SessionBuffer::new();
        buffer.append(sample(1.0));
        let first = buffer.snapshot_and_reset();
        buffer.append(sample(2.0));
        assert_eq!(first, vec![sample(1.0)]);
        assert_eq!(buffer.snapshot_and_reset(), vec![sample(2.0)]);
    }

    #[test]
    fn reset_clears_latest() {
        let buffer = SessionBuffer::new();
        buffer.append(sample(3.0));
        buffer.snapshot_and_reset();
        assert_eq!(buffer.latest(), Some(sample(3.0)));
        buffer.reset();
        assert_eq!(buffer.latest(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let buffer = SessionBuffer::with_capacity(8);
        let handle = buffer.clone();
        handle.append(sample(1.0));
        assert_eq!(buffer.len(), 1);
    }
}

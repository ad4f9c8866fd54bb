use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::time::Clock;

use super::{PointWindow, Sample};

/// Ingestion handle of one series.
///
/// Cheap to clone and safe to move to a receive thread. Merges are serialized by
/// the window lock, which the draw step also takes, so a frame never observes a
/// merge in progress.
#[derive(Clone)]
pub struct SeriesFeed {
    window: Arc<Mutex<PointWindow>>,
    time_reference: i64,
    clock: Arc<dyn Clock>,
}

impl SeriesFeed {
    pub(super) fn new(window: PointWindow, time_reference: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Arc::new(Mutex::new(window)),
            time_reference,
            clock,
        }
    }

    /// Merges a batch of absolute-time samples.
    ///
    /// Empty batches are ignored. A batch out of timestamp order is sorted first.
    pub fn ingest(&self, batch: &[Sample]) {
        if batch.is_empty() {
            return;
        }

        let mut rebased: Vec<Sample> = batch
            .iter()
            .map(|s| s.rebased(self.time_reference))
            .collect();
        if !rebased.is_sorted_by_key(|s| s.timestamp) {
            log::debug!("sorting out-of-order batch of {} samples", rebased.len());
            rebased.sort_by_key(|s| s.timestamp);
        }

        let now = self.now();
        self.window.lock().merge(&rebased, now);
    }

    /// Epoch all stored timestamps are relative to.
    #[inline]
    pub fn time_reference(&self) -> i64 {
        self.time_reference
    }

    /// Current time relative to the reference.
    #[inline]
    pub fn now(&self) -> i64 {
        self.clock.now().wrapping_sub(self.time_reference)
    }

    /// Retained samples right now.
    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, PointWindow> {
        self.window.lock()
    }
}

impl fmt::Debug for SeriesFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesFeed")
            .field("time_reference", &self.time_reference)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    fn feed(start: i64, time_window: i64) -> (SeriesFeed, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let feed = SeriesFeed::new(PointWindow::new(100, time_window), start, clock.clone());
        (feed, clock)
    }

    #[test]
    fn timestamps_are_stored_relative_to_reference() {
        let (feed, _) = feed(1_000_000, 5_000);
        feed.ingest(&[Sample::new(999_000, 0.5), Sample::new(1_000_000, 1.0)]);
        let window = feed.lock();
        assert_eq!(window.samples(), &[Sample::new(-1_000, 0.5), Sample::new(0, 1.0)]);
    }

    #[test]
    fn out_of_order_batch_is_sorted() {
        let (feed, clock) = feed(0, 5_000);
        clock.set(100);
        feed.ingest(&[Sample::new(30, 3.0), Sample::new(10, 1.0), Sample::new(20, 2.0)]);
        let ts: Vec<i64> = feed.lock().samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let (feed, _) = feed(0, 5_000);
        feed.ingest(&[]);
        assert!(feed.is_empty());
        assert_eq!(feed.lock().generation(), 0);
    }

    #[test]
    fn clones_share_one_window() {
        let (feed, _) = feed(0, 5_000);
        let other = feed.clone();
        std::thread::spawn(move || other.ingest(&[Sample::new(0, 1.0)]))
            .join()
            .unwrap();
        assert_eq!(feed.len(), 1);
    }
}

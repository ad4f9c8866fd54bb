//! Per-series time-bounded sample window and its streaming merge.

use super::Sample;

/// Index of the first sample still inside the window at `now`.
///
/// A sample is admissible while `now - timestamp <= time_window`; a sample exactly
/// one window old is still kept. `samples` must be sorted ascending, so the expired
/// samples form a prefix.
#[inline]
pub fn first_in_window(samples: &[Sample], now: i64, time_window: i64) -> usize {
    samples.partition_point(|s| now.saturating_sub(s.timestamp) > time_window)
}

/// Result of [`merge_windowed`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Samples discarded from either input because they fell out of the window.
    pub expired: usize,
    /// Admissible samples discarded because the point cap was reached.
    pub truncated: usize,
    /// Oldest timestamp among the incoming samples that made it into the output.
    pub first_incoming_kept: Option<i64>,
}

/// Merges two individually sorted sequences into `out`, keeping only admissible
/// samples and at most the `max_points` most recent of them.
///
/// The merge runs from the newest end of both inputs, so the cap is enforced by
/// stopping once `out` is full. On equal timestamps the incoming sample lands after
/// the existing one. `out` is cleared first; its allocation is reused.
pub fn merge_windowed(
    existing: &[Sample],
    incoming: &[Sample],
    now: i64,
    time_window: i64,
    max_points: usize,
    out: &mut Vec<Sample>,
) -> MergeOutcome {
    debug_assert!(existing.is_sorted_by_key(|s| s.timestamp));
    debug_assert!(incoming.is_sorted_by_key(|s| s.timestamp));

    let start_a = first_in_window(existing, now, time_window);
    let start_b = first_in_window(incoming, now, time_window);
    let a = &existing[start_a..];
    let b = &incoming[start_b..];

    let total = a.len() + b.len();
    let len = total.min(max_points);

    out.clear();
    out.resize(len, Sample::default());

    let (mut i, mut j, mut k) = (a.len(), b.len(), len);
    while k > 0 && i > 0 && j > 0 {
        if a[i - 1].timestamp > b[j - 1].timestamp {
            out[k - 1] = a[i - 1];
            i -= 1;
        } else {
            out[k - 1] = b[j - 1];
            j -= 1;
        }
        k -= 1;
    }
    while k > 0 && i > 0 {
        out[k - 1] = a[i - 1];
        i -= 1;
        k -= 1;
    }
    while k > 0 && j > 0 {
        out[k - 1] = b[j - 1];
        j -= 1;
        k -= 1;
    }

    MergeOutcome {
        expired: start_a + start_b,
        truncated: total - len,
        first_incoming_kept: b.get(j).map(|s| s.timestamp),
    }
}

/// What changed in a window since the last [`PointWindow::take_changes`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub generation: u64,
    /// Oldest timestamp written by a merge; samples before it kept their order.
    pub changed_from: Option<i64>,
}

/// Time-ordered, time-bounded, capped sample buffer of one series.
///
/// Invariants, after every mutating call:
/// - samples are sorted ascending by timestamp
/// - `len() <= max_points`
/// - every sample satisfied `now - timestamp <= time_window` at the `now` of the
///   last merge or eviction
#[derive(Debug, Clone)]
pub struct PointWindow {
    samples: Vec<Sample>,
    spare: Vec<Sample>,
    max_points: usize,
    time_window: i64,
    generation: u64,
    changed_from: Option<i64>,
}

impl PointWindow {
    pub fn new(max_points: usize, time_window: i64) -> Self {
        debug_assert!(time_window > 0);
        Self {
            samples: Vec::new(),
            spare: Vec::new(),
            max_points,
            time_window,
            generation: 0,
            changed_from: None,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    #[inline]
    pub fn time_window(&self) -> i64 {
        self.time_window
    }

    /// Bumped by every call that changed the contents.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Changes the retained duration. Takes effect at the next merge or eviction.
    pub fn set_time_window(&mut self, time_window: i64) {
        debug_assert!(time_window > 0);
        self.time_window = time_window;
    }

    /// Merges a sorted batch at `now`. An empty batch only evicts.
    pub fn merge(&mut self, incoming: &[Sample], now: i64) {
        if incoming.is_empty() {
            self.evict_expired(now);
            return;
        }

        let outcome = merge_windowed(
            &self.samples,
            incoming,
            now,
            self.time_window,
            self.max_points,
            &mut self.spare,
        );
        std::mem::swap(&mut self.samples, &mut self.spare);

        if outcome.truncated > 0 {
            log::debug!(
                "point cap {} reached; dropped {} oldest samples",
                self.max_points,
                outcome.truncated
            );
        }

        if let Some(ts) = outcome.first_incoming_kept {
            self.changed_from = Some(self.changed_from.map_or(ts, |c| c.min(ts)));
        }
        if outcome.first_incoming_kept.is_some() || outcome.expired > 0 || outcome.truncated > 0 {
            self.generation = self.generation.wrapping_add(1);
        }
    }

    /// Drops samples that fell out of the window at `now`.
    pub fn evict_expired(&mut self, now: i64) {
        let start = first_in_window(&self.samples, now, self.time_window);
        if start > 0 {
            self.samples.drain(..start);
            self.generation = self.generation.wrapping_add(1);
        }
    }

    /// Returns and resets the change summary consumed by the geometry step.
    pub fn take_changes(&mut self) -> WindowChanges {
        WindowChanges {
            generation: self.generation,
            changed_from: self.changed_from.take(),
        }
    }
}

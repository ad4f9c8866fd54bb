//! Polyline expansion into a triangle strip.
//!
//! Every drawn point becomes two vertices carrying `(previous, current, next)`.
//! The vertex stage offsets each vertex along the miter at `current`; the second
//! vertex of a pair carries its neighbours mirrored across `current`, which flips
//! its offset to the other side of the stroke. Positions are raw
//! `(timestamp, value)` pairs relative to the series time reference; the stage
//! maps them to NDC with [`PointConstraints`].

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use super::Sample;

/// Vertices emitted per drawn point.
pub const VERTICES_PER_POINT: usize = 2;

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct StrokeVertex {
    pub previous: [f32; 2],
    pub current: [f32; 2],
    pub next: [f32; 2],
}

impl StrokeVertex {
    /// Attribute names the vertex stage must declare, in field order.
    pub const ATTRIBUTE_NAMES: [&'static str; 3] = ["iPrevious", "iCurrent", "iNext"];

    /// Both vertices of one point.
    #[inline]
    pub fn pair(previous: [f32; 2], current: [f32; 2], next: [f32; 2]) -> [StrokeVertex; 2] {
        [
            StrokeVertex {
                previous,
                current,
                next,
            },
            StrokeVertex {
                previous: mirror(previous, current),
                current,
                next: mirror(next, current),
            },
        ]
    }
}

// ── coordinate mapping ────────────────────────────────────────────────────

/// Affine map of `v` from `[lo, hi]` onto `[lo2, hi2]`.
#[inline]
pub fn map_range(v: f64, lo: f64, hi: f64, lo2: f64, hi2: f64) -> f64 {
    lo2 + (hi2 - lo2) * (v - lo) / (hi - lo)
}

/// Inverse of [`map_range`] for the same ranges.
#[inline]
pub fn unmap_range(y: f64, lo: f64, hi: f64, lo2: f64, hi2: f64) -> f64 {
    map_range(y, lo2, hi2, lo, hi)
}

/// Reflects `p` across `pivot`.
#[inline]
pub fn mirror(p: [f32; 2], pivot: [f32; 2]) -> [f32; 2] {
    [2.0 * pivot[0] - p[0], 2.0 * pivot[1] - p[1]]
}

/// Per-frame mapping from series space to NDC, uploaded as `uPointConstraints`.
///
/// Times are relative to the series time reference.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointConstraints {
    pub current_time: f64,
    pub time_window: f64,
    pub value_low: f64,
    pub value_high: f64,
}

impl PointConstraints {
    /// CPU rendition of the vertex stage's transform.
    pub fn to_ndc(&self, sample: Sample) -> [f64; 2] {
        let x = map_range(
            sample.timestamp as f64,
            self.current_time - self.time_window,
            self.current_time,
            -1.0,
            1.0,
        );
        let y = map_range(sample.value, self.value_low, self.value_high, -1.0, 1.0);
        [x, y]
    }
}

// ── decimation ────────────────────────────────────────────────────────────

/// Smallest time step worth drawing: `fraction` of the NDC width (2 units) in time.
pub fn reasonable_interval(time_window: i64, fraction: f64) -> i64 {
    let interval = time_window as f64 * fraction / 2.0;
    if interval.is_finite() && interval > 0.0 {
        interval as i64
    } else {
        0
    }
}

/// Index of the first sample after `from` that is at least `interval` later than
/// `samples[from]`, or `samples.len()` when there is none.
#[inline]
pub fn find_next_spaced(samples: &[Sample], from: usize, interval: i64) -> usize {
    let anchor = samples[from].timestamp;
    let mut i = from + 1;
    while i < samples.len() && samples[i].timestamp.saturating_sub(anchor) < interval {
        i += 1;
    }
    i
}

/// Writes the chain of decimation anchors of `samples` into `anchors`.
///
/// The first sample is always an anchor. Samples closer than `interval` to the
/// last anchor are left out until a later anchor arrives.
pub fn decimate(samples: &[Sample], interval: i64, anchors: &mut Vec<Sample>) {
    anchors.clear();
    let mut i = 0;
    while i < samples.len() {
        anchors.push(samples[i]);
        i = find_next_spaced(samples, i, interval);
    }
}

/// Writes the two vertices of anchor `k`. Neighbours missing at either end are
/// mirrored from the one that exists.
#[inline]
fn write_point(anchors: &[Sample], k: usize, out: &mut [StrokeVertex]) {
    let cur = anchors[k].to_attr();
    let prev = k.checked_sub(1).map(|i| anchors[i].to_attr());
    let next = anchors.get(k + 1).map(|s| s.to_attr());

    let (prev, next) = match (prev, next) {
        (Some(p), Some(n)) => (p, n),
        (Some(p), None) => (p, mirror(p, cur)),
        (None, Some(n)) => (mirror(n, cur), n),
        (None, None) => (cur, cur),
    };

    let base = k * VERTICES_PER_POINT;
    out[base..base + VERTICES_PER_POINT].copy_from_slice(&StrokeVertex::pair(prev, cur, next));
}

/// Full build of the strip for `samples` into `out`; returns the vertex count.
///
/// `out` must hold `VERTICES_PER_POINT` vertices per anchor.
pub fn build_strip(samples: &[Sample], interval: i64, out: &mut [StrokeVertex]) -> usize {
    let mut anchors = Vec::new();
    decimate(samples, interval, &mut anchors);
    for k in 0..anchors.len() {
        write_point(&anchors, k, out);
    }
    anchors.len() * VERTICES_PER_POINT
}

// ── incremental builder ───────────────────────────────────────────────────

/// Incremental strip builder backed by a fixed scratch array.
///
/// Slot `k` holds the anchor sample of point `k` and vertices `2k..2k+2`. Points
/// retire from the front by advancing `first`, so eviction rewrites nothing; new
/// anchors are appended after the last one unaffected by a merge. The scratch
/// array is allocated once for `capacity` points. When appending would run past
/// its end the builder compacts by rebuilding from slot 0.
#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    anchors: Vec<Sample>,
    first: usize,
    vertices: Vec<StrokeVertex>,
    capacity: usize,
    interval: i64,
}

impl StrokeBuilder {
    pub fn new(capacity: usize, interval: i64) -> Self {
        Self {
            anchors: Vec::with_capacity(capacity),
            first: 0,
            vertices: vec![StrokeVertex::default(); capacity * VERTICES_PER_POINT],
            capacity,
            interval,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Changes the decimation step. Callers rebuild afterwards.
    pub fn set_interval(&mut self, interval: i64) {
        self.interval = interval;
    }

    /// Forgets all points.
    pub fn reset(&mut self) {
        self.anchors.clear();
        self.first = 0;
    }

    /// Whole scratch array, including retired and stale slots.
    #[inline]
    pub fn vertices(&self) -> &[StrokeVertex] {
        &self.vertices
    }

    /// Points currently drawn.
    #[inline]
    pub fn live_points(&self) -> usize {
        self.anchors.len() - self.first
    }

    /// Vertex range of the live points.
    #[inline]
    pub fn draw_range(&self) -> Range<u32> {
        (self.first * VERTICES_PER_POINT) as u32..(self.anchors.len() * VERTICES_PER_POINT) as u32
    }

    /// Rebuilds every point from slot 0. Returns the dirty vertex range.
    pub fn rebuild(&mut self, samples: &[Sample]) -> Range<usize> {
        self.first = 0;
        decimate(samples, self.interval, &mut self.anchors);
        if self.anchors.len() > self.capacity {
            log::error!(
                "{} anchors exceed stroke capacity {}; dropping the oldest",
                self.anchors.len(),
                self.capacity
            );
            let excess = self.anchors.len() - self.capacity;
            self.anchors.drain(..excess);
        }
        self.rewrite_from(0)
    }

    /// Brings the strip up to date with `samples`.
    ///
    /// `changed_from` is the oldest timestamp merged since the previous call;
    /// `None` means samples were only evicted. Returns the dirty vertex range.
    pub fn update(&mut self, samples: &[Sample], changed_from: Option<i64>) -> Range<usize> {
        let Some(oldest) = samples.first().map(|s| s.timestamp) else {
            self.reset();
            return 0..0;
        };

        // Retire anchors that fell out of the window. A retired anchor stays in
        // its slot as the previous neighbour of the new first point.
        self.first += self.anchors[self.first..].partition_point(|a| a.timestamp < oldest);

        if self.live_points() < 2 || !self.front_matches(samples, oldest) {
            return self.rebuild(samples);
        }
        let Some(changed) = changed_from else {
            return 0..0;
        };

        let stable_end =
            self.first + self.anchors[self.first..].partition_point(|a| a.timestamp < changed);
        if stable_end - self.first < 2 {
            return self.rebuild(samples);
        }

        let resume = stable_end - 1;
        let resume_ts = self.anchors[resume].timestamp;
        let mut cursor = samples.partition_point(|s| s.timestamp <= resume_ts) - 1;
        self.anchors.truncate(stable_end);

        loop {
            cursor = find_next_spaced(samples, cursor, self.interval);
            if cursor >= samples.len() {
                break;
            }
            if self.anchors.len() == self.capacity {
                log::trace!("stroke scratch full at slot {}; compacting", self.capacity);
                return self.rebuild(samples);
            }
            self.anchors.push(samples[cursor]);
        }

        self.rewrite_from(resume)
    }

    /// Timestamps repeat, so the cap can drop part of the oldest group while its
    /// anchors survive the timestamp-based retirement. The live front is valid only
    /// if it starts at the window's first sample and holds no more anchors of that
    /// timestamp than the window holds samples.
    fn front_matches(&self, samples: &[Sample], oldest: i64) -> bool {
        let live = &self.anchors[self.first..];
        let front_anchors = live.partition_point(|a| a.timestamp == oldest);
        if front_anchors == 0 {
            return true;
        }
        let front_samples = samples.partition_point(|s| s.timestamp == oldest);
        live[0] == samples[0] && front_anchors <= front_samples
    }

    fn rewrite_from(&mut self, slot: usize) -> Range<usize> {
        for k in slot..self.anchors.len() {
            write_point(&self.anchors, k, &mut self.vertices);
        }
        slot * VERTICES_PER_POINT..self.anchors.len() * VERTICES_PER_POINT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::PointWindow;

    fn samples(ts: &[i64]) -> Vec<Sample> {
        ts.iter().map(|&t| Sample::new(t, (t as f64 * 0.1).sin())).collect()
    }

    fn full(samples: &[Sample], interval: i64) -> Vec<StrokeVertex> {
        let mut out = vec![StrokeVertex::default(); samples.len() * VERTICES_PER_POINT];
        let n = build_strip(samples, interval, &mut out);
        out.truncate(n);
        out
    }

    fn drawn(builder: &StrokeBuilder) -> &[StrokeVertex] {
        let r = builder.draw_range();
        &builder.vertices()[r.start as usize..r.end as usize]
    }

    // ── mapping ───────────────────────────────────────────────────────────

    #[test]
    fn map_range_hits_endpoints_exactly() {
        assert_eq!(map_range(-3.0, -3.0, 7.0, -1.0, 1.0), -1.0);
        assert_eq!(map_range(7.0, -3.0, 7.0, -1.0, 1.0), 1.0);
    }

    #[test]
    fn unmap_inverts_map() {
        for v in [-3.0, -1.25, 0.0, 2.5, 6.99] {
            let y = map_range(v, -3.0, 7.0, -1.0, 1.0);
            let back = unmap_range(y, -3.0, 7.0, -1.0, 1.0);
            assert!((back - v).abs() < 1e-12, "{v} -> {y} -> {back}");
        }
    }

    #[test]
    fn point_constraints_map_window_edges() {
        let pc = PointConstraints {
            current_time: 10_000.0,
            time_window: 5_000.0,
            value_low: -1.0,
            value_high: 1.0,
        };
        assert_eq!(pc.to_ndc(Sample::new(10_000, 1.0)), [1.0, 1.0]);
        assert_eq!(pc.to_ndc(Sample::new(5_000, -1.0)), [-1.0, -1.0]);
        assert_eq!(pc.to_ndc(Sample::new(7_500, 0.0)), [0.0, 0.0]);
    }

    // ── vertex layout ─────────────────────────────────────────────────────

    #[test]
    fn vertex_is_six_floats() {
        assert_eq!(std::mem::size_of::<StrokeVertex>(), 6 * 4);
    }

    #[test]
    fn strip_has_two_vertices_per_point() {
        assert_eq!(full(&[], 0).len(), 0);
        assert_eq!(full(&samples(&[1]), 0).len(), 2);
        assert_eq!(full(&samples(&[1, 2, 3, 4, 5]), 0).len(), 10);
    }

    #[test]
    fn first_point_mirrors_its_successor() {
        let s = samples(&[0, 10, 30]);
        let v = full(&s, 0);
        let (p0, p1) = (s[0].to_attr(), s[1].to_attr());
        assert_eq!(v[0].previous, [2.0 * p0[0] - p1[0], 2.0 * p0[1] - p1[1]]);
        assert_eq!(v[0].next, p1);
    }

    #[test]
    fn last_point_mirrors_its_predecessor() {
        let s = samples(&[0, 10, 30]);
        let v = full(&s, 0);
        let (p1, p2) = (s[1].to_attr(), s[2].to_attr());
        assert_eq!(v[4].previous, p1);
        assert_eq!(v[4].next, mirror(p1, p2));
    }

    #[test]
    fn second_vertex_carries_mirrored_neighbours() {
        let s = samples(&[0, 10, 30]);
        let v = full(&s, 0);
        let cur = s[1].to_attr();
        assert_eq!(v[2].current, v[3].current);
        assert_eq!(v[3].previous, mirror(v[2].previous, cur));
        assert_eq!(v[3].next, mirror(v[2].next, cur));
    }

    #[test]
    fn single_point_is_degenerate() {
        let s = samples(&[42]);
        let v = full(&s, 0);
        let p = s[0].to_attr();
        assert!(v.iter().all(|x| x.previous == p && x.current == p && x.next == p));
    }

    // ── decimation ────────────────────────────────────────────────────────

    #[test]
    fn reasonable_interval_is_fraction_of_half_window() {
        assert_eq!(reasonable_interval(5_000_000_000, 0.0001), 250_000);
        assert_eq!(reasonable_interval(1_000, 0.0), 0);
        assert_eq!(reasonable_interval(1_000, f64::NAN), 0);
    }

    #[test]
    fn decimation_keeps_first_and_spaced_samples() {
        let s = samples(&(0..25).collect::<Vec<_>>());
        let mut anchors = Vec::new();
        decimate(&s, 10, &mut anchors);
        let ts: Vec<i64> = anchors.iter().map(|a| a.timestamp).collect();
        assert_eq!(ts, vec![0, 10, 20]);
    }

    #[test]
    fn find_next_spaced_runs_off_the_end() {
        let s = samples(&[0, 1, 2]);
        assert_eq!(find_next_spaced(&s, 0, 5), 3);
        assert_eq!(find_next_spaced(&s, 0, 0), 1);
    }

    #[test]
    fn dense_stream_is_bounded_by_interval() {
        let s = samples(&(0..10_000).collect::<Vec<_>>());
        assert_eq!(full(&s, 100).len(), 100 * VERTICES_PER_POINT);
    }

    // ── incremental updates ───────────────────────────────────────────────

    #[test]
    fn appends_match_full_rebuild() {
        let all = samples(&(0..400).map(|t| t * 10 + (t % 7)).collect::<Vec<_>>());
        let mut b = StrokeBuilder::new(all.len(), 10);
        let mut seen = 0;
        for batch in [1, 5, 17, 60, 3, 114, 200] {
            let end = (seen + batch).min(all.len());
            let changed = all[seen].timestamp;
            b.update(&all[..end], Some(changed));
            assert_eq!(drawn(&b), full(&all[..end], 10).as_slice(), "after {end} samples");
            seen = end;
        }
    }

    #[test]
    fn append_dirties_only_the_tail() {
        let s = samples(&(0..100).collect::<Vec<_>>());
        let mut b = StrokeBuilder::new(200, 0);
        b.rebuild(&s);

        let mut more = s.clone();
        more.extend(samples(&[100, 101]));
        let dirty = b.update(&more, Some(100));
        assert_eq!(dirty, 99 * VERTICES_PER_POINT..102 * VERTICES_PER_POINT);
    }

    #[test]
    fn interleaved_merge_matches_full_rebuild() {
        let mut s = samples(&(0..50).map(|t| t * 10).collect::<Vec<_>>());
        let mut b = StrokeBuilder::new(100, 0);
        b.rebuild(&s);

        // Late samples land between existing ones.
        s.extend(samples(&[305, 315, 495, 500]));
        s.sort_by_key(|x| x.timestamp);
        let dirty = b.update(&s, Some(305));

        assert_eq!(drawn(&b), full(&s, 0).as_slice());
        assert_eq!(dirty.start, 30 * VERTICES_PER_POINT);
    }

    #[test]
    fn eviction_advances_draw_range_without_rewrites() {
        let s = samples(&(0..20).collect::<Vec<_>>());
        let mut b = StrokeBuilder::new(20, 0);
        b.rebuild(&s);
        assert_eq!(b.draw_range(), 0..40);

        let dirty = b.update(&s[5..], None);
        assert!(dirty.is_empty());
        assert_eq!(b.draw_range(), 10..40);
        assert_eq!(b.live_points(), 15);
    }

    #[test]
    fn full_scratch_compacts_to_slot_zero() {
        let mut b = StrokeBuilder::new(8, 0);
        let mut window: Vec<Sample> = samples(&(0..8).collect::<Vec<_>>());
        b.rebuild(&window);

        for t in 8..30 {
            window.remove(0);
            window.push(Sample::new(t, 0.0));
            b.update(&window, Some(t));
            let r = b.draw_range();
            assert!((r.end as usize) <= 8 * VERTICES_PER_POINT);
            assert_eq!(b.live_points(), window.len(), "at t={t}");
            assert_eq!(b.vertices()[r.end as usize - 2].current, [t as f32, 0.0]);
        }
    }

    #[test]
    fn too_few_survivors_fall_back_to_rebuild() {
        let s = samples(&[0, 10, 20]);
        let mut b = StrokeBuilder::new(10, 0);
        b.rebuild(&s);

        let dirty = b.update(&s[2..], None);
        assert_eq!(dirty, 0..2);
        assert_eq!(b.draw_range(), 0..2);
    }

    // ── duplicate timestamps ──────────────────────────────────────────────

    fn live(b: &StrokeBuilder) -> &[Sample] {
        &b.anchors[b.first..]
    }

    /// Live anchors must be a subsequence of the window, duplicates counted.
    fn anchors_in_window(b: &StrokeBuilder, window: &[Sample]) -> bool {
        let mut rest = window.iter();
        live(b).iter().all(|a| rest.any(|s| s == a))
    }

    fn window_with(cap: usize, batch: &[Sample], now: i64) -> PointWindow {
        let mut w = PointWindow::new(cap, 1_000);
        w.merge(batch, now);
        w.take_changes();
        w
    }

    #[test]
    fn capped_duplicate_does_not_keep_its_anchor() {
        let mut w = window_with(
            4,
            &[Sample::new(0, 0.0), Sample::new(10, 1.0), Sample::new(10, 2.0), Sample::new(20, 3.0)],
            20,
        );
        let mut b = StrokeBuilder::new(4, 5);
        b.rebuild(w.samples());
        assert_eq!(live(&b)[1], Sample::new(10, 1.0));

        // The cap drops (0, 0.0) and (10, 1.0) but keeps (10, 2.0).
        w.merge(&[Sample::new(30, 4.0), Sample::new(40, 5.0)], 40);
        assert_eq!(w.samples()[0], Sample::new(10, 2.0));
        let changes = w.take_changes();
        b.update(w.samples(), changes.changed_from);

        assert!(anchors_in_window(&b, w.samples()));
        assert_eq!(live(&b)[0], Sample::new(10, 2.0));
        assert_eq!(drawn(&b), full(w.samples(), 5).as_slice());
    }

    #[test]
    fn identical_duplicates_are_not_over_counted() {
        let mut w = window_with(
            4,
            &[Sample::new(0, 0.0), Sample::new(10, 1.0), Sample::new(10, 1.0), Sample::new(20, 3.0)],
            20,
        );
        let mut b = StrokeBuilder::new(4, 0);
        b.rebuild(w.samples());

        w.merge(&[Sample::new(30, 4.0), Sample::new(40, 5.0)], 40);
        let changes = w.take_changes();
        b.update(w.samples(), changes.changed_from);

        assert_eq!(b.live_points(), w.len());
        assert_eq!(drawn(&b), full(w.samples(), 0).as_slice());
    }

    #[test]
    fn anchors_stay_in_window_under_random_merges() {
        let mut state = 0x2545_f491_u64;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            state >> 33
        };

        for seed in 0..100 {
            let cap = 4 + (next() % 16) as usize;
            let tw = 20 + (next() % 40) as i64;
            let interval = (next() % 10) as i64;
            let mut w = PointWindow::new(cap, tw);
            let mut b = StrokeBuilder::new(cap, interval);
            let mut now = 0;
            let mut built = false;

            for step in 0..60 {
                now += (next() % 6) as i64;
                let len = 1 + (next() % 6) as usize;
                let mut batch: Vec<Sample> = (0..len)
                    .map(|_| Sample::new(now - (next() % 4) as i64, (next() % 100) as f64))
                    .collect();
                batch.sort_by_key(|s| s.timestamp);

                w.merge(&batch, now);
                w.evict_expired(now);
                let changes = w.take_changes();
                if built {
                    b.update(w.samples(), changes.changed_from);
                } else {
                    b.rebuild(w.samples());
                    built = true;
                }

                assert!(
                    anchors_in_window(&b, w.samples()),
                    "seed {seed} step {step}: anchor outside the window"
                );
                assert!(b.live_points() <= w.len(), "seed {seed} step {step}");
            }
        }
    }

    #[test]
    fn empty_window_draws_nothing() {
        let mut b = StrokeBuilder::new(10, 0);
        b.rebuild(&samples(&[1, 2, 3]));
        assert!(b.update(&[], None).is_empty());
        assert!(b.draw_range().is_empty());
    }
}

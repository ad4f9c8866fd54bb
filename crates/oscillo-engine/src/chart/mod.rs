//! Streaming line charts.
//!
//! Data path: a [`SeriesFeed`] merges batches into the series' [`PointWindow`];
//! on draw, the [`StrokeBuilder`] turns the window into a triangle strip and the
//! changed vertices are uploaded; [`Chart`] clears the target and draws every
//! series.

mod feed;
pub mod geometry;
mod registry;
mod sample;
mod series;
mod target;
mod window;

pub use feed::SeriesFeed;
pub use geometry::{PointConstraints, StrokeBuilder, StrokeVertex};
pub use registry::{Chart, ChartConfig, DrawStats};
pub use sample::Sample;
pub use series::{Series, SeriesConfig, SERIES_FRAGMENT_WGSL, SERIES_VERTEX_WGSL, UNIFORM_NAMES};
pub use target::{ChartTarget, HeadlessFrame, RecordedDraw};
pub use window::{first_in_window, merge_windowed, MergeOutcome, PointWindow, WindowChanges};

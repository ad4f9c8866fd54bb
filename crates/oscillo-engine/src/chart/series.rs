//! One drawable series: sample window, stroke geometry, vertex buffer, program
//! and style.

use std::ops::Range;
use std::sync::Arc;

use crate::coords::PhysicalRect;
use crate::error::ChartError;
use crate::paint::Color;
use crate::render::{DeviceRef, GpuBuffer, ShaderSource, ShadingProgram};
use crate::time::{Clock, SECOND};

use super::geometry::{reasonable_interval, StrokeBuilder, StrokeVertex, VERTICES_PER_POINT};
use super::{PointWindow, Sample, SeriesFeed};

pub const SERIES_VERTEX_WGSL: &str = include_str!("../render/shaders/series_vertex.wgsl");
pub const SERIES_FRAGMENT_WGSL: &str = include_str!("../render/shaders/series_fragment.wgsl");

/// Uniforms every series program must declare.
pub const UNIFORM_NAMES: [&str; 8] = [
    "uColor",
    "uWidth",
    "uViewport.width",
    "uViewport.height",
    "uPointConstraints.currentTime",
    "uPointConstraints.timeWindow",
    "uPointConstraints.valueLow",
    "uPointConstraints.valueHigh",
];

/// Construction-time settings of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    /// Hard cap on retained samples.
    pub max_points: usize,
    /// Retained duration, in stream units.
    pub time_window: i64,
    /// Decimation step as a fraction of the plot width.
    pub decimation_fraction: f64,
    pub color: Color,
    /// Stroke width in logical pixels.
    pub line_width: f32,
    pub value_low: f64,
    pub value_high: f64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            max_points: 100_000,
            time_window: 5 * SECOND,
            decimation_fraction: 0.0001,
            color: Color::from_rgba8(0xee, 0x76, 0x23, 0xff),
            line_width: 5.0,
            value_low: -1.0,
            value_high: 1.0,
        }
    }
}

/// A time series drawn as a constant-width line.
///
/// Samples go in through [`Series::ingest`] or a [`SeriesFeed`] handle. Each
/// frame [`Series::prepare`] evicts expired samples, updates the strip where the
/// window changed, uploads only the dirty vertices and stages uniforms. Time is
/// mapped in the vertex stage, so time passing alone costs no upload.
pub struct Series {
    feed: SeriesFeed,
    time_window: i64,
    decimation_fraction: f64,
    color: Color,
    line_width: f32,
    value_low: f64,
    value_high: f64,

    builder: StrokeBuilder,
    buffer: GpuBuffer<StrokeVertex>,
    program: ShadingProgram,
    attributes: [wgpu::VertexAttribute; 3],

    built_generation: Option<u64>,
    last_upload: Range<usize>,
    pending: Option<Range<u32>>,
}

impl Series {
    /// Creates a series with the built-in stroke program.
    pub fn new(config: SeriesConfig, clock: Arc<dyn Clock>) -> Result<Self, ChartError> {
        Self::with_program(
            config,
            clock,
            &[
                ShaderSource::vertex(SERIES_VERTEX_WGSL),
                ShaderSource::fragment(SERIES_FRAGMENT_WGSL),
            ],
        )
    }

    /// Creates a series drawn with custom stages.
    ///
    /// The stages must declare the `iPrevious`/`iCurrent`/`iNext` attributes and
    /// the uniforms in [`UNIFORM_NAMES`]; mismatches fail here.
    pub fn with_program(
        config: SeriesConfig,
        clock: Arc<dyn Clock>,
        sources: &[ShaderSource<'_>],
    ) -> Result<Self, ChartError> {
        let defaults = SeriesConfig::default();
        let time_window = if config.time_window > 0 {
            config.time_window
        } else {
            log::warn!(
                "series time window {} is not positive; using {}",
                config.time_window,
                defaults.time_window
            );
            defaults.time_window
        };
        let (value_low, value_high) = if valid_range(config.value_low, config.value_high) {
            (config.value_low, config.value_high)
        } else {
            log::warn!(
                "series value range [{}, {}] is invalid; using [{}, {}]",
                config.value_low,
                config.value_high,
                defaults.value_low,
                defaults.value_high
            );
            (defaults.value_low, defaults.value_high)
        };

        let mut program = ShadingProgram::new("oscillo series", sources)?;
        let mut attributes = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }; 3];
        for (slot, name) in StrokeVertex::ATTRIBUTE_NAMES.iter().enumerate() {
            let loc = program.attribute_location(name)?;
            if loc.components != 2 {
                return Err(ChartError::ProgramLink {
                    log: format!("attribute `{name}` has {} components, expected 2", loc.components),
                });
            }
            attributes[slot] = wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: (slot * std::mem::size_of::<[f32; 2]>()) as u64,
                shader_location: loc.location,
            };
        }
        for name in UNIFORM_NAMES {
            program.uniform_location(name)?;
        }

        let time_reference = clock.now();
        let window = PointWindow::new(config.max_points, time_window);
        let interval = reasonable_interval(time_window, config.decimation_fraction);

        Ok(Self {
            feed: SeriesFeed::new(window, time_reference, clock),
            time_window,
            decimation_fraction: config.decimation_fraction,
            color: config.color,
            line_width: config.line_width,
            value_low,
            value_high,
            builder: StrokeBuilder::new(config.max_points, interval),
            buffer: GpuBuffer::new(
                "oscillo series vbo",
                config.max_points * VERTICES_PER_POINT,
            ),
            program,
            attributes,
            built_generation: None,
            last_upload: 0..0,
            pending: None,
        })
    }

    // ── ingestion ─────────────────────────────────────────────────────────

    /// Merges a batch of absolute-time samples. See [`SeriesFeed::ingest`].
    #[inline]
    pub fn ingest(&self, batch: &[Sample]) {
        self.feed.ingest(batch);
    }

    /// Handle for ingesting from another thread.
    pub fn feed(&self) -> SeriesFeed {
        self.feed.clone()
    }

    /// Epoch captured at creation. Timestamps and the current time reach the
    /// vertex stage as `f32` offsets from it, so their resolution coarsens as the
    /// series ages: steps reach about 1 ms after roughly 2.4 hours.
    #[inline]
    pub fn time_reference(&self) -> i64 {
        self.feed.time_reference()
    }

    /// Retained samples.
    pub fn len(&self) -> usize {
        self.feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    // ── style ─────────────────────────────────────────────────────────────

    /// Sets the stroke color from straight components in `[0, 1]`.
    pub fn set_line_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.color = Color::from_straight(r, g, b, a);
    }

    /// Sets the stroke width in logical pixels.
    pub fn set_line_width(&mut self, width: f32) {
        if !width.is_finite() || width < 0.0 {
            log::warn!("ignoring line width {width}");
            return;
        }
        self.line_width = width;
    }

    /// Sets the value range mapped to the plot height. Needs `low < high`.
    pub fn set_value_range(&mut self, low: f64, high: f64) {
        if !valid_range(low, high) {
            log::warn!("ignoring value range [{low}, {high}]");
            return;
        }
        self.value_low = low;
        self.value_high = high;
    }

    /// Sets the retained duration. Rebuilds the strip on the next frame.
    pub fn set_time_window(&mut self, time_window: i64) {
        if time_window <= 0 {
            log::warn!("ignoring time window {time_window}");
            return;
        }
        self.time_window = time_window;
        self.feed.lock().set_time_window(time_window);
        self.builder
            .set_interval(reasonable_interval(time_window, self.decimation_fraction));
        self.builder.reset();
        self.built_generation = None;
    }

    #[inline]
    pub fn line_color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    #[inline]
    pub fn value_range(&self) -> (f64, f64) {
        (self.value_low, self.value_high)
    }

    #[inline]
    pub fn time_window(&self) -> i64 {
        self.time_window
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Brings GPU state up to date for one frame.
    ///
    /// `plot` is the plot area in physical pixels. Returns the vertex range to
    /// draw, or `None` when fewer than two points are visible.
    pub fn prepare(
        &mut self,
        device: DeviceRef<'_>,
        plot: PhysicalRect,
        scale_factor: f32,
    ) -> Result<Option<Range<u32>>, ChartError> {
        let now = self.feed.now();

        let dirty = {
            let mut window = self.feed.lock();
            window.evict_expired(now);
            let changes = window.take_changes();
            let dirty = match self.built_generation {
                None => self.builder.rebuild(window.samples()),
                Some(g) if g == changes.generation => 0..0,
                Some(_) => self.builder.update(window.samples(), changes.changed_from),
            };
            self.built_generation = Some(changes.generation);
            dirty
        };

        self.buffer.ensure_created(device)?;
        if !dirty.is_empty() {
            self.buffer
                .upload(device, &self.builder.vertices()[dirty.clone()], dirty.start)?;
        }
        self.last_upload = dirty;

        let range = self.builder.draw_range();
        self.buffer.set_valid_vertex_count(range.end as usize);

        let target_format = match device {
            DeviceRef::Wgpu { format, .. } => Some(format),
            DeviceRef::Headless => None,
        };
        self.stage_uniforms(now, plot, scale_factor, target_format)?;

        if let DeviceRef::Wgpu { device, queue, format } = device {
            let layout = wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<StrokeVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &self.attributes,
            };
            self.program.ensure_pipeline(device, format, &[layout]);
            self.program.flush_uniforms(queue);
        }

        self.pending = (self.builder.live_points() >= 2).then_some(range);
        Ok(self.pending.clone())
    }

    fn stage_uniforms(
        &mut self,
        now: i64,
        plot: PhysicalRect,
        scale_factor: f32,
        target_format: Option<wgpu::TextureFormat>,
    ) -> Result<(), ChartError> {
        let color = target_format.map_or(self.color, |f| self.color.for_target(f));
        let p = &mut self.program;
        let [r, g, b, a] = color.to_array();
        p.set_uniform_4f("uColor", r, g, b, a)?;
        p.set_uniform_1f("uWidth", self.line_width * scale_factor)?;
        p.set_uniform_1f("uViewport.width", plot.width as f32)?;
        p.set_uniform_1f("uViewport.height", plot.height as f32)?;
        p.set_uniform_1f("uPointConstraints.currentTime", now as f32)?;
        p.set_uniform_1f("uPointConstraints.timeWindow", self.time_window as f32)?;
        p.set_uniform_1f("uPointConstraints.valueLow", self.value_low as f32)?;
        p.set_uniform_1f("uPointConstraints.valueHigh", self.value_high as f32)?;
        Ok(())
    }

    /// Skips drawing this frame.
    pub(super) fn skip_frame(&mut self) {
        self.pending = None;
    }

    /// Vertex range prepared for this frame.
    #[inline]
    pub fn pending(&self) -> Option<Range<u32>> {
        self.pending.clone()
    }

    /// Vertex range uploaded by the last `prepare`.
    #[inline]
    pub fn last_upload(&self) -> Range<usize> {
        self.last_upload.clone()
    }

    /// Records the prepared draw into `pass`.
    pub fn record(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(range) = self.pending.clone() else { return };
        if !self.program.is_ready() {
            return;
        }
        self.program.activate(pass);
        self.buffer.bind(pass, 0);
        pass.draw(range, 0..1);
    }

    /// Vertex buffer contents of a headless series.
    pub fn host_vertices(&self) -> Option<&[StrokeVertex]> {
        self.buffer.host_contents()
    }

    /// Value currently staged for a float uniform.
    pub fn staged_uniform(&mut self, name: &str) -> Result<Vec<f32>, ChartError> {
        self.program.staged_uniform(name)
    }

    /// Drops GPU resources. The next frame recreates and refills them.
    pub fn release(&mut self) {
        self.buffer.release();
        self.program.release();
        self.builder.reset();
        self.built_generation = None;
        self.pending = None;
    }
}

fn valid_range(low: f64, high: f64) -> bool {
    low.is_finite() && high.is_finite() && low < high
}

use std::collections::HashMap;

use crate::coords::{PhysicalRect, Rect, Viewport};
use crate::error::ChartError;
use crate::paint::Color;
use crate::render::{DeviceRef, RenderCtx, RenderTarget};

use super::{ChartTarget, HeadlessFrame, RecordedDraw, Series};

/// Chart-wide settings.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChartConfig {
    pub background: Color,
    /// Plot area in logical pixels; `None` covers the whole surface.
    pub plot_area: Option<Rect>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            background: Color::transparent(),
            plot_area: None,
        }
    }
}

/// What one frame drew.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub series: usize,
    pub vertices: u64,
}

/// Named series sharing one surface.
///
/// `draw` clears the target to the background and draws every series in map
/// order inside the plot area. Series are independent; order only decides
/// overlap.
pub struct Chart {
    series: HashMap<String, Series>,
    background: Color,
    plot_area: Option<Rect>,
}

impl Chart {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            series: HashMap::new(),
            background: config.background,
            plot_area: config.plot_area,
        }
    }

    /// Adds `series` under `name`. A series it replaces is released and returned.
    pub fn add_series(&mut self, name: impl Into<String>, series: Series) -> Option<Series> {
        let name = name.into();
        log::info!("series `{name}` added");
        let mut old = self.series.insert(name, series)?;
        old.release();
        Some(old)
    }

    #[inline]
    pub fn has_series(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    #[inline]
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    #[inline]
    pub fn series_mut(&mut self, name: &str) -> Option<&mut Series> {
        self.series.get_mut(name)
    }

    /// Removes a series and releases its GPU resources.
    pub fn remove_series(&mut self, name: &str) -> Option<Series> {
        let mut series = self.series.remove(name)?;
        series.release();
        log::info!("series `{name}` removed");
        Some(series)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    #[inline]
    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    #[inline]
    pub fn plot_area(&self) -> Option<Rect> {
        self.plot_area
    }

    pub fn set_plot_area(&mut self, area: Option<Rect>) {
        self.plot_area = area;
    }

    /// Draws one frame.
    pub fn draw(&mut self, target: ChartTarget<'_, '_>) -> Result<DrawStats, ChartError> {
        let stats = match target {
            ChartTarget::Gpu { ctx, target } => self.draw_gpu(ctx, target)?,
            ChartTarget::Headless(frame) => self.draw_headless(frame)?,
        };
        log::trace!("drew {} series, {} vertices", stats.series, stats.vertices);
        Ok(stats)
    }

    /// Drops GPU resources of every series (surface teardown).
    pub fn release(&mut self) {
        for series in self.series.values_mut() {
            series.release();
        }
    }

    fn prepare_all(
        &mut self,
        device: DeviceRef<'_>,
        viewport: Viewport,
    ) -> Result<(Option<PhysicalRect>, DrawStats), ChartError> {
        let plot = self
            .plot_area
            .unwrap_or_else(|| Rect::covering(viewport))
            .to_physical(viewport);

        let mut stats = DrawStats::default();
        for series in self.series.values_mut() {
            let Some(plot) = plot else {
                series.skip_frame();
                continue;
            };
            if let Some(range) = series.prepare(device, plot, viewport.scale_factor)? {
                stats.series += 1;
                stats.vertices += u64::from(range.end - range.start);
            }
        }
        Ok((plot, stats))
    }

    fn draw_gpu(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
    ) -> Result<DrawStats, ChartError> {
        let (plot, stats) = self.prepare_all(ctx.device_ref(), ctx.viewport)?;

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("oscillo chart pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.background.for_target(ctx.surface_format).to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let Some(p) = plot else { return Ok(stats) };
        rpass.set_viewport(p.x as f32, p.y as f32, p.width as f32, p.height as f32, 0.0, 1.0);
        rpass.set_scissor_rect(p.x, p.y, p.width, p.height);
        for series in self.series.values() {
            series.record(&mut rpass);
        }
        Ok(stats)
    }

    fn draw_headless(&mut self, frame: &mut HeadlessFrame) -> Result<DrawStats, ChartError> {
        let (plot, stats) = self.prepare_all(DeviceRef::Headless, frame.viewport)?;

        frame.clear = Some(self.background);
        frame.plot = plot;
        frame.draws.clear();
        for (name, series) in &self.series {
            if let Some(vertices) = series.pending() {
                frame.draws.push(RecordedDraw {
                    series: name.clone(),
                    vertices,
                    uploaded: series.last_upload(),
                });
            }
        }
        Ok(stats)
    }
}

impl Default for Chart {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

use std::ops::Range;

use crate::coords::{PhysicalRect, Viewport};
use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget};

/// Where a chart frame goes. Picked by the caller once per frame.
pub enum ChartTarget<'a, 'b> {
    /// A wgpu surface frame.
    Gpu {
        ctx: &'a RenderCtx<'a>,
        target: &'a mut RenderTarget<'b>,
    },
    /// No device: draws are recorded and vertex data kept on the host.
    Headless(&'a mut HeadlessFrame),
}

/// One draw call recorded by a headless frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub series: String,
    pub vertices: Range<u32>,
    /// Vertex range uploaded while preparing this draw.
    pub uploaded: Range<usize>,
}

/// Headless frame: the clear, the plot rectangle and every draw call.
#[derive(Debug, Clone, Default)]
pub struct HeadlessFrame {
    pub viewport: Viewport,
    pub clear: Option<Color>,
    pub plot: Option<PhysicalRect>,
    pub draws: Vec<RecordedDraw>,
}

impl HeadlessFrame {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn draw_for(&self, series: &str) -> Option<&RecordedDraw> {
        self.draws.iter().find(|d| d.series == series)
    }
}

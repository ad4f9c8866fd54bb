use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::{LogicalSize, PhysicalSize};

use oscillo_engine::chart::{Chart, ChartConfig, ChartTarget, Series, SeriesConfig};
use oscillo_engine::core::{App, AppControl, FrameCtx};
use oscillo_engine::device::GpuInit;
use oscillo_engine::logging::{init_logging, LoggingConfig};
use oscillo_engine::paint::Color;
use oscillo_engine::time::{Clock, SystemClock};
use oscillo_engine::window::{FrameScheduler, SchedulerConfig};

mod source;

use source::{SourceConfig, SourceHandle, Wave};

/// Demo lines: name, wave, straight RGB, width.
const LINES: [(&str, Wave, [f32; 3], f32); 3] = [
    ("a", Wave::Sin, [1.0, 0.0, 0.0], 4.0),
    ("b", Wave::Cos, [0.0, 0.0, 1.0], 4.0),
    ("c", Wave::Tan, [0.0, 0.8, 0.0], 2.0),
];

struct Studio {
    chart: Chart,
    source: Option<SourceHandle>,
}

impl Studio {
    fn new() -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut chart = Chart::new(ChartConfig {
            background: Color::from_straight(0.08, 0.08, 0.1, 1.0),
            ..ChartConfig::default()
        });

        let mut feeds = HashMap::new();
        let mut waves = Vec::new();
        for (name, wave, [r, g, b], width) in LINES {
            let series = Series::new(
                SeriesConfig {
                    color: Color::from_straight(r, g, b, 1.0),
                    line_width: width,
                    value_low: -2.0,
                    value_high: 2.0,
                    ..SeriesConfig::default()
                },
                clock.clone(),
            )
            .with_context(|| format!("failed to create series `{name}`"))?;

            feeds.insert(name.to_string(), series.feed());
            waves.push((name.to_string(), wave));
            chart.add_series(name, series);
        }

        let source = source::spawn(SourceConfig::default(), waves, feeds, clock)?;
        Ok(Self {
            chart,
            source: Some(source),
        })
    }
}

impl App for Studio {
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        log::debug!("surface resized to {}x{}", size.width, size.height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let chart = &mut self.chart;
        ctx.present(|rctx, target| match chart.draw(ChartTarget::Gpu { ctx: rctx, target }) {
            Ok(stats) => {
                log::trace!("{} series, {} vertices", stats.series, stats.vertices);
                AppControl::Continue
            }
            Err(e) => {
                log::error!("chart draw failed: {e}");
                AppControl::Exit
            }
        })
    }

    fn on_teardown(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.chart.release();
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let studio = Studio::new()?;
    FrameScheduler::run(
        SchedulerConfig {
            title: "oscillo studio".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        },
        GpuInit::default(),
        studio,
    )
}

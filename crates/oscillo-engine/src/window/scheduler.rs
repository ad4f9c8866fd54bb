use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit};
use crate::time::FrameClock;

/// Window configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            title: "oscillo".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Drives `App::on_frame` once per display refresh until the window closes or
/// the app asks to exit.
pub struct FrameScheduler;

impl FrameScheduler {
    pub fn run<A>(config: SchedulerConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = SchedulerState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.error.map_or(Ok(()), Err)
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,
    occluded: bool,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct SchedulerState<A>
where
    A: App + 'static,
{
    config: SchedulerConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    torn_down: bool,
    error: Option<anyhow::Error>,
}

impl<A> SchedulerState<A>
where
    A: App + 'static,
{
    fn new(config: SchedulerConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            torn_down: false,
            error: None,
        }
    }

    fn create_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        WindowEntryTryBuilder {
            clock: FrameClock::new(),
            occluded: false,
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init)).context("GPU initialization failed")
            },
        }
        .try_build()
    }

    /// Lets the app release GPU resources, then drops the window and device.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if !self.torn_down {
            self.torn_down = true;
            self.app.on_teardown();
            log::info!("frame scheduler stopped");
        }
        self.entry = None;
        event_loop.exit();
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else { return };
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        self.app.on_resize(new_size);
        entry.with_window(|w| w.request_redraw());
    }

    fn frame(&mut self) -> AppControl {
        let (app, entry) = (&mut self.app, &mut self.entry);
        let Some(entry) = entry.as_mut() else {
            return AppControl::Continue;
        };

        entry.with_mut(|fields| {
            if *fields.occluded {
                return AppControl::Continue;
            }
            let time = fields.clock.tick();
            let mut ctx = FrameCtx {
                window: fields.window,
                gpu: fields.gpu,
                time,
            };
            app.on_frame(&mut ctx)
        })
    }
}

impl<A> ApplicationHandler for SchedulerState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.torn_down {
            return;
        }

        match self.create_entry(event_loop) {
            Ok(entry) => {
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
                log::info!("frame scheduler started");
            }
            Err(e) => {
                log::error!("failed to create chart window: {e:#}");
                self.error = Some(e);
                self.shutdown(event_loop);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; FIFO presentation paces it to the display refresh.
        if let Some(entry) = &self.entry {
            if !*entry.borrow_occluded() {
                entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => self.resize(new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size);
                }
            }

            WindowEvent::Occluded(occluded) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_mut(|fields| {
                        *fields.occluded = occluded;
                        if !occluded {
                            fields.clock.reset();
                            fields.window.request_redraw();
                        }
                    });
                    log::debug!("window occluded: {occluded}");
                }
            }

            WindowEvent::RedrawRequested => {
                if self.frame() == AppControl::Exit {
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }
}

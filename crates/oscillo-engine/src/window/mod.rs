//! Window + frame scheduling.
//!
//! Owns the `winit` EventLoop and the chart window, and drives one frame per
//! display refresh through the GPU layer.

mod scheduler;

pub use scheduler::{FrameScheduler, SchedulerConfig};

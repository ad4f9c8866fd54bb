//! Oscillo engine crate.
//!
//! Streaming line charts on wgpu: sample windows fed from any thread, incremental
//! stroke geometry with partial vertex uploads, name-driven WGSL programs, and a
//! winit frame scheduler that draws once per display refresh.

pub mod chart;
pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod paint;
pub mod render;
pub mod time;
pub mod window;
pub mod wire;

pub use error::ChartError;

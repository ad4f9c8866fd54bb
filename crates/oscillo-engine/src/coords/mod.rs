//! Coordinate types shared by the chart and the render layer.
//!
//! CPU space is logical pixels (DPI-aware), origin top-left, +X right, +Y down.
//! Series geometry is not in this space: it stays in stream units and is mapped
//! to NDC by the shading stage.

mod rect;
mod vec2;
mod viewport;

pub use rect::{PhysicalRect, Rect};
pub use vec2::Vec2;
pub use viewport::Viewport;

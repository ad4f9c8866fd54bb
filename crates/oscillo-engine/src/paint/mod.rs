//! Paint model: line and background colors.

mod color;

pub use color::{srgb_to_linear, Color};

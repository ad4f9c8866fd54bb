//! GPU rendering subsystem.
//!
//! Shading programs are WGSL pairs driven by name (reflected through naga);
//! vertex buffers are fixed-capacity and filled by partial uploads. Every GPU
//! resource is created lazily from a [`DeviceRef`], which can also be headless.

mod buffer;
mod ctx;
mod program;
mod reflect;

pub use buffer::{checked_upload_range, GpuBuffer};
pub use ctx::{DeviceRef, RenderCtx, RenderTarget};
pub use program::{AttributeLocation, ShaderSource, ShadingProgram, Stage, UniformLocation};

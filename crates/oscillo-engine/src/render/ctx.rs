use crate::coords::Viewport;

/// Renderer-facing context (device/queue + surface format + viewport).
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    pub viewport: Viewport, // logical px + scale factor
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        Self {
            device,
            queue,
            surface_format,
            viewport,
        }
    }

    /// Device handle for resource creation and uploads.
    #[inline]
    pub fn device_ref(&self) -> DeviceRef<'a> {
        DeviceRef::Wgpu {
            device: self.device,
            queue: self.queue,
            format: self.surface_format,
        }
    }
}

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}

/// Where GPU resources live for the current frame.
///
/// Chosen once per frame by the chart. `Headless` keeps buffer contents on the
/// host and creates no pipelines.
#[derive(Copy, Clone)]
pub enum DeviceRef<'a> {
    Wgpu {
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        format: wgpu::TextureFormat,
    },
    Headless,
}

impl DeviceRef<'_> {
    #[inline]
    pub fn is_headless(&self) -> bool {
        matches!(self, DeviceRef::Headless)
    }
}

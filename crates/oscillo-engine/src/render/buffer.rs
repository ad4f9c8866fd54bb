//! Fixed-capacity vertex buffer with lazy creation and partial uploads.

use std::ops::Range;

use bytemuck::Pod;

use crate::error::ChartError;

use super::DeviceRef;

enum Storage<V> {
    Device(wgpu::Buffer),
    Host(Vec<V>),
}

/// Vertex buffer of `capacity` elements of `V`.
///
/// The device buffer is created on first use and never reallocated. Storage is
/// picked at creation from the [`DeviceRef`] variant: a wgpu buffer, or a host
/// array for headless frames.
pub struct GpuBuffer<V> {
    label: &'static str,
    capacity: usize,
    storage: Option<Storage<V>>,
    valid_vertices: usize,
}

/// Element range written by an upload of `count` elements at `offset`.
pub fn checked_upload_range(
    offset: usize,
    count: usize,
    capacity: usize,
) -> Result<Range<usize>, ChartError> {
    match offset.checked_add(count) {
        Some(end) if end <= capacity => Ok(offset..end),
        _ => Err(ChartError::UploadOutOfRange {
            offset,
            count,
            capacity,
        }),
    }
}

impl<V: Pod> GpuBuffer<V> {
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            capacity,
            storage: None,
            valid_vertices: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.storage.is_some()
    }

    /// Byte size of the whole buffer.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        (self.capacity * std::mem::size_of::<V>()) as u64
    }

    /// Creates the storage if it does not exist yet.
    pub fn ensure_created(&mut self, device: DeviceRef<'_>) -> Result<(), ChartError> {
        if self.storage.is_some() {
            return Ok(());
        }

        let size = self.size_bytes();
        if size == 0 {
            return Err(ChartError::BufferCreation {
                label: self.label,
                size,
                reason: "zero-sized buffer".into(),
            });
        }

        let storage = match device {
            DeviceRef::Wgpu { device, .. } => {
                let max = device.limits().max_buffer_size;
                if size > max {
                    return Err(ChartError::BufferCreation {
                        label: self.label,
                        size,
                        reason: format!("exceeds device max_buffer_size {max}"),
                    });
                }
                Storage::Device(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label),
                    size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }))
            }
            DeviceRef::Headless => Storage::Host(vec![V::zeroed(); self.capacity]),
        };

        log::info!(
            "created `{}` buffer: {} vertices, {} bytes{}",
            self.label,
            self.capacity,
            size,
            if device.is_headless() { " (host)" } else { "" }
        );
        self.storage = Some(storage);
        Ok(())
    }

    /// Writes `data` at element `offset`.
    ///
    /// Out-of-range uploads write nothing and fail with `UploadOutOfRange`.
    pub fn upload(
        &mut self,
        device: DeviceRef<'_>,
        data: &[V],
        offset: usize,
    ) -> Result<(), ChartError> {
        let range = checked_upload_range(offset, data.len(), self.capacity).inspect_err(|e| {
            log::error!("`{}`: {e}", self.label);
        })?;
        if data.is_empty() {
            return Ok(());
        }
        self.ensure_created(device)?;

        match (&mut self.storage, device) {
            (Some(Storage::Device(buffer)), DeviceRef::Wgpu { queue, .. }) => {
                let stride = std::mem::size_of::<V>() as u64;
                queue.write_buffer(buffer, range.start as u64 * stride, bytemuck::cast_slice(data));
            }
            (Some(Storage::Host(host)), _) => host[range].copy_from_slice(data),
            (Some(Storage::Device(_)), DeviceRef::Headless) => {
                log::warn!("`{}`: headless upload into a device buffer ignored", self.label);
            }
            (None, _) => {}
        }
        Ok(())
    }

    /// Binds the whole buffer to vertex slot `slot`. Host storage binds nothing.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, slot: u32) {
        if let Some(Storage::Device(buffer)) = &self.storage {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
    }

    /// Marks the prefix `0..count` as holding current vertex data.
    pub fn set_valid_vertex_count(&mut self, count: usize) {
        debug_assert!(count <= self.capacity);
        self.valid_vertices = count.min(self.capacity);
    }

    #[inline]
    pub fn valid_vertex_count(&self) -> usize {
        self.valid_vertices
    }

    /// Host-side contents when created for headless frames.
    pub fn host_contents(&self) -> Option<&[V]> {
        match &self.storage {
            Some(Storage::Host(host)) => Some(host),
            _ => None,
        }
    }

    /// Drops the storage. The next use creates it again.
    pub fn release(&mut self) {
        if self.storage.take().is_some() {
            log::info!("released `{}` buffer", self.label);
        }
        self.valid_vertices = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── range checks ──────────────────────────────────────────────────────

    #[test]
    fn range_inside_capacity() {
        assert_eq!(checked_upload_range(2, 3, 5), Ok(2..5));
        assert_eq!(checked_upload_range(5, 0, 5), Ok(5..5));
    }

    #[test]
    fn range_past_capacity_is_rejected() {
        assert_eq!(
            checked_upload_range(4, 2, 5),
            Err(ChartError::UploadOutOfRange {
                offset: 4,
                count: 2,
                capacity: 5
            })
        );
        assert!(checked_upload_range(usize::MAX, 1, 5).is_err());
    }

    // ── host storage ──────────────────────────────────────────────────────

    #[test]
    fn creation_is_lazy_and_idempotent() {
        let mut buf = GpuBuffer::<[f32; 2]>::new("test", 4);
        assert!(!buf.is_created());
        buf.ensure_created(DeviceRef::Headless).unwrap();
        buf.ensure_created(DeviceRef::Headless).unwrap();
        assert!(buf.is_created());
        assert_eq!(buf.host_contents().unwrap().len(), 4);
    }

    #[test]
    fn zero_capacity_fails_creation() {
        let mut buf = GpuBuffer::<[f32; 2]>::new("empty", 0);
        let err = buf.ensure_created(DeviceRef::Headless).unwrap_err();
        assert!(matches!(err, ChartError::BufferCreation { size: 0, .. }));
    }

    #[test]
    fn partial_upload_touches_only_its_range() {
        let mut buf = GpuBuffer::<[f32; 2]>::new("test", 4);
        buf.upload(DeviceRef::Headless, &[[1.0, 1.0], [2.0, 2.0]], 1).unwrap();
        assert_eq!(
            buf.host_contents().unwrap(),
            &[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [0.0, 0.0]]
        );
    }

    #[test]
    fn overflowing_upload_writes_nothing() {
        let mut buf = GpuBuffer::<[f32; 2]>::new("test", 2);
        buf.ensure_created(DeviceRef::Headless).unwrap();
        assert!(buf.upload(DeviceRef::Headless, &[[9.0, 9.0]; 2], 1).is_err());
        assert_eq!(buf.host_contents().unwrap(), &[[0.0, 0.0]; 2]);
    }

    #[test]
    fn release_resets_watermark() {
        let mut buf = GpuBuffer::<[f32; 2]>::new("test", 4);
        buf.upload(DeviceRef::Headless, &[[1.0, 1.0]], 0).unwrap();
        buf.set_valid_vertex_count(1);
        buf.release();
        assert!(!buf.is_created());
        assert_eq!(buf.valid_vertex_count(), 0);
    }
}

/// Drawable surface size in logical pixels plus the DPI scale.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scale_factor: 1.0,
        }
    }

    #[inline]
    pub const fn with_scale(width: f32, height: f32, scale_factor: f32) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.scale_factor > 0.0
    }

    /// Size in physical pixels, at least 1x1.
    #[inline]
    pub fn physical_size(self) -> (u32, u32) {
        (
            (self.width * self.scale_factor).max(1.0) as u32,
            (self.height * self.scale_factor).max(1.0) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_applies_scale() {
        assert_eq!(Viewport::with_scale(100.0, 50.0, 2.0).physical_size(), (200, 100));
    }

    #[test]
    fn zero_sized_viewport_is_invalid() {
        assert!(!Viewport::new(0.0, 10.0).is_valid());
        assert!(!Viewport::with_scale(10.0, 10.0, 0.0).is_valid());
        assert!(Viewport::new(1.0, 1.0).is_valid());
    }
}

use super::{Vec2, Viewport};

/// Axis-aligned rectangle in logical pixels (top-left origin).
///
/// Used for the chart's plot area inside the drawable surface.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

/// Rectangle in physical pixels, clamped to a surface. Never zero-area.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Rectangle covering the whole viewport.
    #[inline]
    pub fn covering(viewport: Viewport) -> Self {
        Self::new(0.0, 0.0, viewport.width, viewport.height)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let (mut x, mut w) = (self.origin.x, self.size.x);
        let (mut y, mut h) = (self.origin.y, self.size.y);
        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }
        Rect::new(x, y, w, h)
    }

    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let a = self.normalized();
        let b = other.normalized();

        let min = Vec2::new(a.origin.x.max(b.origin.x), a.origin.y.max(b.origin.y));
        let (amax, bmax) = (a.max(), b.max());
        let max = Vec2::new(amax.x.min(bmax.x), amax.y.min(bmax.y));
        let size = max - min;

        if size.x <= 0.0 || size.y <= 0.0 {
            None
        } else {
            Some(Rect { origin: min, size })
        }
    }

    /// Converts to physical pixels clamped to `viewport`.
    ///
    /// Returns `None` when nothing of the rectangle is visible; callers skip the draw.
    pub fn to_physical(self, viewport: Viewport) -> Option<PhysicalRect> {
        if !self.is_finite() || !viewport.is_valid() {
            return None;
        }
        let visible = self.intersect(Rect::covering(viewport))?;

        let scale = viewport.scale_factor;
        let (phys_w, phys_h) = viewport.physical_size();
        let max = visible.max();

        let x = ((visible.origin.x * scale).max(0.0) as u32).min(phys_w);
        let y = ((visible.origin.y * scale).max(0.0) as u32).min(phys_h);
        let x2 = ((max.x * scale).max(0.0) as u32).min(phys_w);
        let y2 = ((max.y * scale).max(0.0) as u32).min(phys_h);

        let (width, height) = (x2.saturating_sub(x), y2.saturating_sub(y));
        if width == 0 || height == 0 {
            None
        } else {
            Some(PhysicalRect { x, y, width, height })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    // ── normalized ────────────────────────────────────────────────────────

    #[test]
    fn normalized_positive_is_identity() {
        let rect = r(1.0, 2.0, 10.0, 20.0);
        assert_eq!(rect.normalized(), rect);
    }

    #[test]
    fn normalized_flips_negative_extent() {
        let n = r(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, r(6.0, 7.0, 4.0, 3.0));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        let i = r(0.0, 0.0, 10.0, 10.0).intersect(r(5.0, 5.0, 10.0, 10.0));
        assert_eq!(i, Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0.0, 0.0, 10.0, 10.0).intersect(r(10.0, 0.0, 10.0, 10.0)).is_none());
    }

    // ── to_physical ───────────────────────────────────────────────────────

    #[test]
    fn to_physical_scales_and_clamps() {
        let vp = Viewport::with_scale(100.0, 100.0, 2.0);
        let p = r(50.0, -10.0, 100.0, 30.0).to_physical(vp).unwrap();
        assert_eq!(
            p,
            PhysicalRect {
                x: 100,
                y: 0,
                width: 100,
                height: 40
            }
        );
    }

    #[test]
    fn to_physical_outside_is_none() {
        let vp = Viewport::new(100.0, 100.0);
        assert!(r(200.0, 0.0, 10.0, 10.0).to_physical(vp).is_none());
        assert!(r(0.0, 0.0, 0.0, 10.0).to_physical(vp).is_none());
    }
}

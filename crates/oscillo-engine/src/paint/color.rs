/// Premultiplied RGBA color in display (sRGB) space.
///
/// Invariant: `r`, `g`, `b` are already multiplied by `a`. Series colors are set
/// with straight components in `[0, 1]` and converted on the way in; the line
/// pipeline blends with premultiplied alpha. Use [`Color::for_target`] before
/// handing a color to a render target.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32, // premultiplied
    pub g: f32, // premultiplied
    pub b: f32, // premultiplied
    pub a: f32,
}

impl Color {
    #[inline]
    pub const fn transparent() -> Self {
        Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    /// Creates a color from straight-alpha bytes (`0`–`255`).
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_straight(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Creates a color from straight-alpha components, clamped to `[0, 1]`.
    ///
    /// Non-finite components are treated as 0.
    #[inline]
    pub fn from_straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let unit = |c: f32| if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 };
        let a = unit(a);
        Self {
            r: unit(r) * a,
            g: unit(g) * a,
            b: unit(b) * a,
            a,
        }
    }

    /// Creates a color from components that are already premultiplied.
    #[inline]
    pub const fn from_premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the straight-alpha components. For `a == 0`, RGB is 0.
    #[inline]
    pub fn to_straight(self) -> (f32, f32, f32, f32) {
        if self.a <= 0.0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let inv = 1.0 / self.a;
            (self.r * inv, self.g * inv, self.b * inv, self.a)
        }
    }

    /// Same color with its channels decoded from sRGB to linear. Alpha is kept.
    pub fn to_linear(self) -> Self {
        let (r, g, b, a) = self.to_straight();
        Self::from_straight(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a)
    }

    /// Components to write into a target of `format`.
    ///
    /// An sRGB format encodes on write, so the channels go in linear and the
    /// target shows the display values.
    #[inline]
    pub fn for_target(self, format: wgpu::TextureFormat) -> Self {
        if format.is_srgb() {
            self.to_linear()
        } else {
            self
        }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// Decodes one sRGB channel value to linear.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

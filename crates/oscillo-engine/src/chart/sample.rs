/// One timestamped value of a series.
///
/// `timestamp` is in stream units (nanoseconds). Inside a series it is stored
/// relative to the series' time reference.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    #[inline]
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Same sample with its timestamp shifted onto `reference`.
    #[inline]
    pub const fn rebased(self, reference: i64) -> Self {
        Self {
            timestamp: self.timestamp.wrapping_sub(reference),
            value: self.value,
        }
    }

    /// Vertex attribute form: `(timestamp, value)` as `f32`.
    ///
    /// Exact for offsets up to 2^24 units; beyond that the timestamp rounds to the
    /// nearest representable `f32`.
    #[inline]
    pub fn to_attr(self) -> [f32; 2] {
        [self.timestamp as f32, self.value as f32]
    }
}

impl From<(i64, f64)> for Sample {
    #[inline]
    fn from((timestamp, value): (i64, f64)) -> Self {
        Self { timestamp, value }
    }
}

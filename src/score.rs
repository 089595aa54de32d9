//! Keep-priority scoring for group members.
//!
//! A strictly larger score marks the image worth keeping: resolution wins
//! first, file size breaks resolution ties (a larger file at the same pixel
//! count is usually the better encode). Path order is applied as the final
//! tie-break where the representative is chosen, making the order total.

/// Scalar keep priority, packed so the plain integer order matches the
/// resolution-then-bytes preference: pixel count in the high 32 bits, byte
/// size in the low 32 bits, both saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualityScore(u64);

impl QualityScore {
    pub fn new(width: u32, height: u32, bytes: u64) -> Self {
        let pixels = (width as u64)
            .saturating_mul(height as u64)
            .min(u32::MAX as u64);
        let bytes = bytes.min(u32::MAX as u64);
        QualityScore((pixels << 32) | bytes)
    }

    /// Raw packed value, as written to the report.
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn from_value(value: u64) -> Self {
        QualityScore(value)
    }
}

impl std::fmt::Display for QualityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

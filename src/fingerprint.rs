//! Perceptual fingerprints.
//!
//! The fingerprint is an 8x8 average hash: each grid cell contributes one bit,
//! set when the cell's intensity is at or above the mean of the whole grid,
//! concatenated row-major into a `u64`. The hash is stable under rescaling and
//! re-encoding but not under rotation or aggressive cropping; the default
//! distance threshold downstream is calibrated for this variant.

use crate::decode::GRID_CELLS;

/// Width of a fingerprint in bits. Also the largest meaningful distance
/// threshold.
pub const FINGERPRINT_BITS: u32 = GRID_CELLS as u32;

/// Fixed-width perceptual hash of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Derive the fingerprint from a normalized grayscale grid.
    ///
    /// The mean uses truncating integer division and the comparison is
    /// inclusive, so a flat image hashes to all ones. Deterministic.
    pub fn from_grid(grid: &[u8; GRID_CELLS]) -> Self {
        let sum: u32 = grid.iter().map(|&v| v as u32).sum();
        let mean = (sum / GRID_CELLS as u32) as u8;

        let mut bits = 0u64;
        for (i, &v) in grid.iter().enumerate() {
            if v >= mean {
                bits |= 1 << i;
            }
        }
        Fingerprint(bits)
    }

    pub fn from_bits(bits: u64) -> Self {
        Fingerprint(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Hamming distance to another fingerprint.
    pub fn distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// The top `bits` bits, used as a coarse bucket key. The Hamming distance
    /// between two prefixes never exceeds the distance between the full
    /// fingerprints, which is what makes bucket pruning exact.
    pub fn prefix(self, bits: u32) -> u64 {
        debug_assert!(bits <= FINGERPRINT_BITS);
        if bits == 0 {
            0
        } else {
            self.0 >> (FINGERPRINT_BITS - bits)
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

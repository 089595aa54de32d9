//! Near-duplicate image detection.
//!
//! The engine decodes images to a small grayscale grid, derives a 64-bit
//! perceptual fingerprint per image, groups fingerprints within a Hamming
//! distance threshold via union-find, picks the best-quality keeper per group,
//! and renders the groups in a line-oriented report format.

pub mod decode;
pub mod fingerprint;
pub mod group;
pub mod lines;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod walk;

pub use fingerprint::Fingerprint;
pub use group::{DEFAULT_MAX_DISTANCE, Group, ImageRecord, group_records};
pub use score::QualityScore;

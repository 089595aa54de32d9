//! Parallel decode + fingerprint stage.
//!
//! Each image is independent, so the stage fans out across the rayon pool and
//! produces immutable `ImageRecord`s. Decode failures are either collected as
//! skips (the default) or abort the run; cancellation is checked between
//! images so an aborted run never yields partial results.

use crate::decode::{self, DecodeError};
use crate::fingerprint::Fingerprint;
use crate::group::ImageRecord;
use crate::score::QualityScore;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to process {path}: {source}")]
    Decode {
        path: PathBuf,
        source: DecodeError,
    },
}

/// What to do when an image fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Log a warning, record the skip, keep going.
    Skip,
    /// Fail the whole run on the first bad image.
    Abort,
}

/// An input that could not be fingerprinted under [`DecodePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of the fingerprint stage.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Successfully fingerprinted inputs, sorted by path.
    pub records: Vec<ImageRecord>,
    /// Inputs skipped under [`DecodePolicy::Skip`], sorted by path.
    pub skipped: Vec<SkippedImage>,
}

enum Fetched {
    Record(ImageRecord),
    Skipped(SkippedImage),
}

/// Decode and fingerprint every path in parallel.
///
/// Output order is path-sorted regardless of worker scheduling. Setting
/// `cancel` stops the run between images with [`PipelineError::Cancelled`].
pub fn fingerprint_paths(
    paths: &[PathBuf],
    policy: DecodePolicy,
    cancel: &AtomicBool,
) -> Result<PipelineOutcome, PipelineError> {
    let bar = ProgressBar::new(paths.len() as u64);

    let results: Result<Vec<Fetched>, PipelineError> = paths
        .par_iter()
        .map(|path| {
            if cancel.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }

            let fetched = match decode::decode_image(path) {
                Ok(decoded) => Fetched::Record(ImageRecord {
                    path: path.clone(),
                    fingerprint: Fingerprint::from_grid(&decoded.grid),
                    score: QualityScore::new(decoded.width, decoded.height, decoded.bytes),
                }),
                Err(err) => match policy {
                    DecodePolicy::Abort => {
                        return Err(PipelineError::Decode {
                            path: path.clone(),
                            source: err,
                        });
                    }
                    DecodePolicy::Skip => {
                        log::warn!("skipping {}: {}", path.display(), err);
                        Fetched::Skipped(SkippedImage {
                            path: path.clone(),
                            reason: err.to_string(),
                        })
                    }
                },
            };
            bar.inc(1);
            Ok(fetched)
        })
        .collect();
    bar.finish_and_clear();

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for item in results? {
        match item {
            Fetched::Record(rec) => records.push(rec),
            Fetched::Skipped(skip) => skipped.push(skip),
        }
    }
    records.sort_by(|a, b| a.path.cmp(&b.path));
    skipped.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(PipelineOutcome { records, skipped })
}

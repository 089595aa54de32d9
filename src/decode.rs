//! Image loading and normalization.
//!
//! Decoding produces the fixed-size grayscale grid the fingerprint is derived
//! from, plus the original dimensions and byte size used for quality scoring.
//! A decode is a pure function of the file bytes.

use image::ImageFormat;
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Edge length of the normalized grayscale grid. The 64-bit fingerprint width
/// and the default distance threshold are calibrated against this size.
pub const GRID_SIZE: u32 = 8;

/// Cells in the normalized grid.
pub const GRID_CELLS: usize = (GRID_SIZE * GRID_SIZE) as usize;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported image format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to decode {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// A decoded, normalized image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Original pixel width.
    pub width: u32,
    /// Original pixel height.
    pub height: u32,
    /// Size of the source file in bytes.
    pub bytes: u64,
    /// Row-major grayscale intensities after area-averaged downsampling.
    pub grid: [u8; GRID_CELLS],
}

/// Load an image and normalize it to the fingerprint grid.
///
/// The format is detected from file content, not the extension; anything
/// other than JPEG or PNG is rejected.
pub fn decode_image(path: &Path) -> Result<DecodedImage, DecodeError> {
    let data = fs::read(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = data.len() as u64;

    // Format comes from the content, never the extension.
    let format = match image::guess_format(&data) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png)) => f,
        _ => {
            return Err(DecodeError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    let img = image::load_from_memory_with_format(&data, format).map_err(|source| {
        DecodeError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let (width, height) = (img.width(), img.height());
    let luma = img.to_luma8();
    let small = image::imageops::resize(&luma, GRID_SIZE, GRID_SIZE, FilterType::Triangle);

    let mut grid = [0u8; GRID_CELLS];
    grid.copy_from_slice(small.as_raw());

    Ok(DecodedImage {
        width,
        height,
        bytes,
        grid,
    })
}

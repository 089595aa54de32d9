//! Line-delimited path-file I/O, the exchange format for input lists.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Read one path per line, skipping blank lines and tolerating CRLF endings
/// from producers built on Windows.
pub fn read_path_lines(path: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(path)
        .with_context(|| format!("could not open path list {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("failed reading {}", path.display()))?;
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

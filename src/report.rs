//! The line-oriented group report.
//!
//! Each group is a block of `<score>\t<path>` lines closed by a `------`
//! sentinel line; the representative is always the first line of its block,
//! so consumers never re-derive it. No empty lines, trailing newline at EOF.

use crate::group::Group;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Line separating group blocks.
pub const GROUP_SENTINEL: &str = "------";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed report at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// One `(score, path)` entry read back from a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub score: u64,
    pub path: PathBuf,
}

/// A parsed group block. Entries keep report order: representative first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportGroup {
    pub entries: Vec<ReportEntry>,
}

impl ReportGroup {
    pub fn representative(&self) -> &ReportEntry {
        &self.entries[0]
    }

    pub fn duplicates(&self) -> &[ReportEntry] {
        &self.entries[1..]
    }
}

/// Render groups into the report text.
pub fn render_report(groups: &[Group]) -> String {
    let mut out = String::new();
    for group in groups {
        for member in &group.members {
            out.push_str(&format!(
                "{}\t{}\n",
                member.score.value(),
                member.path.display()
            ));
        }
        out.push_str(GROUP_SENTINEL);
        out.push('\n');
    }
    out
}

/// Write the report to `path`, replacing any previous content.
pub fn write_report(path: &Path, groups: &[Group]) -> Result<(), ReportError> {
    fs::write(path, render_report(groups))?;
    Ok(())
}

/// Parse report text back into groups.
pub fn parse_report(text: &str) -> Result<Vec<ReportGroup>, ReportError> {
    let mut groups = Vec::new();
    let mut entries: Vec<ReportEntry> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let lineno = idx + 1;

        if line == GROUP_SENTINEL {
            if entries.is_empty() {
                return Err(ReportError::Malformed {
                    line: lineno,
                    message: "empty group block".to_string(),
                });
            }
            groups.push(ReportGroup {
                entries: std::mem::take(&mut entries),
            });
            continue;
        }

        let (score, path) = line.split_once('\t').ok_or_else(|| ReportError::Malformed {
            line: lineno,
            message: "expected <score>\\t<path>".to_string(),
        })?;
        let score = score.parse::<u64>().map_err(|e| ReportError::Malformed {
            line: lineno,
            message: format!("bad score {score:?}: {e}"),
        })?;
        entries.push(ReportEntry {
            score,
            path: PathBuf::from(path),
        });
    }

    if !entries.is_empty() {
        return Err(ReportError::Malformed {
            line: text.lines().count(),
            message: "unterminated group block".to_string(),
        });
    }
    Ok(groups)
}

/// Read and parse a report file.
pub fn read_report(path: &Path) -> Result<Vec<ReportGroup>, ReportError> {
    let text = fs::read_to_string(path)?;
    parse_report(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::group::{ImageRecord, group_records};
    use crate::score::QualityScore;

    fn rec(path: &str, bits: u64, score: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            fingerprint: Fingerprint::from_bits(bits),
            score: QualityScore::from_value(score),
        }
    }

    fn sample_groups() -> Vec<Group> {
        group_records(
            vec![
                rec("/a/one.jpg", 0, 10),
                rec("/a/two.jpg", 1, 30),
                rec("/b/three.png", 0xf0f0, 5),
                rec("/b/four.png", 0xf0f1, 5),
            ],
            2,
            false,
        )
    }

    #[test]
    fn representative_is_first_and_holds_block_max() {
        let text = render_report(&sample_groups());
        for block in text.split(&format!("{GROUP_SENTINEL}\n")) {
            if block.is_empty() {
                continue;
            }
            let scores: Vec<u64> = block
                .lines()
                .map(|l| l.split('\t').next().unwrap().parse().unwrap())
                .collect();
            assert_eq!(scores[0], *scores.iter().max().unwrap());
        }
    }

    #[test]
    fn blocks_end_with_sentinel_and_trailing_newline() {
        let text = render_report(&sample_groups());
        assert!(text.ends_with(&format!("{GROUP_SENTINEL}\n")));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn round_trips_through_parse() {
        let groups = sample_groups();
        let parsed = parse_report(&render_report(&groups)).unwrap();

        assert_eq!(parsed.len(), groups.len());
        for (p, g) in parsed.iter().zip(&groups) {
            assert_eq!(p.entries.len(), g.members.len());
            assert_eq!(p.representative().path, g.representative().path);
            for (e, m) in p.entries.iter().zip(&g.members) {
                assert_eq!(e.score, m.score.value());
                assert_eq!(e.path, m.path);
            }
        }
    }

    #[test]
    fn empty_report_parses_to_no_groups() {
        assert!(parse_report("").unwrap().is_empty());
    }

    #[test]
    fn parse_tolerates_crlf() {
        let text = format!("12\t/x/a.jpg\r\n7\t/x/b.jpg\r\n{GROUP_SENTINEL}\r\n");
        let parsed = parse_report(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].representative().path, PathBuf::from("/x/a.jpg"));
    }

    #[test]
    fn rejects_unterminated_block() {
        let err = parse_report("12\t/x/a.jpg\n").unwrap_err();
        assert!(matches!(err, ReportError::Malformed { .. }));
    }

    #[test]
    fn rejects_line_without_score() {
        let err = parse_report(&format!("/x/a.jpg\n{GROUP_SENTINEL}\n")).unwrap_err();
        assert!(matches!(err, ReportError::Malformed { line: 1, .. }));
    }

    #[test]
    fn rejects_empty_block() {
        let err = parse_report(&format!("{GROUP_SENTINEL}\n")).unwrap_err();
        assert!(matches!(err, ReportError::Malformed { line: 1, .. }));
    }

    #[test]
    fn write_and_read_report_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("groups.lines");
        let groups = sample_groups();
        write_report(&path, &groups).unwrap();

        let parsed = read_report(&path).unwrap();
        assert_eq!(parsed.len(), groups.len());
    }
}

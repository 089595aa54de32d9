use anyhow::{Context, Result, bail, ensure};
use chrono::Utc;
use clap::{Parser, Subcommand};
use duprs::fingerprint::FINGERPRINT_BITS;
use duprs::group::{DEFAULT_MAX_DISTANCE, Group, group_records};
use duprs::pipeline::{self, DecodePolicy, SkippedImage};
use duprs::{lines, report, walk};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

#[derive(Serialize, Debug)]
struct MoveRecord {
    timestamp: String,
    kept: String,
    moved: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(name = "duprs", version, about = "CLI for grouping near-duplicate images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group a path list from a lines file and write the group report
    Compare {
        /// Line-delimited file of image paths, one per line
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
        /// Where to write the group report
        #[arg(short, long, value_name = "FILE", default_value = "groups.lines")]
        output: PathBuf,
        /// Hamming distance at or below which images count as duplicates
        #[arg(long, default_value_t = DEFAULT_MAX_DISTANCE)]
        max_distance: u32,
        /// Abort on the first undecodable image instead of skipping it
        #[arg(long)]
        strict: bool,
        /// Also report groups of size 1 (images with no duplicates)
        #[arg(long)]
        singletons: bool,
    },

    /// Find and list duplicate groups under a directory
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_DISTANCE)]
        max_distance: u32,
        #[arg(long)]
        strict: bool,
    },

    /// Move every non-representative duplicate into `<dir>/duplicates`
    Cull {
        /// Directory to cull
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_DISTANCE)]
        max_distance: u32,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
        /// Directory to move duplicates into (default: `<dir>/duplicates`)
        #[arg(long, value_name = "DIR")]
        target_dir: Option<PathBuf>,
    },

    /// Move duplicates listed in a previously written group report
    Move {
        /// Group report produced by `compare`
        #[arg(short, long, value_name = "FILE")]
        groups: PathBuf,
        /// Directory to move duplicates into
        #[arg(long, value_name = "DIR")]
        target_dir: PathBuf,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            input,
            output,
            max_distance,
            strict,
            singletons,
        } => {
            let paths = lines::read_path_lines(&input)?;
            ensure!(
                !paths.is_empty(),
                "input path list {} is empty",
                input.display()
            );

            let (groups, skipped, processed) =
                run_engine(paths, max_distance, strict, singletons)?;
            report::write_report(&output, &groups)
                .with_context(|| format!("failed to write report {}", output.display()))?;

            println!("✅ Wrote {} group(s) to {}", groups.len(), output.display());
            print_summary(processed, &skipped, &groups);
        }

        Commands::Scan {
            path,
            max_distance,
            strict,
        } => {
            println!("▶ Scanning for duplicates in: {}", path.display());
            let paths = walk::collect_images(&path)?;
            ensure!(!paths.is_empty(), "no images found under {}", path.display());

            let (groups, skipped, processed) = run_engine(paths, max_distance, strict, false)?;
            if groups.is_empty() {
                println!("No duplicates found.");
            } else {
                println!("Found {} duplicate group(s):", groups.len());
                for (i, group) in groups.iter().enumerate() {
                    println!(" Group {}:", i + 1);
                    println!("   🏆 {}", group.representative().path.display());
                    for dup in group.duplicates() {
                        println!("   ▶ {}", dup.path.display());
                    }
                }
            }
            print_summary(processed, &skipped, &groups);
        }

        Commands::Cull {
            path,
            max_distance,
            dry_run,
            target_dir,
        } => {
            println!("▶ Culling duplicates in: {}", path.display());
            let paths = walk::collect_images(&path)?;
            ensure!(!paths.is_empty(), "no images found under {}", path.display());

            let (groups, skipped, processed) = run_engine(paths, max_distance, false, false)?;
            if groups.is_empty() {
                println!("No duplicates found.");
                return Ok(());
            }

            let dup_dir = target_dir.unwrap_or_else(|| path.join("duplicates"));
            if !dry_run {
                fs::create_dir_all(&dup_dir)
                    .with_context(|| format!("Failed to create directory {:?}", dup_dir))?;
            }

            let history_file = path.join(".history.jsonl");
            let mut history_out = if dry_run {
                None
            } else {
                Some(
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&history_file)
                        .with_context(|| {
                            format!("Failed to open history file {:?}", history_file)
                        })?,
                )
            };

            for (i, group) in groups.iter().enumerate() {
                println!("\n✨ Group {}:", i + 1);
                println!("   🏆 Keeping → {}", group.representative().path.display());
                let kept = group.representative().path.to_string_lossy().into_owned();
                let mut moved = Vec::new();

                for dup in group.duplicates() {
                    moved.push(dup.path.to_string_lossy().into_owned());
                    if dry_run {
                        println!(
                            "   📦 [dry-run] MOVE {} → {}",
                            dup.path.display(),
                            dup_dir.display()
                        );
                    } else {
                        move_into(&dup.path, &dup_dir)?;
                    }
                }

                if let Some(out) = history_out.as_mut() {
                    let record = MoveRecord {
                        timestamp: Utc::now().to_rfc3339(),
                        kept,
                        moved,
                    };
                    writeln!(out, "{}", serde_json::to_string(&record)?)?;
                }
            }

            print_summary(processed, &skipped, &groups);
            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
            } else {
                println!("\n✅ Recorded move history in {}", history_file.display());
            }
        }

        Commands::Move {
            groups,
            target_dir,
            dry_run,
        } => {
            let parsed = report::read_report(&groups)
                .with_context(|| format!("failed to read report {}", groups.display()))?;
            if parsed.is_empty() {
                println!("Report contains no groups; nothing to move.");
                return Ok(());
            }

            if !dry_run {
                fs::create_dir_all(&target_dir)
                    .with_context(|| format!("Failed to create directory {:?}", target_dir))?;
            }

            let mut moved_count = 0usize;
            for group in &parsed {
                for dup in group.duplicates() {
                    if dry_run {
                        println!(
                            "📦 [dry-run] MOVE {} → {}",
                            dup.path.display(),
                            target_dir.display()
                        );
                    } else {
                        move_into(&dup.path, &target_dir)?;
                    }
                    moved_count += 1;
                }
            }

            if dry_run {
                println!("\n⚠️  Dry-run only; {} file(s) would be moved.", moved_count);
            } else {
                println!("\n✅ Moved {} duplicate(s) to {}", moved_count, target_dir.display());
            }
        }
    }

    Ok(())
}

/// Fingerprint `paths` and group the results.
///
/// Returns the groups, the skipped inputs, and the count of images that were
/// actually fingerprinted.
fn run_engine(
    paths: Vec<PathBuf>,
    max_distance: u32,
    strict: bool,
    singletons: bool,
) -> Result<(Vec<Group>, Vec<SkippedImage>, usize)> {
    ensure!(
        max_distance <= FINGERPRINT_BITS,
        "--max-distance must be between 0 and {} (got {})",
        FINGERPRINT_BITS,
        max_distance
    );

    let policy = if strict {
        DecodePolicy::Abort
    } else {
        DecodePolicy::Skip
    };

    println!("▶ Fingerprinting {} image(s)…", paths.len());
    let cancel = AtomicBool::new(false);
    let outcome = pipeline::fingerprint_paths(&paths, policy, &cancel)?;
    if outcome.records.is_empty() {
        bail!("none of the {} input image(s) could be decoded", paths.len());
    }

    let processed = outcome.records.len();
    let groups = group_records(outcome.records, max_distance, singletons);
    Ok((groups, outcome.skipped, processed))
}

fn move_into(file: &Path, dir: &Path) -> Result<()> {
    let file_name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    let dest = dir.join(file_name);
    fs::rename(file, &dest)
        .with_context(|| format!("Failed to move {:?} → {:?}", file, dest))?;
    println!("   📦 Moved {} → {}", file.display(), dest.display());
    Ok(())
}

fn print_summary(processed: usize, skipped: &[SkippedImage], groups: &[Group]) {
    println!("\n📊 Summary:");
    println!("   processed: {} image(s)", processed);
    if !skipped.is_empty() {
        println!("   skipped:   {} image(s)", skipped.len());
        for skip in skipped {
            println!("      ⚠️  {} ({})", skip.path.display(), skip.reason);
        }
    }
    let sizes: Vec<usize> = groups.iter().map(Group::len).collect();
    println!("   groups:    {} (sizes: {:?})", groups.len(), sizes);
}

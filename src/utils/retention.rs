use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::utils::constants::{CHUNKS_DIR, DEFAULT_RETENTION_DAYS};
use crate::utils::filename::extract_scan_date;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub deleted: usize,
    pub freed_bytes: u64,
    /// Files deleted, or that would be in a dry run
    pub files: Vec<PathBuf>,
    pub dry_run: bool,
}

impl SweepReport {
    pub fn freed_mb(&self) -> f64 {
        self.freed_bytes as f64 / 1_048_576.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageStats {
    pub output_files: usize,
    pub chunk_files: usize,
    pub total_bytes: u64,
}

impl StorageStats {
    pub fn summary(&self) -> String {
        format!(
            "Storage Summary:\n\
            - Output files: {}\n\
            - Chunk files: {}\n\
            - Total size: {:.2} MB",
            self.output_files,
            self.chunk_files,
            self.total_bytes as f64 / 1_048_576.0
        )
    }
}

/// Age-based cleanup of dated output files.
pub struct RetentionPolicy {
    days_to_keep: u32,
    dry_run: bool,
}

impl RetentionPolicy {
    pub fn new(days_to_keep: u32) -> Self {
        Self {
            days_to_keep,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> NaiveDate {
        (now - Duration::days(i64::from(self.days_to_keep))).date_naive()
    }

    /// Remove `*.json` files in `dir` and `dir/chunks` whose scan date is
    /// before the cutoff. Files without a scan token are left alone.
    pub fn sweep(&self, dir: &Path, now: DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = self.cutoff(now);
        let mut report = SweepReport {
            dry_run: self.dry_run,
            ..SweepReport::default()
        };

        for folder in [dir.to_path_buf(), dir.join(CHUNKS_DIR)] {
            if !folder.is_dir() {
                continue;
            }

            for path in json_files(&folder)? {
                let Some(scan_date) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(extract_scan_date)
                else {
                    continue;
                };
                if scan_date >= cutoff {
                    continue;
                }

                let size = fs::metadata(&path)?.len();
                if !self.dry_run {
                    fs::remove_file(&path)?;
                }
                debug!(file = %path.display(), %scan_date, dry_run = self.dry_run, "expired");

                report.deleted += 1;
                report.freed_bytes += size;
                report.files.push(path);
            }
        }

        info!(
            dir = %dir.display(),
            deleted = report.deleted,
            freed_bytes = report.freed_bytes,
            dry_run = self.dry_run,
            "retention sweep finished"
        );
        Ok(report)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

pub fn storage_stats(dir: &Path) -> Result<StorageStats> {
    let mut stats = StorageStats::default();

    if dir.is_dir() {
        for path in json_files(dir)? {
            stats.output_files += 1;
            stats.total_bytes += fs::metadata(&path)?.len();
        }
    }

    let chunks = dir.join(CHUNKS_DIR);
    if chunks.is_dir() {
        for path in json_files(&chunks)? {
            stats.chunk_files += 1;
            stats.total_bytes += fs::metadata(&path)?.len();
        }
    }

    Ok(stats)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

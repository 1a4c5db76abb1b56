use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{QualityStrategy, Reliability};
use crate::processors::quality_filter::filter_by_quality;
use crate::utils::filename::is_surface_file;
use crate::writers::JsonWriter;

#[derive(Debug, Clone, Default)]
pub struct QualityAudit {
    pub files_checked: usize,
    pub high_quality: usize,
    pub medium_quality: usize,
    pub low_quality: usize,
    pub warnings: Vec<AuditWarning>,
    pub errors: Vec<AuditError>,
}

#[derive(Debug, Clone)]
pub struct AuditWarning {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AuditError {
    pub file: PathBuf,
    pub details: String,
}

impl QualityAudit {
    pub fn is_clean(&self) -> bool {
        self.low_quality == 0 && self.errors.is_empty()
    }
}

pub struct QualityAuditor {
    strategy: QualityStrategy,
    reader: JsonWriter,
}

impl QualityAuditor {
    pub fn new(strategy: QualityStrategy) -> Self {
        Self {
            strategy,
            reader: JsonWriter::new(),
        }
    }

    /// Audit every `SURFACE_*.json` file directly inside `dir`, in name order.
    pub fn audit_directory(&self, dir: &Path) -> Result<QualityAudit> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_surface_file(path))
            .collect();
        files.sort();

        debug!(dir = %dir.display(), files = files.len(), "auditing processed files");
        Ok(self.audit_files(&files))
    }

    /// Unreadable files are recorded as errors; the audit itself never fails.
    pub fn audit_files(&self, files: &[PathBuf]) -> QualityAudit {
        let mut audit = QualityAudit::default();

        for file in files {
            audit.files_checked += 1;

            let dataset = match self.reader.read_dataset(file) {
                Ok(dataset) => dataset,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "cannot audit file");
                    audit.errors.push(AuditError {
                        file: file.clone(),
                        details: e.to_string(),
                    });
                    continue;
                }
            };

            let (_, report) = filter_by_quality(&dataset.measurements, self.strategy);
            match report.reliability {
                Reliability::Excellent | Reliability::Good => audit.high_quality += 1,
                Reliability::Acceptable => audit.medium_quality += 1,
                Reliability::LowConfidence => {
                    audit.low_quality += 1;
                    audit.warnings.push(AuditWarning {
                        file: file.clone(),
                        message: report
                            .warning
                            .unwrap_or_else(|| Reliability::LowConfidence.to_string()),
                    });
                }
            }
        }

        audit
    }

    pub fn generate_summary(&self, audit: &QualityAudit) -> String {
        let mut summary = String::new();
        let pct = |n: usize| {
            if audit.files_checked == 0 {
                0.0
            } else {
                100.0 * n as f64 / audit.files_checked as f64
            }
        };

        summary.push_str("=== Quality Audit Report ===\n");
        summary.push_str(&format!("Strategy: {}\n", self.strategy));
        summary.push_str(&format!("Files Checked: {}\n", audit.files_checked));
        summary.push_str(&format!(
            "High Quality: {} ({:.1}%)\n",
            audit.high_quality,
            pct(audit.high_quality)
        ));
        summary.push_str(&format!(
            "Medium Quality: {} ({:.1}%)\n",
            audit.medium_quality,
            pct(audit.medium_quality)
        ));
        summary.push_str(&format!(
            "Low Quality: {} ({:.1}%)\n",
            audit.low_quality,
            pct(audit.low_quality)
        ));

        if !audit.warnings.is_empty() {
            summary.push_str(&format!("\nWarnings: {}\n", audit.warnings.len()));
            for (i, warning) in audit.warnings.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {}: {}\n",
                    i + 1,
                    warning.file.display(),
                    warning.message
                ));
            }
        }

        if !audit.errors.is_empty() {
            summary.push_str(&format!("\nErrors: {}\n", audit.errors.len()));
            for error in &audit.errors {
                summary.push_str(&format!("  {}: {}\n", error.file.display(), error.details));
            }
        }

        summary
    }
}

impl Default for QualityAuditor {
    fn default() -> Self {
        Self::new(QualityStrategy::default())
    }
}

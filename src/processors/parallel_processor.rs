use chrono::Utc;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{PollutantKind, QualityReport, QualityStrategy};
use crate::processors::processing_cache::{Fingerprint, ProcessingCache};
use crate::processors::quality_filter::filter_by_quality;
use crate::readers::MeasurementReader;
use crate::utils::filename::{is_surface_file, surface_output_path};
use crate::utils::progress::ProgressReporter;
use crate::writers::{JsonWriter, ProcessedDataset, ProcessedMetadata};

/// What happened to one source file during a run.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Skipped {
        source: PathBuf,
    },
    Processed {
        source: PathBuf,
        output: PathBuf,
        report: QualityReport,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

impl FileOutcome {
    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Skipped { source }
            | FileOutcome::Processed { source, .. }
            | FileOutcome::Failed { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub low_confidence: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Skipped { .. } => summary.skipped += 1,
                FileOutcome::Processed { report, .. } => {
                    summary.processed += 1;
                    if report.fallback_triggered {
                        summary.low_confidence += 1;
                    }
                }
                FileOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

pub struct ParallelProcessor {
    max_workers: usize,
    strategy: QualityStrategy,
    pollutant: Option<PollutantKind>,
    force: bool,
    pretty: bool,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            strategy: QualityStrategy::default(),
            pollutant: None,
            force: false,
            pretty: false,
        }
    }

    pub fn with_strategy(mut self, strategy: QualityStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_pollutant(mut self, pollutant: Option<PollutantKind>) -> Self {
        self.pollutant = pollutant;
        self
    }

    /// Reprocess files even when their fingerprint matches the cache
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_pretty_output(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Source `*.json` files directly inside `input_dir`, excluding our own outputs.
    pub fn discover_sources(input_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut sources: Vec<PathBuf> = fs::read_dir(input_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| ext == "json")
                    && !is_surface_file(path)
            })
            .collect();
        sources.sort();
        Ok(sources)
    }

    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        cache: &ProcessingCache,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<FileOutcome>> {
        let sources = Self::discover_sources(input_dir)?;
        info!(
            input = %input_dir.display(),
            files = sources.len(),
            "discovered measurement sources"
        );
        self.process_files(&sources, output_dir, cache, progress)
    }

    /// Process distinct files concurrently, one worker per file.
    ///
    /// Each file is read, annotated, filtered for its report, written as
    /// `SURFACE_<name>.json` and only then marked processed. A failing file
    /// is reported in its outcome and does not stop the others. Outcomes come
    /// back in input order.
    pub fn process_files(
        &self,
        sources: &[PathBuf],
        output_dir: &Path,
        cache: &ProcessingCache,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<FileOutcome>> {
        fs::create_dir_all(output_dir)?;

        if let Some(p) = progress {
            p.set_message(&format!("Processing {} files...", sources.len()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::InvalidSetting(e.to_string()))?;

        let done = Arc::new(AtomicUsize::new(0));

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            sources
                .par_iter()
                .map(|source| {
                    let outcome = self.process_single_file(source, output_dir, cache);

                    let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = progress {
                        p.update(count as u64);
                    }

                    outcome
                })
                .collect()
        });

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "processing run finished"
        );

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Processed {}, skipped {}, failed {}",
                summary.processed, summary.skipped, summary.failed
            ));
        }

        Ok(outcomes)
    }

    fn process_single_file(
        &self,
        source: &Path,
        output_dir: &Path,
        cache: &ProcessingCache,
    ) -> FileOutcome {
        match self.try_process_file(source, output_dir, cache) {
            Ok(Some((output, report))) => FileOutcome::Processed {
                source: source.to_path_buf(),
                output,
                report,
            },
            Ok(None) => FileOutcome::Skipped {
                source: source.to_path_buf(),
            },
            Err(e) => {
                warn!(file = %source.display(), error = %e, "failed to process file");
                FileOutcome::Failed {
                    source: source.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_process_file(
        &self,
        source: &Path,
        output_dir: &Path,
        cache: &ProcessingCache,
    ) -> Result<Option<(PathBuf, QualityReport)>> {
        if !self.force && cache.is_already_processed(source)? {
            debug!(file = %source.display(), "unchanged since last run, skipping");
            return Ok(None);
        }

        // Hash and parse the same bytes so the record matches what was ingested
        let bytes = fs::read(source)?;
        let source_fingerprint = Fingerprint::of_reader(bytes.as_slice())?;
        let batch = MeasurementReader::with_pollutant(self.pollutant)
            .read_batch_from_slice(&bytes, source)?;
        let measurements = batch.to_measurements();
        let (_, report) = filter_by_quality(&measurements, self.strategy);

        let pollutant = batch.pollutant;
        let output = surface_output_path(output_dir, source);
        let dataset = ProcessedDataset {
            metadata: ProcessedMetadata {
                source_file: batch.source_file,
                pollutant,
                scan_time: batch.scan_time,
                processed_at: Utc::now(),
                raw_units: pollutant.raw_units().to_string(),
                concentration_units: pollutant.concentration_units().to_string(),
                conversion_factor: pollutant.conversion_factor(),
                fingerprint: Some(source_fingerprint.to_string()),
                skipped_records: batch.skipped_records,
                quality: report.clone(),
            },
            measurements,
        };

        let writer = JsonWriter::new().with_pretty(self.pretty);
        writer.write_dataset(&dataset, &output)?;

        cache.mark_fingerprint(source, &source_fingerprint)?;
        info!(
            file = %source.display(),
            output = %output.display(),
            measurements = report.total_count,
            kept = report.kept_count,
            reliability = %report.reliability,
            fingerprint = %source_fingerprint,
            "processed file"
        );

        Ok(Some((output, report)))
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NO2_SOURCE: &str = r#"{
        "metadata": {"product": "NO2", "scan_time": "2025-10-04T15:24:07Z"},
        "measurements": [
            {"latitude": 13.7, "longitude": -89.2, "vertical_column": 40.0, "quality_flag": 0.9},
            {"latitude": 13.8, "longitude": -89.3, "vertical_column": 12.0, "quality_flag": 0.2}
        ]
    }"#;

    fn setup() -> (TempDir, PathBuf, PathBuf, ProcessingCache) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input).unwrap();
        let cache = ProcessingCache::open(output.join(".cache")).unwrap();
        (dir, input, output, cache)
    }

    #[test]
    fn test_discover_sources_ignores_outputs() -> Result<()> {
        let (_dir, input, _output, _cache) = setup();
        fs::write(input.join("NO2_b.json"), NO2_SOURCE)?;
        fs::write(input.join("NO2_a.json"), NO2_SOURCE)?;
        fs::write(input.join("SURFACE_NO2_a.json"), "{}")?;
        fs::write(input.join("notes.txt"), "")?;

        let sources = ParallelProcessor::discover_sources(&input)?;
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["NO2_a.json", "NO2_b.json"]);
        Ok(())
    }

    #[test]
    fn test_second_run_skips_unchanged() -> Result<()> {
        let (_dir, input, output, cache) = setup();
        fs::write(input.join("NO2_scan.json"), NO2_SOURCE)?;
        let processor = ParallelProcessor::new(2);

        let first = processor.process_directory(&input, &output, &cache, None)?;
        assert!(matches!(first[0], FileOutcome::Processed { .. }));
        assert!(output.join("SURFACE_NO2_scan.json").exists());

        let second = processor.process_directory(&input, &output, &cache, None)?;
        assert!(matches!(second[0], FileOutcome::Skipped { .. }));

        let forced = processor
            .with_force(true)
            .process_directory(&input, &output, &cache, None)?;
        assert!(matches!(forced[0], FileOutcome::Processed { .. }));
        Ok(())
    }

    #[test]
    fn test_output_and_cache_share_the_ingested_fingerprint() -> Result<()> {
        let (_dir, input, output, cache) = setup();
        let source = input.join("NO2_scan.json");
        fs::write(&source, NO2_SOURCE)?;

        ParallelProcessor::new(1).process_directory(&input, &output, &cache, None)?;

        let dataset = JsonWriter::new().read_dataset(&output.join("SURFACE_NO2_scan.json"))?;
        let stored = cache.stored_fingerprint("NO2_scan.json")?;
        assert_eq!(
            dataset.metadata.fingerprint.as_deref(),
            stored.as_ref().map(Fingerprint::as_str)
        );
        assert_eq!(stored, Some(Fingerprint::of_reader(NO2_SOURCE.as_bytes())?));
        Ok(())
    }

    #[test]
    fn test_failure_does_not_stop_other_files() -> Result<()> {
        let (_dir, input, output, cache) = setup();
        fs::write(input.join("NO2_good.json"), NO2_SOURCE)?;
        fs::write(input.join("NO2_bad.json"), "{ truncated")?;

        let outcomes = ParallelProcessor::new(2).process_directory(&input, &output, &cache, None)?;
        let summary = RunSummary::from_outcomes(&outcomes);

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(outcomes[0].source().file_name().unwrap(), "NO2_bad.json");
        assert!(!cache.is_already_processed(&input.join("NO2_bad.json"))?);
        Ok(())
    }
}

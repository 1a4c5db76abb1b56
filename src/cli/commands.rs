use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analyzers::MeasurementAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::models::{AirQualityResponse, Measurement, PollutantKind, QualityStrategy};
use crate::processors::{
    filter_by_quality, BoundingBox, FileOutcome, ParallelProcessor, ProcessingCache,
    QualityAuditor, QualityFilter, RunSummary, SpatialIndex,
};
use crate::utils::constants::CACHE_DIR_NAME;
use crate::utils::progress::ProgressReporter;
use crate::utils::retention::{storage_stats, RetentionPolicy};
use crate::writers::JsonWriter;

const SAMPLE_ROWS: usize = 10;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    match cli.command {
        Commands::Process {
            input_dir,
            output_dir,
            cache_dir,
            pollutant,
            strategy,
            max_workers,
            force,
            pretty,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
            let cache_dir = cache_dir
                .or_else(|| settings.cache_dir.clone())
                .unwrap_or_else(|| output_dir.join(CACHE_DIR_NAME));
            let strategy = resolve_strategy(strategy.as_deref(), &settings)?;
            let pollutant = pollutant
                .as_deref()
                .map(str::parse::<PollutantKind>)
                .transpose()?;
            let max_workers = max_workers.unwrap_or(settings.max_workers);

            println!("Processing measurement files...");
            println!("Input directory: {}", input_dir.display());
            println!("Output directory: {}", output_dir.display());
            println!("Strategy: {}, Workers: {}", strategy, max_workers);

            let sources = ParallelProcessor::discover_sources(&input_dir)
                .with_context(|| format!("listing {}", input_dir.display()))?;
            if sources.is_empty() {
                println!("No measurement files found");
                return Ok(());
            }

            let cache = ProcessingCache::open(&cache_dir)?;
            let processor = ParallelProcessor::new(max_workers)
                .with_strategy(strategy)
                .with_pollutant(pollutant)
                .with_force(force)
                .with_pretty_output(pretty);
            let progress = ProgressReporter::new(
                sources.len() as u64,
                "Processing measurement files...",
                false,
            );

            let outcomes = tokio::task::spawn_blocking(move || {
                processor.process_files(&sources, &output_dir, &cache, Some(&progress))
            })
            .await??;

            println!();
            for outcome in &outcomes {
                print_outcome(outcome);
            }

            let summary = RunSummary::from_outcomes(&outcomes);
            println!(
                "\nProcessed: {}, skipped (unchanged): {}, failed: {}, low confidence: {}",
                summary.processed, summary.skipped, summary.failed, summary.low_confidence
            );

            if summary.failed > 0 {
                bail!("{} file(s) failed to process", summary.failed);
            }
            println!("Processing complete!");
        }

        Commands::Query {
            file,
            bbox,
            strategy,
            page_size,
            json,
        } => {
            let strategy = resolve_strategy(strategy.as_deref(), &settings)?;
            let page_size = page_size.unwrap_or(settings.page_size).max(1);

            let dataset = JsonWriter::new()
                .read_dataset(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let pollutant = dataset.metadata.pollutant;

            let selected: Vec<Measurement> = match bbox {
                Some(values) => {
                    let bbox = BoundingBox::from_slice(&values)?;
                    let index = SpatialIndex::build(&dataset.measurements);
                    info!(
                        cells = index.cell_count(),
                        measurements = index.len(),
                        %bbox,
                        "querying spatial index"
                    );
                    index
                        .query_bbox(&dataset.measurements, &bbox)
                        .into_iter()
                        .cloned()
                        .collect()
                }
                None => dataset.measurements,
            };

            let (kept, report) = filter_by_quality(&selected, strategy);
            let response = AirQualityResponse::build(pollutant, &kept, &report, page_size);

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            println!("{}", QualityFilter::new(strategy).generate_summary(&report));
            if let Some(stats) = &response.statistics {
                println!("{}", stats.detailed_summary());
            }

            println!(
                "Sample Measurements (showing {} of {}):",
                response.measurements.len().min(SAMPLE_ROWS),
                response.total_available
            );
            for (i, m) in response.measurements.iter().take(SAMPLE_ROWS).enumerate() {
                println!(
                    "{}. ({:.3}, {:.3}) {}: {:.2} {} -> AQI {} (quality {:.2})",
                    i + 1,
                    m.latitude,
                    m.longitude,
                    m.timestamp.to_rfc3339(),
                    m.concentration,
                    pollutant.concentration_units(),
                    m.aqi.map_or_else(|| "n/a".to_string(), |aqi| aqi.to_string()),
                    m.quality()
                );
            }
        }

        Commands::Validate {
            input_dir,
            strategy,
        } => {
            let input_dir = input_dir.unwrap_or_else(|| settings.output_dir.clone());
            let strategy = resolve_strategy(strategy.as_deref(), &settings)?;

            println!("Auditing processed files in {}", input_dir.display());
            let progress = ProgressReporter::new_spinner("Auditing quality...", false);

            let auditor = QualityAuditor::new(strategy);
            let audit = auditor
                .audit_directory(&input_dir)
                .with_context(|| format!("auditing {}", input_dir.display()))?;

            progress.finish_with_message("Audit complete");
            println!("\n{}", auditor.generate_summary(&audit));

            if audit.is_clean() {
                println!("✅ All files passed the quality audit");
            } else {
                println!(
                    "⚠️  {} low-confidence file(s), {} unreadable",
                    audit.low_quality,
                    audit.errors.len()
                );
            }
        }

        Commands::Stats { file } => {
            let writer = JsonWriter::new();
            let info = writer
                .get_file_info(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let dataset = writer.read_dataset(&file)?;

            match MeasurementAnalyzer::new().calculate_statistics(&dataset.measurements) {
                Some(stats) => println!("{}", stats.detailed_summary()),
                None => println!("No measurements in file"),
            }

            println!(
                "{}",
                QualityFilter::default().generate_summary(&dataset.metadata.quality)
            );
            println!("File Details:");
            println!("{}", info.summary());
        }

        Commands::Clean {
            output_dir,
            days_to_keep,
            dry_run,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
            let days = days_to_keep.unwrap_or(settings.retention_days);

            let policy = RetentionPolicy::new(days).with_dry_run(dry_run);
            println!(
                "Cleaning files dated before {} in {}{}",
                policy.cutoff(Utc::now()),
                output_dir.display(),
                if dry_run { " (dry run)" } else { "" }
            );

            let report = policy.sweep(&output_dir, Utc::now())?;
            for path in &report.files {
                println!("  🗑️  {}", path.display());
            }
            println!(
                "\nFiles {}: {}",
                if dry_run { "to delete" } else { "deleted" },
                report.deleted
            );
            println!("Space freed: {:.1} MB", report.freed_mb());

            println!("\n{}", storage_stats(&output_dir)?.summary());

            let cache_dir = settings
                .cache_dir
                .clone()
                .unwrap_or_else(|| output_dir.join(CACHE_DIR_NAME));
            if cache_dir.is_dir() {
                let entries = ProcessingCache::open(&cache_dir)?.entries()?;
                println!("- Cached sources: {}", entries.len());
            }
        }
    }

    Ok(())
}

fn resolve_strategy(flag: Option<&str>, settings: &Settings) -> anyhow::Result<QualityStrategy> {
    let strategy = match flag {
        Some(name) => name.parse::<QualityStrategy>()?,
        None => settings.strategy()?,
    };
    Ok(strategy)
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Processed { output, report, .. } => {
            println!(
                "✅ {} ({}/{} kept, {})",
                output.display(),
                report.kept_count,
                report.total_count,
                report.reliability
            );
            if let Some(warning) = &report.warning {
                println!("   ⚠️  {}", warning);
            }
        }
        FileOutcome::Skipped { source } => {
            println!("⏭️  {} unchanged, skipped", source.display());
        }
        FileOutcome::Failed { source, error } => {
            println!("❌ {}: {}", source.display(), error);
        }
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose);

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::models::{Measurement, PollutantKind, RawSample};
use crate::utils::constants::QUALITY_UNFLAGGED;
use crate::utils::filename::{extract_scan_timestamp, pollutant_from_filename};

/// Layout of an extracted product file.
#[derive(Debug, Deserialize)]
struct SourceFile {
    #[serde(default)]
    metadata: SourceMetadata,
    measurements: Vec<SourceRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceMetadata {
    product: Option<String>,
    scan_time: Option<DateTime<Utc>>,
    source_file: Option<String>,
    /// `false` when the product carries no per-sample quality flag
    quality_flagged: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    latitude: f64,
    longitude: f64,
    timestamp: Option<DateTime<Utc>>,
    #[serde(
        alias = "vertical_column",
        alias = "vertical_column_du",
        alias = "aod",
        alias = "aerosol_optical_depth"
    )]
    value: Option<f64>,
    quality_flag: Option<f64>,
}

/// Raw samples read from one product file, plus what was learned about it.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_file: String,
    pub pollutant: PollutantKind,
    pub scan_time: Option<DateTime<Utc>>,
    pub samples: Vec<RawSample>,
    pub skipped_records: usize,
}

impl SourceBatch {
    /// Convert and AQI-annotate every sample, preserving order.
    pub fn to_measurements(&self) -> Vec<Measurement> {
        self.samples
            .iter()
            .map(|s| Measurement::from_sample(s, self.pollutant))
            .collect()
    }
}

pub struct MeasurementReader {
    pollutant_override: Option<PollutantKind>,
}

impl MeasurementReader {
    pub fn new() -> Self {
        Self {
            pollutant_override: None,
        }
    }

    pub fn with_pollutant(pollutant: Option<PollutantKind>) -> Self {
        Self {
            pollutant_override: pollutant,
        }
    }

    /// Read an extracted product file.
    ///
    /// Records with missing values or coordinates outside the globe are
    /// skipped and counted. Timestamps fall back from the record to the
    /// file's `scan_time` and then to the scan token in the file name.
    pub fn read_batch(&self, path: &Path) -> Result<SourceBatch> {
        let file = File::open(path)?;
        let source: SourceFile = serde_json::from_reader(BufReader::new(file))?;
        self.build_batch(source, file_name_of(path))
    }

    /// Parse file content already held in memory, e.g. the exact bytes that
    /// were fingerprinted. `path` only supplies the name used for fallbacks.
    pub fn read_batch_from_slice(&self, bytes: &[u8], path: &Path) -> Result<SourceBatch> {
        let source: SourceFile = serde_json::from_slice(bytes)?;
        self.build_batch(source, file_name_of(path))
    }

    fn build_batch(&self, source: SourceFile, file_name: String) -> Result<SourceBatch> {
        let pollutant = self.resolve_pollutant(&source.metadata, &file_name)?;
        let scan_time = source
            .metadata
            .scan_time
            .or_else(|| extract_scan_timestamp(&file_name));
        let default_quality = match source.metadata.quality_flagged {
            Some(false) => Some(QUALITY_UNFLAGGED),
            _ => None,
        };

        let mut samples = Vec::with_capacity(source.measurements.len());
        let mut skipped_records = 0;

        for record in source.measurements {
            let Some(raw_value) = record.value else {
                skipped_records += 1;
                continue;
            };

            let timestamp = record.timestamp.or(scan_time).ok_or_else(|| {
                ProcessingError::MissingData(format!(
                    "No timestamp for records in '{}' (no record timestamp, scan_time or scan token)",
                    file_name
                ))
            })?;

            let sample = RawSample {
                latitude: record.latitude,
                longitude: record.longitude,
                timestamp,
                raw_value,
                quality_flag: record.quality_flag.or(default_quality),
            };

            if !sample.latitude.is_finite()
                || !sample.longitude.is_finite()
                || sample.validate().is_err()
            {
                skipped_records += 1;
                continue;
            }

            samples.push(sample);
        }

        debug!(
            file = %file_name,
            pollutant = %pollutant,
            samples = samples.len(),
            skipped = skipped_records,
            "read measurement source"
        );

        Ok(SourceBatch {
            source_file: source.metadata.source_file.unwrap_or(file_name),
            pollutant,
            scan_time,
            samples,
            skipped_records,
        })
    }

    fn resolve_pollutant(&self, metadata: &SourceMetadata, file_name: &str) -> Result<PollutantKind> {
        if let Some(kind) = self.pollutant_override {
            return Ok(kind);
        }
        if let Some(product) = &metadata.product {
            return product.parse();
        }
        pollutant_from_filename(file_name).ok_or_else(|| {
            ProcessingError::UnknownPollutant(format!(
                "cannot determine pollutant for '{}'",
                file_name
            ))
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

impl Default for MeasurementReader {
    fn default() -> Self {
        Self::new()
    }
}

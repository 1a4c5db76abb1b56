use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Measurement, PollutantKind, QualityReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMetadata {
    pub source_file: String,
    pub pollutant: PollutantKind,
    pub scan_time: Option<DateTime<Utc>>,
    pub processed_at: DateTime<Utc>,
    pub raw_units: String,
    pub concentration_units: String,
    pub conversion_factor: f64,
    pub fingerprint: Option<String>,
    pub skipped_records: usize,
    pub quality: QualityReport,
}

/// Every annotated measurement of one source file, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDataset {
    pub metadata: ProcessedMetadata,
    pub measurements: Vec<Measurement>,
}

pub struct JsonWriter {
    pretty: bool,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn write_dataset(&self, dataset: &ProcessedDataset, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, dataset)?;
        } else {
            serde_json::to_writer(&mut writer, dataset)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_dataset(&self, path: &Path) -> Result<ProcessedDataset> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn get_file_info(&self, path: &Path) -> Result<DatasetFileInfo> {
        let file_size = fs::metadata(path)?.len();
        let dataset = self.read_dataset(path)?;

        Ok(DatasetFileInfo {
            path: path.to_path_buf(),
            file_size,
            pollutant: dataset.metadata.pollutant,
            total_measurements: dataset.measurements.len(),
            reliability: dataset.metadata.quality.reliability.to_string(),
        })
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct DatasetFileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub pollutant: PollutantKind,
    pub total_measurements: usize,
    pub reliability: String,
}

impl DatasetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Dataset File Summary:\n\
            - File: {}\n\
            - Pollutant: {}\n\
            - Measurements: {}\n\
            - Reliability: {}\n\
            - File size: {:.2} MB",
            self.path.display(),
            self.pollutant,
            self.total_measurements,
            self.reliability,
            self.file_size as f64 / 1_048_576.0
        )
    }
}

//! Layered runtime settings.
//!
//! Built-in defaults are overlaid by an optional TOML file, then by `AQI_*`
//! environment variables. Command line flags are applied last by the CLI.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::error::Result;
use crate::models::QualityStrategy;
use crate::utils::constants::{
    CACHE_DIR_NAME, DEFAULT_CONFIG_FILE, DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_SIZE,
    DEFAULT_RETENTION_DAYS,
};

const ENV_PREFIX: &str = "AQI";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    pub output_dir: PathBuf,

    /// Defaults to `<output_dir>/.cache`
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[validate(custom(function = "validate_strategy"))]
    pub default_strategy: String,

    #[validate(range(min = 1))]
    pub page_size: usize,

    pub retention_days: u32,

    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise
    /// `aqi-processor.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
            .set_default("default_strategy", QualityStrategy::default().name())?
            .set_default("page_size", DEFAULT_PAGE_SIZE as i64)?
            .set_default("retention_days", i64::from(DEFAULT_RETENTION_DAYS))?
            .set_default("max_workers", num_cpus::get() as i64)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn strategy(&self) -> Result<QualityStrategy> {
        self.default_strategy.parse()
    }

    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(CACHE_DIR_NAME))
    }
}

fn validate_strategy(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<QualityStrategy>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_quality_strategy"))
}

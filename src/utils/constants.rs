/// Quality thresholds, strongest first
pub const QUALITY_STRICT: f64 = 0.75;
pub const QUALITY_MODERATE: f64 = 0.50;
pub const QUALITY_PERMISSIVE: f64 = 0.01;
pub const QUALITY_FALLBACK: f64 = 0.0;

/// Quality value assigned when a source format carries no per-sample flag
pub const QUALITY_UNFLAGGED: f64 = 1.0;

/// Quality distribution bucket edges
pub const BUCKET_EXCELLENT_MIN: f64 = 0.75;
pub const BUCKET_GOOD_MIN: f64 = 0.5;

/// AQI range
pub const AQI_MIN: u16 = 0;
pub const AQI_MAX: u16 = 500;

/// Geographic bounds
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Spatial grid cell edge in degrees
pub const GRID_CELL_DEGREES: f64 = 1.0;

/// Block size used when streaming a file through the fingerprint hasher
pub const HASH_BLOCK_SIZE: usize = 8192;

/// File naming
pub const SURFACE_PREFIX: &str = "SURFACE_";
pub const CACHE_DIR_NAME: &str = ".cache";
pub const CACHE_FILE_EXTENSION: &str = "hash";
pub const CHUNKS_DIR: &str = "chunks";
pub const DEFAULT_CONFIG_FILE: &str = "aqi-processor.toml";

/// Processing defaults
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Shown whenever the quality cascade had to accept every measurement
pub const LOW_CONFIDENCE_WARNING: &str = "Data may have low confidence due to adverse \
sensing conditions (clouds, aerosols, etc.). Use with caution.";

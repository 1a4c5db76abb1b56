pub mod constants;
pub mod filename;
pub mod progress;
pub mod retention;

pub use constants::*;
pub use filename::{extract_scan_timestamp, surface_output_path};
pub use progress::ProgressReporter;
pub use retention::{storage_stats, RetentionPolicy, StorageStats, SweepReport};

pub mod aqi;
pub mod parallel_processor;
pub mod processing_cache;
pub mod quality_audit;
pub mod quality_filter;
pub mod spatial_index;

pub use aqi::{compute_aqi, AqiCategory};
pub use parallel_processor::{FileOutcome, ParallelProcessor, RunSummary};
pub use processing_cache::{CacheEntry, Fingerprint, ProcessingCache};
pub use quality_audit::{QualityAudit, QualityAuditor};
pub use quality_filter::{filter_by_quality, FilterOutcome, QualityFilter};
pub use spatial_index::{build_index, query_bbox, BoundingBox, CellKey, SpatialIndex};

pub mod measurement_analyzer;

pub use measurement_analyzer::{
    AqiStats, ConcentrationStats, GeographicBounds, MeasurementAnalyzer, MeasurementStatistics,
};

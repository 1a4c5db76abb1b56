pub mod measurement;
pub mod pollutant;
pub mod quality;
pub mod response;

pub use measurement::{Measurement, RawSample};
pub use pollutant::PollutantKind;
pub use quality::{QualityBucket, QualityDistribution, QualityReport, QualityStrategy, Reliability};
pub use response::{AirQualityResponse, DataQualitySummary};

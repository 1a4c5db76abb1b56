use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::{MeasurementAnalyzer, MeasurementStatistics};
use crate::models::{Measurement, PollutantKind, QualityReport, Reliability};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualitySummary {
    pub reliability: Reliability,
    pub total_measurements: usize,
    pub valid_measurements: usize,
    pub quality_threshold: f64,
    pub fallback_used: bool,
}

/// Envelope handed to an API layer. Reliability and warning are meant to be
/// shown verbatim so low-confidence data is never presented as reliable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityResponse {
    pub success: bool,
    pub pollutant: PollutantKind,
    pub generated_at: DateTime<Utc>,
    pub data_quality: DataQualitySummary,
    pub warning: Option<String>,
    pub statistics: Option<MeasurementStatistics>,
    /// First page of kept measurements, original order
    pub measurements: Vec<Measurement>,
    pub has_more: bool,
    pub total_available: usize,
}

impl AirQualityResponse {
    pub fn build(
        pollutant: PollutantKind,
        kept: &[&Measurement],
        report: &QualityReport,
        page_size: usize,
    ) -> Self {
        let statistics = MeasurementAnalyzer::new().calculate_statistics(kept.iter().copied());

        Self {
            success: true,
            pollutant,
            generated_at: Utc::now(),
            data_quality: DataQualitySummary {
                reliability: report.reliability,
                total_measurements: report.total_count,
                valid_measurements: report.kept_count,
                quality_threshold: report.threshold_used,
                fallback_used: report.fallback_triggered,
            },
            warning: report.warning.clone(),
            statistics,
            measurements: kept.iter().take(page_size).map(|&m| m.clone()).collect(),
            has_more: kept.len() > page_size,
            total_available: kept.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QualityStrategy, RawSample};
    use crate::processors::quality_filter::filter_by_quality;
    use chrono::TimeZone;

    fn data(n: usize, quality: f64) -> Vec<Measurement> {
        (0..n)
            .map(|i| {
                Measurement::from_sample(
                    &RawSample {
                        latitude: i as f64 * 0.1,
                        longitude: -90.0,
                        timestamp: Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap(),
                        raw_value: 20.0,
                        quality_flag: Some(quality),
                    },
                    PollutantKind::No2,
                )
            })
            .collect()
    }

    #[test]
    fn test_page_is_capped_in_order() {
        let measurements = data(25, 0.9);
        let (kept, report) = filter_by_quality(&measurements, QualityStrategy::Moderate);
        let response = AirQualityResponse::build(PollutantKind::No2, &kept, &report, 10);

        assert_eq!(response.measurements.len(), 10);
        assert!(response.has_more);
        assert_eq!(response.total_available, 25);
        assert_eq!(response.measurements[3], measurements[3]);
        assert_eq!(response.data_quality.reliability, Reliability::Good);
        assert!(response.warning.is_none());
    }

    #[test]
    fn test_low_confidence_is_surfaced() {
        let measurements = data(3, 0.0);
        let (kept, report) = filter_by_quality(&measurements, QualityStrategy::Strict);
        let response = AirQualityResponse::build(PollutantKind::No2, &kept, &report, 1000);

        assert!(!response.has_more);
        assert!(response.data_quality.fallback_used);
        assert_eq!(response.data_quality.reliability, Reliability::LowConfidence);
        assert!(response.warning.is_some());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data_quality"]["reliability"], "LOW_CONFIDENCE");
    }
}

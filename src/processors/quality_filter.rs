use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::models::{
    Measurement, QualityBucket, QualityDistribution, QualityReport, QualityStrategy, Reliability,
};
use crate::utils::constants::LOW_CONFIDENCE_WARNING;

/// Measurements that passed the filter, borrowed in original order, plus the report.
pub type FilterOutcome<'a> = (Vec<&'a Measurement>, QualityReport);

pub struct QualityFilter {
    strategy: QualityStrategy,
}

impl QualityFilter {
    pub fn new(strategy: QualityStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> QualityStrategy {
        self.strategy
    }

    /// Filter with the configured strategy, relaxing it when nothing passes.
    pub fn filter<'a>(&self, measurements: &'a [Measurement]) -> FilterOutcome<'a> {
        filter_by_quality(measurements, self.strategy)
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &QualityReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Quality Filter Report ===\n");
        summary.push_str(&format!("Total Measurements: {}\n", report.total_count));
        summary.push_str(&format!(
            "Kept Measurements: {} ({:.1}%)\n",
            report.kept_count,
            report.kept_percentage()
        ));
        summary.push_str(&format!(
            "Requested Strategy: {}\n",
            report.requested_strategy
        ));
        summary.push_str(&format!("Strategy Used: {}\n", report.strategy_used));
        summary.push_str(&format!("Reliability: {}\n", report.reliability));
        summary.push_str(&format!(
            "Fallback Triggered: {}\n",
            report.fallback_triggered
        ));

        summary.push_str("\nQuality Distribution:\n");
        for bucket in QualityBucket::ALL {
            summary.push_str(&format!(
                "  {:<10} {:>10} ({:.1}%)\n",
                format!("{:?}", bucket),
                report.distribution.count(bucket),
                report.distribution.percentage(bucket)
            ));
        }

        if let Some(warning) = &report.warning {
            summary.push_str(&format!("\n⚠️  {}\n", warning));
        }

        summary
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(QualityStrategy::default())
    }
}

/// Bucket every measurement by quality. Purely informational.
pub fn analyze_quality_distribution(measurements: &[Measurement]) -> QualityDistribution {
    let mut counts: BTreeMap<QualityBucket, usize> = BTreeMap::new();
    for m in measurements {
        *counts
            .entry(QualityBucket::classify(m.quality()))
            .or_default() += 1;
    }

    QualityDistribution {
        total: measurements.len(),
        counts,
    }
}

/// Keep every measurement whose quality is at least the requested threshold.
///
/// When that leaves nothing, each weaker predefined level is tried in order;
/// the final level accepts everything and marks the report as a fallback.
/// Never fails: empty input yields an empty result with a 0/0 report.
pub fn filter_by_quality(
    measurements: &[Measurement],
    requested: QualityStrategy,
) -> FilterOutcome<'_> {
    let distribution = analyze_quality_distribution(measurements);

    if measurements.is_empty() {
        return (Vec::new(), build_report(0, 0, requested, requested, distribution));
    }

    let mut strategy_used = QualityStrategy::Fallback;
    let mut kept: Vec<&Measurement> = Vec::new();

    for &level in requested.cascade_from() {
        // The last level takes the whole input, whatever the flags say.
        if level == QualityStrategy::Fallback {
            kept = measurements.iter().collect();
            break;
        }

        kept = select(measurements, level.threshold());
        if !kept.is_empty() {
            strategy_used = level;
            break;
        }
        debug!(strategy = level.name(), "no measurements pass quality threshold");
    }

    let report = build_report(
        measurements.len(),
        kept.len(),
        requested,
        strategy_used,
        distribution,
    );

    if report.fallback_triggered {
        warn!(
            total = report.total_count,
            requested = requested.name(),
            "quality cascade exhausted, using all measurements as low confidence"
        );
    } else if report.was_relaxed() {
        warn!(
            kept = report.kept_count,
            requested = requested.name(),
            used = strategy_used.name(),
            "quality threshold relaxed"
        );
    }

    (kept, report)
}

fn select(measurements: &[Measurement], threshold: f64) -> Vec<&Measurement> {
    measurements
        .iter()
        .filter(|m| m.quality() >= threshold)
        .collect()
}

fn build_report(
    total_count: usize,
    kept_count: usize,
    requested: QualityStrategy,
    strategy_used: QualityStrategy,
    distribution: QualityDistribution,
) -> QualityReport {
    let fallback_triggered =
        strategy_used == QualityStrategy::Fallback && requested != QualityStrategy::Fallback;
    let threshold_used = strategy_used.threshold();

    QualityReport {
        total_count,
        kept_count,
        requested_strategy: requested,
        strategy_used,
        threshold_used,
        fallback_triggered,
        reliability: Reliability::from_threshold(threshold_used),
        warning: fallback_triggered.then(|| LOW_CONFIDENCE_WARNING.to_string()),
        distribution,
    }
}

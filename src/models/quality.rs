use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::utils::constants::{
    BUCKET_EXCELLENT_MIN, BUCKET_GOOD_MIN, QUALITY_FALLBACK, QUALITY_MODERATE, QUALITY_PERMISSIVE,
    QUALITY_STRICT,
};

// Same table as `QualityStrategy::CASCADE`, held in a static so `cascade_from`
// can return a `&'static` sub-slice of it.
static CASCADE_ORDER: [QualityStrategy; 4] = QualityStrategy::CASCADE;

/// Predefined quality thresholds, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStrategy {
    Strict,
    #[default]
    Moderate,
    Permissive,
    Fallback,
}

impl QualityStrategy {
    /// Cascade order. Adding an intermediate level is a change to this table only.
    pub const CASCADE: [QualityStrategy; 4] = [
        QualityStrategy::Strict,
        QualityStrategy::Moderate,
        QualityStrategy::Permissive,
        QualityStrategy::Fallback,
    ];

    pub fn threshold(&self) -> f64 {
        match self {
            QualityStrategy::Strict => QUALITY_STRICT,
            QualityStrategy::Moderate => QUALITY_MODERATE,
            QualityStrategy::Permissive => QUALITY_PERMISSIVE,
            QualityStrategy::Fallback => QUALITY_FALLBACK,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QualityStrategy::Strict => "strict",
            QualityStrategy::Moderate => "moderate",
            QualityStrategy::Permissive => "permissive",
            QualityStrategy::Fallback => "fallback",
        }
    }

    /// This level followed by every weaker level, in descending order.
    pub fn cascade_from(&self) -> &'static [QualityStrategy] {
        let start = CASCADE_ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or(CASCADE_ORDER.len() - 1);
        &CASCADE_ORDER[start..]
    }
}

impl FromStr for QualityStrategy {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(QualityStrategy::Strict),
            "moderate" => Ok(QualityStrategy::Moderate),
            "permissive" => Ok(QualityStrategy::Permissive),
            "fallback" | "all" => Ok(QualityStrategy::Fallback),
            other => Err(ProcessingError::UnknownStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for QualityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (>= {})", self.name(), self.threshold())
    }
}

/// Reliability label derived solely from the threshold actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    Excellent,
    Good,
    Acceptable,
    LowConfidence,
}

impl Reliability {
    pub fn from_threshold(threshold: f64) -> Self {
        if threshold >= QUALITY_STRICT {
            Reliability::Excellent
        } else if threshold >= QUALITY_MODERATE {
            Reliability::Good
        } else if threshold >= QUALITY_PERMISSIVE {
            Reliability::Acceptable
        } else {
            Reliability::LowConfidence
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reliability::Excellent => "EXCELLENT",
            Reliability::Good => "GOOD",
            Reliability::Acceptable => "ACCEPTABLE",
            Reliability::LowConfidence => "LOW_CONFIDENCE",
        }
    }
}

impl std::fmt::Display for Reliability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBucket {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityBucket {
    pub const ALL: [QualityBucket; 4] = [
        QualityBucket::Excellent,
        QualityBucket::Good,
        QualityBucket::Fair,
        QualityBucket::Poor,
    ];

    pub fn classify(quality: f64) -> Self {
        if quality >= BUCKET_EXCELLENT_MIN {
            QualityBucket::Excellent
        } else if quality >= BUCKET_GOOD_MIN {
            QualityBucket::Good
        } else if quality > 0.0 {
            QualityBucket::Fair
        } else {
            QualityBucket::Poor
        }
    }
}

/// Informational breakdown of input quality; never affects filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub total: usize,
    pub counts: BTreeMap<QualityBucket, usize>,
}

impl QualityDistribution {
    pub fn count(&self, bucket: QualityBucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    pub fn percentage(&self, bucket: QualityBucket) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.count(bucket) as f64 / self.total as f64
    }

    pub fn all_poor(&self) -> bool {
        self.total > 0 && self.count(QualityBucket::Poor) == self.total
    }
}

/// Outcome metadata of a single filtering call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_count: usize,
    pub kept_count: usize,
    pub requested_strategy: QualityStrategy,
    pub strategy_used: QualityStrategy,
    pub threshold_used: f64,
    pub fallback_triggered: bool,
    pub reliability: Reliability,
    pub warning: Option<String>,
    pub distribution: QualityDistribution,
}

impl QualityReport {
    pub fn was_relaxed(&self) -> bool {
        self.strategy_used != self.requested_strategy
    }

    pub fn kept_percentage(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        100.0 * self.kept_count as f64 / self.total_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_from() {
        assert_eq!(CASCADE_ORDER, QualityStrategy::CASCADE);
        assert_eq!(QualityStrategy::Strict.cascade_from(), &QualityStrategy::CASCADE[..]);
        assert_eq!(
            QualityStrategy::Moderate.cascade_from(),
            &[
                QualityStrategy::Moderate,
                QualityStrategy::Permissive,
                QualityStrategy::Fallback
            ]
        );
        assert_eq!(
            QualityStrategy::Fallback.cascade_from(),
            &[QualityStrategy::Fallback]
        );
    }

    #[test]
    fn test_thresholds_strictly_ordered() {
        for pair in QualityStrategy::CASCADE.windows(2) {
            assert!(pair[0].threshold() > pair[1].threshold());
        }
    }

    #[test]
    fn test_reliability_labels() {
        assert_eq!(Reliability::from_threshold(0.75), Reliability::Excellent);
        assert_eq!(Reliability::from_threshold(0.9), Reliability::Excellent);
        assert_eq!(Reliability::from_threshold(0.5), Reliability::Good);
        assert_eq!(Reliability::from_threshold(0.01), Reliability::Acceptable);
        assert_eq!(Reliability::from_threshold(0.0), Reliability::LowConfidence);
        assert_eq!(Reliability::LowConfidence.to_string(), "LOW_CONFIDENCE");
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(QualityBucket::classify(0.75), QualityBucket::Excellent);
        assert_eq!(QualityBucket::classify(0.74), QualityBucket::Good);
        assert_eq!(QualityBucket::classify(0.5), QualityBucket::Good);
        assert_eq!(QualityBucket::classify(0.001), QualityBucket::Fair);
        assert_eq!(QualityBucket::classify(0.0), QualityBucket::Poor);
        assert_eq!(QualityBucket::classify(f64::NAN), QualityBucket::Poor);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "STRICT".parse::<QualityStrategy>().unwrap(),
            QualityStrategy::Strict
        );
        assert!("best".parse::<QualityStrategy>().is_err());
    }
}

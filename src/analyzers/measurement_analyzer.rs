use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Measurement;
use crate::processors::aqi::AqiCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStatistics {
    pub count: usize,
    pub concentration: Option<ConcentrationStats>,
    pub aqi: Option<AqiStats>,
    pub category_distribution: BTreeMap<AqiCategory, usize>,
    pub geographic_bounds: GeographicBounds,
    pub time_range: (DateTime<Utc>, DateTime<Utc>),
}

/// Over measurements with a valid index; unusable values are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Over measurements that carry an index only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiStats {
    pub max: u16,
    pub mean: f64,
    pub indexed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl MeasurementStatistics {
    pub fn category_percentage(&self, category: AqiCategory) -> f64 {
        let count = self.category_distribution.get(&category).copied().unwrap_or(0);
        if self.count == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.count as f64
    }

    pub fn detailed_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Measurement Statistics ===\n");
        summary.push_str(&format!("Measurements: {}\n", self.count));
        summary.push_str(&format!(
            "Time Range: {} to {}\n",
            self.time_range.0.to_rfc3339(),
            self.time_range.1.to_rfc3339()
        ));

        if let Some(concentration) = &self.concentration {
            summary.push_str("\nConcentration:\n");
            summary.push_str(&format!("  Min:    {:.2}\n", concentration.min));
            summary.push_str(&format!("  Max:    {:.2}\n", concentration.max));
            summary.push_str(&format!("  Mean:   {:.2}\n", concentration.mean));
            summary.push_str(&format!("  Median: {:.2}\n", concentration.median));
        }

        match &self.aqi {
            Some(aqi) => summary.push_str(&format!(
                "\nAQI: max {}, mean {:.0} ({} indexed)\n",
                aqi.max, aqi.mean, aqi.indexed_count
            )),
            None => summary.push_str("\nAQI: no valid index\n"),
        }

        summary.push_str("\nAir Quality Distribution:\n");
        for category in AqiCategory::ALL {
            if let Some(count) = self.category_distribution.get(&category) {
                summary.push_str(&format!(
                    "  {:<32} {:>8} ({:5.1}%)\n",
                    category.label(),
                    count,
                    self.category_percentage(category)
                ));
            }
        }

        let bounds = &self.geographic_bounds;
        summary.push_str("\nGeographic Coverage:\n");
        summary.push_str(&format!(
            "  Latitude:  {:7.2}° to {:7.2}°\n",
            bounds.min_lat, bounds.max_lat
        ));
        summary.push_str(&format!(
            "  Longitude: {:7.2}° to {:7.2}°\n",
            bounds.min_lon, bounds.max_lon
        ));

        summary
    }
}

pub struct MeasurementAnalyzer;

impl MeasurementAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Summary statistics, `None` for an empty sequence.
    pub fn calculate_statistics<'a, I>(&self, measurements: I) -> Option<MeasurementStatistics>
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let measurements: Vec<&Measurement> = measurements.into_iter().collect();
        let first = measurements.first()?;

        let count = measurements.len();

        let mut concentrations: Vec<f64> = measurements
            .iter()
            .filter(|m| m.has_aqi())
            .map(|m| m.concentration)
            .collect();
        concentrations.sort_by(f64::total_cmp);
        let concentration = match (concentrations.first(), concentrations.last()) {
            (Some(&min), Some(&max)) => Some(ConcentrationStats {
                min,
                max,
                mean: concentrations.iter().sum::<f64>() / concentrations.len() as f64,
                median: concentrations[concentrations.len() / 2],
            }),
            _ => None,
        };

        let indices: Vec<u16> = measurements.iter().filter_map(|m| m.aqi).collect();
        let aqi = indices.iter().max().map(|&max| AqiStats {
            max,
            mean: indices.iter().map(|&i| f64::from(i)).sum::<f64>() / indices.len() as f64,
            indexed_count: indices.len(),
        });

        let mut category_distribution: BTreeMap<AqiCategory, usize> = BTreeMap::new();
        for category in measurements.iter().filter_map(|m| m.aqi_category) {
            *category_distribution.entry(category).or_default() += 1;
        }

        let mut bounds = GeographicBounds {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lon: first.longitude,
            max_lon: first.longitude,
        };
        let mut time_range = (first.timestamp, first.timestamp);
        for m in &measurements {
            bounds.min_lat = bounds.min_lat.min(m.latitude);
            bounds.max_lat = bounds.max_lat.max(m.latitude);
            bounds.min_lon = bounds.min_lon.min(m.longitude);
            bounds.max_lon = bounds.max_lon.max(m.longitude);
            time_range.0 = time_range.0.min(m.timestamp);
            time_range.1 = time_range.1.max(m.timestamp);
        }

        Some(MeasurementStatistics {
            count,
            concentration,
            aqi,
            category_distribution,
            geographic_bounds: bounds,
            time_range,
        })
    }
}

impl Default for MeasurementAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

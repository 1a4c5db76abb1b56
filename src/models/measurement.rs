use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PollutantKind;
use crate::processors::aqi::{self, AqiCategory};

/// A sample as yielded by the measurement source, before conversion.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawSample {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    pub timestamp: DateTime<Utc>,

    /// Native unit of the pollutant product (column density, DU, optical depth)
    pub raw_value: f64,

    pub quality_flag: Option<f64>,
}

/// An AQI-annotated measurement.
///
/// The derived concentration, index and category are computed once by
/// [`Measurement::from_sample`] and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Measurement {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    pub timestamp: DateTime<Utc>,

    pub pollutant: PollutantKind,

    pub raw_value: f64,

    pub concentration: f64,

    /// Missing flags are read as `None` and count as quality 0
    #[serde(default)]
    pub quality_flag: Option<f64>,

    pub aqi: Option<u16>,

    pub aqi_category: Option<AqiCategory>,
}

impl Measurement {
    pub fn from_sample(sample: &RawSample, pollutant: PollutantKind) -> Self {
        let concentration = pollutant.to_concentration(sample.raw_value);
        let (aqi, aqi_category) = match aqi::classify(concentration, pollutant) {
            Some((index, category)) => (Some(index), Some(category)),
            None => (None, None),
        };

        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
            pollutant,
            raw_value: sample.raw_value,
            concentration,
            quality_flag: sample.quality_flag,
            aqi,
            aqi_category,
        }
    }

    /// Quality used for filtering. Absent, negative (fill value) and
    /// non-finite flags read as 0, the most conservative value.
    pub fn quality(&self) -> f64 {
        match self.quality_flag {
            Some(q) if q.is_finite() && q >= 0.0 => q,
            _ => 0.0,
        }
    }

    pub fn has_aqi(&self) -> bool {
        self.aqi.is_some()
    }
}

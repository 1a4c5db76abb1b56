use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::models::PollutantKind;
use crate::utils::constants::{AQI_MAX, AQI_MIN};

/// One row of a piecewise-linear AQI table: concentrations in
/// `[c_lo, c_hi]` map linearly onto indices `[i_lo, i_hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_lo: f64,
    pub c_hi: f64,
    pub i_lo: u16,
    pub i_hi: u16,
}

impl Breakpoint {
    const fn new(c_lo: f64, c_hi: f64, i_lo: u16, i_hi: u16) -> Self {
        Self {
            c_lo,
            c_hi,
            i_lo,
            i_hi,
        }
    }

    pub fn contains(&self, concentration: f64) -> bool {
        (self.c_lo..=self.c_hi).contains(&concentration)
    }

    fn interpolate(&self, concentration: f64) -> u16 {
        let slope = f64::from(self.i_hi - self.i_lo) / (self.c_hi - self.c_lo);
        let index = f64::from(self.i_lo) + slope * (concentration - self.c_lo);
        index
            .round_ties_even()
            .clamp(f64::from(AQI_MIN), f64::from(AQI_MAX)) as u16
    }
}

/// NO2 surface concentration, µg/m³
const NO2_BREAKPOINTS: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 53.0, 0, 50),
    Breakpoint::new(54.0, 100.0, 51, 100),
    Breakpoint::new(101.0, 360.0, 101, 150),
    Breakpoint::new(361.0, 649.0, 151, 200),
    Breakpoint::new(650.0, 1249.0, 201, 300),
    Breakpoint::new(1250.0, 2049.0, 301, 500),
];

/// O3 tropospheric concentration, ppb
const O3_BREAKPOINTS: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 54.0, 0, 50),
    Breakpoint::new(55.0, 70.0, 51, 100),
    Breakpoint::new(71.0, 85.0, 101, 150),
    Breakpoint::new(86.0, 105.0, 151, 200),
    Breakpoint::new(106.0, 200.0, 201, 300),
    Breakpoint::new(201.0, 404.0, 301, 500),
];

/// PM2.5 estimated from aerosol optical depth, µg/m³
const PM25_BREAKPOINTS: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 12.0, 0, 50),
    Breakpoint::new(12.1, 35.4, 51, 100),
    Breakpoint::new(35.5, 55.4, 101, 150),
    Breakpoint::new(55.5, 150.4, 151, 200),
    Breakpoint::new(150.5, 250.4, 201, 300),
    Breakpoint::new(250.5, 500.4, 301, 500),
];

pub fn breakpoints(kind: PollutantKind) -> &'static [Breakpoint] {
    match kind {
        PollutantKind::No2 => &NO2_BREAKPOINTS,
        PollutantKind::O3 => &O3_BREAKPOINTS,
        PollutantKind::Aerosol => &PM25_BREAKPOINTS,
    }
}

/// Convert a concentration into a 0-500 index.
///
/// Returns `None` for NaN, infinite or negative input: the index is unknown,
/// not zero. Values falling in the gap between two rows take the upper index
/// of the lower row; values beyond the last row saturate at 500.
///
/// ```
/// use aqi_processor::models::PollutantKind;
/// use aqi_processor::processors::aqi::compute_aqi;
///
/// assert_eq!(compute_aqi(53.0, PollutantKind::No2), Some(50));
/// assert_eq!(compute_aqi(5000.0, PollutantKind::No2), Some(500));
/// assert_eq!(compute_aqi(f64::NAN, PollutantKind::No2), None);
/// ```
pub fn compute_aqi(concentration: f64, kind: PollutantKind) -> Option<u16> {
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }

    let mut previous: Option<&Breakpoint> = None;
    for row in breakpoints(kind) {
        if concentration < row.c_lo {
            return Some(previous.map_or(row.i_lo, |p| p.i_hi));
        }
        if row.contains(concentration) {
            return Some(row.interpolate(concentration));
        }
        previous = Some(row);
    }

    Some(AQI_MAX)
}

/// Index plus category, or `None` when the concentration is unusable.
pub fn classify(concentration: f64, kind: PollutantKind) -> Option<(u16, AqiCategory)> {
    compute_aqi(concentration, kind).map(|aqi| (aqi, AqiCategory::from_index(aqi)))
}

/// Six ordered AQI bands, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Closed integer bands; indices above 500 fall into `Hazardous`.
    pub fn from_index(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn index_range(&self) -> RangeInclusive<u16> {
        match self {
            AqiCategory::Good => 0..=50,
            AqiCategory::Moderate => 51..=100,
            AqiCategory::UnhealthyForSensitiveGroups => 101..=150,
            AqiCategory::Unhealthy => 151..=200,
            AqiCategory::VeryUnhealthy => 201..=300,
            AqiCategory::Hazardous => 301..=AQI_MAX,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

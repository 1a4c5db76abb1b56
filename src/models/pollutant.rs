use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ProcessingError;

/// Pollutant products delivered by the measurement source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PollutantKind {
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "O3")]
    O3,
    /// Aerosol optical depth, used as a PM2.5 proxy
    #[serde(rename = "AEROSOL", alias = "AOD")]
    Aerosol,
}

impl PollutantKind {
    pub const ALL: [PollutantKind; 3] = [PollutantKind::No2, PollutantKind::O3, PollutantKind::Aerosol];

    pub fn code(&self) -> &'static str {
        match self {
            PollutantKind::No2 => "NO2",
            PollutantKind::O3 => "O3",
            PollutantKind::Aerosol => "AEROSOL",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PollutantKind::No2 => "Nitrogen Dioxide",
            PollutantKind::O3 => "Ozone",
            PollutantKind::Aerosol => "Aerosol (PM2.5 proxy)",
        }
    }

    /// Unit of the raw value as delivered by the source.
    pub fn raw_units(&self) -> &'static str {
        match self {
            PollutantKind::No2 => "1e15 molec/cm²",
            PollutantKind::O3 => "DU",
            PollutantKind::Aerosol => "optical depth",
        }
    }

    /// Unit of the derived concentration fed to the AQI tables.
    pub fn concentration_units(&self) -> &'static str {
        match self {
            PollutantKind::No2 => "µg/m³",
            PollutantKind::O3 => "ppb",
            PollutantKind::Aerosol => "µg/m³",
        }
    }

    /// Empirical factor from raw column value to surface/tropospheric concentration.
    ///
    /// NO2 assumes a ~1.5 km mixing layer, O3 assumes ~10% of the total column
    /// is tropospheric at ~0.4 ppb per DU, and aerosol uses a mid-range
    /// AOD-to-PM2.5 scale of 50.
    pub fn conversion_factor(&self) -> f64 {
        match self {
            PollutantKind::No2 => 0.75,
            PollutantKind::O3 => 0.04,
            PollutantKind::Aerosol => 50.0,
        }
    }

    pub fn to_concentration(&self, raw_value: f64) -> f64 {
        raw_value * self.conversion_factor()
    }
}

impl FromStr for PollutantKind {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NO2" => Ok(PollutantKind::No2),
            "O3" => Ok(PollutantKind::O3),
            "AEROSOL" | "AOD" | "AI" => Ok(PollutantKind::Aerosol),
            other => Err(ProcessingError::UnknownPollutant(other.to_string())),
        }
    }
}

impl std::fmt::Display for PollutantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pollutant_from_str() {
        assert_eq!("no2".parse::<PollutantKind>().unwrap(), PollutantKind::No2);
        assert_eq!(" O3 ".parse::<PollutantKind>().unwrap(), PollutantKind::O3);
        assert_eq!("AOD".parse::<PollutantKind>().unwrap(), PollutantKind::Aerosol);
        assert!("SO2".parse::<PollutantKind>().is_err());
    }

    #[test]
    fn test_conversion_factors() {
        assert!((PollutantKind::No2.to_concentration(40.0) - 30.0).abs() < 1e-9);
        assert!((PollutantKind::O3.to_concentration(300.0) - 12.0).abs() < 1e-9);
        assert!((PollutantKind::Aerosol.to_concentration(0.2) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_codes() {
        let json = serde_json::to_string(&PollutantKind::No2).unwrap();
        assert_eq!(json, "\"NO2\"");
        let kind: PollutantKind = serde_json::from_str("\"AOD\"").unwrap();
        assert_eq!(kind, PollutantKind::Aerosol);
    }
}

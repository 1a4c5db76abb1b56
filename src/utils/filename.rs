use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

use crate::models::PollutantKind;
use crate::utils::constants::SURFACE_PREFIX;

const SCAN_TOKEN_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Find the `YYYYMMDDTHHMMSSZ` scan token in a product file name.
///
/// # Examples
/// ```
/// use aqi_processor::utils::filename::extract_scan_timestamp;
///
/// let ts = extract_scan_timestamp("TEMPO_NO2_L2_V04_20251004T152407Z_S005G09.json").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2025-10-04T15:24:07+00:00");
/// ```
pub fn extract_scan_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    stem.split('_')
        .filter(|part| part.len() == 16 && part.as_bytes()[8] == b'T')
        .find_map(|part| NaiveDateTime::parse_from_str(part, SCAN_TOKEN_FORMAT).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Calendar date of the scan token, used by the retention sweep
pub fn extract_scan_date(file_name: &str) -> Option<NaiveDate> {
    extract_scan_timestamp(file_name).map(|ts| ts.date_naive())
}

/// Guess the pollutant from the leading product token (`NO2_`, `O3_`, `AER_`...).
pub fn pollutant_from_filename(file_name: &str) -> Option<PollutantKind> {
    let name = file_name.strip_prefix(SURFACE_PREFIX).unwrap_or(file_name);
    let upper = name.to_uppercase();
    if upper.starts_with("NO2_") {
        Some(PollutantKind::No2)
    } else if upper.starts_with("O3_") || upper.starts_with("O3TOT_") {
        Some(PollutantKind::O3)
    } else if upper.starts_with("AER") || upper.starts_with("AOD_") {
        Some(PollutantKind::Aerosol)
    } else {
        None
    }
}

/// `SURFACE_<stem>.json` inside `output_dir`
pub fn surface_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    output_dir.join(format!("{}{}.json", SURFACE_PREFIX, stem))
}

pub fn is_surface_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SURFACE_PREFIX) && n.ends_with(".json"))
}

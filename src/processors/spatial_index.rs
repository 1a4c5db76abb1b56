use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ProcessingError, Result};
use crate::models::Measurement;
use crate::utils::constants::{GRID_CELL_DEGREES, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Integer coordinates of a 1° x 1° grid cell.
///
/// Assignment uses `floor` on both axes, so latitude -0.5 lies in cell -1 and
/// -1.5 in cell -2; truncation would put -0.5 in cell 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub lat: i32,
    pub lon: i32,
}

impl CellKey {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn containing(latitude: f64, longitude: f64) -> Self {
        Self {
            lat: cell_coordinate(latitude),
            lon: cell_coordinate(longitude),
        }
    }
}

fn cell_coordinate(degrees: f64) -> i32 {
    (degrees / GRID_CELL_DEGREES).floor() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Build from a `[lat_min, lat_max, lon_min, lon_max]` slice, as given on the command line.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [lat_min, lat_max, lon_min, lon_max] => {
                Ok(Self::new(*lat_min, *lat_max, *lon_min, *lon_max))
            }
            _ => Err(ProcessingError::InvalidCoordinate(format!(
                "Bounding box needs 4 values (lat_min lat_max lon_min lon_max), got {}",
                values.len()
            ))),
        }
    }

    /// Inverted or NaN bounds describe an empty box.
    pub fn is_empty(&self) -> bool {
        !(self.lat_min <= self.lat_max && self.lon_min <= self.lon_max)
    }

    /// Inclusive point-in-box test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }

    /// Inclusive cell ranges covering the box, clamped to the globe.
    fn cell_ranges(&self) -> Option<((i32, i32), (i32, i32))> {
        if self.is_empty() {
            return None;
        }
        let lat_lo = self.lat_min.max(MIN_LAT);
        let lat_hi = self.lat_max.min(MAX_LAT);
        let lon_lo = self.lon_min.max(MIN_LON);
        let lon_hi = self.lon_max.min(MAX_LON);
        if lat_lo > lat_hi || lon_lo > lon_hi {
            return None;
        }
        Some((
            (cell_coordinate(lat_lo), cell_coordinate(lat_hi)),
            (cell_coordinate(lon_lo), cell_coordinate(lon_hi)),
        ))
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}]",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

/// Grid index over an immutable measurement slice.
///
/// Holds positions into the slice it was built from. If that slice changes,
/// build a new index; there is no incremental update.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    cells: HashMap<CellKey, Vec<usize>>,
    source_len: usize,
}

impl SpatialIndex {
    /// Single pass, buckets created lazily.
    pub fn build(measurements: &[Measurement]) -> Self {
        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (position, m) in measurements.iter().enumerate() {
            cells
                .entry(CellKey::containing(m.latitude, m.longitude))
                .or_default()
                .push(position);
        }

        Self {
            cells,
            source_len: measurements.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.source_len
    }

    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, key: CellKey) -> &[usize] {
        self.cells.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions in every populated cell overlapping the box, ascending.
    pub fn candidates(&self, bbox: &BoundingBox) -> Vec<usize> {
        let Some(((lat_lo, lat_hi), (lon_lo, lon_hi))) = bbox.cell_ranges() else {
            return Vec::new();
        };

        let cells_in_box =
            (i64::from(lat_hi - lat_lo) + 1) * (i64::from(lon_hi - lon_lo) + 1);
        let in_range = |key: &CellKey| {
            (lat_lo..=lat_hi).contains(&key.lat) && (lon_lo..=lon_hi).contains(&key.lon)
        };

        let mut positions: Vec<usize> = if cells_in_box > self.cells.len() as i64 {
            // Wide boxes: cheaper to walk the populated cells
            self.cells
                .iter()
                .filter(|(key, _)| in_range(key))
                .flat_map(|(_, bucket)| bucket.iter().copied())
                .collect()
        } else {
            let mut found = Vec::new();
            for lat in lat_lo..=lat_hi {
                for lon in lon_lo..=lon_hi {
                    if let Some(bucket) = self.cells.get(&CellKey::new(lat, lon)) {
                        found.extend_from_slice(bucket);
                    }
                }
            }
            found
        };

        positions.sort_unstable();
        positions
    }

    /// Exact subset of `measurements` inside the box, in original order.
    ///
    /// An empty or inverted box returns an empty result.
    pub fn query_bbox<'a>(
        &self,
        measurements: &'a [Measurement],
        bbox: &BoundingBox,
    ) -> Vec<&'a Measurement> {
        if measurements.len() != self.source_len {
            warn!(
                indexed = self.source_len,
                given = measurements.len(),
                "spatial index was built from a different measurement set"
            );
        }

        self.candidates(bbox)
            .into_iter()
            .filter_map(|position| measurements.get(position))
            .filter(|m| bbox.contains(m.latitude, m.longitude))
            .collect()
    }
}

/// Free-function form of [`SpatialIndex::build`].
pub fn build_index(measurements: &[Measurement]) -> SpatialIndex {
    SpatialIndex::build(measurements)
}

/// Free-function form of [`SpatialIndex::query_bbox`].
pub fn query_bbox<'a>(
    index: &SpatialIndex,
    measurements: &'a [Measurement],
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
) -> Vec<&'a Measurement> {
    index.query_bbox(
        measurements,
        &BoundingBox::new(lat_min, lat_max, lon_min, lon_max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PollutantKind, RawSample};
    use chrono::{TimeZone, Utc};

    fn at(latitude: f64, longitude: f64) -> Measurement {
        let sample = RawSample {
            latitude,
            longitude,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap(),
            raw_value: 10.0,
            quality_flag: Some(1.0),
        };
        Measurement::from_sample(&sample, PollutantKind::No2)
    }

    /// Deterministic pseudo-random points, no external RNG needed
    fn scattered(n: usize, seed: u64) -> Vec<Measurement> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|_| at(next() * 20.0 - 10.0, next() * 30.0 - 100.0))
            .collect()
    }

    fn linear_scan<'a>(measurements: &'a [Measurement], bbox: &BoundingBox) -> Vec<&'a Measurement> {
        measurements
            .iter()
            .filter(|m| bbox.contains(m.latitude, m.longitude))
            .collect()
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        assert_eq!(CellKey::containing(-0.5, -0.5), CellKey::new(-1, -1));
        assert_eq!(CellKey::containing(-1.5, -89.2), CellKey::new(-2, -90));
        assert_eq!(CellKey::containing(-1.0, 0.0), CellKey::new(-1, 0));
        assert_eq!(CellKey::containing(0.5, 13.7), CellKey::new(0, 13));
        assert_eq!(CellKey::containing(90.0, 180.0), CellKey::new(90, 180));
    }

    #[test]
    fn test_build_groups_positions_by_cell() {
        let data = vec![at(13.2, -89.5), at(13.9, -89.1), at(-0.5, 0.5), at(14.0, -89.5)];
        let index = SpatialIndex::build(&data);

        assert_eq!(index.len(), 4);
        assert_eq!(index.cell_count(), 3);
        assert_eq!(index.cell(CellKey::new(13, -90)), &[0, 1]);
        assert_eq!(index.cell(CellKey::new(-1, 0)), &[2]);
        assert_eq!(index.cell(CellKey::new(14, -90)), &[3]);
        assert!(index.cell(CellKey::new(50, 50)).is_empty());
    }

    #[test]
    fn test_query_is_exact_at_cell_boundaries() {
        let data = vec![at(13.0, -90.0), at(13.5, -89.5), at(14.0, -87.0), at(14.01, -87.0)];
        let index = build_index(&data);

        let hits = query_bbox(&index, &data, 13.0, 14.0, -90.0, -87.0);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|m| m.latitude <= 14.0));
    }

    #[test]
    fn test_negative_boundary_query() {
        let data = vec![at(-0.5, -0.5), at(-1.5, -1.5), at(0.5, 0.5)];
        let index = build_index(&data);

        let hits = query_bbox(&index, &data, -1.0, 0.0, -1.0, 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].latitude, -0.5);
    }

    #[test]
    fn test_empty_inputs() {
        let index = build_index(&[]);
        assert!(index.is_empty());
        assert!(query_bbox(&index, &[], -90.0, 90.0, -180.0, 180.0).is_empty());

        let data = vec![at(1.0, 1.0)];
        let index = build_index(&data);
        assert!(query_bbox(&index, &data, 5.0, 1.0, 0.0, 2.0).is_empty());
        assert!(query_bbox(&index, &data, 0.0, 2.0, 3.0, -3.0).is_empty());
        assert!(query_bbox(&index, &data, f64::NAN, 2.0, 0.0, 2.0).is_empty());
        assert!(query_bbox(&index, &data, 40.0, 50.0, 40.0, 50.0).is_empty());
    }

    #[test]
    fn test_matches_linear_scan() {
        let data = scattered(2_000, 42);
        let index = build_index(&data);

        let boxes = [
            BoundingBox::new(-3.3, 4.7, -95.2, -80.1),
            BoundingBox::new(0.0, 0.0, -90.0, -90.0),
            BoundingBox::new(-10.0, 10.0, -100.0, -70.0),
            BoundingBox::new(-0.99, -0.01, -88.5, -87.5),
            BoundingBox::new(-90.0, 90.0, -180.0, 180.0),
            BoundingBox::new(-1e9, 1e9, -1e9, 1e9),
            BoundingBox::new(5.5, 5.6, -75.0, -70.0),
        ];

        for bbox in &boxes {
            let expected = linear_scan(&data, bbox);
            let actual = index.query_bbox(&data, bbox);
            assert_eq!(actual, expected, "mismatch for {bbox}");
        }
    }

    #[test]
    fn test_rebuild_answers_identically() {
        let data = scattered(500, 7);
        let first = build_index(&data);
        let second = build_index(&data);

        for bbox in [
            BoundingBox::new(-5.0, 5.0, -95.0, -85.0),
            BoundingBox::new(-10.0, -9.0, -100.0, -99.0),
        ] {
            assert_eq!(first.query_bbox(&data, &bbox), second.query_bbox(&data, &bbox));
        }
    }

    #[test]
    fn test_bbox_from_slice() {
        let bbox = BoundingBox::from_slice(&[13.0, 14.0, -90.0, -87.0]).unwrap();
        assert_eq!(bbox, BoundingBox::new(13.0, 14.0, -90.0, -87.0));
        assert!(BoundingBox::from_slice(&[1.0, 2.0]).is_err());
    }
}

use aqi_processor::models::{AirQualityResponse, PollutantKind, QualityStrategy, Reliability};
use aqi_processor::processors::{
    filter_by_quality, query_bbox, BoundingBox, FileOutcome, ParallelProcessor, ProcessingCache,
    QualityAuditor, RunSummary, SpatialIndex,
};
use aqi_processor::utils::retention::RetentionPolicy;
use aqi_processor::writers::JsonWriter;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use validator::Validate;

fn write_no2_scan(dir: &Path, name: &str, records: &[(f64, f64, f64, f64)]) {
    let measurements: Vec<String> = records
        .iter()
        .map(|(lat, lon, value, quality)| {
            format!(
                r#"{{"latitude": {}, "longitude": {}, "vertical_column": {}, "quality_flag": {}}}"#,
                lat, lon, value, quality
            )
        })
        .collect();
    let body = format!(
        r#"{{"metadata": {{"product": "NO2"}}, "measurements": [{}]}}"#,
        measurements.join(",")
    );
    fs::write(dir.join(name), body).expect("Failed to write source file");
}

// Central America swath: three good pixels, one cloudy pixel outside the box
const SCAN: &[(f64, f64, f64, f64)] = &[
    (13.7, -89.2, 40.0, 0.9),
    (14.1, -87.2, 20.0, 0.6),
    (14.6, -90.5, 80.0, 0.8),
    (40.0, -100.0, 10.0, 0.1),
];

#[tokio::test]
async fn test_incremental_processing_pipeline() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("extracted");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input).unwrap();

    write_no2_scan(&input, "NO2_TEMPO_NO2_L2_V04_20251004T152407Z_S005G09.json", SCAN);
    write_no2_scan(
        &input,
        "NO2_TEMPO_NO2_L2_V04_20251004T162407Z_S006G09.json",
        &[(10.0, -80.0, 15.0, 0.2)],
    );

    let cache = ProcessingCache::open(output.join(".cache")).unwrap();
    let processor = ParallelProcessor::new(2).with_strategy(QualityStrategy::Moderate);

    let (input_dir, output_dir) = (input.clone(), output.clone());
    let (outcomes, processor, cache) = tokio::task::spawn_blocking(move || {
        let outcomes = processor
            .process_directory(&input_dir, &output_dir, &cache, None)
            .unwrap();
        (outcomes, processor, cache)
    })
    .await
    .unwrap();

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);

    let surface = output.join("SURFACE_NO2_TEMPO_NO2_L2_V04_20251004T152407Z_S005G09.json");
    let dataset = JsonWriter::new().read_dataset(&surface).unwrap();
    assert_eq!(dataset.measurements.len(), 4);
    assert_eq!(dataset.metadata.pollutant, PollutantKind::No2);
    assert_eq!(
        dataset.metadata.scan_time,
        Some(Utc.with_ymd_and_hms(2025, 10, 4, 15, 24, 7).unwrap())
    );
    assert_eq!(dataset.metadata.quality.kept_count, 3);
    assert_eq!(dataset.metadata.quality.reliability, Reliability::Good);
    assert!(dataset.measurements.iter().all(|m| m.validate().is_ok()));

    // Nothing changed: every file is skipped
    let second = processor
        .process_directory(&input, &output, &cache, None)
        .unwrap();
    assert_eq!(RunSummary::from_outcomes(&second).skipped, 2);

    // Changed content is picked up again
    write_no2_scan(
        &input,
        "NO2_TEMPO_NO2_L2_V04_20251004T162407Z_S006G09.json",
        &[(10.0, -80.0, 15.0, 0.9)],
    );
    let third = processor
        .process_directory(&input, &output, &cache, None)
        .unwrap();
    let reprocessed: Vec<_> = third
        .iter()
        .filter(|o| matches!(o, FileOutcome::Processed { .. }))
        .map(|o| o.source().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        reprocessed,
        vec!["NO2_TEMPO_NO2_L2_V04_20251004T162407Z_S006G09.json".to_string()]
    );
}

#[test]
fn test_query_and_response_envelope() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("extracted");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input).unwrap();
    write_no2_scan(&input, "NO2_scan_20251004T152407Z.json", SCAN);

    let cache = ProcessingCache::open(output.join(".cache")).unwrap();
    ParallelProcessor::new(1)
        .process_directory(&input, &output, &cache, None)
        .unwrap();

    let dataset = JsonWriter::new()
        .read_dataset(&output.join("SURFACE_NO2_scan_20251004T152407Z.json"))
        .unwrap();

    let index = SpatialIndex::build(&dataset.measurements);
    let bbox = BoundingBox::new(13.0, 15.0, -91.0, -87.0);
    let in_box = index.query_bbox(&dataset.measurements, &bbox);
    let lats: Vec<f64> = in_box.iter().map(|m| m.latitude).collect();
    assert_eq!(lats, vec![13.7, 14.1, 14.6]);

    let via_free_fn = query_bbox(&index, &dataset.measurements, 13.0, 15.0, -91.0, -87.0);
    assert_eq!(via_free_fn.len(), 3);

    let selected: Vec<_> = in_box.into_iter().cloned().collect();
    let (kept, report) = filter_by_quality(&selected, QualityStrategy::Strict);
    assert_eq!(report.kept_count, 2);
    assert!(!report.fallback_triggered);

    let response = AirQualityResponse::build(PollutantKind::No2, &kept, &report, 1);
    assert!(response.success);
    assert!(response.has_more);
    assert_eq!(response.total_available, 2);
    assert_eq!(response.measurements.len(), 1);
    assert_eq!(response.measurements[0].latitude, 13.7);
    assert_eq!(response.data_quality.reliability, Reliability::Excellent);
    assert_eq!(response.statistics.as_ref().map(|s| s.count), Some(2));
}

#[test]
fn test_quality_audit_over_processed_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("extracted");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input).unwrap();

    write_no2_scan(&input, "NO2_clear.json", &[(1.0, 1.0, 30.0, 0.95)]);
    write_no2_scan(&input, "NO2_cloudy.json", &[(2.0, 2.0, 30.0, 0.0)]);

    let cache = ProcessingCache::open(output.join(".cache")).unwrap();
    ParallelProcessor::new(2)
        .process_directory(&input, &output, &cache, None)
        .unwrap();

    let audit = QualityAuditor::new(QualityStrategy::Moderate)
        .audit_directory(&output)
        .unwrap();

    assert_eq!(audit.files_checked, 2);
    assert_eq!(audit.high_quality, 1);
    assert_eq!(audit.low_quality, 1);
    assert!(audit.warnings[0]
        .file
        .ends_with("SURFACE_NO2_cloudy.json"));
}

#[test]
fn test_retention_sweep_spares_recent_and_undated() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path();
    fs::write(dir.join("SURFACE_NO2_20250101T000000Z_S001.json"), "{}").unwrap();
    fs::write(dir.join("SURFACE_NO2_20251018T000000Z_S001.json"), "{}").unwrap();
    fs::write(dir.join("SURFACE_NO2_latest.json"), "{}").unwrap();

    let now = Utc.with_ymd_and_hms(2025, 10, 20, 0, 0, 0).unwrap();
    let report = RetentionPolicy::new(7).sweep(dir, now).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(dir.join("SURFACE_NO2_20251018T000000Z_S001.json").exists());
    assert!(dir.join("SURFACE_NO2_latest.json").exists());
}

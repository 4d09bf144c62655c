//! End-to-end runs of the analysis pipeline over CSV files on disk.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use approx::assert_abs_diff_eq;
use heatlog_telemetry::{
    analysis::AnalysisKind,
    anomaly::AnomalyKind,
    config::{AnalysisConfig, ValueRange},
    engine::{AnalysisOutcome, AnalysisRequest, analyze},
    ingest::read_log,
    metric::Metric,
    report::Report,
    session::SkipReason,
    time::TimeRange,
    warning::WarningKind,
};

const HEADER: &str = "Time,CPU Temperature,GPU Temperature,CPU Usage,GPU Usage\n";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn clock(minute: u32) -> String {
    format!("{:02}:{:02}:00", 20 + minute / 60, minute % 60)
}

/// One row per minute offset, with temperatures between 60 and 70 °C.
fn rows(minutes: impl IntoIterator<Item = u32>) -> String {
    let mut out = String::new();
    for m in minutes {
        let cpu_temp = 60.0 + f64::from(m % 11);
        let gpu_temp = 62.0 + f64::from(m % 7);
        let cpu_usage = 20.0 + f64::from(m % 13) * 3.0;
        let gpu_usage = 40.0 + f64::from(m % 5) * 9.0;
        writeln!(out, "{},{cpu_temp},{gpu_temp},{cpu_usage},{gpu_usage}", clock(m)).unwrap();
    }
    out
}

fn run(paths: &[PathBuf], config: &AnalysisConfig) -> AnalysisOutcome {
    analyze(paths, &AnalysisRequest::default(), config).unwrap()
}

#[test]
fn test_gap_equal_to_threshold_keeps_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let minutes = (0..10).chain(39..49);
    let path = write(dir.path(), "log.csv", &format!("{HEADER}{}", rows(minutes)));
    let outcome = run(&[path], &AnalysisConfig::default());
    assert_eq!(outcome.sessions.len(), 1);
    assert_eq!(outcome.sessions[0].samples, 20);
}

#[test]
fn test_gap_one_minute_over_threshold_splits() {
    let dir = tempfile::tempdir().unwrap();
    let minutes = (0..10).chain(40..50);
    let path = write(dir.path(), "log.csv", &format!("{HEADER}{}", rows(minutes)));
    let outcome = run(&[path], &AnalysisConfig::default());
    assert_eq!(outcome.sessions.len(), 2);
    assert_eq!(
        outcome.sessions.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn test_short_second_session_is_skipped_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let minutes = (0..10).chain(45..48);
    let path = write(dir.path(), "log.csv", &format!("{HEADER}{}", rows(minutes)));
    let outcome = run(&[path], &AnalysisConfig::default());

    assert_eq!(outcome.sessions.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].id, 2);
    assert_eq!(outcome.skipped[0].samples, 3);
    assert_eq!(outcome.skipped[0].reason, SkipReason::TooFewSamples);

    assert!(outcome.warnings.iter().all(|w| w.session != Some(1)));
    let skipped = outcome
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::SkippedSession)
        .collect::<Vec<_>>();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].session, Some(2));
    assert!(skipped[0].to_string().contains("skipped"));
}

#[test]
fn test_corrupted_reading_drops_one_sample() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!(
        "{HEADER}{}{},N/A,64,30,50\n{}",
        rows(0..5),
        clock(5),
        rows(6..10)
    );
    let path = write(dir.path(), "log.csv", &content);
    let outcome = run(&[path], &AnalysisConfig::default());

    let count = |metric| {
        outcome
            .summaries
            .iter()
            .find(|s| s.metric == metric)
            .unwrap()
            .count
    };
    assert_eq!(count(Metric::CpuTemp), 9);
    assert_eq!(count(Metric::GpuTemp), 10);
    let dropped = outcome
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::DroppedSamples)
        .unwrap();
    assert_eq!(dropped.metric, Some(Metric::CpuTemp));
}

#[test]
fn test_alias_headers_resolve_to_same_metric() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig::default();
    let headers = [
        "Time,CPU Temperature",
        "time,cpu_temp",
        "TIME, Cpu  Temp (C) ",
        "Time;CPU Temperature [°C]",
    ];
    for (i, header) in headers.into_iter().enumerate() {
        let sep = if header.contains(';') { ';' } else { ',' };
        let path = write(
            dir.path(),
            &format!("log{i}.csv"),
            &format!("{header}\n20:00:00{sep}61\n20:01:00{sep}62\n"),
        );
        let (log, _) = read_log(&path, &config).unwrap();
        let column = log.schema.column(Metric::CpuTemp).unwrap();
        assert_eq!(column.index, 1, "{header}");
        assert_eq!(log.samples[1].value(Metric::CpuTemp), Some(62.0));
    }
}

#[test]
fn test_single_outlier_flags_one_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from("Time,CPU Temperature,GPU Temperature\n");
    for m in 0..20 {
        let cpu = if m == 10 {
            200.0
        } else if m % 2 == 0 {
            40.0
        } else {
            60.0
        };
        let gpu = 50.0 + f64::from(m % 5);
        writeln!(content, "{},{cpu},{gpu}", clock(m)).unwrap();
    }
    let path = write(dir.path(), "log.csv", &content);
    let config = AnalysisConfig {
        valid_temp_range: ValueRange::new(0.0, 250.0),
        ..AnalysisConfig::default()
    };
    let request = AnalysisRequest {
        kinds: vec![AnalysisKind::Anomaly],
        sensitivity: Some(2.0),
        ..AnalysisRequest::default()
    };
    let outcome = analyze(&[path], &request, &config).unwrap();

    assert_eq!(outcome.anomalies.len(), 1);
    let event = &outcome.anomalies[0];
    assert_eq!(event.metric, Metric::CpuTemp);
    assert_eq!(event.kind, AnomalyKind::High);
    assert_eq!(event.samples, 1);
    assert_abs_diff_eq!(event.peak_value, 200.0);
}

#[test]
fn test_out_of_validity_range_is_dropped_not_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from("Time,CPU Temperature\n");
    for m in 0..20 {
        let cpu = if m == 10 { 200.0 } else { 50.0 + f64::from(m % 3) };
        writeln!(content, "{},{cpu}", clock(m)).unwrap();
    }
    let path = write(dir.path(), "log.csv", &content);
    let outcome = run(&[path], &AnalysisConfig::default());

    assert!(outcome.anomalies.is_empty());
    assert_eq!(outcome.summaries[0].count, 19);
}

#[test]
fn test_identical_and_negated_series_correlate() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from(HEADER);
    for m in 0..15 {
        let temp = 60.0 + f64::from(m * 7 % 11);
        let usage = 10.0 + f64::from(m * 5 % 9) * 8.0;
        writeln!(content, "{},{temp},{temp},{usage},{}", clock(m), 100.0 - usage).unwrap();
    }
    let path = write(dir.path(), "log.csv", &content);
    let request = AnalysisRequest {
        kinds: vec![AnalysisKind::Correlation],
        ..AnalysisRequest::default()
    };
    let outcome = analyze(&[path], &request, &AnalysisConfig::default()).unwrap();

    let coefficient = |a, b| {
        outcome
            .correlations
            .iter()
            .find(|c| c.metric_a == a && c.metric_b == b)
            .unwrap()
            .coefficient
    };
    assert_abs_diff_eq!(coefficient(Metric::CpuTemp, Metric::GpuTemp), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(coefficient(Metric::CpuUsage, Metric::GpuUsage), -1.0, epsilon = 1e-9);
    // four metrics, six pairs
    assert_eq!(outcome.correlations.len(), 6);
}

#[test]
fn test_time_range_outside_data_warns_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "log.csv", &format!("{HEADER}{}", rows(0..20)));
    let request = AnalysisRequest {
        time_range: TimeRange::morning(),
        kinds: vec![AnalysisKind::Statistics],
        ..AnalysisRequest::default()
    };
    let outcome = analyze(&[path], &request, &AnalysisConfig::default()).unwrap();

    assert!(outcome.summaries.is_empty());
    assert_eq!(
        outcome
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::InsufficientData)
            .count(),
        4
    );
}

#[test]
fn test_unreadable_and_valid_files_together() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write(dir.path(), "empty.csv", "");
    let fan_only = write(dir.path(), "fans.csv", "Time,Fan Speed\n20:00:00,1200\n");
    let good = write(dir.path(), "good.csv", &format!("{HEADER}{}", rows(0..10)));
    let outcome = run(&[empty, fan_only, good], &AnalysisConfig::default());

    assert_eq!(outcome.sessions.len(), 1);
    let ingestion = outcome
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::Ingestion)
        .collect::<Vec<_>>();
    assert_eq!(ingestion.len(), 2);
    assert!(ingestion[0].source.ends_with("empty.csv"));
    assert!(ingestion[1].source.ends_with("fans.csv"));
}

#[test]
fn test_report_keeps_outcome_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "log.csv", &format!("{HEADER}{}", rows(0..20)));
    let config = AnalysisConfig::default();
    let request = AnalysisRequest::default();
    let outcome = analyze(&[path], &request, &config).unwrap();
    let report = Report::new(&outcome, &request, &config);

    assert_eq!(report.summaries, outcome.summaries);
    assert_eq!(report.trends, outcome.trends);
    assert_eq!(
        report
            .correlations
            .iter()
            .map(|c| c.result.clone())
            .collect::<Vec<_>>(),
        outcome.correlations
    );
    let text = report.render_text();
    assert!(text.contains("log.csv"));
    assert!(text.contains("cpu_temp / gpu_temp"));
}

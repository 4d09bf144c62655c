//! Offline analysis of hardware-monitor CSV logs.
//!
//! This crate turns the CSV logs written by PC hardware monitors (CPU/GPU
//! temperature, usage and power readings) into a structured report: per-metric
//! statistics, anomalous periods, long-horizon trends and cross-metric
//! correlations, each broken down by recording session.
//!
//! # Overview
//!
//! A request flows through a fixed pipeline:
//!
//! 1. **Ingestion** ([`ingest::read_log`]): Decode one file, sniff its delimiter,
//!    resolve header names to metrics ([`schema::Schema`]) and parse timestamps
//!    ([`time::TimeParser`]) into [`sample::Sample`]s
//! 2. **Segmentation** ([`session::Segmenter`]): Merge all files and split them
//!    into sessions wherever the time gap exceeds the configured threshold
//! 3. **Cleaning** ([`clean::Cleaner`]): Drop missing and physically impossible
//!    readings and resample to a fixed bucket
//! 4. **Analysis** ([`analysis::AnalysisKind`]): Run statistics, trend, anomaly
//!    and correlation analysis on each session
//! 5. **Reporting** ([`report::Report`]): Gather the results in a serializable
//!    payload that also renders as plain text
//!
//! [`engine::analyze`] runs all of it. Files are read in parallel and sessions
//! are analysed in parallel; the outcome is identical to a sequential run.
//!
//! Nothing that goes wrong with a single file or session aborts the request.
//! Problems are recorded as [`warning::Warning`]s and carried in the report.
//!
//! # Modules
//!
//! - [`metric`]: The canonical metrics and metric groups
//! - [`config`]: Tunable analysis parameters
//! - [`time`]: Timestamps, timestamp parsing and time-of-day ranges
//! - [`schema`]: Column-name classification
//! - [`sample`]: Per-row readings
//! - [`ingest`]: File reading and parsing
//! - [`session`]: Session segmentation
//! - [`clean`]: Series cleaning and resampling
//! - [`statistics`], [`trend`], [`anomaly`], [`correlation`]: The analyses
//! - [`analysis`]: Uniform dispatch over the analyses
//! - [`engine`]: The full pipeline
//! - [`report`]: Report payload and text rendering
//! - [`warning`]: Non-fatal problems
//!
//! # Examples
//!
//! ```no_run
//! use heatlog_telemetry::{
//!     config::AnalysisConfig,
//!     engine::{AnalysisRequest, analyze},
//!     report::Report,
//!     time::TimeRange,
//! };
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let config = AnalysisConfig::default();
//! let request = AnalysisRequest {
//!     time_range: TimeRange::evening(),
//!     ..AnalysisRequest::default()
//! };
//! let outcome = analyze(&["logs/monday.csv", "logs/tuesday.csv"], &request, &config)?;
//!
//! for trend in &outcome.trends {
//!     println!("session {} {}: {}", trend.session, trend.metric, trend.direction);
//! }
//! print!("{}", Report::new(&outcome, &request, &config).render_text());
//! # Ok(())
//! # }
//! ```
//!
//! Column names are matched by keyword, so differently named exports resolve
//! to the same metric:
//!
//! ```
//! use heatlog_telemetry::{metric::Metric, schema::{ColumnRole, classify_column}};
//!
//! for name in ["GPU Temperature", "gpu_temp", "GPU Temp [°C]"] {
//!     let matched = classify_column(name).unwrap();
//!     assert_eq!(matched.role, ColumnRole::Metric(Metric::GpuTemp));
//! }
//! ```

pub mod analysis;
pub mod anomaly;
pub mod clean;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod ingest;
pub mod metric;
pub mod report;
pub mod sample;
pub mod schema;
pub mod session;
pub mod statistics;
pub mod time;
pub mod trend;
pub mod warning;

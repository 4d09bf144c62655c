//! Statistical utilities for the heatlog telemetry analyzer.
//!
//! This crate provides the numeric kernels the analysis engine is built on.
//! Everything here works on plain `f64` slices and knows nothing about
//! timestamps, sessions or hardware metrics.
//!
//! - **Descriptive statistics**: mean, median, sample variance, standard deviation, min/max
//! - **Percentiles**: nearest-rank percentile lookup
//! - **Regression**: least-squares line fitting for trend slopes
//! - **Correlation**: Pearson correlation of paired observations
//! - **Smoothing**: trailing simple moving average
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`regression`]: Ordinary least-squares fitting
//! - [`correlation`]: Pearson correlation coefficient
//! - [`smoothing`]: Moving averages
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use heatlog_stats::descriptive::DescriptiveStats;
//!
//! let values = [61.0, 63.0, 65.0, 67.0, 69.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 65.0);
//! assert_eq!(stats.median, 65.0);
//! ```
//!
//! ## Fitting a trend
//!
//! ```
//! use heatlog_stats::regression::LinearFit;
//!
//! // (minutes, °C)
//! let fit = LinearFit::from_points([(0.0, 60.0), (10.0, 62.0), (20.0, 64.0)]).unwrap();
//! assert!((fit.slope - 0.2).abs() < 1e-12);
//! ```
//!
//! ## Correlating two series
//!
//! ```
//! use heatlog_stats::correlation::pearson;
//!
//! let gpu_usage = [40.0, 60.0, 80.0, 99.0];
//! let gpu_temp = [55.0, 63.0, 71.0, 78.0];
//! assert!(pearson(&gpu_usage, &gpu_temp).unwrap() > 0.99);
//! ```

pub mod correlation;
pub mod descriptive;
pub mod percentiles;
pub mod regression;
pub mod smoothing;

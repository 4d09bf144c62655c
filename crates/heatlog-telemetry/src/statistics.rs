//! Descriptive statistics of cleaned series.

use heatlog_stats::{descriptive::DescriptiveStats, percentiles::Percentiles};
use serde::Serialize;

use crate::{clean::CleanedSeries, metric::Metric};

const PERCENTILES: [f64; 2] = [5.0, 95.0];

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("{metric} has {count} point(s) in the selected range, {required} required")]
pub struct InsufficientDataError {
    pub metric: Metric,
    pub count: usize,
    pub required: usize,
}

/// Summary of one metric within one session and time range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSummary {
    pub session: usize,
    pub metric: Metric,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for a single value.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p05: f64,
    pub p95: f64,
}

impl StatSummary {
    /// Summarizes `series`.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientDataError`] when the series is empty.
    pub fn compute(session: usize, series: &CleanedSeries) -> Result<Self, InsufficientDataError> {
        let mut values = series.values();
        values.sort_by(f64::total_cmp);
        let stats = DescriptiveStats::from_sorted(&values).ok_or(InsufficientDataError {
            metric: series.metric(),
            count: 0,
            required: 1,
        })?;
        let percentiles = Percentiles::from_sorted(&values, &PERCENTILES);
        Ok(Self {
            session,
            metric: series.metric(),
            count: stats.count,
            mean: stats.mean,
            median: stats.median,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
            p05: percentiles.get(5.0).unwrap_or(stats.min),
            p95: percentiles.get(95.0).unwrap_or(stats.max),
        })
    }

    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

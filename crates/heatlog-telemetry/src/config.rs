//! Tunable parameters of one analysis request.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::metric::MetricKind;

/// Inclusive `[min, max]` interval of accepted values.
///
/// Serialized as a two-element array (`[0.0, 120.0]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl From<[f64; 2]> for ValueRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<ValueRange> for [f64; 2] {
    fn from(range: ValueRange) -> Self {
        [range.min, range.max]
    }
}

/// Rule used to flag anomalous samples.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyMethod {
    /// `|value - mean| > sensitivity * std_dev`.
    #[default]
    ZScore,
    /// Values in the top or bottom `peak_range_fraction` of the distance
    /// between the mean and the observed extremes.
    PeakRange,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("{field} is below its minimum")]
    NotPositive { field: &'static str },
    #[display("{field} must be a finite [min, max] pair with min <= max")]
    InvalidRange { field: &'static str },
    #[display("peak_range_fraction must be in (0, 1], got {value}")]
    PeakFraction { value: f64 },
}

/// Configuration of the analysis pipeline.
///
/// Every field has a default, so a JSON file only needs to list the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// A gap strictly longer than this starts a new session.
    pub session_gap_minutes: u32,
    pub resample_bucket_seconds: u32,
    pub valid_temp_range: ValueRange,
    pub valid_usage_range: ValueRange,
    pub valid_power_range: ValueRange,
    /// Rendering hint for temperature plots. Never used to drop data.
    pub display_temp_range: ValueRange,
    pub anomaly_sensitivity: f64,
    pub anomaly_method: AnomalyMethod,
    pub peak_range_fraction: f64,
    pub trend_window: usize,
    /// Absolute slope per minute under which a trend counts as stable.
    pub trend_stable_slope: f64,
    pub min_session_samples: usize,
    pub correlation_min_overlap: usize,
    pub column_match_threshold: f64,
    pub max_file_bytes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: 30,
            resample_bucket_seconds: 60,
            valid_temp_range: ValueRange::new(0.0, 120.0),
            valid_usage_range: ValueRange::new(0.0, 100.0),
            valid_power_range: ValueRange::new(0.0, 2000.0),
            display_temp_range: ValueRange::new(40.0, 90.0),
            anomaly_sensitivity: 2.0,
            anomaly_method: AnomalyMethod::ZScore,
            peak_range_fraction: 0.8,
            trend_window: 10,
            trend_stable_slope: 0.05,
            min_session_samples: 5,
            correlation_min_overlap: 3,
            column_match_threshold: 0.5,
            max_file_bytes: 64 * 1024 * 1024,
        }
    }
}

impl AnalysisConfig {
    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("session_gap_minutes", self.session_gap_minutes > 0),
            ("resample_bucket_seconds", self.resample_bucket_seconds > 0),
            ("anomaly_sensitivity", self.anomaly_sensitivity > 0.0),
            ("trend_window", self.trend_window > 0),
            ("trend_stable_slope", self.trend_stable_slope >= 0.0),
            ("min_session_samples", self.min_session_samples > 0),
            ("correlation_min_overlap", self.correlation_min_overlap >= 2),
            ("column_match_threshold", self.column_match_threshold > 0.0),
            ("max_file_bytes", self.max_file_bytes > 0),
        ];
        if let Some((field, _)) = positive.into_iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::NotPositive { field });
        }

        let ranges = [
            ("valid_temp_range", self.valid_temp_range),
            ("valid_usage_range", self.valid_usage_range),
            ("valid_power_range", self.valid_power_range),
            ("display_temp_range", self.display_temp_range),
        ];
        if let Some((field, _)) = ranges.into_iter().find(|(_, r)| !r.is_valid()) {
            return Err(ConfigError::InvalidRange { field });
        }

        if !(self.peak_range_fraction > 0.0 && self.peak_range_fraction <= 1.0) {
            return Err(ConfigError::PeakFraction {
                value: self.peak_range_fraction,
            });
        }
        Ok(())
    }

    /// Validity range applied to metrics of `kind` while cleaning.
    #[must_use]
    pub fn valid_range(&self, kind: MetricKind) -> ValueRange {
        match kind {
            MetricKind::Temperature => self.valid_temp_range,
            MetricKind::Usage => self.valid_usage_range,
            MetricKind::Power => self.valid_power_range,
        }
    }

    #[must_use]
    pub fn session_gap(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.session_gap_minutes))
    }

    #[must_use]
    pub fn resample_bucket(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.resample_bucket_seconds))
    }
}

//! Detection of unusually high or low readings.
//!
//! A [`DeviationRule`] decides, point by point, whether a value is anomalous.
//! Two rules are available:
//!
//! - [`ZScoreRule`]: `|value - mean| > sensitivity * std_dev`, using the
//!   global mean and sample standard deviation of the series.
//! - [`PeakRangeRule`]: the high/low period rule of desktop temperature
//!   viewers. A value is high when `value >= mean + f * (max - mean)` and low
//!   when `value <= mean - f * (mean - min)`.
//!
//! Consecutive flagged points of the same kind are merged into a single
//! [`AnomalyEvent`], so a five-minute thermal spike is one event rather than
//! five. Events are produced lazily by [`AnomalyEvents`].

use std::{iter::Peekable, slice};

use heatlog_stats::descriptive::DescriptiveStats;
use serde::Serialize;

use crate::{
    clean::{CleanedSeries, SeriesPoint},
    config::{AnalysisConfig, AnomalyMethod},
    metric::Metric,
    time::Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    #[display("high")]
    High,
    #[display("low")]
    Low,
}

/// A run of consecutive anomalous points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub session: usize,
    pub metric: Metric,
    pub kind: AnomalyKind,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Time of the most extreme value in the event.
    pub peak_time: Timestamp,
    pub peak_value: f64,
    /// Number of flagged points merged into this event.
    pub samples: usize,
    /// Largest deviation in the event, in standard deviations.
    pub severity: f64,
}

/// Per-point anomaly classification.
pub trait DeviationRule {
    /// Returns the kind and severity if `value` is anomalous.
    fn classify(&self, value: f64) -> Option<(AnomalyKind, f64)>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreRule {
    mean: f64,
    std_dev: f64,
    sensitivity: f64,
}

impl ZScoreRule {
    /// Fits the rule to `values`. Returns `None` for an empty slice.
    #[must_use]
    pub fn fit(values: &[f64], sensitivity: f64) -> Option<Self> {
        let stats = DescriptiveStats::new(values.iter().copied())?;
        Some(Self {
            mean: stats.mean,
            std_dev: stats.std_dev,
            sensitivity,
        })
    }
}

impl DeviationRule for ZScoreRule {
    fn classify(&self, value: f64) -> Option<(AnomalyKind, f64)> {
        if self.std_dev <= 0.0 {
            return None;
        }
        let deviation = value - self.mean;
        if deviation.abs() <= self.sensitivity * self.std_dev {
            return None;
        }
        let kind = if deviation > 0.0 {
            AnomalyKind::High
        } else {
            AnomalyKind::Low
        };
        Some((kind, deviation.abs() / self.std_dev))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRangeRule {
    high: f64,
    low: f64,
    std_dev: f64,
}

impl PeakRangeRule {
    /// Fits the rule to `values`.
    ///
    /// Returns `None` for an empty or flat series, where every value would
    /// sit on both thresholds.
    #[must_use]
    pub fn fit(values: &[f64], fraction: f64) -> Option<Self> {
        let stats = DescriptiveStats::new(values.iter().copied())?;
        if stats.range() <= 0.0 {
            return None;
        }
        Some(Self {
            high: stats.mean + fraction * (stats.max - stats.mean),
            low: stats.mean - fraction * (stats.mean - stats.min),
            std_dev: stats.std_dev,
        })
    }

    fn severity(&self, distance: f64) -> f64 {
        if self.std_dev > 0.0 {
            distance / self.std_dev
        } else {
            0.0
        }
    }
}

impl DeviationRule for PeakRangeRule {
    fn classify(&self, value: f64) -> Option<(AnomalyKind, f64)> {
        if value >= self.high {
            Some((AnomalyKind::High, self.severity(value - self.high)))
        } else if value <= self.low {
            Some((AnomalyKind::Low, self.severity(self.low - value)))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyDetector {
    method: AnomalyMethod,
    sensitivity: f64,
    peak_fraction: f64,
}

impl AnomalyDetector {
    #[must_use]
    pub fn new(method: AnomalyMethod, sensitivity: f64, peak_fraction: f64) -> Self {
        Self {
            method,
            sensitivity,
            peak_fraction,
        }
    }

    /// Detector configured from `config`, with an optional sensitivity override.
    #[must_use]
    pub fn from_config(config: &AnalysisConfig, sensitivity: Option<f64>) -> Self {
        Self::new(
            config.anomaly_method,
            sensitivity.unwrap_or(config.anomaly_sensitivity),
            config.peak_range_fraction,
        )
    }

    /// Lazily yields the anomaly events of `series` in time order.
    #[must_use]
    pub fn detect<'a>(&self, session: usize, series: &'a CleanedSeries) -> AnomalyEvents<'a> {
        let values = series.values();
        let rule: Option<Box<dyn DeviationRule + Send + Sync>> = match self.method {
            AnomalyMethod::ZScore => ZScoreRule::fit(&values, self.sensitivity)
                .map(|r| Box::new(r) as Box<dyn DeviationRule + Send + Sync>),
            AnomalyMethod::PeakRange => PeakRangeRule::fit(&values, self.peak_fraction)
                .map(|r| Box::new(r) as Box<dyn DeviationRule + Send + Sync>),
        };
        AnomalyEvents {
            session,
            metric: series.metric(),
            rule,
            points: series.points().iter().peekable(),
        }
    }
}

/// Iterator over the anomaly events of one series.
pub struct AnomalyEvents<'a> {
    session: usize,
    metric: Metric,
    rule: Option<Box<dyn DeviationRule + Send + Sync>>,
    points: Peekable<slice::Iter<'a, SeriesPoint>>,
}

impl Iterator for AnomalyEvents<'_> {
    type Item = AnomalyEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let rule = self.rule.as_deref()?;
        let (first, kind, severity) = self.points.by_ref().find_map(|p| {
            let (kind, severity) = rule.classify(p.value)?;
            Some((p, kind, severity))
        })?;

        let mut event = AnomalyEvent {
            session: self.session,
            metric: self.metric,
            kind,
            start: first.time,
            end: first.time,
            peak_time: first.time,
            peak_value: first.value,
            samples: 1,
            severity,
        };
        while let Some(point) = self.points.peek() {
            let Some((next_kind, next_severity)) = rule.classify(point.value) else {
                break;
            };
            if next_kind != kind {
                break;
            }
            let more_extreme = match kind {
                AnomalyKind::High => point.value > event.peak_value,
                AnomalyKind::Low => point.value < event.peak_value,
            };
            if more_extreme {
                event.peak_time = point.time;
                event.peak_value = point.value;
            }
            event.end = point.time;
            event.samples += 1;
            event.severity = event.severity.max(next_severity);
            self.points.next();
        }
        Some(event)
    }
}

/// Order in which anomaly events are listed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyOrder {
    /// By start time.
    #[default]
    Time,
    /// Most severe first.
    Severity,
}

/// Sorts `events` in place. The sort is stable.
pub fn sort_events(events: &mut [AnomalyEvent], order: AnomalyOrder) {
    match order {
        AnomalyOrder::Time => events.sort_by_key(|e| e.start),
        AnomalyOrder::Severity => events.sort_by(|a, b| b.severity.total_cmp(&a.severity)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};

    use super::*;

    fn series(values: &[f64]) -> CleanedSeries {
        let base = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        CleanedSeries::new(
            Metric::CpuTemp,
            values
                .iter()
                .zip(0..)
                .map(|(v, i)| SeriesPoint {
                    time: Timestamp::Clock(base + TimeDelta::minutes(i)),
                    value: *v,
                })
                .collect(),
        )
    }

    fn z_score(sensitivity: f64) -> AnomalyDetector {
        AnomalyDetector::new(AnomalyMethod::ZScore, sensitivity, 0.8)
    }

    #[test]
    fn test_single_extreme_outlier() {
        let mut values = (0..=20).map(|i| 20.0 + 3.0 * f64::from(i)).collect::<Vec<_>>();
        values.insert(10, 200.0);
        let s = series(&values);
        let events = z_score(2.0).detect(1, &s).collect::<Vec<_>>();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AnomalyKind::High);
        assert_eq!(events[0].peak_value, 200.0);
        assert_eq!(events[0].samples, 1);
        assert!(events[0].severity > 2.0);
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        let s = series(&[50.0; 20]);
        assert_eq!(z_score(2.0).detect(1, &s).count(), 0);
        let peak = AnomalyDetector::new(AnomalyMethod::PeakRange, 2.0, 0.8);
        assert_eq!(peak.detect(1, &s).count(), 0);
    }

    #[test]
    fn test_contiguous_points_merge() {
        let mut values = vec![50.0; 30];
        values[10] = 95.0;
        values[11] = 99.0;
        values[12] = 96.0;
        values[20] = 5.0;
        let s = series(&values);
        let events = z_score(2.0).detect(7, &s).collect::<Vec<_>>();
        assert_eq!(events.len(), 2);

        let high = &events[0];
        assert_eq!(high.session, 7);
        assert_eq!(high.kind, AnomalyKind::High);
        assert_eq!(high.samples, 3);
        assert_eq!(high.start, s.points()[10].time);
        assert_eq!(high.end, s.points()[12].time);
        assert_eq!(high.peak_time, s.points()[11].time);
        assert_eq!(high.peak_value, 99.0);

        assert_eq!(events[1].kind, AnomalyKind::Low);
    }

    #[test]
    fn test_threshold_is_strict() {
        // a value exactly on the threshold is not flagged
        let values = [-1.0, 1.0, -1.0, 1.0];
        let rule = ZScoreRule::fit(&values, 1.0).unwrap();
        assert!(rule.classify(rule.mean + rule.sensitivity * rule.std_dev).is_none());
    }

    #[test]
    fn test_peak_range_rule() {
        // mean 50, max 90, min 10
        let rule = PeakRangeRule::fit(&[10.0, 50.0, 50.0, 50.0, 90.0], 0.8).unwrap();
        assert_eq!(rule.classify(82.0).map(|(k, _)| k), Some(AnomalyKind::High));
        assert_eq!(rule.classify(81.0), None);
        assert_eq!(rule.classify(18.0).map(|(k, _)| k), Some(AnomalyKind::Low));
        assert_eq!(rule.classify(50.0), None);
    }

    #[test]
    fn test_sort_by_severity() {
        let mut values = vec![50.0; 40];
        values[5] = 80.0;
        values[25] = 120.0;
        let s = series(&values);
        let mut events = z_score(2.0).detect(1, &s).collect::<Vec<_>>();
        sort_events(&mut events, AnomalyOrder::Severity);
        assert_eq!(events[0].peak_value, 120.0);
        sort_events(&mut events, AnomalyOrder::Time);
        assert_eq!(events[0].peak_value, 80.0);
    }
}

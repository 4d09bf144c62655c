//! Cleaning and resampling of session samples.
//!
//! For every metric of a session the [`Cleaner`]:
//!
//! - drops samples whose value is missing,
//! - drops samples outside the metric's validity range (rejected, never
//!   clamped, so statistics are not biased towards the bounds),
//! - averages the rest into fixed-width time buckets.
//!
//! Resampling always happens here, before any statistic is computed, so
//! every downstream analysis sees the same series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::TimeDelta;
use serde::Serialize;

use crate::{
    config::AnalysisConfig,
    metric::{Metric, MetricGroup},
    session::Session,
    time::{TimeBase, TimeRange, Timestamp},
    warning::{Warning, WarningKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: Timestamp,
    pub value: f64,
}

/// Valid, resampled values of one metric in one session.
///
/// Timestamps are strictly increasing and every value lies within the
/// metric's validity range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedSeries {
    metric: Metric,
    points: Vec<SeriesPoint>,
}

impl CleanedSeries {
    /// Builds a series from points sorted by strictly increasing time.
    #[must_use]
    pub fn new(metric: Metric, points: Vec<SeriesPoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].time < w[1].time));
        Self { metric, points }
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Points inside `range`, as a new series.
    #[must_use]
    pub fn restrict(&self, range: &TimeRange) -> Self {
        if range.is_all() {
            return self.clone();
        }
        Self {
            metric: self.metric,
            points: self
                .points
                .iter()
                .filter(|p| range.contains(p.time))
                .copied()
                .collect(),
        }
    }
}

/// Averages `points` into buckets of width `bucket`.
///
/// Buckets are aligned to multiples of `bucket` since the Unix epoch and
/// each output point is stamped with its bucket start. Empty buckets leave
/// a gap. `points` must be sorted by time. Index timestamps are kept as is.
///
/// Resampling a resampled series with the same width returns it unchanged.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn resample(points: &[SeriesPoint], bucket: TimeDelta) -> Vec<SeriesPoint> {
    let mut out: Vec<SeriesPoint> = vec![];
    let mut count = 0_usize;
    let mut sum = 0.0;
    for point in points {
        let time = point.time.floor_to(bucket);
        match out.last_mut() {
            Some(last) if last.time == time => {
                count += 1;
                sum += point.value;
                last.value = sum / count as f64;
            }
            _ => {
                count = 1;
                sum = point.value;
                out.push(SeriesPoint {
                    time,
                    value: point.value,
                });
            }
        }
    }
    out
}

/// Per-metric sample accounting of one cleaning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricCleaning {
    pub input: usize,
    pub missing: usize,
    pub out_of_range: usize,
    pub kept: usize,
    /// Points after resampling.
    pub resampled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: usize,
    pub source: String,
    pub time_base: TimeBase,
    pub start: Timestamp,
    pub end: Timestamp,
    pub samples: usize,
}

impl SessionInfo {
    fn of(session: &Session) -> Self {
        let start = session.start().unwrap_or(Timestamp::Index(0));
        Self {
            id: session.id,
            source: session.source.clone(),
            time_base: session.time_base,
            start,
            end: session.end().unwrap_or(start),
            samples: session.samples.len(),
        }
    }

    /// Duration between the first and last sample, for clock sessions.
    #[must_use]
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.end.clock()? - self.start.clock()?)
    }
}

/// A session after cleaning: one series per metric that kept any data.
#[derive(Debug, Clone)]
pub struct CleanedSession {
    pub info: SessionInfo,
    pub series: BTreeMap<Metric, CleanedSeries>,
    pub cleaning: BTreeMap<Metric, MetricCleaning>,
    /// Problems found while cleaning, not yet logged.
    pub warnings: Vec<Warning>,
}

/// A session with no usable data for any selected metric.
#[derive(Debug, Clone)]
pub struct InvalidSession {
    pub info: SessionInfo,
    pub reason: String,
}

impl InvalidSession {
    #[must_use]
    pub fn warning(&self) -> Warning {
        Warning::new(
            WarningKind::InvalidSession,
            &self.info.source,
            format!("session excluded: {}", self.reason),
        )
        .with_session(self.info.id)
    }
}

#[derive(Debug, Clone)]
pub struct Cleaner<'a> {
    config: &'a AnalysisConfig,
    metrics: BTreeSet<Metric>,
}

impl<'a> Cleaner<'a> {
    /// Creates a cleaner for the metrics of `group`.
    #[must_use]
    pub fn new(config: &'a AnalysisConfig, group: MetricGroup) -> Self {
        Self {
            config,
            metrics: group.metrics(),
        }
    }

    /// Cleans every selected metric of `session`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSession`] when none of the selected metrics keeps a
    /// single valid sample.
    pub fn clean(&self, session: &Session) -> Result<CleanedSession, InvalidSession> {
        let info = SessionInfo::of(session);
        let mut series = BTreeMap::new();
        let mut cleaning = BTreeMap::new();
        let mut warnings = vec![];
        let warn = |kind, metric, message: String| {
            Warning::new(kind, &session.source, message)
                .with_session(session.id)
                .with_metric(metric)
        };

        let selected = session
            .schema
            .metrics
            .keys()
            .copied()
            .filter(|m| self.metrics.contains(m))
            .collect::<Vec<_>>();
        if selected.is_empty() {
            return Err(InvalidSession {
                info,
                reason: "none of the selected metrics is present".to_owned(),
            });
        }

        for metric in selected {
            let range = self.config.valid_range(metric.kind());
            let mut stats = MetricCleaning::default();
            let mut points = vec![];
            for sample in &session.samples {
                stats.input += 1;
                match sample.value(metric) {
                    None => stats.missing += 1,
                    Some(v) if !range.contains(v) => stats.out_of_range += 1,
                    Some(value) => points.push(SeriesPoint {
                        time: sample.time,
                        value,
                    }),
                }
            }
            stats.kept = points.len();
            if session.time_base.is_clock() {
                points = resample(&points, self.config.resample_bucket());
            }
            stats.resampled = points.len();
            cleaning.insert(metric, stats);

            if stats.missing + stats.out_of_range > 0 {
                warnings.push(warn(
                    WarningKind::DroppedSamples,
                    metric,
                    format!(
                        "dropped {} missing and {} out-of-range sample(s) of {}",
                        stats.missing, stats.out_of_range, stats.input
                    ),
                ));
            }
            if points.is_empty() {
                continue;
            }
            let (min, max) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.value), hi.max(p.value))
            });
            if points.len() > 1 && max <= min {
                warnings.push(warn(
                    WarningKind::FlatSensor,
                    metric,
                    format!("value is constant at {min}, sensor may be stuck"),
                ));
            }
            series.insert(metric, CleanedSeries::new(metric, points));
        }

        if series.is_empty() {
            return Err(InvalidSession {
                info,
                reason: "every selected metric is missing or out of range".to_owned(),
            });
        }
        tracing::debug!(
            session = info.id,
            metrics = series.len(),
            "cleaned session"
        );
        Ok(CleanedSession {
            info,
            series,
            cleaning,
            warnings,
        })
    }
}

//! Pairwise correlation between metrics of a session.
//!
//! Two cleaned series rarely share every timestamp: one sensor may have
//! dropped a reading, another may have been out of range. Before computing
//! Pearson's r, points are paired by nearest timestamp within a tolerance
//! (half the resample bucket). Points without a partner are left out of that
//! pair only.

use std::collections::BTreeMap;

use heatlog_stats::correlation::pearson;
use serde::Serialize;

use crate::{
    clean::{CleanedSeries, SeriesPoint},
    config::AnalysisConfig,
    metric::Metric,
    time::Timestamp,
};

/// Qualitative strength of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    #[display("very strong")]
    VeryStrong,
    #[display("strong")]
    Strong,
    #[display("moderate")]
    Moderate,
    #[display("weak")]
    Weak,
    #[display("negligible")]
    Negligible,
}

impl CorrelationStrength {
    #[must_use]
    pub fn of(coefficient: f64) -> Self {
        match coefficient.abs() {
            r if r >= 0.9 => Self::VeryStrong,
            r if r >= 0.7 => Self::Strong,
            r if r >= 0.5 => Self::Moderate,
            r if r >= 0.3 => Self::Weak,
            _ => Self::Negligible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub session: usize,
    pub metric_a: Metric,
    pub metric_b: Metric,
    /// Pearson's r, in `[-1, 1]`.
    pub coefficient: f64,
    pub aligned_points: usize,
    /// First and last aligned timestamps of the pair.
    pub start: Timestamp,
    pub end: Timestamp,
    pub strength: CorrelationStrength,
}

impl CorrelationResult {
    /// Label such as `strong positive`.
    #[must_use]
    pub fn label(&self) -> String {
        let sign = if self.coefficient < 0.0 {
            "negative"
        } else {
            "positive"
        };
        format!("{} {sign}", self.strength)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("{metric_a}/{metric_b}: {aligned} aligned point(s), {required} required")]
pub struct InsufficientOverlapError {
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub aligned: usize,
    pub required: usize,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CorrelationError {
    #[display("{_0}")]
    InsufficientOverlap(InsufficientOverlapError),
    #[display("{metric_a}/{metric_b}: one of the series is constant over the overlap")]
    ZeroVariance { metric_a: Metric, metric_b: Metric },
}

/// Pairs points of `a` and `b` whose timestamps differ by at most
/// `tolerance` (in [`Timestamp::ordinal`] units).
///
/// Both inputs must be sorted by time. Each point is used at most once.
#[must_use]
pub fn align(
    a: &[SeriesPoint],
    b: &[SeriesPoint],
    tolerance: i64,
) -> Vec<(SeriesPoint, SeriesPoint)> {
    let mut pairs = vec![];
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (ta, tb) = (a[i].time.ordinal(), b[j].time.ordinal());
        if (ta - tb).abs() <= tolerance {
            // prefer the closer partner if the next point of either side is nearer
            let next_a_closer = a
                .get(i + 1)
                .is_some_and(|n| (n.time.ordinal() - tb).abs() < (ta - tb).abs());
            let next_b_closer = b
                .get(j + 1)
                .is_some_and(|n| (n.time.ordinal() - ta).abs() < (ta - tb).abs());
            if next_a_closer {
                i += 1;
            } else if next_b_closer {
                j += 1;
            } else {
                pairs.push((a[i], b[j]));
                i += 1;
                j += 1;
            }
        } else if ta < tb {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationEngine {
    tolerance_ms: i64,
    min_overlap: usize,
}

impl CorrelationEngine {
    #[must_use]
    pub fn new(tolerance_ms: i64, min_overlap: usize) -> Self {
        Self {
            tolerance_ms,
            min_overlap,
        }
    }

    /// Engine aligning clock series within half a resample bucket.
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.resample_bucket().num_milliseconds() / 2,
            config.correlation_min_overlap,
        )
    }

    /// Correlates two series.
    ///
    /// # Errors
    ///
    /// Fails when fewer than the minimum number of points align, or when one
    /// side is constant over the aligned points.
    pub fn correlate(
        &self,
        session: usize,
        a: &CleanedSeries,
        b: &CleanedSeries,
    ) -> Result<CorrelationResult, CorrelationError> {
        let tolerance = match a.points().first().map(|p| p.time) {
            Some(Timestamp::Index(_)) => 0,
            _ => self.tolerance_ms,
        };
        let pairs = align(a.points(), b.points(), tolerance);
        let (metric_a, metric_b) = (a.metric(), b.metric());
        let (Some(first), Some(last)) = (pairs.first(), pairs.last()) else {
            return Err(self.insufficient(metric_a, metric_b, 0));
        };
        if pairs.len() < self.min_overlap {
            return Err(self.insufficient(metric_a, metric_b, pairs.len()));
        }
        let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.iter().map(|(p, q)| (p.value, q.value)).unzip();
        let coefficient =
            pearson(&xs, &ys).ok_or(CorrelationError::ZeroVariance { metric_a, metric_b })?;
        Ok(CorrelationResult {
            session,
            metric_a,
            metric_b,
            coefficient,
            aligned_points: pairs.len(),
            start: first.0.time,
            end: last.0.time,
            strength: CorrelationStrength::of(coefficient),
        })
    }

    fn insufficient(&self, metric_a: Metric, metric_b: Metric, aligned: usize) -> CorrelationError {
        CorrelationError::InsufficientOverlap(InsufficientOverlapError {
            metric_a,
            metric_b,
            aligned,
            required: self.min_overlap,
        })
    }

    /// Correlates every pair of metrics in canonical order (`a < b`).
    ///
    /// Failed pairs are returned alongside the successful ones so the caller
    /// can report them.
    #[must_use]
    pub fn correlate_all(
        &self,
        session: usize,
        series: &BTreeMap<Metric, CleanedSeries>,
    ) -> Vec<Result<CorrelationResult, CorrelationError>> {
        let all = series.values().collect::<Vec<_>>();
        let mut results = vec![];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                results.push(self.correlate(session, a, b));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, TimeDelta};
    use proptest::prelude::*;

    use super::*;

    fn series_at(metric: Metric, points: &[(i64, f64)]) -> CleanedSeries {
        let base = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        CleanedSeries::new(
            metric,
            points
                .iter()
                .map(|(s, value)| SeriesPoint {
                    time: Timestamp::Clock(base + TimeDelta::seconds(*s)),
                    value: *value,
                })
                .collect(),
        )
    }

    fn series(metric: Metric, values: &[f64]) -> CleanedSeries {
        let points = values
            .iter()
            .zip(0..)
            .map(|(v, i)| (i * 60, *v))
            .collect::<Vec<_>>();
        series_at(metric, &points)
    }

    fn engine() -> CorrelationEngine {
        CorrelationEngine::from_config(&AnalysisConfig::default())
    }

    #[test]
    fn test_identical_series() {
        let values = [55.0, 60.0, 58.0, 70.0, 66.0];
        let r = engine()
            .correlate(1, &series(Metric::CpuTemp, &values), &series(Metric::GpuTemp, &values))
            .unwrap();
        assert_abs_diff_eq!(r.coefficient, 1.0, epsilon = 1e-9);
        assert_eq!(r.strength, CorrelationStrength::VeryStrong);
        assert_eq!(r.label(), "very strong positive");
    }

    #[test]
    fn test_negated_series() {
        let values = [55.0, 60.0, 58.0, 70.0, 66.0];
        let negated = values.map(|v| -v);
        let r = engine()
            .correlate(1, &series(Metric::CpuTemp, &values), &series(Metric::GpuTemp, &negated))
            .unwrap();
        assert_abs_diff_eq!(r.coefficient, -1.0, epsilon = 1e-9);
        assert_eq!(r.label(), "very strong negative");
    }

    #[test]
    fn test_alignment_within_half_bucket() {
        let a = [(0, 1.0), (60, 2.0), (120, 3.0), (180, 4.0)];
        let b = [(10, 1.0), (95, 9.0), (125, 3.0), (175, 4.0)];
        let pairs = align(
            series_at(Metric::CpuTemp, &a).points(),
            series_at(Metric::GpuTemp, &b).points(),
            30_000,
        );
        // 60 and 95 are 35 s apart and stay unpaired
        assert_eq!(
            pairs.iter().map(|(p, q)| (p.value, q.value)).collect::<Vec<_>>(),
            vec![(1.0, 1.0), (3.0, 3.0), (4.0, 4.0)]
        );
    }

    #[test]
    fn test_insufficient_overlap() {
        let a = series_at(Metric::CpuTemp, &[(0, 1.0), (60, 2.0), (120, 3.0)]);
        let b = series_at(Metric::GpuTemp, &[(120, 3.0), (600, 1.0)]);
        let err = engine().correlate(1, &a, &b).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::InsufficientOverlap(InsufficientOverlapError { aligned: 1, .. })
        ));
    }

    #[test]
    fn test_constant_side_is_zero_variance() {
        let a = series(Metric::CpuTemp, &[60.0, 61.0, 62.0]);
        let b = series(Metric::CpuUsage, &[50.0, 50.0, 50.0]);
        assert!(matches!(
            engine().correlate(1, &a, &b),
            Err(CorrelationError::ZeroVariance { .. })
        ));
    }

    #[test]
    fn test_correlate_all_in_canonical_order() {
        let values = [55.0, 60.0, 58.0, 70.0];
        let map = [Metric::GpuUsage, Metric::CpuTemp, Metric::GpuTemp]
            .into_iter()
            .map(|m| (m, series(m, &values)))
            .collect::<BTreeMap<_, _>>();
        let pairs = engine()
            .correlate_all(4, &map)
            .into_iter()
            .map(|r| {
                let r = r.unwrap();
                (r.metric_a, r.metric_b)
            })
            .collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                (Metric::CpuTemp, Metric::GpuTemp),
                (Metric::CpuTemp, Metric::GpuUsage),
                (Metric::GpuTemp, Metric::GpuUsage),
            ]
        );
    }

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(CorrelationStrength::of(-0.95), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::of(0.7), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::of(0.55), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::of(-0.3), CorrelationStrength::Weak);
        assert_eq!(CorrelationStrength::of(0.1), CorrelationStrength::Negligible);
    }

    proptest! {
        #[test]
        fn prop_coefficient_is_bounded(values in prop::collection::vec((0.0_f64..120.0, 0.0_f64..100.0), 3..60)) {
            let (xs, ys): (Vec<f64>, Vec<f64>) = values.into_iter().unzip();
            let a = series(Metric::CpuTemp, &xs);
            let b = series(Metric::CpuUsage, &ys);
            if let Ok(r) = engine().correlate(1, &a, &b) {
                prop_assert!((-1.0..=1.0).contains(&r.coefficient));
                prop_assert_eq!(r.aligned_points, xs.len());
            }
        }
    }
}

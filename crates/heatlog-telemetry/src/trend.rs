//! Long-horizon trend of a metric within a session.

use heatlog_stats::{regression::LinearFit, smoothing::simple_moving_average};
use serde::Serialize;

use crate::{
    clean::{CleanedSeries, SeriesPoint},
    config::AnalysisConfig,
    metric::Metric,
    statistics::InsufficientDataError,
    time::Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    #[display("rising")]
    Rising,
    #[display("falling")]
    Falling,
    #[display("stable")]
    Stable,
}

/// Unit of a trend slope's time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnit {
    #[display("/min")]
    PerMinute,
    /// Series without clock time are fitted against the sample index.
    #[display("/sample")]
    PerSample,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub session: usize,
    pub metric: Metric,
    /// Least-squares slope of value against time.
    pub slope: f64,
    pub slope_unit: SlopeUnit,
    pub direction: TrendDirection,
    pub r_squared: f64,
    pub window: usize,
    /// Trailing moving average, each point stamped with the time of the
    /// window's last sample. The raw series when shorter than the window.
    pub moving_average: Vec<SeriesPoint>,
    /// `false` when the series was too short to smooth.
    pub smoothed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAnalyzer {
    window: usize,
    stable_slope: f64,
}

impl TrendAnalyzer {
    #[must_use]
    pub fn new(window: usize, stable_slope: f64) -> Self {
        Self {
            window,
            stable_slope,
        }
    }

    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.trend_window, config.trend_stable_slope)
    }

    /// Fits the trend of `series`.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientDataError`] when fewer than two points are
    /// available, since no slope can be fitted.
    pub fn analyze(
        &self,
        session: usize,
        series: &CleanedSeries,
    ) -> Result<TrendResult, InsufficientDataError> {
        let points = series.points();
        let insufficient = || InsufficientDataError {
            metric: series.metric(),
            count: points.len(),
            required: 2,
        };
        let first = points.first().ok_or_else(insufficient)?;
        let slope_unit = match first.time {
            Timestamp::Clock(_) => SlopeUnit::PerMinute,
            Timestamp::Index(_) => SlopeUnit::PerSample,
        };
        // relative axis keeps the fit well conditioned for epoch-based minutes
        let origin = first.time.axis_value();
        let fit = LinearFit::from_points(
            points
                .iter()
                .map(|p| (p.time.axis_value() - origin, p.value)),
        )
        .ok_or_else(insufficient)?;

        let direction = if fit.slope.abs() <= self.stable_slope {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Rising
        } else {
            TrendDirection::Falling
        };

        let values = series.values();
        let (moving_average, smoothed) = match simple_moving_average(&values, self.window) {
            Some(averages) => {
                let smoothed = points[self.window - 1..]
                    .iter()
                    .zip(averages)
                    .map(|(p, value)| SeriesPoint {
                        time: p.time,
                        value,
                    })
                    .collect();
                (smoothed, true)
            }
            None => (points.to_vec(), false),
        };

        Ok(TrendResult {
            session,
            metric: series.metric(),
            slope: fit.slope,
            slope_unit,
            direction,
            r_squared: fit.r_squared,
            window: self.window,
            moving_average,
            smoothed,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, TimeDelta};

    use super::*;

    fn series(values: &[f64]) -> CleanedSeries {
        let base = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        CleanedSeries::new(
            Metric::GpuTemp,
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

    #[test]
    fn test_rising_trend_per_minute() {
        let values = (0..30).map(|i| 60.0 + 0.5 * f64::from(i)).collect::<Vec<_>>();
        let trend = TrendAnalyzer::new(10, 0.05)
            .analyze(1, &series(&values))
            .unwrap();
        assert_abs_diff_eq!(trend.slope, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(trend.r_squared, 1.0, epsilon = 1e-9);
        assert_eq!(trend.slope_unit, SlopeUnit::PerMinute);
        assert_eq!(trend.direction, TrendDirection::Rising);
        assert!(trend.smoothed);
        assert_eq!(trend.moving_average.len(), 21);
        // window [0, 9] averages to the value at 4.5 minutes
        assert_abs_diff_eq!(trend.moving_average[0].value, 62.25, epsilon = 1e-9);
        assert_eq!(trend.moving_average[0].time, series(&values).points()[9].time);
    }

    #[test]
    fn test_stable_and_falling() {
        let analyzer = TrendAnalyzer::new(3, 0.05);
        let flat = analyzer.analyze(1, &series(&[70.0, 70.02, 70.0, 70.02])).unwrap();
        assert_eq!(flat.direction, TrendDirection::Stable);
        let falling = analyzer.analyze(1, &series(&[80.0, 75.0, 70.0, 65.0])).unwrap();
        assert_eq!(falling.direction, TrendDirection::Falling);
    }

    #[test]
    fn test_short_series_falls_back_to_raw() {
        let s = series(&[60.0, 62.0, 64.0]);
        let trend = TrendAnalyzer::new(10, 0.05).analyze(2, &s).unwrap();
        assert!(!trend.smoothed);
        assert_eq!(trend.moving_average, s.points().to_vec());
        assert_abs_diff_eq!(trend.slope, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let err = TrendAnalyzer::new(10, 0.05)
            .analyze(1, &series(&[60.0]))
            .unwrap_err();
        assert_eq!((err.count, err.required), (1, 2));
    }

    #[test]
    fn test_sequence_series_slope_per_sample() {
        let s = CleanedSeries::new(
            Metric::CpuUsage,
            [10.0, 20.0, 30.0]
                .iter()
                .zip(0..)
                .map(|(v, i)| SeriesPoint {
                    time: Timestamp::Index(i),
                    value: *v,
                })
                .collect(),
        );
        let trend = TrendAnalyzer::new(2, 0.05).analyze(1, &s).unwrap();
        assert_eq!(trend.slope_unit, SlopeUnit::PerSample);
        assert_abs_diff_eq!(trend.slope, 10.0, epsilon = 1e-9);
    }
}

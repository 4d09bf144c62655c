//! Analysis kinds and their uniform dispatch.
//!
//! Each [`AnalysisKind`] consumes the cleaned series of one session and
//! yields [`Findings`] plus the warnings of whatever it had to leave out.
//! Adding an analysis means adding a variant, not another branch in the
//! engine.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;

use crate::{
    anomaly::{AnomalyDetector, AnomalyEvent},
    clean::{CleanedSeries, SessionInfo},
    config::AnalysisConfig,
    correlation::{CorrelationEngine, CorrelationError, CorrelationResult},
    metric::Metric,
    statistics::StatSummary,
    trend::{TrendAnalyzer, TrendResult},
    warning::{Warning, WarningKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Statistics,
    Trend,
    Anomaly,
    Correlation,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Statistics,
        AnalysisKind::Trend,
        AnalysisKind::Anomaly,
        AnalysisKind::Correlation,
    ];

    /// Runs this analysis on one session.
    #[must_use]
    pub fn run(self, ctx: &AnalysisContext<'_>) -> (Findings, Vec<Warning>) {
        match self {
            AnalysisKind::Statistics => run_statistics(ctx),
            AnalysisKind::Trend => run_trend(ctx),
            AnalysisKind::Anomaly => run_anomaly(ctx),
            AnalysisKind::Correlation => run_correlation(ctx),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisKind::Statistics => "statistics",
            AnalysisKind::Trend => "trend",
            AnalysisKind::Anomaly => "anomaly",
            AnalysisKind::Correlation => "correlation",
        })
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("unknown analysis '{input}' (expected statistics, trend, anomaly or correlation)")]
pub struct ParseAnalysisKindError {
    #[error(not(source))]
    input: String,
}

impl FromStr for AnalysisKind {
    type Err = ParseAnalysisKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistics" | "stats" | "summary" => Ok(AnalysisKind::Statistics),
            "trend" | "trends" => Ok(AnalysisKind::Trend),
            "anomaly" | "anomalies" => Ok(AnalysisKind::Anomaly),
            "correlation" | "correlations" => Ok(AnalysisKind::Correlation),
            _ => Err(ParseAnalysisKindError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Output of one analysis on one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Findings {
    Statistics(Vec<StatSummary>),
    Trend(Vec<TrendResult>),
    Anomaly(Vec<AnomalyEvent>),
    Correlation(Vec<CorrelationResult>),
}

/// Read-only inputs shared by every analysis of a session.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub session: &'a SessionInfo,
    /// Cleaned series, already restricted to the requested time range.
    pub series: &'a BTreeMap<Metric, CleanedSeries>,
    pub config: &'a AnalysisConfig,
    pub sensitivity: Option<f64>,
}

impl AnalysisContext<'_> {
    fn warning(&self, kind: WarningKind, message: impl Into<String>) -> Warning {
        Warning::new(kind, &self.session.source, message).with_session(self.session.id)
    }
}

fn run_statistics(ctx: &AnalysisContext<'_>) -> (Findings, Vec<Warning>) {
    let mut summaries = vec![];
    let mut warnings = vec![];
    for series in ctx.series.values() {
        match StatSummary::compute(ctx.session.id, series) {
            Ok(summary) => summaries.push(summary),
            Err(err) => warnings.push(
                ctx.warning(WarningKind::InsufficientData, err.to_string())
                    .with_metric(err.metric),
            ),
        }
    }
    (Findings::Statistics(summaries), warnings)
}

fn run_trend(ctx: &AnalysisContext<'_>) -> (Findings, Vec<Warning>) {
    let analyzer = TrendAnalyzer::from_config(ctx.config);
    let mut trends = vec![];
    let mut warnings = vec![];
    for series in ctx.series.values() {
        match analyzer.analyze(ctx.session.id, series) {
            Ok(trend) => trends.push(trend),
            Err(err) => warnings.push(
                ctx.warning(WarningKind::InsufficientData, format!("no trend: {err}"))
                    .with_metric(err.metric),
            ),
        }
    }
    (Findings::Trend(trends), warnings)
}

fn run_anomaly(ctx: &AnalysisContext<'_>) -> (Findings, Vec<Warning>) {
    let detector = AnomalyDetector::from_config(ctx.config, ctx.sensitivity);
    let events = ctx
        .series
        .values()
        .flat_map(|series| detector.detect(ctx.session.id, series))
        .collect();
    (Findings::Anomaly(events), vec![])
}

fn run_correlation(ctx: &AnalysisContext<'_>) -> (Findings, Vec<Warning>) {
    let engine = CorrelationEngine::from_config(ctx.config);
    let mut results = vec![];
    let mut warnings = vec![];
    for result in engine.correlate_all(ctx.session.id, ctx.series) {
        match result {
            Ok(r) => results.push(r),
            Err(err @ CorrelationError::InsufficientOverlap(_)) => warnings.push(
                ctx.warning(WarningKind::InsufficientOverlap, format!("pair omitted: {err}")),
            ),
            Err(err @ CorrelationError::ZeroVariance { .. }) => warnings.push(
                ctx.warning(WarningKind::InsufficientData, format!("pair omitted: {err}")),
            ),
        }
    }
    (Findings::Correlation(results), warnings)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::{clean::SeriesPoint, time::{TimeBase, Timestamp}};

    fn info() -> SessionInfo {
        SessionInfo {
            id: 1,
            source: "a.csv".to_owned(),
            time_base: TimeBase::Clock,
            start: Timestamp::Index(0),
            end: Timestamp::Index(0),
            samples: 0,
        }
    }

    fn series(metric: Metric, values: &[f64]) -> CleanedSeries {
        let base = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        CleanedSeries::new(
            metric,
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
    fn test_parse_kinds() {
        assert_eq!("Stats".parse::<AnalysisKind>().unwrap(), AnalysisKind::Statistics);
        assert_eq!("anomalies".parse::<AnalysisKind>().unwrap(), AnalysisKind::Anomaly);
        assert!("forecast".parse::<AnalysisKind>().is_err());
        for kind in AnalysisKind::ALL {
            assert_eq!(kind.to_string().parse::<AnalysisKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_every_kind_dispatches_to_its_findings() {
        let info = info();
        let config = AnalysisConfig::default();
        let series = BTreeMap::from([
            (Metric::CpuTemp, series(Metric::CpuTemp, &[60.0, 62.0, 61.0, 65.0])),
            (Metric::GpuTemp, series(Metric::GpuTemp, &[])),
        ]);
        let ctx = AnalysisContext {
            session: &info,
            series: &series,
            config: &config,
            sensitivity: None,
        };

        let (findings, warnings) = AnalysisKind::Statistics.run(&ctx);
        assert!(matches!(findings, Findings::Statistics(ref s) if s.len() == 1));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::InsufficientData);
        assert_eq!(warnings[0].metric, Some(Metric::GpuTemp));

        let (findings, _) = AnalysisKind::Trend.run(&ctx);
        assert!(matches!(findings, Findings::Trend(ref t) if t.len() == 1));

        let (findings, warnings) = AnalysisKind::Anomaly.run(&ctx);
        assert!(matches!(findings, Findings::Anomaly(_)));
        assert!(warnings.is_empty());

        let (findings, warnings) = AnalysisKind::Correlation.run(&ctx);
        assert!(matches!(findings, Findings::Correlation(ref c) if c.is_empty()));
        assert_eq!(warnings[0].kind, WarningKind::InsufficientOverlap);
    }
}

//! Report payload handed to display and export collaborators.
//!
//! A [`Report`] keeps the engine's outputs in the order they were produced,
//! grouped into fixed sections:
//!
//! 1. sessions (analysed and skipped),
//! 2. summary statistics,
//! 3. anomalies,
//! 4. trends,
//! 5. correlations,
//! 6. warnings.
//!
//! It serializes to JSON as is, and [`Report::render_text`] prints the same
//! content as aligned plain-text tables.

use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::{
    analysis::AnalysisKind,
    anomaly::AnomalyEvent,
    clean::SessionInfo,
    config::{AnalysisConfig, ValueRange},
    correlation::CorrelationResult,
    engine::{AnalysisOutcome, AnalysisRequest},
    metric::Metric,
    session::SkippedSession,
    statistics::StatSummary,
    trend::TrendResult,
    warning::Warning,
};

/// A correlation with its qualitative label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    #[serde(flatten)]
    pub result: CorrelationResult,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub time_range: String,
    pub analyses: Vec<AnalysisKind>,
    /// Rendering hint for temperature axes; data outside it is still analysed.
    pub display_temp_range: ValueRange,
    pub sessions: Vec<SessionInfo>,
    pub skipped: Vec<SkippedSession>,
    pub summaries: Vec<StatSummary>,
    pub anomalies: Vec<AnomalyEvent>,
    pub trends: Vec<TrendResult>,
    pub correlations: Vec<CorrelationEntry>,
    pub warnings: Vec<Warning>,
}

impl Report {
    #[must_use]
    pub fn new(outcome: &AnalysisOutcome, request: &AnalysisRequest, config: &AnalysisConfig) -> Self {
        Self {
            time_range: request.time_range.to_string(),
            analyses: request.kinds.clone(),
            display_temp_range: config.display_temp_range,
            sessions: outcome.sessions.clone(),
            skipped: outcome.skipped.clone(),
            summaries: outcome.summaries.clone(),
            anomalies: outcome.anomalies.clone(),
            trends: outcome.trends.clone(),
            correlations: outcome
                .correlations
                .iter()
                .map(|r| CorrelationEntry {
                    label: r.label(),
                    result: r.clone(),
                })
                .collect(),
            warnings: outcome.warnings.clone(),
        }
    }

    /// Renders the report as plain text.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Telemetry Analysis Report")?;
        writeln!(out, "=========================")?;
        writeln!(out, "Time range: {}", self.time_range)?;
        writeln!(
            out,
            "Analyses:   {}",
            self.analyses
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(out)?;

        self.write_sessions(out)?;
        if self.analyses.contains(&AnalysisKind::Statistics) {
            self.write_summaries(out)?;
        }
        if self.analyses.contains(&AnalysisKind::Anomaly) {
            self.write_anomalies(out)?;
        }
        if self.analyses.contains(&AnalysisKind::Trend) {
            self.write_trends(out)?;
        }
        if self.analyses.contains(&AnalysisKind::Correlation) {
            self.write_correlations(out)?;
        }
        self.write_warnings(out)
    }

    fn write_sessions(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Sessions")?;
        writeln!(
            out,
            "  {:>4} {:<24} {:<19} {:<19} {:>8}",
            "ID", "Source", "Start", "End", "Samples"
        )?;
        writeln!(out, "  {}", "-".repeat(78))?;
        for s in &self.sessions {
            writeln!(
                out,
                "  {:>4} {:<24} {:<19} {:<19} {:>8}",
                s.id,
                file_name(&s.source),
                s.start.to_string(),
                s.end.to_string(),
                s.samples
            )?;
        }
        for s in &self.skipped {
            writeln!(
                out,
                "  {:>4} {:<24} {:<19} {:<19} {:>8}  skipped: {}",
                s.id,
                file_name(&s.source),
                s.start.to_string(),
                s.end.to_string(),
                s.samples,
                s.reason
            )?;
        }
        if self.sessions.is_empty() && self.skipped.is_empty() {
            writeln!(out, "  (no sessions)")?;
        }
        writeln!(out)
    }

    fn write_summaries(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Summary")?;
        writeln!(
            out,
            "  {:>4} {:<18} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "ID", "Metric", "Count", "Mean", "Median", "StdDev", "Min", "Max"
        )?;
        writeln!(out, "  {}", "-".repeat(80))?;
        for s in &self.summaries {
            let unit = s.metric.kind().unit();
            writeln!(
                out,
                "  {:>4} {:<18} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9}",
                s.session,
                s.metric.to_string(),
                s.count,
                with_unit(s.mean, unit),
                with_unit(s.median, unit),
                with_unit(s.std_dev, unit),
                with_unit(s.min, unit),
                with_unit(s.max, unit),
            )?;
        }
        write_empty(out, self.summaries.is_empty())
    }

    fn write_anomalies(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Anomalies")?;
        writeln!(
            out,
            "  {:>4} {:<18} {:<5} {:<19} {:<19} {:>10} {:>8}",
            "ID", "Metric", "Kind", "Start", "End", "Peak", "Severity"
        )?;
        writeln!(out, "  {}", "-".repeat(88))?;
        for a in &self.anomalies {
            writeln!(
                out,
                "  {:>4} {:<18} {:<5} {:<19} {:<19} {:>10} {:>8.2}",
                a.session,
                a.metric.to_string(),
                a.kind.to_string(),
                a.start.to_string(),
                a.end.to_string(),
                with_unit(a.peak_value, a.metric.kind().unit()),
                a.severity
            )?;
        }
        write_empty(out, self.anomalies.is_empty())
    }

    fn write_trends(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Trends")?;
        writeln!(
            out,
            "  {:>4} {:<18} {:<8} {:>16} {:>6} {:>10}",
            "ID", "Metric", "Trend", "Slope", "R²", "Smoothed"
        )?;
        writeln!(out, "  {}", "-".repeat(67))?;
        for t in &self.trends {
            let slope = format!(
                "{:+.3}{}{}",
                t.slope,
                t.metric.kind().unit(),
                t.slope_unit
            );
            let smoothed = if t.smoothed {
                format!("SMA{}", t.window)
            } else {
                "raw".to_owned()
            };
            writeln!(
                out,
                "  {:>4} {:<18} {:<8} {:>16} {:>6.3} {:>10}",
                t.session,
                t.metric.to_string(),
                t.direction.to_string(),
                slope,
                t.r_squared,
                smoothed
            )?;
        }
        write_empty(out, self.trends.is_empty())
    }

    fn write_correlations(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Correlations")?;
        writeln!(
            out,
            "  {:>4} {:<37} {:>7} {:>7}  {}",
            "ID", "Pair", "r", "Points", "Strength"
        )?;
        writeln!(out, "  {}", "-".repeat(80))?;
        for c in &self.correlations {
            let r = &c.result;
            writeln!(
                out,
                "  {:>4} {:<37} {:>+7.3} {:>7}  {}",
                r.session,
                pair_name(r.metric_a, r.metric_b),
                r.coefficient,
                r.aligned_points,
                c.label
            )?;
        }
        write_empty(out, self.correlations.is_empty())
    }

    fn write_warnings(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Warnings ({})", self.warnings.len())?;
        for w in &self.warnings {
            writeln!(out, "  - {w}")?;
        }
        Ok(())
    }

}

fn write_empty(out: &mut String, empty: bool) -> fmt::Result {
    if empty {
        writeln!(out, "  (none)")?;
    }
    writeln!(out)
}

fn with_unit(value: f64, unit: &str) -> String {
    format!("{value:.1}{unit}")
}

fn pair_name(a: Metric, b: Metric) -> String {
    format!("{a} / {b}")
}

fn file_name(source: &str) -> &str {
    std::path::Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source)
}

//! Analyze command
//!
//! Runs the full analysis pipeline over one or more telemetry logs and
//! prints the report as text or JSON.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use heatlog_telemetry::{
    analysis::AnalysisKind,
    anomaly::AnomalyOrder,
    engine::{self, AnalysisRequest},
    metric::MetricGroup,
    report::Report,
    time::TimeRange,
};

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct AnalyzeArg {
    /// Telemetry CSV files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON file overriding the default analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time range: all, morning, afternoon, evening, night, HH:MM-HH:MM or START..END
    #[arg(long, default_value = "all")]
    range: TimeRange,

    /// Analyses to run (comma-separated: statistics, trend, anomaly, correlation)
    #[arg(long, value_delimiter = ',', default_values = ["statistics", "trend", "anomaly", "correlation"])]
    analysis: Vec<AnalysisKind>,

    /// Metrics to analyze: all, temperature, cpu-usage, gpu-usage
    #[arg(long, default_value = "all")]
    metrics: MetricGroup,

    /// Anomaly threshold in standard deviations (overrides the configuration)
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Order of the anomaly list
    #[arg(long, value_enum, default_value_t)]
    anomaly_order: OrderArg,

    /// Report format
    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// Report output file (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the cleaned series as CSV to this path
    #[arg(long)]
    series_output: Option<PathBuf>,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    #[default]
    Time,
    Severity,
}

impl From<OrderArg> for AnomalyOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Time => AnomalyOrder::Time,
            OrderArg::Severity => AnomalyOrder::Severity,
        }
    }
}

pub(crate) fn run(arg: &AnalyzeArg) -> anyhow::Result<()> {
    let config = util::load_config(arg.config.as_deref())?;
    let mut kinds = vec![];
    for kind in &arg.analysis {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }
    let request = AnalysisRequest {
        time_range: arg.range,
        kinds,
        sensitivity: arg.sensitivity,
        metrics: arg.metrics,
        anomaly_order: arg.anomaly_order.into(),
    };

    tracing::info!(files = arg.files.len(), range = %request.time_range, "analyzing");
    let outcome = engine::analyze(&arg.files, &request, &config)?;

    if let Some(path) = &arg.series_output {
        util::save_series_csv(path, &outcome.cleaned)?;
        tracing::info!(path = %path.display(), "saved cleaned series");
    }

    let report = Report::new(&outcome, &request, &config);
    let mut output = Output::from_output_path(arg.output.as_deref())?;
    match arg.format {
        Format::Text => output.write_text(&report.render_text())?,
        Format::Json => output.write_json(&report)?,
    }
    if let Output::File { path, .. } = &output {
        eprintln!("Report saved to {}", path.display());
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Args;
use heatlog_telemetry::config::AnalysisConfig;

use crate::util::Output;

#[derive(Debug, Clone, Args)]
pub(crate) struct ConfigArg {
    /// Output file path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ConfigArg) -> anyhow::Result<()> {
    let mut output = Output::from_output_path(arg.output.as_deref())?;
    output.write_json(&AnalysisConfig::default())
}

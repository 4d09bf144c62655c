//! Column inventory command
//!
//! Prints every header column of each file grouped by category, with the
//! metric it resolved to and the match confidence.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Context;
use clap::Args;
use heatlog_telemetry::{
    ingest::{self, ColumnInfo},
    schema::ColumnCategory,
};

use crate::util;

#[derive(Debug, Clone, Args)]
pub(crate) struct ColumnsArg {
    /// Telemetry CSV files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON file overriding the default analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

pub(crate) fn run(arg: &ColumnsArg) -> anyhow::Result<()> {
    let config = util::load_config(arg.config.as_deref())?;
    for path in &arg.files {
        let columns = ingest::inspect_columns(path, &config)
            .with_context(|| format!("Failed to inspect columns of {}", path.display()))?;
        print_columns(&path.display().to_string(), &columns);
        println!();
    }
    Ok(())
}

fn print_columns(title: &str, columns: &[ColumnInfo]) {
    println!("{title}");
    println!("{}", "=".repeat(title.chars().count()));

    let mut by_category = BTreeMap::<ColumnCategory, Vec<&ColumnInfo>>::new();
    for column in columns {
        by_category.entry(column.category).or_default().push(column);
    }

    for (category, columns) in by_category {
        println!("\n{category} ({})", columns.len());
        println!("  {:<36} {:<18} {:>10}  Used", "Column", "Resolved", "Confidence");
        println!("  {}", "-".repeat(74));
        for column in columns {
            let (resolved, confidence) = match column.matched {
                Some(m) => (m.role.to_string(), format!("{:.2}", m.confidence)),
                None => ("-".to_owned(), "-".to_owned()),
            };
            println!(
                "  {:<36} {:<18} {:>10}  {}",
                column.name,
                resolved,
                confidence,
                if column.used { "yes" } else { "no" }
            );
        }
    }
}

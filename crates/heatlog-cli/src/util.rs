use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use heatlog_telemetry::{config::AnalysisConfig, engine::SessionSeries};
use serde::Serialize;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn from_output_path(output_path: Option<&Path>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }

    pub fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write report to {}", self.display_path()))?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Loads the analysis configuration, falling back to the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    let config: AnalysisConfig = match path {
        Some(path) => read_json_file("config", path)?,
        None => AnalysisConfig::default(),
    };
    config
        .validate()
        .context("Invalid analysis configuration")?;
    Ok(config)
}

#[derive(Debug, Serialize)]
struct SeriesRow<'a> {
    session: usize,
    source: &'a str,
    metric: String,
    timestamp: String,
    value: f64,
}

/// Writes cleaned series as long-format CSV
/// (`session,source,metric,timestamp,value`).
pub fn write_series_csv<W>(writer: W, sessions: &[SessionSeries]) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    for session in sessions {
        for series in session.series.values() {
            for point in series.points() {
                writer
                    .serialize(SeriesRow {
                        session: session.info.id,
                        source: &session.info.source,
                        metric: series.metric().to_string(),
                        timestamp: point.time.to_string(),
                        value: point.value,
                    })
                    .context("Failed to write series row")?;
            }
        }
    }
    writer.flush().context("Failed to flush series CSV")?;
    Ok(())
}

pub fn save_series_csv(path: &Path, sessions: &[SessionSeries]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create series file: {}", path.display()))?;
    write_series_csv(BufWriter::new(file), sessions)
        .with_context(|| format!("Failed to write series file: {}", path.display()))
}

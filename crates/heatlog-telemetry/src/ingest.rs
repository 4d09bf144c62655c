//! Reading delimited telemetry files into samples.
//!
//! A file goes through these steps:
//!
//! 1. decode bytes to text (UTF-8, UTF-16 with BOM, or Latin-1),
//! 2. sniff the delimiter from the header line,
//! 3. resolve the header into a [`Schema`],
//! 4. detect the time layout from the first row that has a time value,
//! 5. turn every remaining row into a [`Sample`].
//!
//! Malformed rows, repeated header rows and rows whose time does not parse
//! are skipped; each kind of skip is summarized in one warning per file.

use std::{
    borrow::Cow,
    fs::File,
    io::{self, Read as _},
    path::Path,
    sync::Arc,
};

use crate::{
    config::AnalysisConfig,
    sample::{Sample, parse_reading},
    schema::{ColumnCategory, ColumnMatch, Schema, classify_column},
    time::{TimeBase, TimeParser, Timestamp},
    warning::{Warning, WarningKind, Warnings},
};

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Non-blank rows tried when detecting the time layout of a file.
const TIME_DETECTION_ROWS: usize = 10;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum IngestionError {
    #[display("failed to read {path}")]
    Io { path: String, source: io::Error },
    #[display("{path} is larger than the {limit} byte limit")]
    TooLarge { path: String, limit: u64 },
    #[display("{path} is empty")]
    Empty { path: String },
    #[display("{path} has no header row")]
    MissingHeader { path: String },
    #[display("{path} is not valid UTF-16 text")]
    Undecodable { path: String },
    #[display("{path} has no recognized metric columns")]
    NoRecognizedColumns { path: String },
}

/// All samples of one file, in file order.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    pub source: String,
    pub schema: Arc<Schema>,
    pub time_base: TimeBase,
    pub samples: Vec<Sample>,
}

/// Reads and parses one telemetry file.
///
/// Files larger than `config.max_file_bytes` are rejected before their
/// content is parsed.
pub fn read_log(
    path: &Path,
    config: &AnalysisConfig,
) -> Result<(TelemetryLog, Warnings), IngestionError> {
    let source = path.display().to_string();
    let bytes = read_bounded(path, config.max_file_bytes)?;
    parse_log(&source, &bytes, config)
}

fn read_bounded(path: &Path, limit: u64) -> Result<Vec<u8>, IngestionError> {
    let io_err = |source| IngestionError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    if len > limit {
        return Err(IngestionError::TooLarge {
            path: path.display().to_string(),
            limit,
        });
    }
    let mut bytes = vec![];
    // the file may grow between the size check and the read
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(io_err)?;
    if bytes.len() as u64 > limit {
        return Err(IngestionError::TooLarge {
            path: path.display().to_string(),
            limit,
        });
    }
    Ok(bytes)
}

/// Parses the content of one telemetry file.
///
/// `source` names the file in warnings and sessions.
pub fn parse_log(
    source: &str,
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<(TelemetryLog, Warnings), IngestionError> {
    let mut warnings = Warnings::new();
    let text = decode_text(bytes).ok_or_else(|| IngestionError::Undecodable {
        path: source.to_owned(),
    })?;
    if text.trim().is_empty() {
        return Err(IngestionError::Empty {
            path: source.to_owned(),
        });
    }

    let delimiter = sniff_delimiter(&text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = loop {
        match records.next() {
            Some(Ok(record)) if record.iter().any(|f| !f.is_empty()) => break record,
            Some(_) => {}
            None => {
                return Err(IngestionError::MissingHeader {
                    path: source.to_owned(),
                });
            }
        }
    };
    let header = header.iter().collect::<Vec<_>>();
    let (schema, issues) = Schema::resolve(&header, config.column_match_threshold);
    for issue in &issues {
        warnings.push(
            Warning::new(WarningKind::SchemaResolution, source, issue.message())
                .with_metric(issue.metric()),
        );
    }
    if schema.metrics.is_empty() {
        return Err(IngestionError::NoRecognizedColumns {
            path: source.to_owned(),
        });
    }
    tracing::debug!(
        source,
        delimiter = %char::from(delimiter),
        metrics = schema.metrics.len(),
        "resolved schema"
    );

    let mut rows = vec![];
    let mut malformed = 0;
    for record in records {
        match record {
            Ok(record) if record.len() > schema.columns.len() => malformed += 1,
            Ok(record) => {
                let row = record.iter().map(str::to_owned).collect::<Vec<_>>();
                if row.iter().all(String::is_empty) {
                    continue;
                }
                let cells = row.iter().map(String::as_str).collect::<Vec<_>>();
                if !schema.is_header_row(&cells) {
                    rows.push(row);
                }
            }
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        warnings.push(Warning::new(
            WarningKind::Ingestion,
            source,
            format!("skipped {malformed} malformed row(s)"),
        ));
    }

    let decimal_comma = delimiter != b',';
    let (time_base, samples) = build_samples(source, &schema, &rows, decimal_comma, &mut warnings);

    let log = TelemetryLog {
        source: source.to_owned(),
        schema: Arc::new(schema),
        time_base,
        samples,
    };
    Ok((log, warnings))
}

fn build_samples(
    source: &str,
    schema: &Schema,
    rows: &[Vec<String>],
    decimal_comma: bool,
    warnings: &mut Warnings,
) -> (TimeBase, Vec<Sample>) {
    let to_sample = |time: Timestamp, cells: &[&str]| Sample {
        time,
        values: schema
            .metrics
            .iter()
            .map(|(metric, col)| {
                let value = cells
                    .get(col.index)
                    .and_then(|cell| parse_reading(cell, decimal_comma));
                (*metric, value)
            })
            .collect(),
    };
    let parser = match schema.time {
        None => {
            warnings.push(Warning::new(
                WarningKind::TimeParse,
                source,
                "no time column, using row order; time-based analyses are limited",
            ));
            None
        }
        Some(columns) => {
            let parser = rows
                .iter()
                .map(|row| cells_of(row))
                .filter(|cells| !TimeParser::is_blank(columns, cells))
                .take(TIME_DETECTION_ROWS)
                .find_map(|cells| TimeParser::detect(columns, &cells));
            if parser.is_none() {
                warnings.push(Warning::new(
                    WarningKind::TimeParse,
                    source,
                    "time column could not be parsed, using row order; time-based analyses are limited",
                ));
            }
            parser
        }
    };

    let Some(mut parser) = parser else {
        let samples = rows
            .iter()
            .zip(0..)
            .map(|(row, i)| to_sample(Timestamp::Index(i), &cells_of(row)))
            .collect();
        return (TimeBase::Sequence, samples);
    };
    tracing::debug!(source, layout = %parser.layout_description(), "detected time layout");

    let mut samples = Vec::with_capacity(rows.len());
    let mut unparsed = 0;
    for row in rows {
        let cells = cells_of(row);
        match parser.parse(&cells) {
            Some(t) => samples.push(to_sample(Timestamp::Clock(t), &cells)),
            None => unparsed += 1,
        }
    }
    if unparsed > 0 {
        warnings.push(Warning::new(
            WarningKind::TimeParse,
            source,
            format!(
                "dropped {unparsed} row(s) whose time does not match {}",
                parser.layout_description()
            ),
        ));
    }
    (TimeBase::Clock, samples)
}

fn cells_of(row: &[String]) -> Vec<&str> {
    row.iter().map(String::as_str).collect()
}

/// Decodes file content to text.
///
/// A byte order mark selects UTF-8 or UTF-16; without one the content is
/// read as UTF-8 when valid and as Latin-1 otherwise. Returns `None` only
/// for malformed UTF-16.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return Some(String::from_utf8_lossy(rest));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes).map(Cow::Owned);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes).map(Cow::Owned);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(Cow::Borrowed(text)),
        Err(_) => Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect::<Vec<_>>();
    String::from_utf16(&units).ok()
}

/// Picks the delimiter that splits the first non-empty line into the most
/// fields. Falls back to a comma.
#[must_use]
pub fn sniff_delimiter(text: &str) -> u8 {
    let Some(line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return b',';
    };
    let mut best = (b',', 1);
    for delimiter in DELIMITERS {
        let fields = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .and_then(Result::ok)
            .map_or(0, |r| r.len());
        if fields > best.1 {
            best = (delimiter, fields);
        }
    }
    best.0
}

/// One header column and what it resolved to.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub category: ColumnCategory,
    /// Best rule match, regardless of threshold.
    pub matched: Option<ColumnMatch>,
    /// Whether the column is used for analysis.
    pub used: bool,
}

/// Lists the header columns of a file with their classification.
pub fn inspect_columns(
    path: &Path,
    config: &AnalysisConfig,
) -> Result<Vec<ColumnInfo>, IngestionError> {
    let source = path.display().to_string();
    let bytes = read_bounded(path, config.max_file_bytes)?;
    let text = decode_text(&bytes).ok_or_else(|| IngestionError::Undecodable {
        path: source.clone(),
    })?;
    let delimiter = sniff_delimiter(&text);
    let header = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes())
        .records()
        .filter_map(Result::ok)
        .find(|r| r.iter().any(|f| !f.is_empty()))
        .ok_or(IngestionError::MissingHeader { path: source })?;
    let names = header.iter().collect::<Vec<_>>();
    let (schema, _) = Schema::resolve(&names, config.column_match_threshold);

    let columns = names
        .iter()
        .enumerate()
        .map(|(index, name)| ColumnInfo {
            name: (*name).to_owned(),
            category: ColumnCategory::of(name),
            matched: classify_column(name),
            used: schema.metrics.values().any(|c| c.index == index),
        })
        .collect();
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use crate::metric::Metric;

    use super::*;

    fn parse(text: &str) -> (TelemetryLog, Warnings) {
        parse_log("test.csv", text.as_bytes(), &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("Time,CPU Temperature,GPU Temperature\n"), b',');
        assert_eq!(sniff_delimiter("Time;CPU Temperature;GPU Temperature\n"), b';');
        assert_eq!(sniff_delimiter("Time\tCPU Temperature\n"), b'\t');
        assert_eq!(sniff_delimiter("\n\nTime|CPU Temperature\n"), b'|');
        assert_eq!(sniff_delimiter("Time\n"), b',');
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFTime").unwrap(), "Time");
        assert_eq!(decode_text(b"\xFF\xFET\x00i\x00").unwrap(), "Ti");
        assert_eq!(decode_text(b"\xFE\xFF\x00T\x00i").unwrap(), "Ti");
        assert_eq!(decode_text(b"65 \xB0C").unwrap(), "65 °C");
        assert!(decode_text(b"\xFF\xFET").is_none());
    }

    #[test]
    fn test_parse_clock_log() {
        let (log, warnings) = parse(
            "Date,Time,CPU Temperature,GPU Temperature\n\
             17.03.2025,21:00:00,61,55\n\
             17.03.2025,21:01:00,62 °C,N/A\n",
        );
        assert!(warnings.is_empty());
        assert_eq!(log.time_base, TimeBase::Clock);
        assert_eq!(log.samples.len(), 2);
        assert_eq!(log.samples[1].value(Metric::CpuTemp), Some(62.0));
        assert_eq!(log.samples[1].value(Metric::GpuTemp), None);
    }

    #[test]
    fn test_semicolon_with_decimal_comma() {
        let (log, _) = parse("Time;CPU Temperature\n21:00:00;61,5\n");
        assert_eq!(log.samples[0].value(Metric::CpuTemp), Some(61.5));
    }

    #[test]
    fn test_quoted_comma_cell_is_missing_not_truncated() {
        let (log, _) = parse("Time,CPU Temperature\n20:00:00,\"65,5\"\n20:01:00,\"6.6e1\"\n");
        assert_eq!(log.samples[0].value(Metric::CpuTemp), None);
        assert_eq!(log.samples[1].value(Metric::CpuTemp), Some(66.0));
    }

    #[test]
    fn test_time_layout_detected_past_unparseable_first_rows() {
        let (log, warnings) = parse("Time,CPU Temperature\nN/A,60\n20:00:00,61\n20:01:00,62\n");
        assert_eq!(log.time_base, TimeBase::Clock);
        assert_eq!(log.samples.len(), 2);
        assert_eq!(log.samples[0].value(Metric::CpuTemp), Some(61.0));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.iter().next().unwrap().kind, WarningKind::TimeParse);
    }

    #[test]
    fn test_missing_time_column_falls_back_to_sequence() {
        let (log, warnings) = parse("CPU Temperature,GPU Usage\n60,10\n61,20\n62,30\n");
        assert_eq!(log.time_base, TimeBase::Sequence);
        assert_eq!(
            log.samples.iter().map(|s| s.time).collect::<Vec<_>>(),
            vec![Timestamp::Index(0), Timestamp::Index(1), Timestamp::Index(2)]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.iter().next().unwrap().kind, WarningKind::TimeParse);
    }

    #[test]
    fn test_unparseable_time_falls_back_to_sequence() {
        let (log, _) = parse("Time,CPU Temperature\nsoon,60\nlater,61\n");
        assert_eq!(log.time_base, TimeBase::Sequence);
        assert_eq!(log.samples.len(), 2);
    }

    #[test]
    fn test_bad_and_repeated_header_rows_are_skipped() {
        let (log, warnings) = parse(
            "Time,CPU Temperature\n\
             21:00:00,60\n\
             21:01:00,61,99,98\n\
             Time,CPU Temperature\n\
             21:02:00,62\n\
             garbage,63\n",
        );
        assert_eq!(log.samples.len(), 2);
        let kinds = warnings.iter().map(|w| w.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![WarningKind::Ingestion, WarningKind::TimeParse]);
    }

    #[test]
    fn test_errors() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            parse_log("a.csv", b"  \n", &config),
            Err(IngestionError::Empty { .. })
        ));
        assert!(matches!(
            parse_log("a.csv", b"Time,Fan Speed\n12:00:00,900\n", &config),
            Err(IngestionError::NoRecognizedColumns { .. })
        ));
    }

    #[test]
    fn test_size_guard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.csv");
        std::fs::write(&path, "Time,CPU Temperature\n12:00:00,60\n").unwrap();
        let config = AnalysisConfig {
            max_file_bytes: 8,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            read_log(&path, &config),
            Err(IngestionError::TooLarge { limit: 8, .. })
        ));
    }

    #[test]
    fn test_inspect_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "Time,CPU Temperature,Fan RPM\n12:00:00,60,900\n").unwrap();
        let columns = inspect_columns(&path, &AnalysisConfig::default()).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].category, ColumnCategory::Time);
        assert!(!columns[0].used);
        assert_eq!(columns[1].category, ColumnCategory::Cpu);
        assert!(columns[1].used);
        assert_eq!(columns[2].category, ColumnCategory::Other);
        assert!(columns[2].matched.is_none());
    }
}

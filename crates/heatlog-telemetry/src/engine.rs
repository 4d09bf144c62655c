//! The analysis pipeline.
//!
//! [`analyze`] is a pure function of a file set and request parameters:
//!
//! ```text
//! files ─► ingest
//!       ─► segment into sessions
//!       ─► clean + restrict to time range ─► statistics / trend / anomaly / correlation
//!       ─► AnalysisOutcome
//! ```
//!
//! Files and sessions are spread over at most one scoped thread per
//! available core. Nothing is shared between requests. Threads only read the
//! config and their own inputs, and results are gathered in input order so
//! the outcome does not depend on scheduling.

use std::{
    collections::BTreeMap,
    error::Error as _,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::{
    analysis::{AnalysisContext, AnalysisKind, Findings},
    anomaly::{AnomalyEvent, AnomalyOrder, sort_events},
    clean::{CleanedSeries, Cleaner, SessionInfo},
    config::{AnalysisConfig, ConfigError},
    correlation::CorrelationResult,
    ingest::{IngestionError, TelemetryLog, read_log},
    metric::{Metric, MetricGroup},
    session::{Segmenter, Session, SkipReason, SkippedSession},
    statistics::StatSummary,
    time::TimeRange,
    trend::TrendResult,
    warning::{Warning, WarningKind, Warnings},
};

/// User-selected parameters of one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub time_range: TimeRange,
    /// Analyses to run, in output order.
    pub kinds: Vec<AnalysisKind>,
    /// Overrides `anomaly_sensitivity` of the config.
    pub sensitivity: Option<f64>,
    pub metrics: MetricGroup,
    pub anomaly_order: AnomalyOrder,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            time_range: TimeRange::All,
            kinds: AnalysisKind::ALL.to_vec(),
            sensitivity: None,
            metrics: MetricGroup::All,
            anomaly_order: AnomalyOrder::Time,
        }
    }
}

/// Cleaned, range-restricted series of one session, for rendering.
#[derive(Debug, Clone)]
pub struct SessionSeries {
    pub info: SessionInfo,
    pub series: BTreeMap<Metric, CleanedSeries>,
}

/// Everything one request produced.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub sessions: Vec<SessionInfo>,
    pub skipped: Vec<SkippedSession>,
    pub summaries: Vec<StatSummary>,
    pub anomalies: Vec<AnomalyEvent>,
    pub trends: Vec<TrendResult>,
    pub correlations: Vec<CorrelationResult>,
    pub warnings: Vec<Warning>,
    pub cleaned: Vec<SessionSeries>,
}

/// Cooperative cancellation shared with the caller.
///
/// Checked before each file is read and before each session is analysed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum AnalyzeError {
    #[display("invalid configuration: {_0}")]
    InvalidConfig(ConfigError),
    #[display("analysis cancelled")]
    Cancelled,
}

/// Runs the full pipeline over `paths`.
///
/// Files that cannot be read are reported as warnings; the remaining files
/// are still analysed.
pub fn analyze<P>(
    paths: &[P],
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalyzeError>
where
    P: AsRef<Path> + Sync,
{
    analyze_with_cancel(paths, request, config, &CancelFlag::new())
}

/// Like [`analyze`], stopping early once `cancel` is set.
pub fn analyze_with_cancel<P>(
    paths: &[P],
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    cancel: &CancelFlag,
) -> Result<AnalysisOutcome, AnalyzeError>
where
    P: AsRef<Path> + Sync,
{
    config.validate().map_err(AnalyzeError::InvalidConfig)?;
    if request.sensitivity.is_some_and(|s| s.is_nan() || s <= 0.0) {
        return Err(AnalyzeError::InvalidConfig(ConfigError::NotPositive {
            field: "sensitivity",
        }));
    }

    let mut warnings = Warnings::new();
    let logs = ingest_all(paths, config, cancel, &mut warnings)?;

    let segmentation = Segmenter::from_config(config).segment(logs);
    let mut outcome = AnalysisOutcome {
        skipped: segmentation.skipped,
        ..AnalysisOutcome::default()
    };
    for skipped in &outcome.skipped {
        warnings.push(
            Warning::new(
                WarningKind::SkippedSession,
                &skipped.source,
                format!(
                    "session skipped: {} ({} sample(s), minimum {})",
                    skipped.reason, skipped.samples, config.min_session_samples
                ),
            )
            .with_session(skipped.id),
        );
    }
    tracing::info!(
        sessions = segmentation.sessions.len(),
        skipped = outcome.skipped.len(),
        "segmented input"
    );

    let cleaner = Cleaner::new(config, request.metrics);
    let results = parallel_map(&segmentation.sessions, |session| {
        if cancel.is_cancelled() {
            return None;
        }
        Some(analyze_session(session, &cleaner, request, config))
    });
    if cancel.is_cancelled() {
        return Err(AnalyzeError::Cancelled);
    }

    for result in results.into_iter().flatten() {
        match result {
            SessionResult::Analyzed {
                series,
                findings,
                warnings: session_warnings,
            } => {
                warnings.append(session_warnings);
                for findings in findings {
                    match findings {
                        Findings::Statistics(s) => outcome.summaries.extend(s),
                        Findings::Trend(t) => outcome.trends.extend(t),
                        Findings::Anomaly(a) => outcome.anomalies.extend(a),
                        Findings::Correlation(c) => outcome.correlations.extend(c),
                    }
                }
                outcome.sessions.push(series.info.clone());
                outcome.cleaned.push(series);
            }
            SessionResult::Invalid {
                skipped,
                warnings: session_warnings,
            } => {
                warnings.append(session_warnings);
                outcome.skipped.push(skipped);
            }
        }
    }
    outcome.skipped.sort_by_key(|s| s.id);
    sort_events(&mut outcome.anomalies, request.anomaly_order);
    outcome.warnings = warnings.into_vec();
    Ok(outcome)
}

fn ingest_all<P>(
    paths: &[P],
    config: &AnalysisConfig,
    cancel: &CancelFlag,
    warnings: &mut Warnings,
) -> Result<Vec<TelemetryLog>, AnalyzeError>
where
    P: AsRef<Path> + Sync,
{
    let results = parallel_map(paths, |path| {
        if cancel.is_cancelled() {
            return None;
        }
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading file");
        Some((path.to_path_buf(), read_log(path, config)))
    });
    if cancel.is_cancelled() {
        return Err(AnalyzeError::Cancelled);
    }

    let mut logs = vec![];
    for (path, result) in results.into_iter().flatten() {
        match result {
            Ok((log, file_warnings)) => {
                warnings.append(file_warnings);
                logs.push(log);
            }
            Err(err) => warnings.push(ingestion_warning(&path, &err)),
        }
    }
    Ok(logs)
}

/// Applies `f` to every item on scoped threads, at most one per available
/// core, each handling a contiguous chunk. Results keep input order.
fn parallel_map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let chunk_size = items.len().div_ceil(workers).max(1);
    let f = &f;
    thread::scope(|s| {
        let handles = items
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move || chunk.iter().map(f).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

fn ingestion_warning(path: &Path, err: &IngestionError) -> Warning {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    Warning::new(
        WarningKind::Ingestion,
        path.display().to_string(),
        format!("file skipped: {message}"),
    )
}

enum SessionResult {
    Analyzed {
        series: SessionSeries,
        findings: Vec<Findings>,
        warnings: Warnings,
    },
    Invalid {
        skipped: SkippedSession,
        warnings: Warnings,
    },
}

fn analyze_session(
    session: &Session,
    cleaner: &Cleaner<'_>,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> SessionResult {
    let mut warnings = Warnings::new();
    let cleaned = match cleaner.clean(session) {
        Ok(cleaned) => cleaned,
        Err(invalid) => {
            warnings.push(invalid.warning());
            return SessionResult::Invalid {
                skipped: SkippedSession {
                    id: invalid.info.id,
                    source: invalid.info.source,
                    samples: invalid.info.samples,
                    start: invalid.info.start,
                    end: invalid.info.end,
                    reason: SkipReason::NoValidData,
                },
                warnings,
            };
        }
    };
    warnings.extend(cleaned.warnings);

    let range = if request.time_range.is_all() || cleaned.info.time_base.is_clock() {
        request.time_range
    } else {
        warnings.push(
            Warning::new(
                WarningKind::TimeRangeIgnored,
                &cleaned.info.source,
                format!(
                    "time range {} ignored, session has no clock time",
                    request.time_range
                ),
            )
            .with_session(cleaned.info.id),
        );
        TimeRange::All
    };
    let series = cleaned
        .series
        .iter()
        .map(|(metric, s)| (*metric, s.restrict(&range)))
        .collect::<BTreeMap<_, _>>();

    let ctx = AnalysisContext {
        session: &cleaned.info,
        series: &series,
        config,
        sensitivity: request.sensitivity,
    };
    let findings = request
        .kinds
        .iter()
        .map(|kind| {
            let (findings, kind_warnings) = kind.run(&ctx);
            warnings.extend(kind_warnings);
            findings
        })
        .collect();
    tracing::debug!(session = cleaned.info.id, "analysed session");

    SessionResult::Analyzed {
        series: SessionSeries {
            info: cleaned.info,
            series,
        },
        findings,
        warnings,
    }
}

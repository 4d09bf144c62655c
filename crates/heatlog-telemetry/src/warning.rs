//! Non-fatal problems collected while analysing.
//!
//! Nothing that goes wrong for a single file, session, metric or pair aborts
//! the request. Instead a [`Warning`] is recorded and carried through to the
//! report, so every skipped or dropped piece of data leaves a trace.

use std::fmt;

use serde::Serialize;

use crate::metric::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    #[display("ingestion")]
    Ingestion,
    #[display("schema")]
    SchemaResolution,
    #[display("time")]
    TimeParse,
    #[display("skipped session")]
    SkippedSession,
    #[display("invalid session")]
    InvalidSession,
    #[display("dropped samples")]
    DroppedSamples,
    #[display("flat sensor")]
    FlatSensor,
    #[display("insufficient data")]
    InsufficientData,
    #[display("insufficient overlap")]
    InsufficientOverlap,
    #[display("time range")]
    TimeRangeIgnored,
    #[display("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Originating file.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            session: None,
            metric: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: usize) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.source)?;
        if let Some(session) = self.session {
            write!(f, " session {session}")?;
        }
        if let Some(metric) = self.metric {
            write!(f, " {metric}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered list of warnings that mirrors each entry to the `tracing` log.
#[derive(Debug, Default, Clone)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        tracing::warn!(kind = %warning.kind, "{warning}");
        self.0.push(warning);
    }

    /// Appends warnings that were already logged where they were raised.
    pub fn append(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<Warning> for Warnings {
    fn extend<T: IntoIterator<Item = Warning>>(&mut self, iter: T) {
        for warning in iter {
            self.push(warning);
        }
    }
}

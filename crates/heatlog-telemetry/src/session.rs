//! Splitting telemetry into gaming sessions.
//!
//! A log file rarely covers exactly one play period: loggers are left
//! running, restarted, or several files are recorded on the same evening.
//! The [`Segmenter`] turns parsed logs into [`Session`]s.
//!
//! # Splitting rules
//!
//! ```text
//! samples of one clock-based file, sorted by time
//! ──●─●─●─●──────────(gap > threshold)──────────●─●─●──●─●──
//!   └ session 1 ┘                               └ session 2 ┘
//! ```
//!
//! - A new session starts whenever the gap to the previous sample is
//!   **strictly greater** than the threshold. A gap of exactly the threshold
//!   stays in the same session. Sessions never span two files.
//! - Sessions of all clock-based files are ordered by start time; the sort
//!   is stable, so input order breaks ties.
//! - Files without parseable time (sequence base) form one session each and
//!   follow the clock-based sessions in input order.
//! - Sessions shorter than the minimum sample count are not analysed. They
//!   are returned as [`SkippedSession`]s so the report can list them.
//!
//! Session ids are assigned from 1 in output order, skipped sessions included.

use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;

use crate::{
    config::AnalysisConfig,
    ingest::TelemetryLog,
    sample::Sample,
    schema::Schema,
    time::{TimeBase, Timestamp},
};

/// A contiguous play period from one file.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: usize,
    pub source: String,
    pub schema: Arc<Schema>,
    pub time_base: TimeBase,
    /// Samples ordered by timestamp. Never empty.
    pub samples: Vec<Sample>,
}

impl Session {
    #[must_use]
    pub fn start(&self) -> Option<Timestamp> {
        self.samples.first().map(|s| s.time)
    }

    #[must_use]
    pub fn end(&self) -> Option<Timestamp> {
        self.samples.last().map(|s| s.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[display("insufficient data")]
    TooFewSamples,
    #[display("no valid data")]
    NoValidData,
}

/// A session left out of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSession {
    pub id: usize,
    pub source: String,
    pub samples: usize,
    pub start: Timestamp,
    pub end: Timestamp,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Segmentation {
    pub sessions: Vec<Session>,
    pub skipped: Vec<SkippedSession>,
}

#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    gap: TimeDelta,
    min_samples: usize,
}

impl Segmenter {
    #[must_use]
    pub fn new(gap: TimeDelta, min_samples: usize) -> Self {
        Self { gap, min_samples }
    }

    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.session_gap(), config.min_session_samples)
    }

    /// Splits `logs` into sessions.
    #[must_use]
    pub fn segment(&self, logs: Vec<TelemetryLog>) -> Segmentation {
        let (clock, sequence): (Vec<_>, Vec<_>) =
            logs.into_iter().partition(|log| log.time_base.is_clock());

        let mut segments = self.split_clock_logs(clock);
        segments.extend(
            sequence
                .into_iter()
                .filter(|log| !log.samples.is_empty())
                .map(|log| Segment {
                    source: log.source,
                    schema: log.schema,
                    time_base: log.time_base,
                    samples: log.samples,
                }),
        );

        let mut segmentation = Segmentation::default();
        for (segment, id) in segments.into_iter().zip(1..) {
            if segment.samples.len() < self.min_samples {
                tracing::debug!(
                    id,
                    source = %segment.source,
                    samples = segment.samples.len(),
                    "skipping short session"
                );
                segmentation.skipped.push(SkippedSession {
                    id,
                    source: segment.source,
                    samples: segment.samples.len(),
                    start: segment.samples[0].time,
                    end: segment.samples[segment.samples.len() - 1].time,
                    reason: SkipReason::TooFewSamples,
                });
                continue;
            }
            segmentation.sessions.push(Session {
                id,
                source: segment.source,
                schema: segment.schema,
                time_base: segment.time_base,
                samples: segment.samples,
            });
        }
        segmentation
    }

    fn split_clock_logs(&self, logs: Vec<TelemetryLog>) -> Vec<Segment> {
        let mut segments: Vec<Segment> = vec![];
        for log in logs {
            let mut samples = log.samples;
            samples.sort_by_key(|s| s.time);
            let mut prev: Option<Timestamp> = None;
            for sample in samples {
                let continues =
                    prev.is_some_and(|prev| gap_between(prev, sample.time) <= self.gap);
                prev = Some(sample.time);
                match segments.last_mut() {
                    Some(segment) if continues => segment.samples.push(sample),
                    _ => segments.push(Segment {
                        source: log.source.clone(),
                        schema: Arc::clone(&log.schema),
                        time_base: TimeBase::Clock,
                        samples: vec![sample],
                    }),
                }
            }
        }
        segments.sort_by_key(|segment| segment.samples[0].time);
        segments
    }
}

fn gap_between(prev: Timestamp, next: Timestamp) -> TimeDelta {
    match (prev.clock(), next.clock()) {
        (Some(prev), Some(next)) => next - prev,
        _ => TimeDelta::zero(),
    }
}

struct Segment {
    source: String,
    schema: Arc<Schema>,
    time_base: TimeBase,
    samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use crate::metric::Metric;

    use super::*;

    fn clock_log(source: &str, minutes: &[i64]) -> TelemetryLog {
        let base = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let (schema, _) = Schema::resolve(&["Time", "CPU Temperature"], 0.5);
        TelemetryLog {
            source: source.to_owned(),
            schema: Arc::new(schema),
            time_base: TimeBase::Clock,
            samples: minutes
                .iter()
                .map(|m| Sample {
                    time: Timestamp::Clock(base + TimeDelta::minutes(*m)),
                    values: BTreeMap::from([(Metric::CpuTemp, Some(60.0))]),
                })
                .collect(),
        }
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(TimeDelta::minutes(30), 1)
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_in_session() {
        let seg = segmenter().segment(vec![clock_log("a.csv", &[0, 1, 31])]);
        assert_eq!(seg.sessions.len(), 1);
        assert_eq!(seg.sessions[0].samples.len(), 3);
    }

    #[test]
    fn test_gap_over_threshold_splits() {
        let seg = segmenter().segment(vec![clock_log("a.csv", &[0, 1, 32])]);
        assert_eq!(seg.sessions.len(), 2);
        assert_eq!(
            seg.sessions.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let seg = segmenter().segment(vec![clock_log("a.csv", &[2, 0, 1])]);
        let times = seg.sessions[0]
            .samples
            .iter()
            .map(|s| s.time)
            .collect::<Vec<_>>();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_source_change_splits() {
        let seg = segmenter().segment(vec![
            clock_log("a.csv", &[0, 1, 2]),
            clock_log("b.csv", &[3, 4]),
        ]);
        assert_eq!(seg.sessions.len(), 2);
        assert_eq!(seg.sessions[0].source, "a.csv");
        assert_eq!(seg.sessions[1].source, "b.csv");
    }

    #[test]
    fn test_overlapping_files_stay_whole() {
        let seg = segmenter().segment(vec![
            clock_log("b.csv", &[1, 3, 5]),
            clock_log("a.csv", &[0, 2, 4]),
        ]);
        assert_eq!(seg.sessions.len(), 2);
        assert_eq!(seg.sessions[0].source, "a.csv");
        assert_eq!(seg.sessions[0].samples.len(), 3);
        assert_eq!(seg.sessions[1].source, "b.csv");
    }

    #[test]
    fn test_short_sessions_are_skipped() {
        let seg = Segmenter::new(TimeDelta::minutes(30), 5)
            .segment(vec![clock_log("a.csv", &[0, 1, 2, 3, 4, 5, 60, 61])]);
        assert_eq!(seg.sessions.len(), 1);
        assert_eq!(seg.skipped.len(), 1);
        assert_eq!(seg.skipped[0].id, 2);
        assert_eq!(seg.skipped[0].samples, 2);
        assert_eq!(seg.skipped[0].reason, SkipReason::TooFewSamples);
    }

    #[test]
    fn test_sequence_log_is_one_session() {
        let (schema, _) = Schema::resolve(&["CPU Temperature"], 0.5);
        let log = TelemetryLog {
            source: "seq.csv".to_owned(),
            schema: Arc::new(schema),
            time_base: TimeBase::Sequence,
            samples: (0..3)
                .map(|i| Sample {
                    time: Timestamp::Index(i),
                    values: BTreeMap::new(),
                })
                .collect(),
        };
        let seg = segmenter().segment(vec![log, clock_log("a.csv", &[0])]);
        assert_eq!(seg.sessions.len(), 2);
        assert_eq!(seg.sessions[0].source, "a.csv");
        assert_eq!(seg.sessions[1].time_base, TimeBase::Sequence);
    }
}

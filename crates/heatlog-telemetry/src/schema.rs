//! Fuzzy resolution of header columns to canonical metrics.
//!
//! Every hardware monitor names its columns differently (`CPU Temperature`,
//! `cpu_temp [°C]`, `GPU Hot Spot Temp`, `GPU Load %`). A header name is
//! split into lowercase tokens and matched against keyword rules; the share
//! of tokens a rule explains is its confidence. [`classify_column`] is a pure
//! function so the rules can be tested without any file I/O.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{metric::Metric, time::TimeColumns};

/// Unit tokens removed before matching (`°C`, `[W]`, `%` and the like).
const UNIT_TOKENS: [&str; 8] = ["c", "w", "pct", "percent", "mhz", "s", "ms", "rpm"];

/// What a header column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    #[display("date")]
    Date,
    #[display("time")]
    Time,
    #[display("datetime")]
    DateTime,
    #[display("{_0}")]
    Metric(Metric),
}

/// Result of classifying one header name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnMatch {
    pub role: ColumnRole,
    /// Share of the name's tokens explained by the matching rule, in `(0, 1]`.
    pub confidence: f64,
}

struct MetricRule {
    metric: Metric,
    /// Every group must be matched by at least one token.
    groups: &'static [&'static [&'static str]],
    /// Any token containing one of these disqualifies the rule.
    exclude: &'static [&'static str],
}

const RULES: [MetricRule; 8] = [
    MetricRule {
        metric: Metric::GpuHotspotTemp,
        groups: &[&["gpu"], &["hot", "spot", "junction"], &["temp"]],
        exclude: &["mem"],
    },
    MetricRule {
        metric: Metric::GpuTemp,
        groups: &[&["gpu"], &["temp"]],
        exclude: &["hot", "spot", "junction", "mem"],
    },
    MetricRule {
        metric: Metric::CpuTemp,
        groups: &[&["cpu"], &["temp"]],
        exclude: &[],
    },
    MetricRule {
        metric: Metric::CpuUsage,
        groups: &[&["cpu"], &["usage", "load", "util"]],
        exclude: &["mem"],
    },
    MetricRule {
        metric: Metric::GpuUsage,
        groups: &[&["gpu"], &["usage", "load", "util"]],
        exclude: &["mem"],
    },
    MetricRule {
        metric: Metric::MemoryUsage,
        groups: &[&["mem", "ram"], &["usage", "load", "util"]],
        exclude: &["gpu", "vram"],
    },
    MetricRule {
        metric: Metric::CpuPower,
        groups: &[&["cpu"], &["power", "watt"]],
        exclude: &[],
    },
    MetricRule {
        metric: Metric::GpuPower,
        groups: &[&["gpu"], &["power", "watt"]],
        exclude: &[],
    },
];

fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty() && !UNIT_TOKENS.contains(t))
        .map(str::to_owned)
        .collect()
}

/// Classifies a header name.
///
/// Returns the best matching role with its confidence, or `None` when no
/// rule applies at all.
///
/// # Examples
///
/// ```
/// use heatlog_telemetry::{metric::Metric, schema::{classify_column, ColumnRole}};
///
/// let m = classify_column("GPU Hot Spot Temperature [°C]").unwrap();
/// assert_eq!(m.role, ColumnRole::Metric(Metric::GpuHotspotTemp));
/// assert_eq!(m.confidence, 1.0);
///
/// assert!(classify_column("Fan Speed").is_none());
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn classify_column(name: &str) -> Option<ColumnMatch> {
    let tokens = tokenize(name);
    if tokens.is_empty() {
        return None;
    }

    match tokens.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["date"] => return Some(ColumnMatch { role: ColumnRole::Date, confidence: 1.0 }),
        ["time"] => return Some(ColumnMatch { role: ColumnRole::Time, confidence: 1.0 }),
        ["datetime" | "timestamp"] | ["date", "time"] => {
            return Some(ColumnMatch { role: ColumnRole::DateTime, confidence: 1.0 });
        }
        _ => {}
    }

    RULES.iter().find_map(|rule| {
        if tokens
            .iter()
            .any(|t| rule.exclude.iter().any(|ex| t.contains(ex)))
        {
            return None;
        }
        let mut explained = vec![false; tokens.len()];
        for group in rule.groups {
            let mut hit = false;
            for (i, token) in tokens.iter().enumerate() {
                if group.iter().any(|kw| token.contains(kw)) {
                    explained[i] = true;
                    hit = true;
                }
            }
            if !hit {
                return None;
            }
        }
        let matched = explained.iter().filter(|e| **e).count();
        Some(ColumnMatch {
            role: ColumnRole::Metric(rule.metric),
            confidence: matched as f64 / tokens.len() as f64,
        })
    })
}

/// Coarse grouping of header columns for inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCategory {
    #[display("Time")]
    Time,
    #[display("CPU")]
    Cpu,
    #[display("GPU")]
    Gpu,
    #[display("Memory")]
    Memory,
    #[display("Temperature")]
    Temperature,
    #[display("Power")]
    Power,
    #[display("Other")]
    Other,
}

impl ColumnCategory {
    /// Groups a header name by the keywords it contains.
    #[must_use]
    pub fn of(name: &str) -> Self {
        if let Some(ColumnMatch {
            role: ColumnRole::Date | ColumnRole::Time | ColumnRole::DateTime,
            ..
        }) = classify_column(name)
        {
            return ColumnCategory::Time;
        }
        let lower = name.to_lowercase();
        let has = |kws: &[&str]| kws.iter().any(|kw| lower.contains(kw));
        if has(&["cpu", "core", "package"]) {
            ColumnCategory::Cpu
        } else if has(&["gpu", "vram"]) {
            ColumnCategory::Gpu
        } else if has(&["mem", "ram"]) {
            ColumnCategory::Memory
        } else if has(&["temp", "°c"]) {
            ColumnCategory::Temperature
        } else if has(&["power", "watt"]) {
            ColumnCategory::Power
        } else {
            ColumnCategory::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
    pub confidence: f64,
}

/// Why a header column is not used for analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnIssue {
    /// Matched a metric, but below the confidence threshold.
    LowConfidence {
        name: String,
        metric: Metric,
        confidence: f64,
    },
    /// Another column already claimed the same metric with higher confidence.
    Duplicate {
        name: String,
        metric: Metric,
        kept: String,
    },
}

impl ColumnIssue {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ColumnIssue::LowConfidence {
                name,
                metric,
                confidence,
            } => format!(
                "column '{name}' only weakly matches {metric} (confidence {confidence:.2}), ignored"
            ),
            ColumnIssue::Duplicate { name, metric, kept } => {
                format!("column '{name}' also matches {metric}, using '{kept}'")
            }
        }
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        match self {
            ColumnIssue::LowConfidence { metric, .. } | ColumnIssue::Duplicate { metric, .. } => {
                *metric
            }
        }
    }
}

/// Resolved layout of one file's header. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub columns: Vec<String>,
    pub metrics: BTreeMap<Metric, ResolvedColumn>,
    #[serde(skip)]
    pub time: Option<TimeColumns>,
}

impl Schema {
    /// Resolves a header row.
    ///
    /// Columns below `threshold` confidence are left out and reported as
    /// issues. When two columns match the same metric the more confident one
    /// wins, the earlier one on ties.
    #[must_use]
    pub fn resolve(header: &[&str], threshold: f64) -> (Self, Vec<ColumnIssue>) {
        let mut metrics: BTreeMap<Metric, ResolvedColumn> = BTreeMap::new();
        let mut issues = vec![];
        let (mut date, mut time, mut datetime) = (None, None, None);

        for (index, name) in header.iter().enumerate() {
            let Some(m) = classify_column(name) else {
                continue;
            };
            let metric = match m.role {
                ColumnRole::Date => {
                    date.get_or_insert(index);
                    continue;
                }
                ColumnRole::Time => {
                    time.get_or_insert(index);
                    continue;
                }
                ColumnRole::DateTime => {
                    datetime.get_or_insert(index);
                    continue;
                }
                ColumnRole::Metric(metric) => metric,
            };
            if m.confidence < threshold {
                issues.push(ColumnIssue::LowConfidence {
                    name: (*name).to_owned(),
                    metric,
                    confidence: m.confidence,
                });
                continue;
            }
            let candidate = ResolvedColumn {
                index,
                name: (*name).to_owned(),
                confidence: m.confidence,
            };
            match metrics.get_mut(&metric) {
                Some(current) if candidate.confidence > current.confidence => {
                    issues.push(ColumnIssue::Duplicate {
                        name: current.name.clone(),
                        metric,
                        kept: candidate.name.clone(),
                    });
                    *current = candidate;
                }
                Some(current) => issues.push(ColumnIssue::Duplicate {
                    name: candidate.name,
                    metric,
                    kept: current.name.clone(),
                }),
                None => {
                    metrics.insert(metric, candidate);
                }
            }
        }

        let time = match (date, time, datetime) {
            (Some(date), Some(time), _) => Some(TimeColumns::DateAndTime { date, time }),
            (_, _, Some(idx)) | (None, Some(idx), None) | (Some(idx), None, None) => {
                Some(TimeColumns::Single(idx))
            }
            (None, None, None) => None,
        };

        let schema = Self {
            columns: header.iter().map(|s| (*s).to_owned()).collect(),
            metrics,
            time,
        };
        (schema, issues)
    }

    #[must_use]
    pub fn column(&self, metric: Metric) -> Option<&ResolvedColumn> {
        self.metrics.get(&metric)
    }

    /// Returns `true` if `row` repeats this header.
    #[must_use]
    pub fn is_header_row(&self, row: &[&str]) -> bool {
        row.len() == self.columns.len()
            && row
                .iter()
                .zip(&self.columns)
                .all(|(cell, name)| cell.trim().eq_ignore_ascii_case(name.trim()))
    }
}

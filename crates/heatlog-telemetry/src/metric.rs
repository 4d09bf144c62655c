//! Canonical hardware metrics tracked by the analyzer.

use std::{collections::BTreeSet, str::FromStr};

use serde::{Deserialize, Serialize};

/// A canonical metric a telemetry column can resolve to.
///
/// The declaration order is the canonical order used everywhere results are
/// listed (schema, summaries, correlation pairs).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[display("cpu_temp")]
    CpuTemp,
    #[display("gpu_temp")]
    GpuTemp,
    #[display("gpu_hotspot_temp")]
    GpuHotspotTemp,
    #[display("cpu_usage")]
    CpuUsage,
    #[display("gpu_usage")]
    GpuUsage,
    #[display("memory_usage")]
    MemoryUsage,
    #[display("cpu_power")]
    CpuPower,
    #[display("gpu_power")]
    GpuPower,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::CpuTemp,
        Metric::GpuTemp,
        Metric::GpuHotspotTemp,
        Metric::CpuUsage,
        Metric::GpuUsage,
        Metric::MemoryUsage,
        Metric::CpuPower,
        Metric::GpuPower,
    ];

    #[must_use]
    pub fn kind(self) -> MetricKind {
        match self {
            Metric::CpuTemp | Metric::GpuTemp | Metric::GpuHotspotTemp => MetricKind::Temperature,
            Metric::CpuUsage | Metric::GpuUsage | Metric::MemoryUsage => MetricKind::Usage,
            Metric::CpuPower | Metric::GpuPower => MetricKind::Power,
        }
    }

    /// Human-readable label used in text reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Metric::CpuTemp => "CPU Temperature",
            Metric::GpuTemp => "GPU Temperature",
            Metric::GpuHotspotTemp => "GPU Hot Spot Temperature",
            Metric::CpuUsage => "CPU Usage",
            Metric::GpuUsage => "GPU Usage",
            Metric::MemoryUsage => "Memory Usage",
            Metric::CpuPower => "CPU Power",
            Metric::GpuPower => "GPU Power",
        }
    }
}

/// Physical quantity measured by a metric.
///
/// The kind decides the validity range applied while cleaning and the unit
/// printed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[display("temperature")]
    Temperature,
    #[display("usage")]
    Usage,
    #[display("power")]
    Power,
}

impl MetricKind {
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::Temperature => "°C",
            MetricKind::Usage => "%",
            MetricKind::Power => "W",
        }
    }
}

/// A named group of metrics, matching the graph types a viewer offers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum MetricGroup {
    #[default]
    #[display("all")]
    All,
    #[display("temperature")]
    Temperature,
    #[display("cpu-usage")]
    CpuUsage,
    #[display("gpu-usage")]
    GpuUsage,
}

impl MetricGroup {
    #[must_use]
    pub fn contains(self, metric: Metric) -> bool {
        match self {
            MetricGroup::All => true,
            MetricGroup::Temperature => metric.kind() == MetricKind::Temperature,
            MetricGroup::CpuUsage => metric == Metric::CpuUsage,
            MetricGroup::GpuUsage => metric == Metric::GpuUsage,
        }
    }

    /// The set of metrics in this group, in canonical order.
    #[must_use]
    pub fn metrics(self) -> BTreeSet<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("unknown metric group '{input}' (expected all, temperature, cpu-usage or gpu-usage)")]
pub struct ParseMetricGroupError {
    #[error(not(source))]
    input: String,
}

impl FromStr for MetricGroup {
    type Err = ParseMetricGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Ok(MetricGroup::All),
            "temperature" | "temp" => Ok(MetricGroup::Temperature),
            "cpu-usage" | "cpu" => Ok(MetricGroup::CpuUsage),
            "gpu-usage" | "gpu" => Ok(MetricGroup::GpuUsage),
            _ => Err(ParseMetricGroupError {
                input: s.to_owned(),
            }),
        }
    }
}

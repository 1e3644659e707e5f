use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Calendar day of an entry. There is deliberately no time-of-day component;
/// all date comparisons in the engine are by calendar day.
pub type EntryDate = NaiveDate;

/// Shape constraint a metric's values must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MetricKind {
    /// Numeric value within an inclusive range, e.g. 1–5.
    Range { min: f64, max: f64 },
    /// One of a fixed set of labels.
    Enum { values: Vec<String> },
    /// Unconstrained short text.
    FreeText,
}

/// Externally supplied metric declaration. Read-only input to the engine;
/// keys are unique within a configuration (enforced by config validation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub key: String,
    pub display_name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl MetricDefinition {
    pub fn range(key: &str, display_name: &str, min: f64, max: f64) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            kind: MetricKind::Range { min, max },
            default: None,
        }
    }

    pub fn enumerated(key: &str, display_name: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            kind: MetricKind::Enum {
                values: values.iter().map(|v| (*v).to_string()).collect(),
            },
            default: None,
        }
    }
}

/// One metric value as it appeared in a parsed entry, validated against its
/// `MetricDefinition` at parse time. Absence of a metric is absence from the
/// entry map, not a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum MetricValue {
    Numeric(f64),
    Enumerated(String),
    Text(String),
    /// Numeric value that failed range validation. Kept and flagged rather
    /// than dropped; excluded from numeric statistics.
    OutOfRange(f64),
}

impl MetricValue {
    /// The value usable for numeric aggregation, if any.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Rendering form for the per-entry table.
    pub fn display(&self) -> String {
        match self {
            Self::Numeric(v) => format_number(*v),
            Self::Enumerated(s) | Self::Text(s) => s.clone(),
            Self::OutOfRange(v) => format!("{}!", format_number(*v)),
        }
    }
}

/// Render a float without a trailing `.0` for whole values, so tables stay
/// byte-stable regardless of how the value was written in the source.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// One parsed journal entry. Immutable after creation; rebuilt on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamEntry {
    pub date: EntryDate,
    pub title: String,
    /// Verbatim source span of the callout body.
    pub raw_content: String,
    pub metrics: BTreeMap<String, MetricValue>,
    pub source_file: PathBuf,
    /// 1-based inclusive line range of the callout in its source file.
    pub source_lines: (usize, usize),
}

/// Category of a non-fatal parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum WarningKind {
    UnparsedCallout,
    NestedCallout,
    MissingDate,
    UnknownMetric,
    OutOfRange,
    MalformedMetricLine,
    UnreadableFile,
    HandEditedRegion,
    BackupReplaced,
    FilterRejected,
}

/// Non-fatal diagnostic surfaced alongside a successful run. Warnings are
/// accumulated, never converted into run failure: the offending field or
/// block is skipped and the run continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub file: PathBuf,
    /// 1-based line where the problem was observed; 0 when not line-scoped.
    pub line: usize,
    pub detail: String,
}

impl ParseWarning {
    pub fn new(kind: WarningKind, file: impl Into<PathBuf>, line: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            detail: detail.into(),
        }
    }
}

/// Aggregated statistics for one metric over the filtered entry set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MetricStats {
    Numeric {
        count: usize,
        mean: f64,
        min: f64,
        max: f64,
        /// Value → occurrence count, bucketed on the rounded value. Ordinal
        /// metrics (1–5 style) bucket exactly.
        distribution: BTreeMap<i64, usize>,
    },
    Frequency {
        count: usize,
        counts: BTreeMap<String, usize>,
    },
    /// No qualifying entries. Explicit state instead of NaN.
    NoData,
}

impl MetricStats {
    pub fn count(&self) -> usize {
        match self {
            Self::Numeric { count, .. } | Self::Frequency { count, .. } => *count,
            Self::NoData => 0,
        }
    }
}

/// Whole-run aggregate: entry count, covered date span, per-metric stats.
/// Recomputed fully on every run; never cached across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_entries: usize,
    pub date_span: Option<(EntryDate, EntryDate)>,
    pub per_metric: BTreeMap<String, MetricStats>,
}

impl Summary {
    pub fn empty() -> Self {
        Self {
            total_entries: 0,
            date_span: None,
            per_metric: BTreeMap::new(),
        }
    }
}

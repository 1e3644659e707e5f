use lucid_core::MetricDefinition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use validator::Validate;

/// Complete per-invocation configuration for a synchronization run.
///
/// Passed into the pipeline as an immutable value; nothing in the engine
/// reads shared mutable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LucidConfig {
    /// The project note the engine owns generated regions inside of.
    pub project_note: PathBuf,

    #[serde(default)]
    #[validate(nested)]
    pub scan: ScanScope,

    #[validate(custom(function = "crate::validator::validate_metrics"))]
    pub metrics: Vec<MetricDefinition>,

    #[serde(default)]
    #[validate(nested)]
    pub filter: DateFilterSpec,

    #[serde(default)]
    #[validate(nested)]
    pub callout: CalloutConfig,

    #[serde(default)]
    pub backup: BackupPolicy,
}

/// Which notes to scan for entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanScope {
    /// Explicit note paths.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Folders scanned recursively for `.md` files.
    #[serde(default)]
    pub folders: Vec<PathBuf>,
    /// When a callout header carries no parsable date, fall back to a
    /// `YYYY-MM-DD` prefix in the file name.
    #[serde(default)]
    pub use_filename_date: bool,
}

/// Named preset resolved against "today" at run time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DatePreset {
    #[default]
    AllTime,
    // kebab-case turns the digits into "last7-days"; spell these out.
    #[serde(rename = "last-7-days")]
    #[strum(serialize = "last-7-days")]
    Last7Days,
    #[serde(rename = "last-30-days")]
    #[strum(serialize = "last-30-days")]
    Last30Days,
    ThisMonth,
    LastMonth,
    ThisYear,
}

/// Explicit inclusive `[start, end]` pair, as written by the user in one of
/// the configured display formats. Parsed and validated by the filter before
/// any entry is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRange {
    pub start: String,
    pub end: String,
}

/// Date filter specification. A custom range, when present, takes precedence
/// over the preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DateFilterSpec {
    #[serde(default)]
    pub preset: DatePreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomRange>,
    /// chrono format strings tried in order when parsing custom range dates
    /// and callout header dates. All of them canonicalize to the same
    /// calendar-day representation.
    #[serde(default = "default_date_formats")]
    #[validate(length(min = 1))]
    pub date_formats: Vec<String>,
}

fn default_date_formats() -> Vec<String> {
    vec!["%Y-%m-%d".to_string()]
}

impl Default for DateFilterSpec {
    fn default() -> Self {
        Self {
            preset: DatePreset::AllTime,
            custom: None,
            date_formats: default_date_formats(),
        }
    }
}

/// Callout syntax the parser recognizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalloutConfig {
    /// Callout type tag, matched as `[!tag]` in the header line.
    #[validate(length(min = 1))]
    pub tag: String,
    /// Prefix marking the metrics line within a callout body.
    #[validate(length(min = 1))]
    pub metrics_marker: String,
}

impl Default for CalloutConfig {
    fn default() -> Self {
        Self {
            tag: "dream".to_string(),
            metrics_marker: "Metrics:".to_string(),
        }
    }
}

/// What to do when a backup file from an earlier run is already present.
/// A pre-existing backup is never discarded silently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BackupPolicy {
    /// Replace it, emitting a warning that names the replaced file.
    #[default]
    ReplaceWithWarning,
    /// Fail the run before any mutation.
    Abort,
}

impl LucidConfig {
    /// Minimal configuration for one project note and a set of metric
    /// definitions; used heavily by tests.
    pub fn for_note(project_note: impl Into<PathBuf>, metrics: Vec<MetricDefinition>) -> Self {
        Self {
            project_note: project_note.into(),
            scan: ScanScope::default(),
            metrics,
            filter: DateFilterSpec::default(),
            callout: CalloutConfig::default(),
            backup: BackupPolicy::default(),
        }
    }
}

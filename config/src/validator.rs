//! Configuration validation.
//!
//! Structural rules the serde layer cannot express: metric key uniqueness,
//! range sanity, non-empty enumerations.

use crate::config::LucidConfig;
use lucid_core::{MetricDefinition, MetricKind};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

/// Validate a full configuration.
///
/// Rules:
/// - `metrics` is non-empty, keys are unique and non-empty
/// - `Range` metrics have `min <= max`
/// - `Enum` metrics declare at least one value
/// - `filter.date_formats` is non-empty
/// - callout tag and metrics marker are non-empty
pub fn validate(config: &LucidConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

pub(crate) fn validate_metrics(metrics: &Vec<MetricDefinition>) -> Result<(), ValidationError> {
    if metrics.is_empty() {
        return Err(ValidationError::new(
            "At least one metric definition is required",
        ));
    }

    let mut seen = HashSet::new();
    for def in metrics {
        if def.key.trim().is_empty() {
            return Err(ValidationError::new("Metric keys must be non-empty"));
        }
        if !seen.insert(def.key.as_str()) {
            let mut err = ValidationError::new("metric_key_duplicate");
            err.message = Some(format!("duplicate metric key `{}`", def.key).into());
            return Err(err);
        }
        match &def.kind {
            MetricKind::Range { min, max } => {
                if min > max {
                    let mut err = ValidationError::new("metric_range_inverted");
                    err.message = Some(
                        format!("metric `{}` has min {min} above max {max}", def.key).into(),
                    );
                    return Err(err);
                }
            }
            MetricKind::Enum { values } => {
                if values.is_empty() {
                    let mut err = ValidationError::new("metric_enum_empty");
                    err.message =
                        Some(format!("metric `{}` declares no enum values", def.key).into());
                    return Err(err);
                }
            }
            MetricKind::FreeText => {}
        }
    }

    Ok(())
}

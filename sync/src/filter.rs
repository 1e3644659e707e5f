//! Date range filter.
//!
//! Resolves a filter specification (named preset or explicit custom pair)
//! into an inclusion predicate over entry dates. Invalid custom ranges are
//! rejected before any filtering begins; callers retain the previously
//! active range instead of silently filtering everything out.

use chrono::{Datelike, Days, NaiveDate};
use config::{CustomRange, DateFilterSpec, DatePreset};
use errors::FilterError;
use lucid_core::EntryDate;
use serde::{Deserialize, Serialize};

/// Inclusive calendar-day range; `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRange {
    pub start: Option<EntryDate>,
    pub end: Option<EntryDate>,
}

impl ResolvedRange {
    pub const ALL: Self = Self {
        start: None,
        end: None,
    };

    pub fn contains(&self, date: EntryDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// Resolve a filter spec against `today`. A custom range, when present,
/// takes precedence over the preset.
pub fn resolve(spec: &DateFilterSpec, today: EntryDate) -> Result<ResolvedRange, FilterError> {
    if let Some(custom) = &spec.custom {
        return resolve_custom(custom, &spec.date_formats);
    }
    Ok(resolve_preset(spec.preset, today))
}

/// Like [`resolve`], but on rejection fall back to the previously active
/// range (or all-time when none), returning the error for surfacing.
pub fn resolve_or_previous(
    spec: &DateFilterSpec,
    today: EntryDate,
    previous: Option<ResolvedRange>,
) -> (ResolvedRange, Option<FilterError>) {
    match resolve(spec, today) {
        Ok(range) => (range, None),
        Err(err) => {
            tracing::warn!(error = %err, "date filter rejected; keeping previous filter");
            (previous.unwrap_or(ResolvedRange::ALL), Some(err))
        }
    }
}

fn resolve_custom(
    custom: &CustomRange,
    date_formats: &[String],
) -> Result<ResolvedRange, FilterError> {
    let start = parse_custom_date(&custom.start, date_formats, "start")?;
    let end = parse_custom_date(&custom.end, date_formats, "end")?;
    if start > end {
        return Err(FilterError::InvertedRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(ResolvedRange {
        start: Some(start),
        end: Some(end),
    })
}

fn parse_custom_date(
    raw: &str,
    date_formats: &[String],
    which: &str,
) -> Result<NaiveDate, FilterError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FilterError::IncompleteRange {
            missing: which.to_string(),
        });
    }
    date_formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| FilterError::UnparsableDate {
            raw: raw.to_string(),
            formats: date_formats.join(", "),
        })
}

fn resolve_preset(preset: DatePreset, today: EntryDate) -> ResolvedRange {
    match preset {
        DatePreset::AllTime => ResolvedRange::ALL,
        DatePreset::Last7Days => ResolvedRange {
            start: today.checked_sub_days(Days::new(6)),
            end: Some(today),
        },
        DatePreset::Last30Days => ResolvedRange {
            start: today.checked_sub_days(Days::new(29)),
            end: Some(today),
        },
        DatePreset::ThisMonth => ResolvedRange {
            start: today.with_day(1),
            end: Some(today),
        },
        DatePreset::LastMonth => {
            let first_of_this = today.with_day(1).unwrap_or(today);
            let last_of_prev = first_of_this.pred_opt();
            let first_of_prev = last_of_prev.and_then(|d| d.with_day(1));
            ResolvedRange {
                start: first_of_prev,
                end: last_of_prev,
            }
        }
        DatePreset::ThisYear => ResolvedRange {
            start: NaiveDate::from_ymd_opt(today.year(), 1, 1),
            end: Some(today),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn spec_with_custom(start: &str, end: &str) -> DateFilterSpec {
        DateFilterSpec {
            custom: Some(CustomRange {
                start: start.to_string(),
                end: end.to_string(),
            }),
            ..DateFilterSpec::default()
        }
    }

    #[test]
    fn test_custom_range_inclusive_bounds() {
        let spec = spec_with_custom("2025-01-01", "2025-01-31");
        let range = resolve(&spec, d(2025, 6, 1)).unwrap();

        assert!(range.contains(d(2025, 1, 1)));
        assert!(range.contains(d(2025, 1, 15)));
        assert!(!range.contains(d(2025, 2, 1)));
    }

    #[test]
    fn test_inverted_range_rejected_previous_retained() {
        let spec = spec_with_custom("2025-02-01", "2025-01-01");
        let previous = ResolvedRange {
            start: Some(d(2024, 1, 1)),
            end: Some(d(2024, 12, 31)),
        };

        let (range, err) = resolve_or_previous(&spec, d(2025, 6, 1), Some(previous));
        assert!(matches!(err, Some(FilterError::InvertedRange { .. })));
        assert_eq!(range, previous);
    }

    #[test]
    fn test_unparsable_date_rejected() {
        let spec = spec_with_custom("not-a-date", "2025-01-31");
        let result = resolve(&spec, d(2025, 6, 1));
        assert!(matches!(result, Err(FilterError::UnparsableDate { .. })));
    }

    #[test]
    fn test_empty_custom_date_is_incomplete() {
        let spec = spec_with_custom("", "2025-01-31");
        let result = resolve(&spec, d(2025, 6, 1));
        assert!(matches!(result, Err(FilterError::IncompleteRange { .. })));
    }

    #[test]
    fn test_custom_takes_precedence_over_preset() {
        let mut spec = spec_with_custom("2025-01-01", "2025-01-31");
        spec.preset = DatePreset::Last7Days;

        let range = resolve(&spec, d(2025, 6, 1)).unwrap();
        assert_eq!(range.start, Some(d(2025, 1, 1)));
        assert_eq!(range.end, Some(d(2025, 1, 31)));
    }

    #[test]
    fn test_all_time_contains_everything() {
        let range = resolve(&DateFilterSpec::default(), d(2025, 6, 1)).unwrap();
        assert!(range.contains(d(1900, 1, 1)));
        assert!(range.contains(d(2999, 12, 31)));
    }

    #[test]
    fn test_last_30_days() {
        let spec = DateFilterSpec {
            preset: DatePreset::Last30Days,
            ..DateFilterSpec::default()
        };
        let range = resolve(&spec, d(2025, 3, 31)).unwrap();
        assert_eq!(range.start, Some(d(2025, 3, 2)));
        assert!(range.contains(d(2025, 3, 2)));
        assert!(!range.contains(d(2025, 3, 1)));
        assert!(range.contains(d(2025, 3, 31)));
        assert!(!range.contains(d(2025, 4, 1)));
    }

    #[test]
    fn test_this_month_and_last_month() {
        let today = d(2025, 3, 15);

        let this_month = resolve_preset(DatePreset::ThisMonth, today);
        assert_eq!(this_month.start, Some(d(2025, 3, 1)));
        assert_eq!(this_month.end, Some(today));

        let last_month = resolve_preset(DatePreset::LastMonth, today);
        assert_eq!(last_month.start, Some(d(2025, 2, 1)));
        assert_eq!(last_month.end, Some(d(2025, 2, 28)));
    }

    #[test]
    fn test_last_month_across_year_boundary() {
        let range = resolve_preset(DatePreset::LastMonth, d(2025, 1, 10));
        assert_eq!(range.start, Some(d(2024, 12, 1)));
        assert_eq!(range.end, Some(d(2024, 12, 31)));
    }

    #[test]
    fn test_multiple_formats_canonicalize_equal() {
        // The same calendar day written in two display formats must resolve
        // to equal bounds.
        let formats = vec!["%Y-%m-%d".to_string(), "%d/%m/%Y".to_string()];
        let mut spec_a = spec_with_custom("2025-01-01", "2025-01-31");
        spec_a.date_formats = formats.clone();
        let mut spec_b = spec_with_custom("01/01/2025", "31/01/2025");
        spec_b.date_formats = formats;

        let a = resolve(&spec_a, d(2025, 6, 1)).unwrap();
        let b = resolve(&spec_b, d(2025, 6, 1)).unwrap();
        assert_eq!(a, b);
    }
}

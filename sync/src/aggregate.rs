//! Metrics aggregator.
//!
//! Computes per-metric statistics plus overall entry count and date span
//! over an already-filtered entry set. Everything is recomputed fully on
//! every run; entry counts are small and correctness beats caching.

use lucid_core::{DreamEntry, MetricDefinition, MetricKind, MetricStats, MetricValue, Summary};
use std::collections::BTreeMap;

/// Aggregate the filtered entries against the configured definitions.
///
/// Entries missing a metric are excluded from that metric's statistics but
/// still count toward `total_entries`. Zero qualifying values yields an
/// explicit [`MetricStats::NoData`], never NaN.
pub fn aggregate(entries: &[DreamEntry], definitions: &[MetricDefinition]) -> Summary {
    let date_span = entries
        .iter()
        .map(|e| e.date)
        .min()
        .zip(entries.iter().map(|e| e.date).max());

    let mut per_metric = BTreeMap::new();
    for def in definitions {
        per_metric.insert(def.key.clone(), stats_for(def, entries));
    }

    Summary {
        total_entries: entries.len(),
        date_span,
        per_metric,
    }
}

fn stats_for(def: &MetricDefinition, entries: &[DreamEntry]) -> MetricStats {
    match def.kind {
        MetricKind::Range { .. } => numeric_stats(def, entries),
        MetricKind::Enum { .. } | MetricKind::FreeText => frequency_stats(def, entries),
    }
}

fn numeric_stats(def: &MetricDefinition, entries: &[DreamEntry]) -> MetricStats {
    // Only present, in-range numeric values qualify; out-of-range values
    // stay flagged on the entry and are excluded here.
    let values: Vec<f64> = entries
        .iter()
        .filter_map(|e| e.metrics.get(&def.key))
        .filter_map(MetricValue::as_numeric)
        .collect();

    if values.is_empty() {
        return MetricStats::NoData;
    }

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut distribution = BTreeMap::new();
    for v in &values {
        *distribution.entry(v.round() as i64).or_insert(0) += 1;
    }

    MetricStats::Numeric {
        count,
        mean: sum / count as f64,
        min,
        max,
        distribution,
    }
}

fn frequency_stats(def: &MetricDefinition, entries: &[DreamEntry]) -> MetricStats {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for entry in entries {
        match entry.metrics.get(&def.key) {
            Some(MetricValue::Enumerated(label)) | Some(MetricValue::Text(label)) => {
                *counts.entry(label.clone()).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    if counts.is_empty() {
        return MetricStats::NoData;
    }

    let count = counts.values().sum();
    MetricStats::Frequency { count, counts }
}

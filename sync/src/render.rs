//! Table renderer.
//!
//! Pure functions from aggregated data to markdown fragments. Identical
//! input always renders to byte-identical markdown; column widths and
//! alignment are computed from the content alone, with no global state.

use lucid_core::{DreamEntry, MetricDefinition, MetricStats, Summary, format_number};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Render the full generated-region body: a summary statistics table and a
/// per-entry table. Metric columns follow configuration order; entries are
/// sorted by date, ties broken by their original document order.
pub fn render_fragment(
    summary: &Summary,
    entries: &[DreamEntry],
    definitions: &[MetricDefinition],
) -> String {
    let mut out = String::new();

    out.push_str("## Dream Metrics\n\n");
    let _ = match summary.date_span {
        Some((first, last)) => writeln!(
            out,
            "{} entries from {first} to {last}",
            summary.total_entries
        ),
        None => writeln!(out, "{} entries", summary.total_entries),
    };
    out.push('\n');

    out.push_str(&render_summary_table(summary, definitions));
    out.push('\n');
    out.push_str("## Entries\n\n");
    out.push_str(&render_entry_table(entries, definitions));

    out
}

fn render_summary_table(summary: &Summary, definitions: &[MetricDefinition]) -> String {
    let headers = vec![
        "Metric".to_string(),
        "Count".to_string(),
        "Mean".to_string(),
        "Min".to_string(),
        "Max".to_string(),
        "Distribution".to_string(),
    ];
    let aligns = vec![
        Align::Left,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Right,
        Align::Left,
    ];

    let mut rows = Vec::new();
    for def in definitions {
        let stats = summary
            .per_metric
            .get(&def.key)
            .unwrap_or(&MetricStats::NoData);
        rows.push(summary_row(&def.display_name, stats));
    }

    render_table(&headers, &aligns, &rows)
}

fn summary_row(display_name: &str, stats: &MetricStats) -> Vec<String> {
    match stats {
        MetricStats::Numeric {
            count,
            mean,
            min,
            max,
            distribution,
        } => {
            let dist = distribution
                .iter()
                .map(|(value, n)| format!("{value}:{n}"))
                .collect::<Vec<_>>()
                .join(" ");
            vec![
                escape_cell(display_name),
                count.to_string(),
                format!("{mean:.2}"),
                format_number(*min),
                format_number(*max),
                dist,
            ]
        }
        MetricStats::Frequency { count, counts } => {
            let dist = counts
                .iter()
                .map(|(label, n)| format!("{}:{n}", escape_cell(label)))
                .collect::<Vec<_>>()
                .join(" ");
            vec![
                escape_cell(display_name),
                count.to_string(),
                "n/a".to_string(),
                "n/a".to_string(),
                "n/a".to_string(),
                dist,
            ]
        }
        MetricStats::NoData => vec![
            escape_cell(display_name),
            "0".to_string(),
            "n/a".to_string(),
            "n/a".to_string(),
            "n/a".to_string(),
            String::new(),
        ],
    }
}

fn render_entry_table(entries: &[DreamEntry], definitions: &[MetricDefinition]) -> String {
    let mut headers = vec!["Date".to_string(), "Title".to_string()];
    let mut aligns = vec![Align::Left, Align::Left];
    for def in definitions {
        headers.push(def.display_name.clone());
        aligns.push(Align::Right);
    }

    let mut ordered: Vec<&DreamEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.date);

    let mut rows = Vec::new();
    for entry in ordered {
        let mut row = vec![entry.date.to_string(), escape_cell(&entry.title)];
        for def in definitions {
            row.push(
                entry
                    .metrics
                    .get(&def.key)
                    .map(|v| escape_cell(&v.display()))
                    .unwrap_or_default(),
            );
        }
        rows.push(row);
    }

    render_table(&headers, &aligns, &rows)
}

/// Render one markdown table with content-derived column widths.
fn render_table(headers: &[String], aligns: &[Align], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();

    out.push('|');
    for (header, width) in headers.iter().zip(&widths) {
        let _ = write!(out, " {header:<width$} |");
    }
    out.push('\n');

    out.push('|');
    for (align, width) in aligns.iter().zip(&widths) {
        match align {
            Align::Left => {
                let _ = write!(out, " {:-<width$} |", "");
            }
            Align::Right => {
                let _ = write!(out, " {:-<w$}: |", "", w = width - 1);
            }
        }
    }
    out.push('\n');

    for row in rows {
        out.push('|');
        for ((cell, align), width) in row.iter().zip(aligns).zip(&widths) {
            match align {
                Align::Left => {
                    let _ = write!(out, " {cell:<width$} |");
                }
                Align::Right => {
                    let _ = write!(out, " {cell:>width$} |");
                }
            }
        }
        out.push('\n');
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

//! Callout parser.
//!
//! Extracts metric-annotated journal entries out of raw note text. A small
//! line-by-line state machine (`Outside` → `Header` → `Body`) recognizes
//! blockquote callouts tagged with the configured type, e.g.
//!
//! ```text
//! > [!dream] 2025-01-15: Flying over the city
//! > Woke up mid-air. Lucid for most of it.
//! > Metrics: clarity: 4, mood: calm
//! ```
//!
//! Partial data is preserved, never discarded: a bad metric field flags the
//! field and keeps the entry; only structurally unusable blocks are skipped,
//! and every skip is recorded as a warning.

use chrono::NaiveDate;
use config::CalloutConfig;
use lucid_core::{DreamEntry, MetricDefinition, MetricKind, MetricValue, ParseWarning, WarningKind};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Parser inputs that hold for a whole run.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub metrics: &'a [MetricDefinition],
    pub callout: &'a CalloutConfig,
    pub date_formats: &'a [String],
    pub use_filename_date: bool,
}

/// Entries and diagnostics extracted from one note.
#[derive(Debug, Default)]
pub struct ParsedNote {
    pub entries: Vec<DreamEntry>,
    pub warnings: Vec<ParseWarning>,
}

static CALLOUT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s*\[!([A-Za-z0-9_-]+)\]\s*(.*)$").unwrap());

static QUOTED_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s?(.*)$").unwrap());

enum State {
    Outside,
    Header(Block),
    Body(Block),
}

struct Block {
    start_line: usize,
    date: Option<NaiveDate>,
    title: String,
    raw_lines: Vec<String>,
    body_lines: Vec<String>,
    metrics: BTreeMap<String, MetricValue>,
    /// Set when a nested callout poisons the block; the block is still
    /// consumed to its end, then dropped.
    skipped: bool,
}

/// Parse one note's full text into document-ordered entries.
///
/// Downstream consumers impose their own ordering; this function preserves
/// source order exactly.
pub fn parse_note(text: &str, source_file: &Path, ctx: &ParseContext<'_>) -> ParsedNote {
    let mut parsed = ParsedNote::default();
    let mut state = State::Outside;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        state = match state {
            State::Outside => try_open_block(line, line_no, source_file, ctx, &mut parsed),
            State::Header(block) | State::Body(block) => {
                step_body(block, line, line_no, source_file, ctx, &mut parsed)
            }
        };
    }

    // EOF closes an open block.
    if let State::Header(block) | State::Body(block) = state {
        finish_block(block, text.lines().count(), source_file, ctx, &mut parsed);
    }

    tracing::debug!(
        file = %source_file.display(),
        entries = parsed.entries.len(),
        warnings = parsed.warnings.len(),
        "parsed note"
    );

    parsed
}

fn try_open_block(
    line: &str,
    line_no: usize,
    source_file: &Path,
    ctx: &ParseContext<'_>,
    parsed: &mut ParsedNote,
) -> State {
    let Some(caps) = CALLOUT_HEADER.captures(line) else {
        // A line that mentions our tag but does not form a callout header
        // (unclosed bracket, missing quote prefix) is reported, not ignored.
        let tag_mention = format!("[!{}", ctx.callout.tag);
        if line.trim_start().starts_with('>') && line.contains(&tag_mention) {
            parsed.warnings.push(ParseWarning::new(
                WarningKind::UnparsedCallout,
                source_file,
                line_no,
                format!("line looks like a `{}` callout but could not be parsed", ctx.callout.tag),
            ));
        }
        return State::Outside;
    };
    if !caps[1].eq_ignore_ascii_case(&ctx.callout.tag) {
        // Some other callout type (tip, warning, ...); not ours.
        return State::Outside;
    }

    let rest = caps[2].trim();
    let (date, title) = parse_header_rest(rest, ctx.date_formats);

    State::Header(Block {
        start_line: line_no,
        date,
        title,
        raw_lines: vec![line.to_string()],
        body_lines: Vec::new(),
        metrics: BTreeMap::new(),
        skipped: false,
    })
}

fn step_body(
    mut block: Block,
    line: &str,
    line_no: usize,
    source_file: &Path,
    ctx: &ParseContext<'_>,
    parsed: &mut ParsedNote,
) -> State {
    let Some(caps) = QUOTED_LINE.captures(line) else {
        // Dedent or blank unquoted line closes the callout.
        finish_block(block, line_no - 1, source_file, ctx, parsed);
        // The closing line itself may open the next block.
        return try_open_block(line, line_no, source_file, ctx, parsed);
    };

    let content = caps[1].to_string();
    block.raw_lines.push(line.to_string());

    // Nested callouts are not supported: poison the block, keep consuming.
    let trimmed = content.trim_start();
    if trimmed.starts_with('>') && trimmed.contains("[!") {
        if !block.skipped {
            parsed.warnings.push(ParseWarning::new(
                WarningKind::NestedCallout,
                source_file,
                line_no,
                "nested callouts are not supported; block skipped",
            ));
        }
        block.skipped = true;
        return State::Body(block);
    }

    if let Some(metric_text) = strip_marker(&content, &ctx.callout.metrics_marker) {
        parse_metric_line(metric_text, line_no, source_file, ctx, &mut block, parsed);
    } else {
        block.body_lines.push(content);
    }

    State::Body(block)
}

fn finish_block(
    block: Block,
    end_line: usize,
    source_file: &Path,
    ctx: &ParseContext<'_>,
    parsed: &mut ParsedNote,
) {
    if block.skipped {
        return;
    }

    let date = match block.date {
        Some(d) => d,
        None => {
            let fallback = if ctx.use_filename_date {
                source_file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(utils::date_from_file_stem)
            } else {
                None
            };
            match fallback {
                Some(d) => d,
                None => {
                    parsed.warnings.push(ParseWarning::new(
                        WarningKind::MissingDate,
                        source_file,
                        block.start_line,
                        "callout has no parsable date and no filename fallback; entry excluded",
                    ));
                    return;
                }
            }
        }
    };

    parsed.entries.push(DreamEntry {
        date,
        title: block.title,
        raw_content: block.raw_lines.join("\n"),
        metrics: block.metrics,
        source_file: source_file.to_path_buf(),
        source_lines: (block.start_line, end_line),
    });
}

/// Split the header remainder into a date and a title. Accepted shapes:
/// `2025-01-15`, `2025-01-15: Title`, `2025-01-15 - Title`.
fn parse_header_rest(rest: &str, date_formats: &[String]) -> (Option<NaiveDate>, String) {
    if rest.is_empty() {
        return (None, String::new());
    }

    for sep in [':', '-'] {
        // Date formats themselves may contain '-', so split points are tried
        // from the right of the candidate date prefix.
        if let Some((candidate, title)) = split_once_after_date(rest, sep, date_formats) {
            return (Some(candidate), title);
        }
    }

    if let Some(date) = parse_date(rest.trim(), date_formats) {
        return (Some(date), String::new());
    }

    (None, rest.to_string())
}

fn split_once_after_date(
    rest: &str,
    sep: char,
    date_formats: &[String],
) -> Option<(NaiveDate, String)> {
    let mut search_from = 0;
    while let Some(pos) = rest[search_from..].find(sep) {
        let at = search_from + pos;
        let (head, tail) = rest.split_at(at);
        if let Some(date) = parse_date(head.trim(), date_formats) {
            return Some((date, tail[sep.len_utf8()..].trim().to_string()));
        }
        search_from = at + sep.len_utf8();
    }
    None
}

fn parse_date(raw: &str, date_formats: &[String]) -> Option<NaiveDate> {
    date_formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn strip_marker<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    let trimmed = content.trim_start();
    match trimmed.get(..marker.len()) {
        Some(head) if head.eq_ignore_ascii_case(marker) => Some(trimmed[marker.len()..].trim()),
        _ => None,
    }
}

fn parse_metric_line(
    text: &str,
    line_no: usize,
    source_file: &Path,
    ctx: &ParseContext<'_>,
    block: &mut Block,
    parsed: &mut ParsedNote,
) {
    for pair in text.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once(':') else {
            parsed.warnings.push(ParseWarning::new(
                WarningKind::MalformedMetricLine,
                source_file,
                line_no,
                format!("expected `key: value`, found `{pair}`"),
            ));
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            parsed.warnings.push(ParseWarning::new(
                WarningKind::MalformedMetricLine,
                source_file,
                line_no,
                format!("empty key or value in `{pair}`"),
            ));
            continue;
        }

        let resolved = resolve_metric(key, value, line_no, source_file, ctx, parsed);
        block.metrics.insert(resolved.0, resolved.1);
    }
}

/// Validate one `key: value` pair against its definition. Out-of-range and
/// unknown values are kept (flagged or as text) so a single bad field never
/// loses the entry.
fn resolve_metric(
    key: &str,
    value: &str,
    line_no: usize,
    source_file: &Path,
    ctx: &ParseContext<'_>,
    parsed: &mut ParsedNote,
) -> (String, MetricValue) {
    let Some(def) = ctx
        .metrics
        .iter()
        .find(|d| d.key.eq_ignore_ascii_case(key))
    else {
        parsed.warnings.push(ParseWarning::new(
            WarningKind::UnknownMetric,
            source_file,
            line_no,
            format!("metric `{key}` is not defined; kept as text"),
        ));
        return (key.to_string(), MetricValue::Text(value.to_string()));
    };

    let resolved = match &def.kind {
        MetricKind::Range { min, max } => match value.parse::<f64>() {
            Ok(n) if n >= *min && n <= *max => MetricValue::Numeric(n),
            Ok(n) => {
                parsed.warnings.push(ParseWarning::new(
                    WarningKind::OutOfRange,
                    source_file,
                    line_no,
                    format!("`{}` value {n} outside range {min}–{max}", def.key),
                ));
                MetricValue::OutOfRange(n)
            }
            Err(_) => {
                parsed.warnings.push(ParseWarning::new(
                    WarningKind::MalformedMetricLine,
                    source_file,
                    line_no,
                    format!("`{}` expects a number, found `{value}`", def.key),
                ));
                MetricValue::Text(value.to_string())
            }
        },
        MetricKind::Enum { values } => {
            if let Some(canonical) = values.iter().find(|v| v.eq_ignore_ascii_case(value)) {
                MetricValue::Enumerated(canonical.clone())
            } else {
                parsed.warnings.push(ParseWarning::new(
                    WarningKind::OutOfRange,
                    source_file,
                    line_no,
                    format!("`{}` has no label `{value}`; kept as text", def.key),
                ));
                MetricValue::Text(value.to_string())
            }
        }
        MetricKind::FreeText => MetricValue::Text(value.to_string()),
    };

    (def.key.clone(), resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::CalloutConfig;
    use lucid_core::MetricDefinition;
    use std::path::PathBuf;

    fn defs() -> Vec<MetricDefinition> {
        vec![
            MetricDefinition::range("clarity", "Clarity", 1.0, 5.0),
            MetricDefinition::range("recall", "Emotional Recall", 1.0, 5.0),
            MetricDefinition::enumerated("mood", "Mood", &["calm", "anxious", "joyful"]),
        ]
    }

    fn parse(text: &str) -> ParsedNote {
        parse_with_file(text, "vault/journal/2025-01-15 dreams.md")
    }

    fn parse_with_file(text: &str, file: &str) -> ParsedNote {
        let metrics = defs();
        let callout = CalloutConfig::default();
        let formats = vec!["%Y-%m-%d".to_string()];
        let ctx = ParseContext {
            metrics: &metrics,
            callout: &callout,
            date_formats: &formats,
            use_filename_date: true,
        };
        parse_note(text, &PathBuf::from(file), &ctx)
    }

    #[test]
    fn test_parses_basic_callout() {
        let note = "\
# Journal

> [!dream] 2025-01-15: Flying over the city
> Woke up mid-air. Lucid for most of it.
> Metrics: clarity: 4, mood: calm

Some trailing prose.
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.warnings.is_empty());

        let entry = &parsed.entries[0];
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(entry.title, "Flying over the city");
        assert_eq!(entry.metrics["clarity"], MetricValue::Numeric(4.0));
        assert_eq!(
            entry.metrics["mood"],
            MetricValue::Enumerated("calm".to_string())
        );
        assert_eq!(entry.source_lines, (3, 5));
    }

    #[test]
    fn test_out_of_range_is_flagged_not_dropped() {
        let note = "\
> [!dream] 2025-01-15: Test
> Metrics: clarity: 9, recall: 3
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 1);
        let entry = &parsed.entries[0];
        assert_eq!(entry.metrics["clarity"], MetricValue::OutOfRange(9.0));
        assert_eq!(entry.metrics["recall"], MetricValue::Numeric(3.0));
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::OutOfRange);
    }

    #[test]
    fn test_nested_callout_skips_block_with_warning() {
        let note = "\
> [!dream] 2025-01-15: Outer
> > [!note] inner
> still quoted

> [!dream] 2025-01-16: Fine one
> Metrics: clarity: 3
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].title, "Fine one");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::NestedCallout)
        );
    }

    #[test]
    fn test_missing_date_falls_back_to_filename() {
        let note = "\
> [!dream] A dream without a date
> Metrics: clarity: 2
";
        let parsed = parse_with_file(note, "vault/journal/2025-02-03.md");
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(
            parsed.entries[0].date,
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );
    }

    #[test]
    fn test_missing_date_without_fallback_excludes_entry() {
        let note = "> [!dream] No date here\n> body\n";
        let metrics = defs();
        let callout = CalloutConfig::default();
        let formats = vec!["%Y-%m-%d".to_string()];
        let ctx = ParseContext {
            metrics: &metrics,
            callout: &callout,
            date_formats: &formats,
            use_filename_date: false,
        };
        let parsed = parse_note(note, &PathBuf::from("undated.md"), &ctx);
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::MissingDate);
    }

    #[test]
    fn test_unknown_metric_kept_as_text() {
        let note = "\
> [!dream] 2025-01-15
> Metrics: vividness: 5
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(
            parsed.entries[0].metrics["vividness"],
            MetricValue::Text("5".to_string())
        );
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnknownMetric);
    }

    #[test]
    fn test_malformed_pair_keeps_remaining_pairs() {
        let note = "\
> [!dream] 2025-01-15
> Metrics: garbage, clarity: 4
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(
            parsed.entries[0].metrics["clarity"],
            MetricValue::Numeric(4.0)
        );
        assert!(
            parsed
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::MalformedMetricLine)
        );
    }

    #[test]
    fn test_other_callout_types_ignored() {
        let note = "\
> [!tip] Not a journal entry
> some advice
";
        let parsed = parse(note);
        assert!(parsed.entries.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_adjacent_blocks_split_on_dedent() {
        let note = "\
> [!dream] 2025-01-15: First
> body one
not quoted anymore
> [!dream] 2025-01-16: Second
> body two
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].title, "First");
        assert_eq!(parsed.entries[1].title, "Second");
    }

    #[test]
    fn test_document_order_preserved_not_date_order() {
        let note = "\
> [!dream] 2025-03-01: Later date first

> [!dream] 2025-01-01: Earlier date second
";
        let parsed = parse(note);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].title, "Later date first");
    }

    #[test]
    fn test_raw_content_is_verbatim() {
        let note = "\
> [!dream] 2025-01-15: Verbatim
>   indented body line
";
        let parsed = parse(note);
        assert_eq!(
            parsed.entries[0].raw_content,
            "> [!dream] 2025-01-15: Verbatim\n>   indented body line"
        );
    }

    #[test]
    fn test_unclosed_header_reported_as_unparsed() {
        let note = "> [!dream 2025-01-15 missing bracket\n";
        let parsed = parse(note);
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnparsedCallout);
    }

    #[test]
    fn test_enum_label_mismatch_kept_as_text() {
        let note = "\
> [!dream] 2025-01-15
> Metrics: mood: furious
";
        let parsed = parse(note);
        assert_eq!(
            parsed.entries[0].metrics["mood"],
            MetricValue::Text("furious".to_string())
        );
        assert!(
            parsed
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::OutOfRange)
        );
    }
}

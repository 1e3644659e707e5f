//! Content merger.
//!
//! Splices a freshly rendered generated-region body into the prior project
//! note. The central correctness property: every byte outside the generated
//! region is copied unchanged. Malformed marker arrangements abort with a
//! structural error instead of guessing.
//!
//! The begin marker records a hash of the body the engine last wrote, which
//! lets a later run distinguish "this is exactly what we produced" from
//! "the user hand-edited inside the region". Hand edits are overwritten
//! with a warning; availability over a hard stop.

use errors::MergeError;
use regex::Regex;
use std::sync::LazyLock;

/// Prefix of the begin marker; the full marker carries a version identifier
/// and the body hash, e.g. `<!-- lucid:begin v1 hash:0f3a... -->`.
pub const GENERATED_BEGIN_PREFIX: &str = "<!-- lucid:begin v1";

/// End marker, always exactly this line.
pub const GENERATED_END: &str = "<!-- lucid:end -->";

static BEGIN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!-- lucid:begin v1(?: hash:([0-9a-f]+))? -->$").unwrap());

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: String,
    /// The stored region no longer matched the hash recorded in the begin
    /// marker: someone edited inside the generated region since the last
    /// run. Overwritten, surfaced as a warning by the pipeline.
    pub hand_edited: bool,
    /// The prior note had no markers; a region was appended.
    pub first_run: bool,
}

struct Markers {
    /// Byte offset of the begin-marker line start and the offset just past
    /// its line terminator.
    begin: (usize, usize),
    end: (usize, usize),
    recorded_hash: Option<String>,
}

/// Merge `fragment` into `prior` as the generated-region body.
pub fn merge(prior: &str, fragment: &str) -> Result<MergeOutcome, MergeError> {
    let mut body = fragment.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    let hash = utils::short_content_hash(&body);
    let begin_line = format!("{GENERATED_BEGIN_PREFIX} hash:{hash} -->");

    match locate_markers(prior)? {
        Some(markers) => {
            let stored_body = &prior[markers.begin.1..markers.end.0];
            let hand_edited = markers
                .recorded_hash
                .as_deref()
                .is_some_and(|recorded| utils::short_content_hash(stored_body) != recorded);
            if hand_edited {
                tracing::warn!("generated region was hand-edited since the last run; overwriting");
            }

            let mut merged =
                String::with_capacity(prior.len() - stored_body.len() + body.len() + 48);
            merged.push_str(&prior[..markers.begin.0]);
            merged.push_str(&begin_line);
            merged.push('\n');
            merged.push_str(&body);
            merged.push_str(&prior[markers.end.0..]);

            Ok(MergeOutcome {
                merged,
                hand_edited,
                first_run: false,
            })
        }
        None => {
            // First run: append markers after all existing content,
            // touching none of it.
            let mut merged = String::with_capacity(prior.len() + body.len() + 64);
            merged.push_str(prior);
            if !prior.is_empty() {
                if !prior.ends_with('\n') {
                    merged.push('\n');
                }
                if !prior.ends_with("\n\n") {
                    merged.push('\n');
                }
            }
            merged.push_str(&begin_line);
            merged.push('\n');
            merged.push_str(&body);
            merged.push_str(GENERATED_END);
            merged.push('\n');

            Ok(MergeOutcome {
                merged,
                hand_edited: false,
                first_run: true,
            })
        }
    }
}

/// Find the generated-region markers, rejecting every ambiguous arrangement.
fn locate_markers(prior: &str) -> Result<Option<Markers>, MergeError> {
    let mut begin: Option<(usize, usize, usize, Option<String>)> = None;
    let mut end: Option<(usize, usize, usize)> = None;

    let mut offset = 0;
    for (idx, raw_line) in prior.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let line_end = offset + raw_line.len();

        if let Some(caps) = BEGIN_MARKER.captures(line) {
            if let Some((_, _, first, _)) = &begin {
                return Err(MergeError::DuplicateBegin {
                    first: *first,
                    second: line_no,
                });
            }
            let recorded = caps.get(1).map(|m| m.as_str().to_string());
            begin = Some((offset, line_end, line_no, recorded));
        } else if line == GENERATED_END {
            if let Some((_, _, first)) = &end {
                return Err(MergeError::DuplicateEnd {
                    first: *first,
                    second: line_no,
                });
            }
            end = Some((offset, line_end, line_no));
        }

        offset = line_end;
    }

    match (begin, end) {
        (None, None) => Ok(None),
        (Some((_, _, begin_line, _)), None) => Err(MergeError::MissingEnd { begin: begin_line }),
        (None, Some((_, _, end_line))) => Err(MergeError::MissingBegin { end: end_line }),
        (Some((b_start, b_end, b_line, recorded)), Some((e_start, e_end, e_line))) => {
            if e_line < b_line {
                return Err(MergeError::EndBeforeBegin {
                    begin: b_line,
                    end: e_line,
                });
            }
            Ok(Some(Markers {
                begin: (b_start, b_end),
                end: (e_start, e_end),
                recorded_hash: recorded,
            }))
        }
    }
}

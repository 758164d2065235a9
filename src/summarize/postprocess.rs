//! Deterministic cleanup of model-written summaries.
//!
//! Models asked for "clean Markdown" still wrap answers in fences, emit CRLF,
//! pad lines and leave zero-width characters behind. The passes below fix the
//! layout without touching content. They run over every partial summary and
//! over the final fused document.
//!
//! ## Pass Order
//!
//! ```text
//! unwrap_fence → unify_newlines → rstrip_lines → squeeze_blank_runs
//!              → separate_headings → drop_invisible → single_final_newline
//! ```
//!
//! The fence goes first so later passes see the real document. `\r` is
//! turned into `\n` before lines are stripped, otherwise it would survive at
//! line ends.

use once_cell::sync::Lazy;
use regex::Regex;

type Pass = fn(&str) -> String;

const PASSES: [Pass; 7] = [
    unwrap_fence,
    unify_newlines,
    rstrip_lines,
    squeeze_blank_runs,
    separate_headings,
    drop_invisible,
    single_final_newline,
];

/// Zero-width and formatting characters that render as nothing.
const INVISIBLE: [char; 6] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

static RE_WHOLE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

/// Four or more newlines, i.e. three or more blank lines.
static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

/// ATX heading; `#page=3` and `#hashtag` do not qualify.
static RE_ATX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

/// Clean a model reply that is returned to the caller.
pub fn clean_summary(input: &str) -> String {
    PASSES
        .iter()
        .fold(input.to_string(), |text, pass| pass(&text))
}

/// [`clean_summary`] without the trailing newline, for partials that are
/// embedded inside another prompt.
pub fn clean_partial(input: &str) -> String {
    let mut cleaned = clean_summary(input);
    cleaned.truncate(cleaned.trim_end().len());
    cleaned
}

fn unwrap_fence(input: &str) -> String {
    RE_WHOLE_FENCE
        .captures(input.trim())
        .map_or_else(|| input.to_string(), |caps| caps[1].to_string())
}

fn unify_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn rstrip_lines(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// At most two blank lines in a row.
fn squeeze_blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").into_owned()
}

/// Exactly one blank line before every heading except a leading one.
fn separate_headings(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 64);
    for line in input.lines() {
        if !out.is_empty() && RE_ATX_HEADING.is_match(line) {
            out.truncate(out.trim_end_matches('\n').len());
            out.push_str("\n\n");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn drop_invisible(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

fn single_final_newline(input: &str) -> String {
    let body = input.trim_end();
    let mut out = String::with_capacity(body.len() + 1);
    out.push_str(body);
    out.push('\n');
    out
}

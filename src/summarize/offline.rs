//! Offline summary: local text analysis with no external dependency.
//!
//! Used when any backend call fails. The output depends only on the input
//! text and the mode, so identical input always yields identical Markdown.
//!
//! ## How it works
//!
//! 1. Split sentences at terminal punctuation, keep those longer than 5 chars.
//! 2. Score 41–239 char sentences: length weight, domain keyword families
//!    (Spanish and English, each family once), digits, discourse connectives. Keep the top 12, ties in source order.
//! 3. The first sentence of each of the first 20 paragraphs becomes a key
//!    point (at most 10).
//! 4. Rich mode also pulls bullet lines, numbered steps, `#param=value`
//!    tokens and URLs out of the raw text.

use super::chunk::split_terminal;
use crate::config::SummaryMode;
use crate::extract::estimate_pages;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const IMPORTANT_SENTENCES: usize = 12;
const KEY_POINT_PARAGRAPHS: usize = 20;
const KEY_POINTS: usize = 10;
const MAX_BULLETS: usize = 60;
const MAX_STEPS: usize = 80;

/// Stems that mark a sentence as central to the document, grouped so that
/// a Spanish word and its English cognate count once. A stem matches at the
/// start of a word followed by a short inflection, see [`has_stem`].
const KEYWORD_FAMILIES: &[&[&str]] = &[
    &["important"],
    &["principal", "main"],
    &["conclus"],
    &["result"],
    &["objetiv", "objectiv"],
    &["propósito", "purpose"],
    &["meta", "goal"],
    &["fundamental"],
    &["esencial", "essential"],
    &["clave", "key"],
    &["relevant"],
    &["crític", "critical"],
    &["vital"],
    &["procedimiento", "procedure"],
    &["paso", "step"],
    &["instal"],
    &["configur"],
];

/// Points per keyword family present in a sentence.
const KEYWORD_WEIGHT: f64 = 8.0;

static RE_CONNECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(por ejemplo|es decir|además|nota:|for example|that is|in addition|moreover|note:)").unwrap()
});
static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\*|-|•)\s+").unwrap());
static RE_STEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s+").unwrap());
static RE_HASH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z_]+(?:=[^ \n&#]+)?").unwrap());
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bhttps?://[^\s)]+").unwrap());

/// Statistics and extracts shared by both templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnalysis {
    pub total_sentences: usize,
    pub total_words: usize,
    pub total_paragraphs: usize,
    /// Highest-scoring sentences, best first.
    pub important_sentences: Vec<String>,
    pub key_points: Vec<String>,
}

/// Patterns only the Rich template uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralExtracts {
    pub bullets: Vec<String>,
    pub steps: Vec<String>,
    /// `#page=3`-style tokens, first occurrence order.
    pub commands: Vec<String>,
    pub urls: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Importance score of one sentence.
pub fn importance(sentence: &str) -> f64 {
    let mut score = char_len(sentence).min(240) as f64 * 0.12;
    let lower = sentence.to_lowercase();
    let families = KEYWORD_FAMILIES
        .iter()
        .filter(|stems| stems.iter().any(|stem| has_stem(&lower, stem)))
        .count();
    score += KEYWORD_WEIGHT * families as f64;
    if sentence.chars().any(|c| c.is_ascii_digit()) {
        score += 4.0;
    }
    if RE_CONNECTIVE.is_match(sentence) {
        score += 1.0;
    }
    score
}

/// `stem` starts a word of `lower` and at most a short inflection follows:
/// two letters for stems of four chars or fewer (`keys`, `pasos`), six for
/// longer ones (`conclusiones`). `monkey` and `keyboard` do not match `key`.
fn has_stem(lower: &str, stem: &str) -> bool {
    let max_suffix = if char_len(stem) <= 4 { 2 } else { 6 };
    lower.match_indices(stem).any(|(at, _)| {
        let starts_word = lower[..at].chars().next_back().is_none_or(|c| !c.is_alphanumeric());
        let suffix = lower[at + stem.len()..]
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .count();
        starts_word && suffix <= max_suffix
    })
}

pub fn analyze(text: &str) -> TextAnalysis {
    let sentences: Vec<&str> = split_terminal(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| char_len(s) > 5)
        .collect();

    let mut scored: Vec<(&str, f64)> = sentences
        .iter()
        .copied()
        .filter(|s| (41..240).contains(&char_len(s)))
        .map(|s| (s, importance(s)))
        .collect();
    // `sort_by` is stable: equal scores keep source order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let important_sentences = scored
        .into_iter()
        .take(IMPORTANT_SENTENCES)
        .map(|(s, _)| s.to_string())
        .collect();

    let paragraphs: Vec<&str> = RE_PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| char_len(p) > 10)
        .collect();

    let key_points = paragraphs
        .iter()
        .take(KEY_POINT_PARAGRAPHS)
        .filter_map(|p| split_terminal(p).into_iter().next())
        .filter(|first| char_len(first) > 20)
        .map(|first| first.trim().to_string())
        .take(KEY_POINTS)
        .collect();

    TextAnalysis {
        total_sentences: sentences.len(),
        total_words: text.split_whitespace().count(),
        total_paragraphs: paragraphs.len(),
        important_sentences,
        key_points,
    }
}

pub fn extract_structure(text: &str) -> StructuralExtracts {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    StructuralExtracts {
        bullets: lines
            .iter()
            .filter(|l| RE_BULLET.is_match(l))
            .take(MAX_BULLETS)
            .map(|l| l.to_string())
            .collect(),
        steps: lines
            .iter()
            .filter(|l| RE_STEP.is_match(l))
            .take(MAX_STEPS)
            .map(|l| l.to_string())
            .collect(),
        commands: dedup(RE_HASH_PARAM.find_iter(text).map(|m| m.as_str())),
        urls: dedup(RE_URL.find_iter(text).map(|m| m.as_str())),
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

/// Render the offline summary for `mode`.
pub fn offline_summary(text: &str, mode: SummaryMode) -> String {
    let analysis = analyze(text);
    match mode {
        SummaryMode::Executive => render_executive(&analysis),
        SummaryMode::Rich => render_rich(&analysis, &extract_structure(text)),
    }
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("- {empty}");
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn head(items: &[String], n: usize) -> &[String] {
    &items[..items.len().min(n)]
}

fn render_executive(a: &TextAnalysis) -> String {
    format!(
        "# Executive summary (offline)\n\n\
**Approximate length:** {} pages  \n\
**Paragraphs analysed:** {}\n\n\
## Key points\n{}\n\n\
## Relevant sentences\n{}\n\n\
> Generated by local analysis without an external AI. Nuances may be missing.\n",
        estimate_pages(a.total_words),
        a.total_paragraphs,
        bullet_list(head(&a.key_points, 8), "(no key points detected)"),
        bullet_list(head(&a.important_sentences, 6), "(no relevant sentences detected)"),
    )
}

fn render_rich(a: &TextAnalysis, x: &StructuralExtracts) -> String {
    let context = a
        .important_sentences
        .first()
        .or_else(|| a.key_points.first())
        .map_or("Technical document.", String::as_str);

    let mut out = format!(
        "# Structured summary (offline)\n\n\
## Context\n{context}\n\n\
## Outline\n{}\n\n\
## Detected procedures\n{}\n\n",
        bullet_list(&a.key_points, "(no outline detected)"),
        bullet_list(head(&x.steps, 30), "(no clearly numbered steps detected)"),
    );
    if !x.bullets.is_empty() {
        let items: Vec<String> = x
            .bullets
            .iter()
            .map(|b| RE_BULLET.replace(b, "").into_owned())
            .collect();
        out.push_str(&format!("## Listed items\n{}\n\n", bullet_list(&items, "")));
    }
    out.push_str(&format!(
        "## Commands / parameters\n{}\n\n\
## Highlights\n{}\n\n\
## References\n{}\n",
        bullet_list(&x.commands, "(no parameters such as #page=, #zoom=, etc.)"),
        bullet_list(head(&a.important_sentences, 6), "(none)"),
        bullet_list(&x.urls, "(no URLs found)"),
    ));
    out
}

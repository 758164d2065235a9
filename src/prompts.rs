//! Prompts for the chunk-and-reduce summarizer.
//!
//! Every instruction sent to a backend lives here, so changing the output
//! shape (an extra section, a different length band) means editing exactly
//! one place, and tests can inspect prompts without a live model.
//!
//! All prompts ask the model to answer in the language of the source text;
//! the offline summary is the only part of the crate with fixed headings.

use crate::config::SummaryMode;

/// System message attached to every summarizer call.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an assistant that extracts and structures the content of documents. \
You never invent facts and you always answer in the same language as the text you are given.";

const MAP_BASE: &str = r#"Summarise the following text IN THE SAME LANGUAGE AS THE TEXT.
Length: 120–180 words.

Requirements:
- Keep bullet lists and numbering when they exist.
- Keep tool names, commands, paths and parameters verbatim (for example "document.pdf#page=…").
- Do not invent data. Do not repeat yourself."#;

const MAP_RICH_SUFFIX: &str = r#"
If you find them, include these sections:
- "Procedures" with numbered steps.
- "Commands/Parameters".
- "Tools" and what they are used for."#;

const REDUCE_EXECUTIVE_STRUCTURE: &str = r#"1) Context
2) Key points (bullets)
3) Conclusion"#;

const REDUCE_RICH_STRUCTURE: &str = r#"1) Short context (2–3 lines)
2) Topic outline (bullets)
3) Step-by-step procedures (each with numbered steps)
4) Useful commands and parameters (e.g. "document.pdf#page=...", "zoom=", "pagemode=")
5) Tools and downloads (what each is and what it is for)
6) Best practices / notes
7) Final checklist
8) Glossary (key terms)"#;

/// Instruction for summarising one chunk.
pub fn map_prompt(mode: SummaryMode, chunk_text: &str) -> String {
    let suffix = match mode {
        SummaryMode::Executive => "",
        SummaryMode::Rich => MAP_RICH_SUFFIX,
    };
    format!("{MAP_BASE}{suffix}\n\nText:\n\n{chunk_text}")
}

/// Word band of the fused summary.
pub fn reduce_length(mode: SummaryMode) -> &'static str {
    match mode {
        SummaryMode::Executive => "250–500",
        SummaryMode::Rich => "800–1,200",
    }
}

/// Instruction fusing the partial summaries into the final document.
///
/// Partials are labelled `[#n]` in chunk order, with the approximate page
/// range appended when one is known: `[#2 (≈p. 3–4)]`.
pub fn reduce_prompt(mode: SummaryMode, partials: &[String], page_ranges: &[String]) -> String {
    let structure = match mode {
        SummaryMode::Executive => REDUCE_EXECUTIVE_STRUCTURE,
        SummaryMode::Rich => REDUCE_RICH_STRUCTURE,
    };
    let head = format!(
        "Merge and clean up the following mini-summaries into **{} words**, \
always IN THE SAME LANGUAGE AS THE ORIGINAL TEXT.\n\n\
Mandatory structure:\n{structure}\n\n\
When page ranges are given you may cite them as (≈p. X–Y).\n\n\
Answer in clean **Markdown**.",
        reduce_length(mode)
    );

    let body = partials
        .iter()
        .enumerate()
        .map(|(i, partial)| format!("{} {}", partial_label(i, page_ranges.get(i)), partial))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{head}\n\n{body}")
}

fn partial_label(index: usize, range: Option<&String>) -> String {
    match range {
        Some(r) if !r.is_empty() => format!("[#{} (≈{})]", index + 1, r),
        _ => format!("[#{}]", index + 1),
    }
}

/// Instruction re-encoding the final Markdown as strict JSON.
pub fn structured_prompt(markdown: &str) -> String {
    format!(
        r#"From the following Markdown, produce **pure JSON** with exactly these keys:
{{
  "context": string,
  "outline": string[],
  "procedures": [{{"title": string, "steps": string[]}}],
  "commands": string[],
  "tools": [{{"name": string, "description": string}}],
  "best_practices": string[],
  "checklist": string[],
  "glossary": [{{"term": string, "definition": string}}]
}}
Output nothing outside the JSON (no backticks, no comments).
If a section is missing, use an empty array.

Text:
{markdown}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_prompt_embeds_chunk_and_length() {
        let p = map_prompt(SummaryMode::Executive, "Alpha beta.");
        assert!(p.ends_with("Alpha beta."));
        assert!(p.contains("120–180 words"));
        assert!(!p.contains("Procedures"));
    }

    #[test]
    fn rich_map_prompt_asks_for_procedures() {
        let p = map_prompt(SummaryMode::Rich, "x");
        assert!(p.contains("\"Procedures\""));
        assert!(p.contains("\"Tools\""));
    }

    #[test]
    fn reduce_prompt_labels_partials_in_order() {
        let partials = vec!["first".to_string(), "second".to_string()];
        let ranges = vec!["p. 1–2".to_string(), "p. 3".to_string()];
        let p = reduce_prompt(SummaryMode::Executive, &partials, &ranges);
        let a = p.find("[#1 (≈p. 1–2)] first").unwrap();
        let b = p.find("[#2 (≈p. 3)] second").unwrap();
        assert!(a < b);
        assert!(p.contains("250–500"));
        assert!(p.contains("3) Conclusion"));
    }

    #[test]
    fn reduce_prompt_without_ranges() {
        let p = reduce_prompt(SummaryMode::Rich, &["only".to_string()], &[]);
        assert!(p.contains("[#1] only"));
        assert!(p.contains("8) Glossary"));
        assert!(p.contains("800–1,200"));
    }

    #[test]
    fn structured_prompt_lists_schema_keys() {
        let p = structured_prompt("# Title");
        for key in [
            "\"context\"",
            "\"outline\"",
            "\"procedures\"",
            "\"commands\"",
            "\"tools\"",
            "\"best_practices\"",
            "\"checklist\"",
            "\"glossary\"",
        ] {
            assert!(p.contains(key), "missing {key}");
        }
        assert!(p.ends_with("# Title"));
    }
}

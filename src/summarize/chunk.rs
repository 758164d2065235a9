//! Sentence segmentation and overlapping word-bounded chunking.
//!
//! ```text
//! sentences:  s1 s2 s3 s4 s5 s6 s7
//! chunk #0:   s1 s2 s3 s4
//! chunk #1:         s3 s4 s5 s6     (overlap = 2)
//! chunk #2:               s5 s6 s7
//! ```
//!
//! A chunk closes before the sentence that would push it past the word
//! budget. The last `overlap` sentences of the closed chunk seed the next
//! one, capped so that every chunk contributes at least one new sentence.

use crate::output::TextChunk;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split at `.`, `!` or `?` followed by whitespace.
///
/// The terminal punctuation stays with its sentence; the whitespace run that
/// follows is dropped. Pieces keep any inner whitespace (including newlines)
/// untouched, and empty pieces are skipped.
pub fn split_terminal(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(_, next)) = chars.peek() else { break };
        if !next.is_whitespace() {
            continue;
        }
        let end = i + c.len_utf8();
        if end > start {
            out.push(&text[start..end]);
        }
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                start = j;
                break;
            }
            chars.next();
            start = j + w.len_utf8();
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out.retain(|s| !s.trim().is_empty());
    out
}

/// Sentences of `text` after whitespace normalisation.
pub fn split_sentences(text: &str) -> Vec<String> {
    split_terminal(&normalize_whitespace(text))
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Split `text` into overlapping chunks of roughly `target_words` words.
///
/// A single sentence longer than the budget forms its own chunk. The final
/// partial chunk is always emitted. Page ranges are left unset; see
/// [`assign_page_ranges`].
pub fn chunk_text(text: &str, target_words: usize, overlap_sentences: usize) -> Vec<TextChunk> {
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut carried = 0;
    let mut count = 0;

    for sentence in split_sentences(text) {
        let words = word_count(&sentence);
        if count + words > target_words && !current.is_empty() {
            let keep = overlap_sentences.min(current.len() - 1);
            let seed = current[current.len() - keep..].to_vec();
            chunks.push(TextChunk {
                index: chunks.len(),
                sentences: std::mem::replace(&mut current, seed),
                word_count: count,
                overlap: carried,
                page_range: None,
            });
            carried = keep;
            count = current.iter().map(|s| word_count(s)).sum();
        }
        current.push(sentence);
        count += words;
    }

    if !current.is_empty() {
        chunks.push(TextChunk {
            index: chunks.len(),
            sentences: current,
            word_count: count,
            overlap: carried,
            page_range: None,
        });
    }
    chunks
}

/// Approximate page labels for `chunk_count` chunks over `page_count` pages.
///
/// Pages are dealt out evenly, `max(1, round(pages / chunks))` per chunk,
/// clamped to the last page. A one-page range renders as `p. N`.
pub fn page_ranges(page_count: usize, chunk_count: usize) -> Vec<String> {
    if chunk_count == 0 {
        return Vec::new();
    }
    let pages = page_count.max(1);
    let per_chunk = ((pages as f64 / chunk_count as f64).round() as usize).max(1);

    (0..chunk_count)
        .map(|i| {
            let start = (i * per_chunk + 1).min(pages);
            let end = ((i + 1) * per_chunk).min(pages);
            page_label(start, end)
        })
        .collect()
}

pub fn page_label(start: usize, end: usize) -> String {
    if end > start {
        format!("p. {start}–{end}")
    } else {
        format!("p. {start}")
    }
}

/// Fill in `page_range` on every chunk.
pub fn assign_page_ranges(chunks: &mut [TextChunk], page_count: usize) {
    let ranges = page_ranges(page_count, chunks.len());
    for (chunk, range) in chunks.iter_mut().zip(ranges) {
        chunk.page_range = Some(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(tag: usize, words: usize) -> String {
        let mut s = (0..words.saturating_sub(1))
            .map(|w| format!("w{tag}x{w}"))
            .collect::<Vec<_>>()
            .join(" ");
        if !s.is_empty() {
            s.push(' ');
        }
        s.push_str(&format!("end{tag}."));
        s
    }

    #[test]
    fn splits_on_terminal_punctuation_and_whitespace() {
        let s = split_sentences("Hello world.  How are you?\nFine!Thanks. Version 3.5 ships.");
        assert_eq!(s, ["Hello world.", "How are you?", "Fine!Thanks.", "Version 3.5 ships."]);
    }

    #[test]
    fn split_terminal_keeps_inner_newlines() {
        let parts = split_terminal("First line\ncontinues. Second.\n\nThird");
        assert_eq!(parts, ["First line\ncontinues.", "Second.", "Third"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("   \n ", 800, 2).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        // 3 sentences, 50 words.
        let text = [sentence(1, 20), sentence(2, 20), sentence(3, 10)].join(" ");
        assert_eq!(word_count(&text), 50);
        let chunks = chunk_text(&text, 800, 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sentences.len(), 3);
        assert_eq!(chunks[0].word_count, 50);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn chunks_overlap_by_configured_sentences() {
        let text: Vec<String> = (0..10).map(|i| sentence(i, 10)).collect();
        let chunks = chunk_text(&text.join(" "), 40, 2);

        assert_eq!(chunks[0].sentences.len(), 4);
        assert_eq!(chunks[1].overlap, 2);
        assert_eq!(chunks[1].sentences[..2], chunks[0].sentences[2..]);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.word_count <= 40);
        }
    }

    #[test]
    fn non_overlap_sentences_reconstruct_the_source() {
        let text: Vec<String> = (0..37).map(|i| sentence(i, 3 + i % 9)).collect();
        let joined = text.join(" ");
        for (target, overlap) in [(15, 0), (15, 2), (30, 3), (8, 5)] {
            let chunks = chunk_text(&joined, target, overlap);
            let rebuilt: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.new_sentences().iter().cloned())
                .collect();
            assert_eq!(rebuilt, split_sentences(&joined), "target={target} overlap={overlap}");
        }
    }

    #[test]
    fn oversized_sentence_forms_its_own_chunk() {
        let text = [sentence(1, 5), sentence(2, 50), sentence(3, 5)].join(" ");
        let chunks = chunk_text(&text, 20, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].new_sentences().len(), 1);
        assert_eq!(chunks[1].word_count, 50);
        // Carry-over from a single-sentence chunk would add nothing new.
        assert_eq!(chunks[2].overlap, 0);
    }

    #[test]
    fn page_ranges_deal_pages_evenly() {
        assert_eq!(page_ranges(10, 3), ["p. 1–3", "p. 4–6", "p. 7–9"]);
        assert_eq!(page_ranges(4, 2), ["p. 1–2", "p. 3–4"]);
        assert_eq!(page_ranges(1, 1), ["p. 1"]);
    }

    #[test]
    fn page_ranges_clamp_to_last_page() {
        assert_eq!(page_ranges(2, 4), ["p. 1", "p. 2", "p. 2", "p. 2"]);
        assert!(page_ranges(5, 0).is_empty());
    }

    #[test]
    fn assign_sets_every_chunk() {
        let text: Vec<String> = (0..6).map(|i| sentence(i, 10)).collect();
        let mut chunks = chunk_text(&text.join(" "), 20, 0);
        assign_page_ranges(&mut chunks, 6);
        let labels: Vec<_> = chunks.iter().map(|c| c.page_range.clone().unwrap()).collect();
        assert_eq!(labels, ["p. 1–2", "p. 3–4", "p. 5–6"]);
    }
}

//! Emphasis of vocabulary inside a phraseme's free-text fields.
//!
//! Matches are collected as byte spans first, longest token first, and a
//! span that overlaps an already claimed one is dropped. Markers are only
//! inserted once all spans are known, so a short token can never match
//! inside the markers or text of a longer one.

use regex::Regex;
use std::ops::Range;
use tracing::warn;

/// Markdown emphasis marker placed on both sides of a match.
pub const EMPHASIS: &str = "*";

/// Splits a `;`-separated vocabulary list, longest entries first.
pub fn highlight_tokens(words: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = words
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();
    tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    tokens
}

/// Sorted, non-overlapping byte ranges of whole-word, case-insensitive matches.
pub fn highlight_spans(text: &str, words: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    for token in highlight_tokens(words) {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(token));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(err) => {
                warn!(%token, error = %err, "Skipping unusable highlight token");
                continue;
            }
        };
        for found in re.find_iter(text) {
            let span = found.range();
            if spans.iter().any(|claimed| overlaps(claimed, &span)) {
                continue;
            }
            spans.push(span);
        }
    }
    spans.sort_by_key(|span| span.start);
    spans
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Wraps every highlight match in [`EMPHASIS`] markers, keeping its casing.
pub fn highlight(text: &str, words: &str) -> String {
    if words.trim().is_empty() {
        return text.to_string();
    }
    let spans = highlight_spans(text, words);
    if spans.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + spans.len() * EMPHASIS.len() * 2);
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(EMPHASIS);
        out.push_str(&text[span.clone()]);
        out.push_str(EMPHASIS);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_token_wins_and_is_wrapped_once() {
        assert_eq!(
            highlight("Das war gut gemacht.", "gemacht;mach"),
            "Das war gut *gemacht*."
        );
    }

    #[test]
    fn matching_is_case_insensitive_and_keeps_casing() {
        assert_eq!(
            highlight("Daumen drücken! Ich drücke die DAUMEN.", "daumen"),
            "*Daumen* drücken! Ich drücke die *DAUMEN*."
        );
    }

    #[test]
    fn only_whole_words_match() {
        assert_eq!(highlight("machen und mach", "mach"), "machen und *mach*");
        assert_eq!(highlight("Grüße über Füße", "füße"), "Grüße über *Füße*");
    }

    #[test]
    fn nested_shorter_token_is_not_rewrapped() {
        assert_eq!(
            highlight("Er fuhr ins Blaue hinein.", "hinein; Blaue hinein"),
            "Er fuhr ins *Blaue hinein*."
        );
        assert_eq!(
            highlight_spans("ins Blaue hinein, hinein", "hinein;Blaue hinein"),
            vec![4..16, 18..24]
        );
    }

    #[test]
    fn blank_vocabulary_returns_text_unchanged() {
        assert_eq!(highlight("unverändert", ""), "unverändert");
        assert_eq!(highlight("unverändert", " ; ;"), "unverändert");
        assert_eq!(highlight("kein Treffer", "Daumen"), "kein Treffer");
    }

    #[test]
    fn tokens_are_trimmed_and_sorted_by_length() {
        assert_eq!(
            highlight_tokens(" mach ; gemacht;; auf die Nerven "),
            vec!["auf die Nerven", "gemacht", "mach"]
        );
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert_eq!(highlight("a+b oder ab", "a+b"), "*a+b* oder ab");
    }
}

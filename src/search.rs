//! Text search over the glossary: suffix-stripping normalizer, per-row
//! matcher and the combined text/theme/style filter.

use crate::{Phraseme, PhrasemeTable, ResultSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// German endings tried in order; only the first match is stripped.
const SUFFIXES: [&str; 9] = ["lich", "keit", "heit", "ung", "en", "er", "e", "n", "s"];
/// A word must exceed `suffix length + MIN_STEM_GUARD` characters to be stripped.
const MIN_STEM_GUARD: usize = 3;

/// Lower-cases `word` and strips at most one common inflectional ending.
pub fn normalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let len = lower.chars().count();
    for suffix in SUFFIXES {
        let suffix_len = suffix.chars().count();
        if lower.ends_with(suffix) && len > suffix_len + MIN_STEM_GUARD {
            return lower[..lower.len() - suffix.len()].to_string();
        }
    }
    lower
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// At least one query word occurs.
    #[default]
    #[serde(rename = "OR", alias = "or", alias = "any")]
    Any,
    /// Every query word occurs.
    #[serde(rename = "AND", alias = "and", alias = "all")]
    All,
    /// The whole query occurs verbatim (case-insensitive).
    #[serde(rename = "EXACT", alias = "exact")]
    Exact,
}

impl SearchMode {
    pub const ALL_MODES: [SearchMode; 3] = [SearchMode::Any, SearchMode::All, SearchMode::Exact];

    pub fn query_value(&self) -> &'static str {
        match self {
            SearchMode::Any => "OR",
            SearchMode::All => "AND",
            SearchMode::Exact => "EXACT",
        }
    }

    /// Form label shown next to the mode selector.
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::Any => "eines der Wörter",
            SearchMode::All => "alle Wörter",
            SearchMode::Exact => "genauer Text",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSearchMode(pub String);

impl fmt::Display for UnknownSearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown search mode {:?} (expected OR, AND or EXACT)", self.0)
    }
}

impl std::error::Error for UnknownSearchMode {}

impl FromStr for SearchMode {
    type Err = UnknownSearchMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "or" | "any" => Ok(SearchMode::Any),
            "and" | "all" => Ok(SearchMode::All),
            "exact" => Ok(SearchMode::Exact),
            _ => Err(UnknownSearchMode(value.to_string())),
        }
    }
}

/// The four optional search inputs. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
    pub theme: String,
    pub style: String,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            text: text.into(),
            mode,
            ..Self::default()
        }
    }

    /// Whitespace-only text counts as no text, so it never filters in any mode.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// True if any query stem is contained in any stem of the row's searchable words.
pub fn matches_any(row: &Phraseme, words: &[&str]) -> bool {
    TextMatcher::Any(stems(words.iter().copied())).matches(row)
}

/// True if every query stem is contained in at least one stem of the row's searchable words.
pub fn matches_all(row: &Phraseme, words: &[&str]) -> bool {
    TextMatcher::All(stems(words.iter().copied())).matches(row)
}

/// Case-insensitive contiguous match against the joined searchable text, no stemming.
pub fn matches_exact(row: &Phraseme, query: &str) -> bool {
    TextMatcher::Exact(query.to_lowercase()).matches(row)
}

fn stems<'a>(words: impl Iterator<Item = &'a str>) -> Vec<String> {
    words.map(normalize).collect()
}

fn row_stems(row: &Phraseme) -> Vec<String> {
    stems(row.search_text().to_lowercase().split_whitespace())
}

/// Query text prepared once and applied to every row.
enum TextMatcher {
    Any(Vec<String>),
    All(Vec<String>),
    Exact(String),
}

impl TextMatcher {
    fn compile(text: &str, mode: SearchMode) -> Self {
        match mode {
            SearchMode::Any => TextMatcher::Any(stems(text.split_whitespace())),
            SearchMode::All => TextMatcher::All(stems(text.split_whitespace())),
            SearchMode::Exact => TextMatcher::Exact(text.to_lowercase()),
        }
    }

    fn matches(&self, row: &Phraseme) -> bool {
        match self {
            TextMatcher::Any(query) => {
                let text = row_stems(row);
                query
                    .iter()
                    .any(|qw| text.iter().any(|tw| tw.contains(qw.as_str())))
            }
            TextMatcher::All(query) => {
                let text = row_stems(row);
                query
                    .iter()
                    .all(|qw| text.iter().any(|tw| tw.contains(qw.as_str())))
            }
            TextMatcher::Exact(query) => row.search_text().to_lowercase().contains(query.as_str()),
        }
    }
}

/// Filters the table by text, theme and style, then sorts by phrase.
pub fn search(table: &PhrasemeTable, query: &SearchQuery) -> ResultSet {
    let matcher = query
        .has_text()
        .then(|| TextMatcher::compile(&query.text, query.mode));
    let rows: Vec<Arc<_>> = table
        .rows()
        .iter()
        .filter(|row| matcher.as_ref().is_none_or(|m| m.matches(row)))
        .filter(|row| query.theme.is_empty() || row.has_theme(&query.theme))
        .filter(|row| query.style.is_empty() || row.sprachstil_hereglee == query.style)
        .cloned()
        .collect();
    tracing::debug!(
        text = %query.text,
        mode = %query.mode,
        theme = %query.theme,
        style = %query.style,
        hits = rows.len(),
        "Search evaluated"
    );
    ResultSet::new(rows)
}

mod data;
pub mod highlight;
pub mod navigation;
pub mod search;
#[cfg(feature = "web")]
pub mod session;
#[cfg(feature = "web")]
pub mod web;

pub use data::{LoadError, Phraseme};
pub use highlight::{highlight, highlight_spans};
pub use navigation::{NavEvent, Page, Source, View, ViewState};
pub use search::{SearchMode, SearchQuery, normalize, search};

use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The immutable glossary table. Cheap to clone; rows are shared.
#[derive(Debug, Clone)]
pub struct PhrasemeTable {
    rows: Arc<[Arc<Phraseme>]>,
    by_id: Arc<HashMap<String, usize>>,
    version: Option<Arc<str>>,
}

impl PhrasemeTable {
    /// Loads a tab-separated export of the glossary spreadsheet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let parsed = data::read_tsv_file(path)?;
        let table = Self::from_parsed(parsed);
        info!(
            path = %path.display(),
            rows = table.len(),
            version = table.version().unwrap_or("-"),
            "Loaded phraseme table"
        );
        Ok(table)
    }

    /// Parses tab-separated text already held in memory.
    pub fn from_tsv_str(input: &str) -> Result<Self, LoadError> {
        data::parse_tsv(input).map(Self::from_parsed)
    }

    /// Builds a table from rows. Ids are assumed unique; the last duplicate wins in `get`.
    pub fn from_rows(rows: Vec<Phraseme>) -> Self {
        Self::from_parsed(data::ParsedRows {
            rows,
            version: None,
        })
    }

    fn from_parsed(parsed: data::ParsedRows) -> Self {
        let by_id = data::index_by_id(&parsed.rows);
        let rows: Vec<Arc<Phraseme>> = parsed.rows.into_iter().map(Arc::new).collect();
        Self {
            rows: rows.into(),
            by_id: Arc::new(by_id),
            version: parsed.version.map(Arc::from),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Arc<Phraseme>] {
        &self.rows
    }

    pub fn get(&self, phrasem_id: &str) -> Option<&Arc<Phraseme>> {
        self.by_id.get(phrasem_id).map(|&idx| &self.rows[idx])
    }

    /// Dataset version caption, taken from the first row's `version` cell.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Sorted distinct non-empty theme tags across all three theme columns.
    pub fn themes(&self) -> Vec<String> {
        let mut themes = BTreeSet::new();
        for row in self.rows.iter() {
            for theme in row.present_themes() {
                themes.insert(theme);
            }
        }
        themes.into_iter().map(str::to_string).collect()
    }

    /// Sorted distinct non-empty register tags.
    pub fn styles(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.sprachstil_hereglee.as_str())
            .filter(|style| !style.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// All rows tagged with `theme`, sorted by phrase.
    pub fn theme_results(&self, theme: &str) -> ResultSet {
        search(
            self,
            &SearchQuery {
                theme: theme.to_string(),
                ..SearchQuery::default()
            },
        )
    }

    pub fn random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Phraseme>> {
        if self.rows.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.rows.len());
        debug!(idx, id = %self.rows[idx].phrasem_id, "Random phraseme picked");
        Some(Arc::clone(&self.rows[idx]))
    }

    pub fn random(&self) -> Option<Arc<Phraseme>> {
        self.random_with(&mut rand::thread_rng())
    }
}

/// Ordered rows produced by one search or browse operation.
///
/// Always sorted ascending by `phrasem_de`; construction enforces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<Arc<Phraseme>>,
}

impl ResultSet {
    pub fn new(mut rows: Vec<Arc<Phraseme>>) -> Self {
        rows.sort_by(|a, b| a.phrasem_de.cmp(&b.phrasem_de));
        Self { rows }
    }

    pub fn single(row: Arc<Phraseme>) -> Self {
        Self { rows: vec![row] }
    }
}

impl Deref for ResultSet {
    type Target = [Arc<Phraseme>];

    fn deref(&self) -> &Self::Target {
        &self.rows
    }
}

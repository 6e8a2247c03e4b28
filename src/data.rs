use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const COL_ID: &str = "phrasem_id";
pub const COL_PHRASE: &str = "phrasem_de";
pub const COL_MEANING: &str = "bedeutung";
pub const COL_THEMES: [&str; 3] = ["thema_1", "thema_2", "thema_3"];
pub const COL_STYLE: &str = "sprachstil_hereglee";
pub const COL_NOTE: &str = "hinweis_tailbar";
pub const COL_GRAMMAR: &str = "grammatik_anhaar";
pub const COL_ORIGIN: &str = "herkunft_garal";
pub const COL_EXAMPLES: [&str; 3] = ["beispiel_1", "beispiel_2", "beispiel_3"];
pub const COL_HIGHLIGHT: &str = "highlight_words";
pub const COL_VERSION: &str = "version";

const REQUIRED_COLUMNS: [&str; 2] = [COL_ID, COL_PHRASE];

/// One row of the glossary. Empty string is the only "no value" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phraseme {
    pub phrasem_id: String,
    pub phrasem_de: String,
    pub bedeutung: String,
    pub thema_1: String,
    pub thema_2: String,
    pub thema_3: String,
    pub sprachstil_hereglee: String,
    pub hinweis_tailbar: String,
    pub grammatik_anhaar: String,
    pub herkunft_garal: String,
    pub beispiel_1: String,
    pub beispiel_2: String,
    pub beispiel_3: String,
    pub highlight_words: String,
}

impl Phraseme {
    pub fn themes(&self) -> [&str; 3] {
        [&self.thema_1, &self.thema_2, &self.thema_3]
    }

    /// Theme tags that carry a value, in column order.
    pub fn present_themes(&self) -> impl Iterator<Item = &str> {
        self.themes()
            .into_iter()
            .filter(|theme| !theme.trim().is_empty())
    }

    pub fn has_theme(&self, theme: &str) -> bool {
        self.themes().contains(&theme)
    }

    pub fn examples(&self) -> impl Iterator<Item = &str> {
        [
            self.beispiel_1.as_str(),
            self.beispiel_2.as_str(),
            self.beispiel_3.as_str(),
        ]
        .into_iter()
        .filter(|example| !example.is_empty())
    }

    /// Phrase text followed by the three theme tags, space-joined.
    pub fn search_text(&self) -> String {
        [
            self.phrasem_de.as_str(),
            self.thema_1.as_str(),
            self.thema_2.as_str(),
            self.thema_3.as_str(),
        ]
        .join(" ")
    }

    fn set(&mut self, column: &str, value: String) {
        let slot = match column {
            COL_ID => &mut self.phrasem_id,
            COL_PHRASE => &mut self.phrasem_de,
            COL_MEANING => &mut self.bedeutung,
            "thema_1" => &mut self.thema_1,
            "thema_2" => &mut self.thema_2,
            "thema_3" => &mut self.thema_3,
            COL_STYLE => &mut self.sprachstil_hereglee,
            COL_NOTE => &mut self.hinweis_tailbar,
            COL_GRAMMAR => &mut self.grammatik_anhaar,
            COL_ORIGIN => &mut self.herkunft_garal,
            "beispiel_1" => &mut self.beispiel_1,
            "beispiel_2" => &mut self.beispiel_2,
            "beispiel_3" => &mut self.beispiel_3,
            COL_HIGHLIGHT => &mut self.highlight_words,
            _ => return,
        };
        *slot = value;
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset is empty (no header line)")]
    Empty,
    #[error("dataset header is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("line {line}: empty `phrasem_id`")]
    MissingId { line: usize },
    #[error("line {line}: duplicate `phrasem_id` {id:?}")]
    DuplicateId { line: usize, id: String },
    #[error("malformed record: {0}")]
    Malformed(#[from] csv::Error),
}

/// Rows plus the optional dataset version caption.
#[derive(Debug, Default)]
pub(crate) struct ParsedRows {
    pub rows: Vec<Phraseme>,
    pub version: Option<String>,
}

pub(crate) fn read_tsv_file(path: &Path) -> Result<ParsedRows, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tsv(&raw)
}

pub(crate) fn parse_tsv(input: &str) -> Result<ParsedRows, LoadError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());
    let mut records = reader
        .records()
        .filter(|record| !matches!(record, Ok(record) if is_blank(record)));

    let header = records.next().ok_or(LoadError::Empty)??;
    let columns: Vec<String> = header.iter().map(clean_cell).collect();
    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|col| col == required) {
            return Err(LoadError::MissingColumn(required));
        }
    }
    let version_col = columns.iter().position(|col| col == COL_VERSION);

    let mut parsed = ParsedRows::default();
    let mut seen: HashSet<String> = HashSet::new();
    for record in records {
        let record = record?;
        let line_no = record.position().map_or(0, |pos| pos.line() as usize);
        let cells: Vec<String> = record.iter().map(clean_cell).collect();
        let mut row = Phraseme::default();
        for (col, name) in columns.iter().enumerate() {
            let value = cells.get(col).cloned().unwrap_or_default();
            row.set(name, value);
        }
        if row.phrasem_id.is_empty() {
            return Err(LoadError::MissingId { line: line_no });
        }
        if !seen.insert(row.phrasem_id.clone()) {
            return Err(LoadError::DuplicateId {
                line: line_no,
                id: row.phrasem_id,
            });
        }
        if parsed.rows.is_empty() {
            parsed.version = version_col
                .and_then(|col| cells.get(col))
                .filter(|value| !value.is_empty())
                .cloned();
        }
        parsed.rows.push(row);
    }
    Ok(parsed)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Quotes are already resolved by the reader; this only trims and maps `NaN` to empty.
fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('\r').trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Builds an id lookup for a loaded row set.
pub(crate) fn index_by_id(rows: &[Phraseme]) -> HashMap<String, usize> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| (row.phrasem_id.clone(), idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "phrasem_id\tphrasem_de\tbedeutung\tthema_1\tthema_2\tthema_3\tsprachstil_hereglee\thighlight_words\tversion";

    #[test]
    fn parses_rows_and_version() {
        let input = format!(
            "{HEADER}\n1\tjemandem die Daumen drücken\tGlück wünschen\tGlück\t\t\tumgangssprachlich\tDaumen\t2026-02\n2\tblau sein\tbetrunken sein\tAlkohol\tFarben\t\t\t\t\n"
        );
        let parsed = parse_tsv(&input).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.version.as_deref(), Some("2026-02"));
        let first = &parsed.rows[0];
        assert_eq!(first.phrasem_de, "jemandem die Daumen drücken");
        assert_eq!(first.thema_2, "");
        assert_eq!(parsed.rows[1].thema_2, "Farben");
    }

    #[test]
    fn coerces_nan_quotes_and_short_rows() {
        let input = "phrasem_id\tphrasem_de\tbedeutung\therkunft_garal\r\n7\t\"sagt \"\"ja\"\"\"\tNaN\r\n";
        let parsed = parse_tsv(input).unwrap();
        let row = &parsed.rows[0];
        assert_eq!(row.phrasem_de, "sagt \"ja\"");
        assert_eq!(row.bedeutung, "");
        assert_eq!(row.herkunft_garal, "");
        assert!(parsed.version.is_none());
    }

    #[test]
    fn quoted_cells_keep_newlines_and_tabs() {
        let input = "phrasem_id\tphrasem_de\thinweis_tailbar\tsprachstil_hereglee\n\
                     1\tblau sein\t\"Erste Zeile\nzweite Zeile\"\tsalopp\n\
                     2\tblau machen\t\"a\tb\"\tumgangssprachlich\n";
        let parsed = parse_tsv(input).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        let first = &parsed.rows[0];
        assert_eq!(first.hinweis_tailbar, "Erste Zeile\nzweite Zeile");
        assert_eq!(first.sprachstil_hereglee, "salopp");
        let second = &parsed.rows[1];
        assert_eq!(second.phrasem_id, "2");
        assert_eq!(second.hinweis_tailbar, "a\tb");
        assert_eq!(second.sprachstil_hereglee, "umgangssprachlich");
    }

    #[test]
    fn line_numbers_follow_multi_line_records() {
        let input = "phrasem_id\tphrasem_de\thinweis_tailbar\n1\ta\t\"x\ny\"\n\n1\tb\tz\n";
        match parse_tsv(input).unwrap_err() {
            LoadError::DuplicateId { line, id } => {
                assert_eq!(line, 5);
                assert_eq!(id, "1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        let parsed = parse_tsv("phrasem_id\tphrasem_de\n  \n1\ta\n\t\n").unwrap();
        assert_eq!(parsed.rows.len(), 1);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let err = parse_tsv("phrasem_id\tbedeutung\n1\tx\n").unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(COL_PHRASE)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_tsv("phrasem_id\tphrasem_de\n1\ta\n1\tb\n").unwrap_err();
        match err {
            LoadError::DuplicateId { line, id } => {
                assert_eq!(line, 3);
                assert_eq!(id, "1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(parse_tsv("\n\n"), Err(LoadError::Empty)));
    }

    #[test]
    fn search_text_joins_phrase_and_themes() {
        let row = Phraseme {
            phrasem_de: "ins Blaue".into(),
            thema_1: "Reisen".into(),
            thema_3: "Farben".into(),
            ..Phraseme::default()
        };
        assert_eq!(row.search_text(), "ins Blaue Reisen  Farben");
        assert_eq!(row.present_themes().collect::<Vec<_>>(), vec!["Reisen", "Farben"]);
    }
}

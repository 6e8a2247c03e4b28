use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use phraseo_glossar::{Phraseme, PhrasemeTable, SearchMode, SearchQuery, highlight, search};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

#[derive(Parser, Debug)]
#[command(
    name = "phraseo-glossar",
    about = "Search and browse the German–Mongolian phraseology glossary",
    version
)]
pub struct Cli {
    /// Tab-separated glossary export to load.
    #[arg(long, global = true, default_value = "data/phraseme.tsv")]
    data: PathBuf,

    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search phrases and theme tags.
    Search {
        /// Query words; joined with spaces.
        words: Vec<String>,
        /// OR (any word), AND (all words) or EXACT (verbatim text).
        #[arg(short, long, default_value = "OR")]
        mode: SearchMode,
        /// Only keep rows tagged with this theme.
        #[arg(long, default_value = "")]
        theme: String,
        /// Only keep rows with this register.
        #[arg(long, default_value = "")]
        style: String,
    },
    /// Show the full card for a phraseme id.
    Show {
        /// Value of the `phrasem_id` column.
        id: String,
    },
    /// Show one phraseme picked at random.
    Random,
    /// List the theme tags with their phrase counts.
    Themes,
    /// List the register values.
    Styles,
    /// Run the web interface.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used in logs and the health payload.
        #[arg(long)]
        base_url: Option<String>,
        /// CSS framework for the pages: tailwind or bootstrap.
        #[arg(long, default_value = "tailwind")]
        theme: phraseo_glossar::web::WebTheme,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let Cli {
        data,
        json,
        command,
    } = Cli::parse();
    let load = || PhrasemeTable::load(&data);
    match command {
        Command::Search {
            words,
            mode,
            theme,
            style,
        } => handle_search(&load()?, words, mode, theme, style, json),
        Command::Show { id } => handle_show(&load()?, &id, json),
        Command::Random => handle_random(&load()?, json),
        Command::Themes => handle_themes(&load()?, json),
        Command::Styles => handle_styles(&load()?, json),
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            base_url,
            theme,
        } => handle_serve(&data, addr, base_url, theme),
    }
}

fn handle_search(
    table: &PhrasemeTable,
    words: Vec<String>,
    mode: SearchMode,
    theme: String,
    style: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let query = SearchQuery {
        text: words.join(" "),
        mode,
        theme,
        style,
    };
    let results = search(table, &query);

    if as_json {
        let payload = json!({
            "query": query,
            "total": results.len(),
            "results": results.iter().map(|row| summary_json(row)).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_result_table(&query, &results);
    }
    Ok(())
}

fn handle_show(table: &PhrasemeTable, id: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let row = table
        .get(id)
        .ok_or_else(|| format!("No phraseme with id {id:?}"))?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(row.as_ref())?);
    } else {
        print_card(row);
    }
    Ok(())
}

fn handle_random(table: &PhrasemeTable, as_json: bool) -> Result<(), Box<dyn Error>> {
    let row = table.random().ok_or("The glossary has no rows")?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(row.as_ref())?);
    } else {
        print_card(&row);
    }
    Ok(())
}

fn handle_themes(table: &PhrasemeTable, as_json: bool) -> Result<(), Box<dyn Error>> {
    let counts: Vec<(String, usize)> = table
        .themes()
        .into_iter()
        .map(|theme| {
            let count = table.theme_results(&theme).len();
            (theme, count)
        })
        .collect();

    if as_json {
        let payload: Vec<_> = counts
            .iter()
            .map(|(theme, count)| json!({ "theme": theme, "phrasemes": count }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_theme_table(&counts);
    }
    Ok(())
}

fn handle_styles(table: &PhrasemeTable, as_json: bool) -> Result<(), Box<dyn Error>> {
    let styles = table.styles();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&styles)?);
    } else if styles.is_empty() {
        println!("No register values in the dataset.");
    } else {
        for style in styles {
            println!("{style}");
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    data: &std::path::Path,
    addr: std::net::SocketAddr,
    base_url: Option<String>,
    theme: phraseo_glossar::web::WebTheme,
) -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let table = PhrasemeTable::load(data)?;
    let config = phraseo_glossar::web::WebConfig {
        addr,
        theme,
        base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(phraseo_glossar::web::serve(table, config))?;
    Ok(())
}

fn summary_json(row: &Phraseme) -> serde_json::Value {
    json!({
        "phrasem_id": row.phrasem_id,
        "phrasem_de": row.phrasem_de,
        "bedeutung": row.bedeutung,
        "themes": row.present_themes().collect::<Vec<_>>(),
        "register": row.sprachstil_hereglee,
    })
}

fn print_result_table(query: &SearchQuery, rows: &[std::sync::Arc<Phraseme>]) {
    if rows.is_empty() {
        println!("Keine Treffer gefunden.");
        return;
    }
    let id_width = rows
        .iter()
        .map(|row| row.phrasem_id.chars().count())
        .max()
        .unwrap_or(2)
        .max("ID".len());
    let phrase_width = rows
        .iter()
        .map(|row| row.phrasem_de.chars().count())
        .max()
        .unwrap_or(6)
        .max("PHRASEM".len());
    if query.has_text() {
        println!("Treffer gefunden: {} ({} {:?})", rows.len(), query.mode, query.text);
    } else {
        println!("Treffer gefunden: {}", rows.len());
    }
    println!(
        "{:<id_width$}  {:<phrase_width$}  {}",
        "ID", "PHRASEM", "THEMEN"
    );
    println!("{:-<id_width$}  {:-<phrase_width$}  {}", "", "", "------");
    for row in rows {
        println!(
            "{:<id_width$}  {:<phrase_width$}  {}",
            row.phrasem_id,
            row.phrasem_de,
            row.present_themes().collect::<Vec<_>>().join(" – ")
        );
    }
}

fn print_theme_table(rows: &[(String, usize)]) {
    if rows.is_empty() {
        println!("No theme tags in the dataset.");
        return;
    }
    let width = rows
        .iter()
        .map(|(theme, _)| theme.chars().count())
        .max()
        .unwrap_or(5)
        .max("THEMA".len());
    println!("{:<width$}  {}", "THEMA", "PHRASEME", width = width);
    println!("{:-<width$}  {}", "", "--------", width = width);
    for (theme, count) in rows {
        println!("{:<width$}  {}", theme, count, width = width);
    }
}

fn print_card(row: &Phraseme) {
    println!("{}", row.phrasem_de);
    println!("Bedeutung: {}", row.bedeutung);
    let themes: Vec<_> = row.present_themes().collect();
    if !themes.is_empty() {
        println!("Thema: {}", themes.join(" – "));
    }
    if !row.sprachstil_hereglee.is_empty() {
        println!("Register: {}", row.sprachstil_hereglee);
    }

    let words = row.highlight_words.as_str();
    render_markdown_block("Anmerkung", &highlight(&row.hinweis_tailbar, words));
    render_markdown_block(
        "Grammatische Besonderheit",
        &highlight(&row.grammatik_anhaar, words),
    );
    render_markdown_block("Herkunft", &highlight(&row.herkunft_garal, words));

    let examples: Vec<String> = row
        .examples()
        .map(|example| format!("* {}", highlight(example, words)))
        .collect();
    render_markdown_block("Beispiele", &examples.join("\n"));
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}

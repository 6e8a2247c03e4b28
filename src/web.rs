use crate::highlight::highlight;
use crate::navigation::ActiveCard;
use crate::session::SessionStore;
use crate::{
    NavEvent, Page, Phraseme, PhrasemeTable, ResultSet, SearchMode, SearchQuery, Source, View,
    ViewState, search,
};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cookie::{Cookie, SameSite};
use markdown::{Options as MarkdownOptions, to_html_with_options};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;

const SESSION_COOKIE: &str = "phraseo_session";
const SITE_TITLE: &str = "Phraseologisches Glossar";

#[derive(Clone)]
pub struct AppState {
    pub table: PhrasemeTable,
    pub sessions: SessionStore,
    pub theme: WebTheme,
    pub base_url: String,
}

impl AppState {
    pub fn new(table: PhrasemeTable, theme: WebTheme, base_url: impl Into<String>) -> Self {
        Self {
            table,
            sessions: SessionStore::default(),
            theme,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for WebTheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!("unknown web theme {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    link_class: &'static str,
    input_class: &'static str,
    nav_class: &'static str,
    nav_link_class: &'static str,
    nav_active_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight text-sky-700",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                link_class: "text-sky-700 hover:underline",
                input_class: "w-full rounded border border-slate-300 px-3 py-2",
                nav_class: "flex flex-wrap gap-2 text-sm font-semibold",
                nav_link_class: "px-3 py-1 rounded-full bg-slate-200 hover:bg-slate-300 text-slate-700",
                nav_active_class: "px-3 py-1 rounded-full bg-slate-900 text-white",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold text-primary",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary px-4 py-2",
                link_class: "link-primary",
                input_class: "form-control",
                nav_class: "nav nav-pills mb-4",
                nav_link_class: "nav-link",
                nav_active_class: "nav-link active",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(table: PhrasemeTable, config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(table, config.theme, config.base_url.clone()));
    let router = build_router(state);
    info!(
        %config.addr,
        theme = %config.theme,
        base = %config.base_url,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(submit_search))
        .route("/open", get(open_search_result))
        .route("/themes", get(theme_list))
        .route("/themes/open", get(open_theme_entry))
        .route("/random", get(random_phraseme))
        .route("/card/back", get(card_back))
        .route("/card/next", get(card_next))
        .route("/theory", get(theory))
        .route("/imprint", get(imprint))
        .route("/api/search", get(api_search))
        .route("/api/phrasem", get(api_phrasem))
        .route("/api/themes", get(api_themes))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

struct Session {
    id: String,
    fresh: bool,
}

fn open_session(app: &AppState, headers: &HeaderMap) -> Session {
    let presented = session_cookie(headers);
    let (id, fresh) = app.sessions.resolve(presented.as_deref());
    Session { id, fresh }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn with_session_cookie(session: &Session, mut response: Response) -> Response {
    if !session.fresh {
        return response;
    }
    let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => warn!(error = %err, "Failed to encode session cookie"),
    }
    response
}

fn respond(app: &AppState, session: &Session, state: &ViewState) -> Response {
    with_session_cookie(session, Html(render_state(app, state)).into_response())
}

fn fail(app: &AppState, session: &Session, status: StatusCode, message: &str) -> Response {
    if session.fresh {
        // Only stored sessions get a cookie.
        app.sessions.update(&session.id, |state| state);
    }
    let html = render_error_page(app.theme, message);
    with_session_cookie(session, (status, Html(html)).into_response())
}

async fn home(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::SelectPage(Page::Home)));
    respond(&app, &session, &state)
}

async fn submit_search(
    State(app): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let session = open_session(&app, &headers);
    let query = match params.into_query() {
        Ok(query) => query,
        Err(err) => return fail(&app, &session, err.status, &err.message),
    };
    let results = search(&app.table, &query);
    let state = app.sessions.update(&session.id, |state| {
        state
            .apply(NavEvent::SelectPage(Page::Home))
            .apply(NavEvent::SubmitSearch { query, results })
    });
    respond(&app, &session, &state)
}

async fn open_search_result(
    State(app): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<OpenParams>,
) -> Response {
    let session = open_session(&app, &headers);
    let mut opened = false;
    let state = app.sessions.update(&session.id, |state| {
        let state = state.apply(NavEvent::SelectPage(Page::Home));
        let results = state
            .search_results()
            .filter(|results| params.index < results.len())
            .cloned();
        match results {
            Some(results) => {
                opened = true;
                state.apply(NavEvent::OpenResult {
                    results,
                    index: params.index,
                    source: Source::Search,
                })
            }
            None => state,
        }
    });
    if !opened {
        return fail(
            &app,
            &session,
            StatusCode::NOT_FOUND,
            &format!("Kein Treffer an Position {}.", params.index),
        );
    }
    respond(&app, &session, &state)
}

async fn theme_list(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::SelectPage(Page::Themes)));
    respond(&app, &session, &state)
}

async fn open_theme_entry(
    State(app): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<ThemeEntryParams>,
) -> Response {
    let session = open_session(&app, &headers);
    let results = app.table.theme_results(&params.theme);
    if params.index >= results.len() {
        return fail(
            &app,
            &session,
            StatusCode::NOT_FOUND,
            &format!(
                "Kein Phrasem an Position {} im Thema {:?}.",
                params.index, params.theme
            ),
        );
    }
    let state = app.sessions.update(&session.id, |state| {
        state
            .apply(NavEvent::SelectPage(Page::Themes))
            .apply(NavEvent::OpenResult {
                results,
                index: params.index,
                source: Source::List,
            })
    });
    respond(&app, &session, &state)
}

async fn random_phraseme(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let Some(row) = app.table.random() else {
        return fail(
            &app,
            &session,
            StatusCode::NOT_FOUND,
            "Es sind keine Phraseme geladen.",
        );
    };
    let state = app.sessions.update(&session.id, |state| {
        state
            .apply(NavEvent::SelectPage(Page::Random))
            .apply(NavEvent::ShowRandom(row))
    });
    respond(&app, &session, &state)
}

async fn card_back(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::Back));
    respond(&app, &session, &state)
}

async fn card_next(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::Next));
    respond(&app, &session, &state)
}

async fn theory(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::SelectPage(Page::Theory)));
    respond(&app, &session, &state)
}

async fn imprint(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    let session = open_session(&app, &headers);
    let state = app
        .sessions
        .update(&session.id, |state| state.apply(NavEvent::SelectPage(Page::Imprint)));
    respond(&app, &session, &state)
}

async fn health(State(app): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "phraseo-glossar",
        "phrasemes": app.table.len(),
        "base_url": app.base_url,
    }))
}

async fn api_search(
    State(app): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponsePayload>, ApiError> {
    let query = params.into_query()?;
    let results = search(&app.table, &query);
    Ok(Json(SearchResponsePayload::new(query, &results)))
}

async fn api_phrasem(
    State(app): State<SharedState>,
    Query(params): Query<PhrasemParams>,
) -> Result<Json<PhrasemPayload>, ApiError> {
    let id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `id` is required"))?;
    let row = app
        .table
        .get(id)
        .ok_or_else(|| ApiError::not_found(format!("No phraseme with id {id:?}")))?;
    Ok(Json(PhrasemPayload::from_row(row)))
}

async fn api_themes(State(app): State<SharedState>) -> Json<VocabularyPayload> {
    Json(VocabularyPayload {
        themes: app.table.themes(),
        styles: app.table.styles(),
        version: app.table.version().map(str::to_string),
    })
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    mode: Option<String>,
    theme: Option<String>,
    style: Option<String>,
}

impl SearchParams {
    fn into_query(self) -> Result<SearchQuery, ApiError> {
        let mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") => SearchMode::default(),
            Some(raw) => raw
                .parse::<SearchMode>()
                .map_err(|err| ApiError::bad_request(err.to_string()))?,
        };
        Ok(SearchQuery {
            text: self.q.unwrap_or_default(),
            mode,
            theme: self.theme.unwrap_or_default(),
            style: self.style.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenParams {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ThemeEntryParams {
    theme: String,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct PhrasemParams {
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhrasemSummaryPayload {
    phrasem_id: String,
    phrasem_de: String,
    bedeutung: String,
    themes: Vec<String>,
    register: String,
}

impl PhrasemSummaryPayload {
    fn from_row(row: &Phraseme) -> Self {
        Self {
            phrasem_id: row.phrasem_id.clone(),
            phrasem_de: row.phrasem_de.clone(),
            bedeutung: row.bedeutung.clone(),
            themes: row.present_themes().map(str::to_string).collect(),
            register: row.sprachstil_hereglee.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: SearchQuery,
    total: usize,
    results: Vec<PhrasemSummaryPayload>,
}

impl SearchResponsePayload {
    fn new(query: SearchQuery, results: &ResultSet) -> Self {
        Self {
            query,
            total: results.len(),
            results: results
                .iter()
                .map(|row| PhrasemSummaryPayload::from_row(row))
                .collect(),
        }
    }
}

/// Full record plus its annotations with highlight markers applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhrasemPayload {
    #[serde(flatten)]
    record: Phraseme,
    highlighted: HighlightedPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HighlightedPayload {
    hinweis_tailbar: String,
    grammatik_anhaar: String,
    herkunft_garal: String,
    beispiele: Vec<String>,
}

impl PhrasemPayload {
    fn from_row(row: &Phraseme) -> Self {
        let words = row.highlight_words.as_str();
        Self {
            record: row.clone(),
            highlighted: HighlightedPayload {
                hinweis_tailbar: highlight(&row.hinweis_tailbar, words),
                grammatik_anhaar: highlight(&row.grammatik_anhaar, words),
                herkunft_garal: highlight(&row.herkunft_garal, words),
                beispiele: row
                    .examples()
                    .map(|example| highlight(example, words))
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabularyPayload {
    themes: Vec<String>,
    styles: Vec<String>,
    version: Option<String>,
}

fn render_state(app: &AppState, state: &ViewState) -> String {
    let chrome = Chrome::new(app.theme);
    let body = match state.current_page() {
        Page::Theory => render_static(
            chrome,
            "Theorie Phraseologie",
            "Hier kommt später die Theorie …",
            None,
        ),
        Page::Imprint => {
            let caption = match app.table.version() {
                Some(version) => format!("📊 Datenstand: {version}"),
                None => "📊 Datenstand: nicht angegeben".to_string(),
            };
            render_static(
                chrome,
                "Impressum",
                "Kontakt, Impressum, Projektbeschreibung",
                Some(caption),
            )
        }
        Page::Home | Page::Themes | Page::Random => match state.view() {
            View::Detail => match state.active() {
                Some(card) => render_card(chrome, card),
                None => render_search(app, chrome, state, Some("Kein Phrasem ausgewählt.")),
            },
            View::List => render_theme_list(app, chrome),
            View::Search => render_search(app, chrome, state, None),
        },
    };
    match body {
        Ok(body) => render_page(chrome, state.current_page(), &body),
        Err(err) => render_error_page(app.theme, err.to_string()),
    }
}

fn render_page(chrome: Chrome, active: Page, body: &str) -> String {
    let nav = Page::ALL
        .iter()
        .map(|page| NavLink {
            label: page.label(),
            href: page.path(),
            active: *page == active,
        })
        .collect();
    let template = PageTemplate {
        chrome,
        title: active.label(),
        nav,
        body,
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page_with(chrome, err.to_string()))
}

fn render_search(
    app: &AppState,
    chrome: Chrome,
    state: &ViewState,
    warning: Option<&str>,
) -> askama::Result<String> {
    let last = state.search_query().cloned().unwrap_or_default();
    let modes = SearchMode::ALL_MODES
        .iter()
        .map(|mode| ModeOption {
            value: mode.query_value(),
            label: mode.label(),
            checked: *mode == last.mode,
        })
        .collect();
    let themes = select_options(app.table.themes(), &last.theme);
    let styles = select_options(app.table.styles(), &last.style);
    let (has_results, results) = match state.search_results() {
        Some(results) => (
            true,
            results
                .iter()
                .enumerate()
                .map(|(index, row)| ResultLink {
                    label: row.phrasem_de.clone(),
                    href: format!("/open?index={index}"),
                })
                .collect(),
        ),
        None => (false, Vec::new()),
    };
    SearchTemplate {
        chrome,
        query: &last.text,
        modes,
        themes,
        styles,
        has_results,
        results,
        warning: warning.unwrap_or_default(),
    }
    .render()
}

fn render_theme_list(app: &AppState, chrome: Chrome) -> askama::Result<String> {
    let groups = app
        .table
        .themes()
        .into_iter()
        .map(|theme| {
            let entries = app
                .table
                .theme_results(&theme)
                .iter()
                .enumerate()
                .map(|(index, row)| ResultLink {
                    label: row.phrasem_de.clone(),
                    href: format!(
                        "/themes/open?theme={}&index={index}",
                        encode_component(&theme)
                    ),
                })
                .collect();
            ThemeGroup { theme, entries }
        })
        .collect();
    ThemeListTemplate { chrome, groups }.render()
}

fn render_card(chrome: Chrome, card: &ActiveCard) -> askama::Result<String> {
    let row = card.record();
    let words = row.highlight_words.as_str();
    let sections = [
        ("Anmerkung", row.hinweis_tailbar.as_str()),
        ("Grammatische Besonderheit", row.grammatik_anhaar.as_str()),
        ("Herkunft", row.herkunft_garal.as_str()),
    ]
    .into_iter()
    .filter_map(|(label, text)| {
        render_markdown_str(&highlight(text, words)).map(|html| CardSection { label, html })
    })
    .collect();
    let examples = row
        .examples()
        .filter_map(|example| render_markdown_str(&highlight(example, words)))
        .collect();
    CardTemplate {
        chrome,
        row,
        themes: row.present_themes().collect::<Vec<_>>().join(" – "),
        sections,
        examples,
        position: card.index() + 1,
        total: card.results().len(),
    }
    .render()
}

fn render_static(
    chrome: Chrome,
    heading: &str,
    text: &str,
    caption: Option<String>,
) -> askama::Result<String> {
    StaticTemplate {
        chrome,
        heading,
        text,
        caption: caption.unwrap_or_default(),
    }
    .render()
}

fn select_options(values: Vec<String>, selected: &str) -> Vec<SelectOption> {
    values
        .into_iter()
        .map(|value| {
            let is_selected = value == selected;
            SelectOption {
                value,
                selected: is_selected,
            }
        })
        .collect()
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    render_error_page_with(Chrome::new(theme), message)
}

fn render_error_page_with(chrome: Chrome, message: impl Into<String>) -> String {
    let (css_tag, js_tag) = cdn_tags(chrome);
    let message = html_escape(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="de">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{SITE_TITLE} • Fehler</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Etwas ist schiefgelaufen</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Zur Startseite</a>
      </div>
    </main>
  </body>
</html>"#,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
    )
}

fn cdn_tags(chrome: Chrome) -> (&'static str, &'static str) {
    if chrome.use_bootstrap {
        (
            r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#,
            r#"<script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>"#,
        )
    } else {
        (
            r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#,
            "",
        )
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_markdown_str(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Cells are plain text with emphasis markers; raw HTML stays escaped.
    let options = MarkdownOptions::gfm();
    let html = to_html_with_options(trimmed, &options)
        .unwrap_or_else(|_| format!("<p>{}</p>", html_escape(trimmed)));
    Some(html)
}

struct NavLink {
    label: &'static str,
    href: &'static str,
    active: bool,
}

struct ModeOption {
    value: &'static str,
    label: &'static str,
    checked: bool,
}

struct SelectOption {
    value: String,
    selected: bool,
}

struct ResultLink {
    label: String,
    href: String,
}

struct ThemeGroup {
    theme: String,
    entries: Vec<ResultLink>,
}

struct CardSection {
    label: &'static str,
    html: String,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="de">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Phraseologisches Glossar • {{ title }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <nav class="{{ chrome.nav_class }}" aria-label="Menü">
          {% for link in nav %}
          <a href="{{ link.href }}" class="{% if link.active %}{{ chrome.nav_active_class }}{% else %}{{ chrome.nav_link_class }}{% endif %}">{{ link.label }}</a>
          {% endfor %}
        </nav>
        {{ body|safe }}
        <footer class="text-sm text-slate-500 text-muted mt-10">GIP-Projekt von MUBIS und RUB · Mit Unterstützung vom DAAD</footer>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate<'a> {
    chrome: Chrome,
    title: &'a str,
    nav: Vec<NavLink>,
    body: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<section id="search" class="space-y-4">
  <div>
    <h1 class="{{ chrome.headline_class }}">Phraseologisches Glossar</h1>
    <p class="{{ chrome.lede_class }}">Deutsch – Mongolisch</p>
  </div>
  {% if !warning.is_empty() %}
  <p class="rounded bg-amber-100 px-4 py-2 alert alert-warning">{{ warning }}</p>
  {% endif %}
  <form action="/search" method="get" class="space-y-3">
    <label class="block form-label">Suchbegriff:
      <input type="text" name="q" value="{{ query }}" placeholder="z. B. Liebe, blau, spielen..." class="{{ chrome.input_class }}">
    </label>
    <fieldset class="flex gap-4">
      <legend class="form-label">Suchoption:</legend>
      {% for mode in modes %}
      <label><input type="radio" name="mode" value="{{ mode.value }}"{% if mode.checked %} checked{% endif %}> {{ mode.label }}</label>
      {% endfor %}
    </fieldset>
    <label class="block form-label">Thema filtern:
      <select name="theme" class="{{ chrome.input_class }}">
        <option value=""></option>
        {% for option in themes %}
        <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
        {% endfor %}
      </select>
    </label>
    <label class="block form-label">Sprachstil:
      <select name="style" class="{{ chrome.input_class }}">
        <option value=""></option>
        {% for option in styles %}
        <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
        {% endfor %}
      </select>
    </label>
    <button type="submit" class="{{ chrome.button_class }}">Suchen</button>
  </form>
  {% if has_results %}
    {% if results.is_empty() %}
    <p class="rounded bg-sky-100 px-4 py-2 alert alert-info">Keine Treffer gefunden.</p>
    {% else %}
    <h5 class="{{ chrome.eyebrow_class }}">Treffer gefunden: {{ results.len() }}</h5>
    <ul class="space-y-1 list-unstyled">
      {% for hit in results %}
      <li><a href="{{ hit.href }}" class="{{ chrome.link_class }}">{{ hit.label }}</a></li>
      {% endfor %}
    </ul>
    {% endif %}
  {% endif %}
</section>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    chrome: Chrome,
    query: &'a str,
    modes: Vec<ModeOption>,
    themes: Vec<SelectOption>,
    styles: Vec<SelectOption>,
    has_results: bool,
    results: Vec<ResultLink>,
    warning: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<section id="themes" class="space-y-3">
  <h1 class="{{ chrome.headline_class }}">📚 Phraseme nach Themen</h1>
  {% for group in groups %}
  <details class="bg-white shadow rounded p-3 card card-body mb-2">
    <summary class="font-semibold">{{ group.theme }} <span class="text-xs text-slate-500 text-muted">({{ group.entries.len() }})</span></summary>
    <ul class="mt-2 space-y-1 list-unstyled">
      {% for entry in group.entries %}
      <li>– <a href="{{ entry.href }}" class="{{ chrome.link_class }}">{{ entry.label }}</a></li>
      {% endfor %}
    </ul>
  </details>
  {% endfor %}
</section>"#,
    ext = "html"
)]
struct ThemeListTemplate {
    chrome: Chrome,
    groups: Vec<ThemeGroup>,
}

#[derive(Template)]
#[template(
    source = r#"<article id="card" class="space-y-4">
  <p class="{{ chrome.eyebrow_class }}">Phrasem {{ position }} von {{ total }}</p>
  <h2 class="{{ chrome.headline_class }}">{{ row.phrasem_de }}</h2>
  <p><strong>Bedeutung:</strong> {{ row.bedeutung }}</p>
  {% if !themes.is_empty() %}
  <p><strong>Thema:</strong> {{ themes }}</p>
  {% endif %}
  {% if !row.sprachstil_hereglee.is_empty() %}
  <p><strong>Register:</strong> {{ row.sprachstil_hereglee }}</p>
  {% endif %}
  {% for section in sections %}
  <div>
    <p><strong>{{ section.label }}:</strong></p>
    <div class="prose prose-slate max-w-none">{{ section.html|safe }}</div>
  </div>
  {% endfor %}
  <p><strong>Beispiele:</strong></p>
  <ul class="list-disc pl-6">
    {% for example in examples %}
    <li>{{ example|safe }}</li>
    {% endfor %}
  </ul>
  <hr>
  <div class="flex justify-between d-flex justify-content-between">
    <a href="/card/back" class="{{ chrome.button_class }}">Zurück</a>
    <a href="/card/next" class="{{ chrome.button_class }}">Weiter</a>
  </div>
</article>"#,
    ext = "html"
)]
struct CardTemplate<'a> {
    chrome: Chrome,
    row: &'a Phraseme,
    themes: String,
    sections: Vec<CardSection>,
    examples: Vec<String>,
    position: usize,
    total: usize,
}

#[derive(Template)]
#[template(
    source = r#"<section class="space-y-3">
  <h1 class="{{ chrome.headline_class }}">{{ heading }}</h1>
  <p class="{{ chrome.lede_class }}">{{ text }}</p>
  {% if !caption.is_empty() %}
  <p class="text-sm text-slate-500 text-muted">{{ caption }}</p>
  {% endif %}
</section>"#,
    ext = "html"
)]
struct StaticTemplate<'a> {
    chrome: Chrome,
    heading: &'a str,
    text: &'a str,
    caption: String,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    const SAMPLE: &str = include_str!("../data/phraseme.tsv");

    fn test_router() -> Router {
        let table = PhrasemeTable::from_tsv_str(SAMPLE).expect("sample dataset parses");
        let state = Arc::new(AppState::new(
            table,
            WebTheme::Tailwind,
            "http://127.0.0.1:8080",
        ));
        build_router(state)
    }

    struct Reply {
        status: StatusCode,
        cookie: Option<String>,
        body: String,
    }

    async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Reply {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string);
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Reply {
            status,
            cookie,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    #[tokio::test]
    async fn home_sets_session_cookie_and_renders_form() {
        let router = test_router();
        let reply = get(&router, "/", None).await;
        assert!(reply.status.is_success());
        let cookie = reply.cookie.expect("fresh session cookie");
        assert!(cookie.starts_with("phraseo_session="));
        assert!(reply.body.contains("Suchbegriff:"));
        assert!(reply.body.contains("Liste nach Themen"));

        let again = get(&router, "/", Some(&cookie)).await;
        assert!(again.cookie.is_none());
    }

    #[tokio::test]
    async fn search_then_walk_cards_back_to_results() {
        let router = test_router();
        let first = get(&router, "/search?q=blau&mode=OR", None).await;
        assert!(first.status.is_success());
        assert!(first.body.contains("Treffer gefunden: 2"));
        let cookie = first.cookie.unwrap();

        let card = get(&router, "/open?index=0", Some(&cookie)).await;
        assert!(card.body.contains("blau machen"));
        assert!(card.body.contains("Phrasem 1 von 2"));

        let next = get(&router, "/card/next", Some(&cookie)).await;
        assert!(next.body.contains("Phrasem 2 von 2"));
        assert!(next.body.contains("blau sein"));

        let past_end = get(&router, "/card/next", Some(&cookie)).await;
        assert!(past_end.body.contains("Treffer gefunden: 2"));
        assert!(!past_end.body.contains("id=\"card\""));
    }

    #[tokio::test]
    async fn empty_search_reports_no_hits() {
        let router = test_router();
        let reply = get(&router, "/search?q=Zitronenfalter&mode=AND", None).await;
        assert!(reply.status.is_success());
        assert!(reply.body.contains("Keine Treffer gefunden."));
    }

    #[tokio::test]
    async fn invalid_mode_is_rejected() {
        let router = test_router();
        let reply = get(&router, "/search?q=blau&mode=fuzzy", None).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn theme_card_back_returns_to_theme_list() {
        let router = test_router();
        let list = get(&router, "/themes", None).await;
        assert!(list.body.contains("Phraseme nach Themen"));
        let cookie = list.cookie.unwrap();

        let card = get(&router, "/themes/open?theme=Farben&index=0", Some(&cookie)).await;
        assert!(card.status.is_success());
        assert!(card.body.contains("id=\"card\""));

        let back = get(&router, "/card/back", Some(&cookie)).await;
        assert!(back.body.contains("Phraseme nach Themen"));
    }

    #[tokio::test]
    async fn out_of_range_requests_are_not_found() {
        let router = test_router();
        let reply = get(&router, "/themes/open?theme=Farben&index=99", None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let reply = get(&router, "/open?index=0", None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cookie_from_error_page_is_reused() {
        let router = test_router();
        let failed = get(&router, "/themes/open?theme=Farben&index=99", None).await;
        assert_eq!(failed.status, StatusCode::NOT_FOUND);
        let cookie = failed.cookie.expect("fresh session cookie");

        let next = get(&router, "/", Some(&cookie)).await;
        assert!(next.status.is_success());
        assert!(next.cookie.is_none());
    }

    #[tokio::test]
    async fn random_page_shows_a_single_card() {
        let router = test_router();
        let reply = get(&router, "/random", None).await;
        assert!(reply.status.is_success());
        assert!(reply.body.contains("Phrasem 1 von 1"));
        let cookie = reply.cookie.unwrap();

        let back = get(&router, "/card/back", Some(&cookie)).await;
        assert!(back.body.contains("Suchbegriff:"));
    }

    #[tokio::test]
    async fn card_highlights_annotation_words() {
        let router = test_router();
        let first = get(&router, "/search?q=Daumen&mode=EXACT", None).await;
        let cookie = first.cookie.unwrap();
        let card = get(&router, "/open?index=0", Some(&cookie)).await;
        assert!(card.body.contains("<em>Daumen</em>"));
    }

    #[tokio::test]
    async fn imprint_shows_dataset_version() {
        let router = test_router();
        let reply = get(&router, "/imprint", None).await;
        assert!(reply.body.contains("Datenstand: 09.02.2026"));
        let theory = get(&router, "/theory", None).await;
        assert!(theory.body.contains("Theorie Phraseologie"));
    }

    #[tokio::test]
    async fn api_search_filters_by_theme() {
        let router = test_router();
        let reply = get(&router, "/api/search?theme=Farben", None).await;
        assert!(reply.status.is_success());
        let payload: SearchResponsePayload = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(payload.total, payload.results.len());
        assert!(payload.total >= 2);
        assert!(
            payload
                .results
                .iter()
                .all(|hit| hit.themes.iter().any(|t| t == "Farben"))
        );
    }

    #[tokio::test]
    async fn api_phrasem_returns_highlighted_fields() {
        let router = test_router();
        let reply = get(&router, "/api/phrasem?id=1", None).await;
        assert!(reply.status.is_success());
        let payload: PhrasemPayload = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(payload.record.phrasem_id, "1");
        assert!(payload.highlighted.hinweis_tailbar.contains("*Daumen*"));

        let missing = get(&router, "/api/phrasem?id=does-not-exist", None).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let blank = get(&router, "/api/phrasem", None).await;
        assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_themes_lists_vocabulary() {
        let router = test_router();
        let reply = get(&router, "/api/themes", None).await;
        let payload: VocabularyPayload = serde_json::from_str(&reply.body).unwrap();
        assert!(payload.themes.contains(&"Farben".to_string()));
        assert!(payload.styles.contains(&"umgangssprachlich".to_string()));
        assert_eq!(payload.version.as_deref(), Some("09.02.2026"));
    }

    #[test]
    fn render_markdown_escapes_raw_html() {
        let html = render_markdown_str("Ein *Wort* <script>alert(1)</script>").expect("rendered");
        assert!(!html.contains("<script>"));
        assert!(html.contains("<em>Wort</em>"));
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!("Bootstrap".parse::<WebTheme>().unwrap(), WebTheme::Bootstrap);
        assert!("material".parse::<WebTheme>().is_err());
    }
}

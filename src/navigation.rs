//! Per-session screen state.
//!
//! [`ViewState::apply`] is the whole state machine: it consumes the current
//! state and one [`NavEvent`] and returns the next state. Anything that needs
//! the table (running a search, computing a theme group, drawing a random
//! row) happens before the event is built, so transitions stay pure.

use crate::{Phraseme, ResultSet, SearchQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Top-level menu destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    #[default]
    Home,
    Themes,
    Random,
    Theory,
    Imprint,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Home,
        Page::Themes,
        Page::Random,
        Page::Theory,
        Page::Imprint,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Page::Home => "Startseite",
            Page::Themes => "Liste nach Themen",
            Page::Random => "Zufälliges Phrasem",
            Page::Theory => "Theorie Phraseologie",
            Page::Imprint => "Impressum",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Themes => "/themes",
            Page::Random => "/random",
            Page::Theory => "/theory",
            Page::Imprint => "/imprint",
        }
    }
}

/// Which screen is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Search form, with the last result list below it.
    #[default]
    Search,
    /// Theme-grouped browsing.
    List,
    /// A single phraseme card.
    Detail,
}

/// Where the current card was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Search,
    List,
    Random,
}

impl Source {
    /// The screen that "back" and "next past the end" return to.
    pub fn return_view(&self) -> View {
        match self {
            Source::List => View::List,
            Source::Search | Source::Random => View::Search,
        }
    }
}

/// The result set being paged through in detail mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCard {
    results: ResultSet,
    index: usize,
    source: Source,
}

impl ActiveCard {
    fn new(results: ResultSet, index: usize, source: Source) -> Self {
        assert!(
            index < results.len(),
            "card index {index} out of range for {} results",
            results.len()
        );
        Self {
            results,
            index,
            source,
        }
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn record(&self) -> &Arc<Phraseme> {
        &self.results[self.index]
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.results.len()
    }
}

#[derive(Debug, Clone)]
pub enum NavEvent {
    /// A menu entry was selected (also sent on every page render).
    SelectPage(Page),
    /// The search form was submitted and evaluated.
    SubmitSearch {
        query: SearchQuery,
        results: ResultSet,
    },
    /// A row of `results` was clicked.
    OpenResult {
        results: ResultSet,
        index: usize,
        source: Source,
    },
    /// A random phraseme was drawn.
    ShowRandom(Arc<Phraseme>),
    Back,
    Next,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    page: Page,
    view: View,
    random_mode: bool,
    search_query: Option<SearchQuery>,
    search_results: Option<ResultSet>,
    active: Option<ActiveCard>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_page(&self) -> Page {
        self.page
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn random_mode(&self) -> bool {
        self.random_mode
    }

    /// The last submitted search, used to refill the form.
    pub fn search_query(&self) -> Option<&SearchQuery> {
        self.search_query.as_ref()
    }

    pub fn search_results(&self) -> Option<&ResultSet> {
        self.search_results.as_ref()
    }

    pub fn active(&self) -> Option<&ActiveCard> {
        self.active.as_ref()
    }

    pub fn active_results(&self) -> Option<&ResultSet> {
        self.active.as_ref().map(ActiveCard::results)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.as_ref().map(ActiveCard::index)
    }

    pub fn active_source(&self) -> Option<Source> {
        self.active.as_ref().map(ActiveCard::source)
    }

    /// The card to render in detail view.
    pub fn active_record(&self) -> Option<&Arc<Phraseme>> {
        self.active.as_ref().map(ActiveCard::record)
    }

    pub fn apply(mut self, event: NavEvent) -> Self {
        match event {
            NavEvent::SelectPage(page) => {
                if page != self.page {
                    self.page = page;
                    self.view = View::Search;
                    self.random_mode = false;
                }
                match page {
                    Page::Home => self.random_mode = false,
                    Page::Themes => {
                        self.random_mode = false;
                        if self.view != View::Detail {
                            self.view = View::List;
                        }
                    }
                    Page::Random => self.random_mode = true,
                    Page::Theory | Page::Imprint => {}
                }
            }
            NavEvent::SubmitSearch { query, results } => {
                self.search_query = Some(query);
                self.search_results = Some(results);
                self.view = View::Search;
            }
            NavEvent::OpenResult {
                results,
                index,
                source,
            } => {
                self.active = Some(ActiveCard::new(results, index, source));
                self.view = View::Detail;
            }
            NavEvent::ShowRandom(row) => {
                self.active = Some(ActiveCard::new(ResultSet::single(row), 0, Source::Random));
                self.view = View::Detail;
            }
            NavEvent::Back => {
                if let (View::Detail, Some(card)) = (self.view, self.active.as_ref()) {
                    self.view = card.source.return_view();
                }
            }
            NavEvent::Next => {
                if let (View::Detail, Some(card)) = (self.view, self.active.as_mut()) {
                    if card.has_next() {
                        card.index += 1;
                    } else {
                        self.view = card.source.return_view();
                    }
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::table;
    use crate::{SearchMode, search};

    fn searched(state: ViewState, text: &str) -> ViewState {
        let query = SearchQuery::text(text, SearchMode::Any);
        let results = search(&table(), &query);
        state.apply(NavEvent::SubmitSearch { query, results })
    }

    fn open_search_row(state: ViewState, index: usize) -> ViewState {
        let results = state.search_results().cloned().unwrap();
        state.apply(NavEvent::OpenResult {
            results,
            index,
            source: Source::Search,
        })
    }

    #[test]
    fn initial_state() {
        let state = ViewState::new();
        assert_eq!(state.current_page(), Page::Home);
        assert_eq!(state.view(), View::Search);
        assert!(state.active_results().is_none());
        assert!(state.search_results().is_none());
    }

    #[test]
    fn submit_search_stays_on_search_view() {
        let state = searched(ViewState::new(), "blau");
        assert_eq!(state.view(), View::Search);
        assert_eq!(state.search_results().unwrap().len(), 2);
        assert_eq!(state.search_query().unwrap().text, "blau");
    }

    #[test]
    fn open_result_enters_detail() {
        let state = open_search_row(searched(ViewState::new(), "blau"), 1);
        assert_eq!(state.view(), View::Detail);
        assert_eq!(state.active_index(), Some(1));
        assert_eq!(state.active_source(), Some(Source::Search));
        assert_eq!(state.active_record().unwrap().phrasem_de, "blau sein");
    }

    #[test]
    fn next_advances_then_returns_to_search() {
        let state = open_search_row(searched(ViewState::new(), "blau"), 0);
        let state = state.apply(NavEvent::Next);
        assert_eq!(state.view(), View::Detail);
        assert_eq!(state.active_index(), Some(1));

        let state = state.apply(NavEvent::Next);
        assert_eq!(state.view(), View::Search);
        assert_eq!(state.active_index(), Some(1));
        assert_eq!(state.search_results().unwrap().len(), 2);
    }

    #[test]
    fn next_past_theme_group_returns_to_list() {
        let state = ViewState::new().apply(NavEvent::SelectPage(Page::Themes));
        assert_eq!(state.view(), View::List);
        let group = table().theme_results("Farben");
        let last = group.len() - 1;
        let state = state.apply(NavEvent::OpenResult {
            results: group,
            index: last,
            source: Source::List,
        });
        assert_eq!(state.view(), View::Detail);
        let state = state.apply(NavEvent::Next);
        assert_eq!(state.view(), View::List);
    }

    #[test]
    fn back_follows_source() {
        let group = table().theme_results("Liebe");
        let from_list = ViewState::new()
            .apply(NavEvent::SelectPage(Page::Themes))
            .apply(NavEvent::OpenResult {
                results: group,
                index: 0,
                source: Source::List,
            })
            .apply(NavEvent::Back);
        assert_eq!(from_list.view(), View::List);

        let from_search = open_search_row(searched(ViewState::new(), "spielen"), 0)
            .apply(NavEvent::Back);
        assert_eq!(from_search.view(), View::Search);
    }

    #[test]
    fn random_pick_is_a_singleton() {
        let row = table().get("5").cloned().unwrap();
        let state = ViewState::new()
            .apply(NavEvent::SelectPage(Page::Random))
            .apply(NavEvent::ShowRandom(row));
        assert!(state.random_mode());
        assert_eq!(state.view(), View::Detail);
        assert_eq!(state.active_results().unwrap().len(), 1);
        assert_eq!(state.active_index(), Some(0));
        assert_eq!(state.active_source(), Some(Source::Random));

        assert_eq!(state.clone().apply(NavEvent::Back).view(), View::Search);
        assert_eq!(state.apply(NavEvent::Next).view(), View::Search);
    }

    #[test]
    fn page_change_resets_view_and_random_mode() {
        let row = table().get("1").cloned().unwrap();
        let state = ViewState::new()
            .apply(NavEvent::SelectPage(Page::Random))
            .apply(NavEvent::ShowRandom(row))
            .apply(NavEvent::SelectPage(Page::Home));
        assert_eq!(state.current_page(), Page::Home);
        assert_eq!(state.view(), View::Search);
        assert!(!state.random_mode());
        assert!(state.active_results().is_some());
    }

    #[test]
    fn same_page_keeps_detail_view() {
        let state = open_search_row(searched(ViewState::new(), "blau"), 0)
            .apply(NavEvent::SelectPage(Page::Home));
        assert_eq!(state.view(), View::Detail);

        let group = table().theme_results("Arbeit");
        let state = ViewState::new()
            .apply(NavEvent::SelectPage(Page::Themes))
            .apply(NavEvent::OpenResult {
                results: group,
                index: 0,
                source: Source::List,
            })
            .apply(NavEvent::SelectPage(Page::Themes));
        assert_eq!(state.view(), View::Detail);
    }

    #[test]
    fn back_and_next_outside_detail_are_ignored() {
        let state = searched(ViewState::new(), "blau");
        let after = state.clone().apply(NavEvent::Back).apply(NavEvent::Next);
        assert_eq!(after, state);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_fails_fast() {
        let results = table().theme_results("Musik");
        let _ = ViewState::new().apply(NavEvent::OpenResult {
            results,
            index: 5,
            source: Source::List,
        });
    }
}

use crate::error::SearchError;
use crate::render::{OutputRegion, ResultRenderer};
use crate::summary::{SearchTerm, SummaryResult, SummarySource};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

const FALLBACK_PANEL_HTML: &str = r#"<div class="error"><p>エラーが発生しました。</p></div>"#;

/// `idle → loading → {result | empty | error} → loading → …`. Every transition replaces the
/// region's content wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayState {
    #[default]
    Idle,
    Loading {
        term: SearchTerm,
    },
    Result {
        term: SearchTerm,
        summary: SummaryResult,
    },
    Empty {
        term: SearchTerm,
    },
    Error {
        term: SearchTerm,
    },
}

impl DisplayState {
    pub fn kind(&self) -> &'static str {
        match self {
            DisplayState::Idle => "idle",
            DisplayState::Loading { .. } => "loading",
            DisplayState::Result { .. } => "result",
            DisplayState::Empty { .. } => "empty",
            DisplayState::Error { .. } => "error",
        }
    }

    pub fn term(&self) -> Option<&SearchTerm> {
        match self {
            DisplayState::Idle => None,
            DisplayState::Loading { term }
            | DisplayState::Result { term, .. }
            | DisplayState::Empty { term }
            | DisplayState::Error { term } => Some(term),
        }
    }

    pub fn summary(&self) -> Option<&SummaryResult> {
        match self {
            DisplayState::Result { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Proof that a submission entered `loading`; hand it back to [`SearchController::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    term: SearchTerm,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn term(&self) -> &SearchTerm {
        &self.term
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer submission started after this one; its outcome was discarded.
    Stale,
}

pub struct SearchController<R> {
    renderer: ResultRenderer,
    region: R,
    state: DisplayState,
    generation: u64,
}

impl<R: OutputRegion> SearchController<R> {
    pub fn new(renderer: ResultRenderer, region: R) -> Self {
        Self {
            renderer,
            region,
            state: DisplayState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn into_region(self) -> R {
        self.region
    }

    /// Validates `raw` and enters `loading`. Blank input is ignored without a state change.
    pub fn begin(&mut self, raw: &str) -> Option<SearchTicket> {
        let term = match SearchTerm::parse(raw) {
            Ok(term) => term,
            Err(_) => {
                debug!("ignoring blank search submission");
                return None;
            }
        };
        self.generation += 1;
        info!(term = %term, generation = self.generation, "search submitted");
        let panel = self.renderer.loading_panel();
        self.paint(panel);
        self.state = DisplayState::Loading { term: term.clone() };
        Some(SearchTicket {
            generation: self.generation,
            term,
        })
    }

    /// Applies the outcome of a lookup, unless a newer submission has started since.
    pub fn complete(
        &mut self,
        ticket: SearchTicket,
        outcome: Result<Option<SummaryResult>, SearchError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            debug!(
                term = %ticket.term,
                generation = ticket.generation,
                current = self.generation,
                "dropping stale search outcome"
            );
            return Completion::Stale;
        }
        let term = ticket.term;
        self.state = match outcome {
            Ok(Some(summary)) => {
                match self.renderer.render(&summary, term.as_str(), &mut self.region) {
                    Ok(()) => DisplayState::Result { term, summary },
                    Err(err) => {
                        error!(term = %term, error = %err, "failed to render search result");
                        self.show_error();
                        DisplayState::Error { term }
                    }
                }
            }
            Ok(None) => {
                let panel = self.renderer.empty_panel(term.as_str());
                self.paint(panel);
                DisplayState::Empty { term }
            }
            Err(err) => {
                error!(term = %term, error = %err, "search failed");
                self.show_error();
                DisplayState::Error { term }
            }
        };
        Completion::Applied
    }

    /// Runs one submission end to end: `begin`, the lookup, then `complete`.
    pub async fn submit<S>(&mut self, source: &S, raw: &str) -> &DisplayState
    where
        S: SummarySource + ?Sized,
    {
        if let Some(ticket) = self.begin(raw) {
            let outcome = source.lookup(&ticket.term).await;
            self.complete(ticket, outcome);
        }
        &self.state
    }

    fn show_error(&mut self) {
        let panel = self.renderer.error_panel();
        self.paint(panel);
    }

    fn paint(&mut self, panel: Result<String, SearchError>) {
        match panel {
            Ok(html) => self.region.replace(html),
            Err(err) => {
                error!(error = %err, "failed to render search panel");
                self.region.replace(FALLBACK_PANEL_HTML.to_string());
            }
        }
    }
}

/// A controller that several in-flight submissions can share.
///
/// This is the embedding API for a long-lived region that outlives a single request, such as
/// an interactive front end. The web server renders each request into its own region and uses
/// [`SearchController`] directly.
///
/// The lock is only held for `begin`/`complete`, never across the lookup, so overlapping
/// submissions proceed independently and the newest one decides what is displayed.
pub struct SharedSearchController<R> {
    inner: Arc<Mutex<SearchController<R>>>,
}

impl<R> Clone for SharedSearchController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: OutputRegion> SharedSearchController<R> {
    pub fn new(controller: SearchController<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn state(&self) -> DisplayState {
        self.inner.lock().state().clone()
    }

    pub fn with_region<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(self.inner.lock().region())
    }

    /// `None` when the input was blank and nothing happened.
    pub async fn submit<S>(&self, source: &S, raw: &str) -> Option<Completion>
    where
        S: SummarySource + ?Sized,
    {
        let ticket = self.inner.lock().begin(raw)?;
        let outcome = source.lookup(ticket.term()).await;
        Some(self.inner.lock().complete(ticket, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BufferRegion;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    /// Records every paint so intermediate states can be asserted.
    #[derive(Default)]
    struct RecordingRegion {
        history: Vec<String>,
    }

    impl RecordingRegion {
        fn current(&self) -> &str {
            self.history.last().map(String::as_str).unwrap_or("")
        }
    }

    impl OutputRegion for RecordingRegion {
        fn replace(&mut self, html: String) {
            self.history.push(html);
        }

        fn scroll_into_view(&mut self, _request: crate::render::ScrollIntoView) {}
    }

    struct CannedSource {
        outcome: fn() -> Result<Option<SummaryResult>, SearchError>,
        calls: AtomicUsize,
    }

    impl CannedSource {
        fn new(outcome: fn() -> Result<Option<SummaryResult>, SearchError>) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SummarySource for CannedSource {
        async fn lookup(&self, _term: &SearchTerm) -> Result<Option<SummaryResult>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct GatedSource {
        gates: Mutex<HashMap<String, oneshot::Receiver<Option<SummaryResult>>>>,
    }

    #[async_trait]
    impl SummarySource for GatedSource {
        async fn lookup(&self, term: &SearchTerm) -> Result<Option<SummaryResult>, SearchError> {
            let gate = self.gates.lock().remove(term.as_str());
            match gate {
                Some(rx) => Ok(rx.await.unwrap_or(None)),
                None => Ok(None),
            }
        }
    }

    fn controller() -> SearchController<RecordingRegion> {
        SearchController::new(ResultRenderer::default(), RecordingRegion::default())
    }

    #[tokio::test]
    async fn blank_submission_changes_nothing() {
        let source = CannedSource::new(|| Ok(None));
        let mut controller = controller();
        let state = controller.submit(&source, "   ").await;
        assert_eq!(state, &DisplayState::Idle);
        assert!(controller.region().history.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shows_loading_before_result() {
        let source = CannedSource::new(|| Ok(Some(SummaryResult::new("RAG", "RAGは手法です。"))));
        let mut controller = controller();
        let state = controller.submit(&source, " RAG ").await.clone();
        assert_eq!(state.kind(), "result");
        assert_eq!(state.term().map(SearchTerm::as_str), Some("RAG"));
        let history = &controller.region().history;
        assert_eq!(history.len(), 2);
        assert!(history[0].contains("検索中..."));
        assert!(history[1].contains("result-card"));
    }

    #[tokio::test]
    async fn no_result_shows_empty_panel_with_term() {
        let source = CannedSource::new(|| Ok(None));
        let mut controller = controller();
        controller.submit(&source, "<謎>").await;
        assert_eq!(controller.state().kind(), "empty");
        assert!(controller.region().current().contains("「&lt;謎&gt;」"));
    }

    #[tokio::test]
    async fn failure_shows_generic_error_without_detail() {
        let source = CannedSource::new(|| Err(SearchError::transport("connection reset by peer")));
        let mut controller = controller();
        controller.submit(&source, "AI").await;
        assert_eq!(controller.state().kind(), "error");
        let html = controller.region().current();
        assert!(html.contains("エラーが発生しました"));
        assert!(!html.contains("connection reset"));
    }

    #[tokio::test]
    async fn stays_usable_and_replaces_previous_content() {
        let failing = CannedSource::new(|| Err(SearchError::transport("boom")));
        let working = CannedSource::new(|| Ok(Some(SummaryResult::new("LLM", "LLMは言語モデルです。"))));
        let mut controller = SearchController::new(ResultRenderer::default(), BufferRegion::new());
        controller.submit(&failing, "LLM").await;
        controller.submit(&working, "LLM").await;
        controller.submit(&working, "LLM").await;
        assert_eq!(controller.state().kind(), "result");
        let html = controller.region().html();
        assert_eq!(html.matches("result-card").count(), 1);
        assert!(!html.contains("エラー"));
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut controller = controller();
        let old = controller.begin("old").unwrap();
        let new = controller.begin("new").unwrap();
        assert!(new.generation() > old.generation());

        let applied = controller.complete(new, Ok(Some(SummaryResult::new("new", "新しい結果"))));
        let stale = controller.complete(old, Ok(Some(SummaryResult::new("old", "古い結果"))));
        assert_eq!(applied, Completion::Applied);
        assert_eq!(stale, Completion::Stale);
        assert_eq!(controller.state().summary().unwrap().title, "new");
        assert!(controller.region().current().contains("新しい結果"));
    }

    #[tokio::test]
    async fn overlapping_shared_submissions_keep_newest() {
        let shared = SharedSearchController::new(SearchController::new(
            ResultRenderer::default(),
            BufferRegion::new(),
        ));
        let (tx_old, rx_old) = oneshot::channel();
        let (tx_new, rx_new) = oneshot::channel();
        let source = GatedSource {
            gates: Mutex::new(HashMap::from([
                ("old".to_string(), rx_old),
                ("new".to_string(), rx_new),
            ])),
        };
        let driver = async move {
            tokio::task::yield_now().await;
            tx_new
                .send(Some(SummaryResult::new("new", "新しい結果")))
                .unwrap();
            tx_old
                .send(Some(SummaryResult::new("old", "古い結果")))
                .unwrap();
        };

        let (old, new, ()) = tokio::join!(
            shared.submit(&source, "old"),
            shared.submit(&source, "new"),
            driver
        );
        assert_eq!(old, Some(Completion::Stale));
        assert_eq!(new, Some(Completion::Applied));
        assert_eq!(shared.state().summary().unwrap().title, "new");
        assert!(shared.with_region(|region| region.html().contains("新しい結果")));
    }
}

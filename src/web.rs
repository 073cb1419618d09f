use crate::accordion::Accordion;
use crate::controller::{DisplayState, SearchController};
use crate::error::SearchError;
use crate::render::{BufferRegion, ResultRenderer, ScrollIntoView};
use crate::simplify;
use crate::summary::{SearchTerm, SummaryConfig, SummaryResult, SummarySource, WikipediaClient};
use crate::telemetry::{SearchTelemetry, TelemetrySnapshot};
use crate::{GlossaryEntry, GlossaryIndex};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;
const DEFAULT_TERMS_LIMIT: usize = 20;
const MAX_TERMS_LIMIT: usize = 200;

pub struct AppState {
    pub source: Arc<dyn SummarySource>,
    pub renderer: ResultRenderer,
    pub telemetry: SearchTelemetry,
    pub theme: WebTheme,
    pub base_url: String,
}

impl AppState {
    pub fn new(source: Arc<dyn SummarySource>, theme: WebTheme, base_url: impl Into<String>) -> Self {
        Self {
            source,
            renderer: ResultRenderer::default(),
            telemetry: SearchTelemetry::new(),
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
            other => Err(format!("unknown theme {other:?} (expected tailwind or bootstrap)")),
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
    input_class: &'static str,
    button_class: &'static str,
    section_class: &'static str,
    header_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-4xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                input_class: "flex-1 rounded-md border border-slate-300 px-3 py-2",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                section_class: "border-b border-slate-200",
                header_class: "w-full text-left py-3 font-semibold flex justify-between",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-9",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                input_class: "form-control",
                button_class: "btn btn-primary",
                section_class: "accordion-item",
                header_class: "accordion-button",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
    pub summary: SummaryConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            summary: SummaryConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Client(SearchError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Client(err) => write!(f, "summary client error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<SearchError> for WebError {
    fn from(value: SearchError) -> Self {
        WebError::Client(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let client = WikipediaClient::new(config.summary.clone())?;
    let state = Arc::new(AppState::new(
        Arc::new(client),
        config.theme,
        config.base_url.clone(),
    ));
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        base = %config.base_url,
        host = %config.summary.host,
        timeout_secs = config.summary.timeout.as_secs(),
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

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::EmptyTerm => ApiError::bad_request(err.to_string()),
            SearchError::NotFound(_) => ApiError::not_found(err.to_string()),
            SearchError::Transport(_) => {
                error!(error = %err, "summary lookup failed");
                ApiError {
                    status: StatusCode::BAD_GATEWAY,
                    message: "summary service unavailable".to_string(),
                }
            }
            SearchError::Render(_) => {
                error!(error = %err, "rendering failed");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal error".to_string(),
                }
            }
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
        .route("/search", get(search_html))
        .route("/fragment/search", get(search_fragment))
        .route("/api/summary", get(api_summary))
        .route("/api/terms", get(api_terms))
        .route("/api/stats", get(api_stats))
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

#[derive(Debug, Default, Deserialize)]
struct HomeParams {
    open: Option<String>,
    toggle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    open: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TermsParams {
    prefix: Option<String>,
    limit: Option<usize>,
}

async fn home(
    State(state): State<SharedState>,
    Query(params): Query<HomeParams>,
) -> impl IntoResponse {
    let mut accordion = restore_accordion(params.open.as_deref());
    if let Some(id) = params.toggle.as_deref() {
        accordion.toggle(id);
    }
    render_page(&state, &accordion, "", &BufferRegion::new())
}

async fn search_html(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let raw = params.q.unwrap_or_default();
    let region = run_search(&state, &raw).await;
    let accordion = restore_accordion(params.open.as_deref());
    render_page(&state, &accordion, raw.trim(), &region)
}

async fn search_fragment(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let region = run_search(&state, params.q.as_deref().unwrap_or_default()).await;
    let template = RegionTemplate {
        region: RegionView::from_region(&region),
    };
    Html(template.render().unwrap_or_else(|err| {
        error!(error = %err, "failed to render search region");
        String::new()
    }))
}

async fn api_summary(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SummaryResult>, ApiError> {
    let term = SearchTerm::parse(params.q.as_deref().unwrap_or_default())?;
    match state.source.lookup(&term).await? {
        Some(summary) => Ok(Json(summary)),
        None => Err(SearchError::NotFound(term.into_string()).into()),
    }
}

async fn api_terms(Query(params): Query<TermsParams>) -> Json<TermsPayload> {
    let prefix = params.prefix.unwrap_or_default();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TERMS_LIMIT)
        .clamp(1, MAX_TERMS_LIMIT);
    let results = GlossaryIndex::prefix(prefix.trim(), limit)
        .into_iter()
        .filter_map(|(_, id)| GlossaryIndex::entry_by_id(id))
        .map(|entry| TermPayload::from_entry(&entry))
        .collect();
    Json(TermsPayload {
        prefix,
        limit,
        results,
    })
}

async fn api_stats(State(state): State<SharedState>) -> Json<TelemetrySnapshot> {
    Json(state.telemetry.snapshot())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "aigloss-web" }))
}

/// One controller and region per request; nothing is shared between visitors.
async fn run_search(state: &AppState, raw: &str) -> BufferRegion {
    let mut controller = SearchController::new(state.renderer.clone(), BufferRegion::new());
    let outcome = controller.submit(state.source.as_ref(), raw).await;
    state.telemetry.record(outcome);
    if let DisplayState::Result { term, summary } = outcome {
        info!(term = %term, title = %summary.title, "search rendered");
    }
    controller.into_region()
}

fn restore_accordion(open: Option<&str>) -> Accordion {
    let ids = open
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty());
    Accordion::from_glossary().with_expanded(ids)
}

fn render_page(
    state: &AppState,
    accordion: &Accordion,
    query: &str,
    region: &BufferRegion,
) -> Html<String> {
    let sections = accordion
        .sections()
        .iter()
        .filter_map(|section| {
            let entry = GlossaryIndex::entry_by_slug(section.id())?;
            Some(SectionView {
                id: section.id().to_string(),
                heading: section.heading().to_string(),
                reading: entry.reading().map(str::to_string),
                category: entry.category().map(str::to_string),
                summary: entry.summary().to_string(),
                detail: entry
                    .detail()
                    .map(|detail| {
                        simplify::paragraphs(&detail, usize::MAX)
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                related: entry.related().map(str::to_string).collect(),
                expanded: section.is_expanded(),
                aria_expanded: section.aria_expanded(),
            })
        })
        .collect();
    let template = PageTemplate {
        chrome: Chrome::new(state.theme),
        version: env!("CARGO_PKG_VERSION"),
        canonical_url: state.base_url.trim_end_matches('/').to_string(),
        open_ids: accordion.expanded_ids().collect::<Vec<_>>().join(","),
        query: query.to_string(),
        sections,
        region: RegionView::from_region(region),
    };
    Html(template.render().unwrap_or_else(|err| {
        error!(error = %err, "failed to render glossary page");
        render_error_page(state.theme)
    }))
}

fn render_error_page(theme: WebTheme) -> String {
    let chrome = Chrome::new(theme);
    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
  <head>
    <meta charset="utf-8" />
    <title>AI用語辞書 • エラー</title>
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">ページを表示できませんでした</h1>
        <a href="/" class="{button_class}">トップへ戻る</a>
      </div>
    </main>
  </body>
</html>"#,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        button_class = chrome.button_class,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermPayload {
    term_id: u32,
    slug: String,
    term: String,
    reading: Option<String>,
    category: Option<String>,
    summary: String,
    related: Vec<String>,
}

impl TermPayload {
    fn from_entry(entry: &GlossaryEntry<'_>) -> Self {
        Self {
            term_id: entry.term_id(),
            slug: entry.slug().to_string(),
            term: entry.term().to_string(),
            reading: entry.reading().map(str::to_string),
            category: entry.category().map(str::to_string),
            summary: entry.summary().to_string(),
            related: entry.related().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermsPayload {
    prefix: String,
    limit: usize,
    results: Vec<TermPayload>,
}

struct SectionView {
    id: String,
    heading: String,
    reading: Option<String>,
    category: Option<String>,
    summary: String,
    detail: Vec<String>,
    related: Vec<String>,
    expanded: bool,
    aria_expanded: &'static str,
}

/// The `search-result` container as the controller left it.
struct RegionView {
    html: String,
    visible: bool,
    scroll: Option<ScrollIntoView>,
}

impl RegionView {
    fn from_region(region: &BufferRegion) -> Self {
        Self {
            html: region.html().to_string(),
            visible: region.is_visible(),
            scroll: region.pending_scroll(),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<div id="search-result" class="search-result" aria-live="polite"{% if !region.visible %} hidden{% endif %}{% match region.scroll %}{% when Some with (scroll) %} data-scroll-behavior="{{ scroll.behavior.as_str() }}" data-scroll-block="{{ scroll.block.as_str() }}"{% when None %}{% endmatch %}>{{ region.html|safe }}</div>"#,
    ext = "html"
)]
struct RegionTemplate {
    region: RegionView,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="ja">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>AI用語辞書</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <link rel="canonical" href="{{ canonical_url }}/">
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="{{ chrome.eyebrow_class }}">aigloss v{{ version }}</p>
          <h1 class="{{ chrome.headline_class }}">AI用語辞書</h1>
          <p class="{{ chrome.lede_class }}">用語をクリックすると解説が開きます。Wikipediaの概要も検索できます。</p>
        </div>

        <form id="search-form" action="/search#search-result" method="get" role="search">
          <input type="hidden" name="open" value="{{ open_ids }}">
          <label for="search-input">用語を検索</label>
          <input id="search-input" name="q" type="search" value="{{ query }}" placeholder="例: 機械学習" class="{{ chrome.input_class }}">
          <button type="submit" class="{{ chrome.button_class }}">検索</button>
        </form>

        <div id="search-result" class="search-result" aria-live="polite"{% if !region.visible %} hidden{% endif %}{% match region.scroll %}{% when Some with (scroll) %} data-scroll-behavior="{{ scroll.behavior.as_str() }}" data-scroll-block="{{ scroll.block.as_str() }}"{% when None %}{% endmatch %}>{{ region.html|safe }}</div>

        <form id="glossary" action="/" method="get">
          <input type="hidden" name="open" value="{{ open_ids }}">
          {% for section in sections %}
          <section class="accordion-section {{ chrome.section_class }}">
            <button type="submit" name="toggle" value="{{ section.id }}" id="header-{{ section.id }}" class="accordion-header {{ chrome.header_class }}" role="button" tabindex="0" aria-expanded="{{ section.aria_expanded }}" aria-controls="content-{{ section.id }}">
              <span>{{ section.heading }}</span>
              {% match section.reading %}{% when Some with (reading) %}<small>{{ reading }}</small>{% when None %}{% endmatch %}
            </button>
            <div id="content-{{ section.id }}" class="accordion-content" role="region" aria-labelledby="header-{{ section.id }}"{% if !section.expanded %} hidden{% endif %}>
              {% match section.category %}{% when Some with (category) %}<p class="category">{{ category }}</p>{% when None %}{% endmatch %}
              <p>{{ section.summary }}</p>
              {% for paragraph in section.detail %}
              <p>{{ paragraph }}</p>
              {% endfor %}
              {% if !section.related.is_empty() %}
              <p class="related">関連用語: {{ section.related.join("、") }}</p>
              {% endif %}
            </div>
          </section>
          {% endfor %}
        </form>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct PageTemplate {
    chrome: Chrome,
    version: &'static str,
    canonical_url: String,
    open_ids: String,
    query: String,
    sections: Vec<SectionView>,
    region: RegionView,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body, body::Body, http::Request};
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
    use tower::ServiceExt;

    struct FakeSource;

    #[async_trait]
    impl SummarySource for FakeSource {
        async fn lookup(&self, term: &SearchTerm) -> Result<Option<SummaryResult>, SearchError> {
            match term.as_str() {
                "機械学習" => Ok(Some(
                    SummaryResult::new(
                        "機械学習 <ML>",
                        "機械学習は人工知能の一分野である。\n\n\
                         データから学習する。\n第三段落。\n第四段落。",
                    )
                    .with_page_url("https://ja.wikipedia.org/wiki/機械学習"),
                )),
                "故障" => Err(SearchError::transport("upstream timed out")),
                _ => Ok(None),
            }
        }
    }

    fn test_state() -> SharedState {
        Arc::new(AppState::new(
            Arc::new(FakeSource),
            WebTheme::Tailwind,
            "http://127.0.0.1:8080",
        ))
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn encode(value: &str) -> String {
        utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
    }

    #[tokio::test]
    async fn home_has_search_controls_and_collapsed_sections() {
        let (status, html) = get_body(build_router(test_state()), "/").await;
        assert!(status.is_success());
        assert!(html.contains(r#"<form id="search-form" action="/search#search-result" method="get""#));
        assert!(html.contains(r#"id="search-input""#));
        assert!(html.contains(r#"<div id="search-result" class="search-result" aria-live="polite" hidden>"#));
        assert_eq!(
            html.matches(r#"role="button" tabindex="0" aria-expanded="false""#).count(),
            GlossaryIndex::len()
        );
    }

    #[tokio::test]
    async fn toggle_expands_one_section() {
        let (_, html) = get_body(build_router(test_state()), "/?toggle=llm").await;
        assert!(html.contains(r#"id="header-llm" class="accordion-header"#));
        assert_eq!(html.matches(r#"aria-expanded="true""#).count(), 1);
        assert!(html.contains(r#"name="open" value="llm""#));

        let (_, html) = get_body(build_router(test_state()), "/?open=llm,rag&toggle=llm").await;
        assert_eq!(html.matches(r#"aria-expanded="true""#).count(), 1);
        assert!(html.contains(r#"name="open" value="rag""#));
    }

    #[tokio::test]
    async fn search_page_renders_simplified_card() {
        let uri = format!("/search?q={}", encode("機械学習"));
        let (status, html) = get_body(build_router(test_state()), &uri).await;
        assert!(status.is_success());
        let start = html.find(r#"id="search-result""#).unwrap();
        let end = html[start..].find(r#"<form id="glossary""#).unwrap() + start;
        let region = &html[start..end];
        assert!(region.contains("<h3>機械学習 &lt;ML&gt;</h3>"));
        assert!(region.contains("<strong>機械学習</strong>は<strong>人工知能</strong>"));
        let body = &region[region.find("📖 概要").unwrap()..];
        assert_eq!(body.matches("<p>").count(), 3);
        assert!(region.contains(r#"data-scroll-behavior="smooth" data-scroll-block="nearest""#));
        assert!(html.contains(r#"value="機械学習""#));
    }

    #[tokio::test]
    async fn blank_query_leaves_region_idle() {
        let state = test_state();
        let (_, html) = get_body(build_router(state.clone()), "/fragment/search?q=%20%20").await;
        assert_eq!(
            html,
            r#"<div id="search-result" class="search-result" aria-live="polite" hidden></div>"#
        );
        assert_eq!(state.telemetry.snapshot().ignored, 1);
    }

    #[tokio::test]
    async fn fragment_shows_empty_and_error_panels() {
        let state = test_state();
        let uri = format!("/fragment/search?q={}", encode("謎の用語"));
        let (_, html) = get_body(build_router(state.clone()), &uri).await;
        assert!(html.contains("「謎の用語」"));

        let uri = format!("/fragment/search?q={}", encode("故障"));
        let (_, html) = get_body(build_router(state.clone()), &uri).await;
        assert!(html.contains("エラーが発生しました"));
        assert!(!html.contains("upstream"));

        let snapshot = state.telemetry.snapshot();
        assert_eq!((snapshot.empty, snapshot.errors), (1, 1));
    }

    #[tokio::test]
    async fn api_summary_maps_outcomes_to_status() {
        let router = build_router(test_state());
        let uri = format!("/api/summary?q={}", encode("機械学習"));
        let (status, body) = get_body(router.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let summary: SummaryResult = serde_json::from_str(&body).unwrap();
        assert_eq!(summary.title, "機械学習 <ML>");

        let (status, _) = get_body(router.clone(), "/api/summary?q=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_body(router.clone(), "/api/summary?q=nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let uri = format!("/api/summary?q={}", encode("故障"));
        let (status, body) = get_body(router, &uri).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.contains("timed out"));
    }

    #[tokio::test]
    async fn api_terms_lists_prefix_matches() {
        let uri = format!("/api/terms?prefix={}&limit=5", encode("ト"));
        let (status, body) = get_body(build_router(test_state()), &uri).await;
        assert!(status.is_success());
        let payload: TermsPayload = serde_json::from_str(&body).unwrap();
        assert_eq!(payload.limit, 5);
        assert!(payload.results.iter().any(|t| t.term == "トークン"));
    }

    #[tokio::test]
    async fn stats_and_health_respond() {
        let state = test_state();
        let uri = format!("/search?q={}", encode("機械学習"));
        get_body(build_router(state.clone()), &uri).await;
        let (_, body) = get_body(build_router(state.clone()), "/api/stats").await;
        let snapshot: TelemetrySnapshot = serde_json::from_str(&body).unwrap();
        assert_eq!(snapshot.results, 1);
        assert_eq!(snapshot.recent[0].term, "機械学習");

        let (status, body) = get_body(build_router(state), "/healthz").await;
        assert!(status.is_success());
        assert!(body.contains("\"ok\""));
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!("Bootstrap".parse::<WebTheme>(), Ok(WebTheme::Bootstrap));
        assert!("material".parse::<WebTheme>().is_err());
    }
}

use crate::error::SearchError;
use crate::escape::escape_html;
use crate::simplify::ContentSimplifier;
use crate::summary::SummaryResult;
use askama::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    Auto,
    #[default]
    Smooth,
}

impl ScrollBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollBehavior::Auto => "auto",
            ScrollBehavior::Smooth => "smooth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBlock {
    Start,
    Center,
    End,
    #[default]
    Nearest,
}

impl ScrollBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollBlock::Start => "start",
            ScrollBlock::Center => "center",
            ScrollBlock::End => "end",
            ScrollBlock::Nearest => "nearest",
        }
    }
}

/// A request to bring the region into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollIntoView {
    pub behavior: ScrollBehavior,
    pub block: ScrollBlock,
}

impl ScrollIntoView {
    /// Smallest movement that makes the region visible; never jumps the whole page.
    pub const NEAREST_SMOOTH: Self = Self {
        behavior: ScrollBehavior::Smooth,
        block: ScrollBlock::Nearest,
    };
}

/// The single container search output is written into.
pub trait OutputRegion {
    /// Replaces everything in the region and makes it visible.
    fn replace(&mut self, html: String);

    fn scroll_into_view(&mut self, request: ScrollIntoView);
}

/// In-memory region; the web page and the CLI read it back after a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferRegion {
    html: String,
    visible: bool,
    scroll: Option<ScrollIntoView>,
}

impl BufferRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Scroll request made since the last [`OutputRegion::replace`], if any.
    pub fn pending_scroll(&self) -> Option<ScrollIntoView> {
        self.scroll
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

impl OutputRegion for BufferRegion {
    fn replace(&mut self, html: String) {
        self.html = html;
        self.visible = true;
        self.scroll = None;
    }

    fn scroll_into_view(&mut self, request: ScrollIntoView) {
        self.scroll = Some(request);
    }
}

/// Markup for the search output region: result card plus loading, empty and error panels.
#[derive(Debug, Clone, Default)]
pub struct ResultRenderer {
    simplifier: ContentSimplifier,
}

impl ResultRenderer {
    pub fn new(simplifier: ContentSimplifier) -> Self {
        Self { simplifier }
    }

    pub fn simplifier(&self) -> &ContentSimplifier {
        &self.simplifier
    }

    /// Writes the result card into `region`, then asks for it to be scrolled into view.
    pub fn render<R>(
        &self,
        result: &SummaryResult,
        original_term: &str,
        region: &mut R,
    ) -> Result<(), SearchError>
    where
        R: OutputRegion + ?Sized,
    {
        let html = self.result_card(result, original_term)?;
        region.replace(html);
        region.scroll_into_view(ScrollIntoView::NEAREST_SMOOTH);
        Ok(())
    }

    pub fn result_card(
        &self,
        result: &SummaryResult,
        original_term: &str,
    ) -> Result<String, SearchError> {
        let title = if result.title.trim().is_empty() {
            original_term
        } else {
            result.title.as_str()
        };
        let template = ResultCardTemplate {
            title_html: escape_html(title),
            thumbnail_src: web_url(result.thumbnail_url.as_deref()),
            body_html: self.simplifier.simplify(Some(&result.extract)),
            page_href: web_url(result.page_url.as_deref()),
        };
        Ok(template.render()?)
    }

    pub fn loading_panel(&self) -> Result<String, SearchError> {
        Ok(LoadingTemplate.render()?)
    }

    /// Panel for a search that resolved to nothing. Names the term the user typed.
    pub fn empty_panel(&self, term: &str) -> Result<String, SearchError> {
        let template = EmptyTemplate {
            term_html: escape_html(term),
        };
        Ok(template.render()?)
    }

    /// Generic retry-later panel. Carries no detail about the failure.
    pub fn error_panel(&self) -> Result<String, SearchError> {
        Ok(ErrorTemplate.render()?)
    }
}

/// Escaped URL for an attribute, or `None` for anything but http(s).
fn web_url(url: Option<&str>) -> Option<String> {
    url.map(str::trim)
        .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
        .map(escape_html)
}

#[derive(Template)]
#[template(
    source = r#"<div class="result-card">
  <div class="result-header">
    <h3>{{ title_html|safe }}</h3>
  </div>
  {% match thumbnail_src %}{% when Some with (src) %}
  <img src="{{ src|safe }}" alt="{{ title_html|safe }}" class="result-image">
  {% when None %}{% endmatch %}
  <div class="result-content">
    <h4>📖 概要</h4>
    {{ body_html|safe }}
  </div>
  {% match page_href %}{% when Some with (href) %}
  <div class="result-footer">
    <a href="{{ href|safe }}" target="_blank" rel="noopener noreferrer" class="wiki-link">📚 Wikipediaで詳しく読む →</a>
  </div>
  {% when None %}{% endmatch %}
</div>"#,
    ext = "html"
)]
struct ResultCardTemplate {
    title_html: String,
    thumbnail_src: Option<String>,
    body_html: String,
    page_href: Option<String>,
}

#[derive(Template)]
#[template(source = r#"<div class="loading">検索中...</div>"#, ext = "html")]
struct LoadingTemplate;

#[derive(Template)]
#[template(
    source = r#"<div class="error">
  <h3>⚠️ 検索結果が見つかりませんでした</h3>
  <p>「{{ term_html|safe }}」に関する情報がWikipediaで見つかりませんでした。</p>
  <p>別の用語で検索してみてください。</p>
</div>"#,
    ext = "html"
)]
struct EmptyTemplate {
    term_html: String,
}

#[derive(Template)]
#[template(
    source = r#"<div class="error">
  <h3>⚠️ エラーが発生しました</h3>
  <p>情報の取得中にエラーが発生しました。しばらくしてから再度お試しください。</p>
</div>"#,
    ext = "html"
)]
struct ErrorTemplate;

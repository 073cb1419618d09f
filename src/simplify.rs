use crate::escape::escape_html;
use crate::highlight::Highlighter;

pub const DEFAULT_MAX_PARAGRAPHS: usize = 3;
pub const NO_INFORMATION_HTML: &str = "<p>情報を取得できませんでした。</p>";

/// Turns a raw encyclopedia extract into a short, beginner-friendly HTML fragment.
#[derive(Debug, Clone)]
pub struct ContentSimplifier {
    highlighter: Highlighter,
    max_paragraphs: usize,
}

impl Default for ContentSimplifier {
    fn default() -> Self {
        Self::new(Highlighter::default())
    }
}

impl ContentSimplifier {
    pub fn new(highlighter: Highlighter) -> Self {
        Self {
            highlighter,
            max_paragraphs: DEFAULT_MAX_PARAGRAPHS,
        }
    }

    pub fn with_max_paragraphs(mut self, max_paragraphs: usize) -> Self {
        self.max_paragraphs = max_paragraphs.max(1);
        self
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    /// Output only ever contains `<p>` and `<strong>` tags around escaped text.
    pub fn simplify(&self, raw: Option<&str>) -> String {
        let paragraphs = paragraphs(raw.unwrap_or_default(), self.max_paragraphs);
        if paragraphs.is_empty() {
            return NO_INFORMATION_HTML.to_string();
        }
        let html: String = paragraphs
            .into_iter()
            .map(|paragraph| format!("<p>{}</p>", escape_html(paragraph)))
            .collect();
        self.highlighter.highlight(&html)
    }
}

/// Non-blank lines of `raw`, trimmed, capped at `max`.
pub fn paragraphs(raw: &str, max: usize) -> Vec<&str> {
    raw.split('\n')
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .take(max)
        .collect()
}

/// Replaces the five HTML-significant characters with entity references.
///
/// Applies to element content and quoted attribute values alike. Escaping is not idempotent:
/// `&amp;` becomes `&amp;amp;` on a second pass.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Like [`escape_html`], treating a missing value as empty text.
pub fn escape_opt(text: Option<&str>) -> String {
    text.map(escape_html).unwrap_or_default()
}

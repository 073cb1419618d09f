const OPEN_TAG: &str = "<strong>";
const CLOSE_TAG: &str = "</strong>";

const DEFAULT_TERMS: &[&str] = &[
    "人工知能",
    "AI",
    "機械学習",
    "ディープラーニング",
    "深層学習",
    "ニューラルネットワーク",
    "学習",
    "モデル",
    "アルゴリズム",
    "データ",
    "パターン",
    "予測",
    "分類",
    "認識",
    "LLM",
    "トランスフォーマー",
    "Transformer",
    "プロンプト",
    "トークン",
    "ファインチューニング",
    "エンベディング",
    "RAG",
    "ハルシネーション",
];

/// Ordered list of terms to emphasise. Earlier terms win when terms overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary, dropping empty terms.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(Into::into)
                .filter(|term: &String| !term.is_empty())
                .collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_TERMS.iter().copied())
    }
}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    vocabulary: Vocabulary,
}

impl Highlighter {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Wraps every vocabulary occurrence in `<strong>`, one term at a time in list order.
    ///
    /// Matching is case-sensitive and unanchored, so a term also matches inside a longer
    /// word. Tag markup is never searched and text already inside `<strong>` is left alone,
    /// which makes the pass idempotent.
    pub fn highlight(&self, html: &str) -> String {
        let mut result = html.to_string();
        for term in &self.vocabulary.terms {
            result = wrap_term(&result, term);
        }
        result
    }
}

fn wrap_term(html: &str, term: &str) -> String {
    let mut out = String::with_capacity(html.len() + OPEN_TAG.len() + CLOSE_TAG.len());
    let mut strong_depth = 0usize;
    let mut rest = html;
    while !rest.is_empty() {
        if rest.starts_with('<') {
            let end = rest.find('>').map(|idx| idx + 1).unwrap_or(rest.len());
            let tag = &rest[..end];
            if is_strong_open(tag) {
                strong_depth += 1;
            } else if tag == CLOSE_TAG {
                strong_depth = strong_depth.saturating_sub(1);
            }
            out.push_str(tag);
            rest = &rest[end..];
            continue;
        }
        let end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..end];
        if strong_depth == 0 {
            push_wrapped(&mut out, text, term);
        } else {
            out.push_str(text);
        }
        rest = &rest[end..];
    }
    out
}

fn is_strong_open(tag: &str) -> bool {
    tag == OPEN_TAG || tag.starts_with("<strong ")
}

/// Searches `text` for `term`, copying entity references such as `&amp;` through untouched.
fn push_wrapped(out: &mut String, text: &str, term: &str) {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        push_matches(out, &rest[..amp], term);
        let entity_len = entity_len(&rest[amp..]);
        out.push_str(&rest[amp..amp + entity_len]);
        rest = &rest[amp + entity_len..];
    }
    push_matches(out, rest, term);
}

/// Length of the entity reference at the start of `text`, or 1 for a bare `&`.
fn entity_len(text: &str) -> usize {
    let body = &text[1..];
    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
        .count();
    if name_len > 0 && body[name_len..].starts_with(';') {
        name_len + 2
    } else {
        1
    }
}

fn push_matches(out: &mut String, text: &str, term: &str) {
    let mut rest = text;
    while let Some(idx) = rest.find(term) {
        out.push_str(&rest[..idx]);
        out.push_str(OPEN_TAG);
        out.push_str(term);
        out.push_str(CLOSE_TAG);
        rest = &rest[idx + term.len()..];
    }
    out.push_str(rest);
}

use thiserror::Error;

/// Terminal outcomes of a single search submission.
///
/// None of these are retried automatically; the user re-submits.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The submitted term was empty after trimming. Ignored without a state change.
    #[error("search term is empty")]
    EmptyTerm,
    /// The encyclopedia has no article for the term, even after the suggestion lookup.
    #[error("no summary found for {0:?}")]
    NotFound(String),
    /// Network failure, unexpected status, or malformed payload.
    #[error("summary transport failed: {0}")]
    Transport(String),
    #[error("failed to render search panel: {0}")]
    Render(#[from] askama::Error),
}

impl SearchError {
    pub fn transport(message: impl Into<String>) -> Self {
        SearchError::Transport(message.into())
    }
}

use crate::controller::DisplayState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

const MAX_RECENT_SEARCHES: usize = 50;
const ERROR_RATE_WARN_MIN_SAMPLES: u64 = 20;
const ERROR_RATE_WARN_THRESHOLD: f64 = 0.5;

/// In-memory search outcome counters. Nothing here is persisted.
#[derive(Clone, Default)]
pub struct SearchTelemetry {
    shared: Arc<RwLock<TelemetryData>>,
}

impl SearchTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records where a submission ended up. `Idle` means the input was blank.
    pub fn record(&self, state: &DisplayState) {
        let now = now_ts();
        let mut guard = self.shared.write();
        guard.submissions += 1;
        let outcome = match state {
            DisplayState::Idle => {
                guard.ignored += 1;
                return;
            }
            DisplayState::Loading { .. } => SearchOutcome::Pending,
            DisplayState::Result { .. } => {
                guard.results += 1;
                SearchOutcome::Result
            }
            DisplayState::Empty { .. } => {
                guard.empty += 1;
                SearchOutcome::Empty
            }
            DisplayState::Error { .. } => {
                guard.errors += 1;
                SearchOutcome::Error
            }
        };
        if let Some(term) = state.term() {
            guard.push_recent(RecentSearch {
                term: term.to_string(),
                outcome,
                at: now,
            });
        }
        let answered = guard.results + guard.empty + guard.errors;
        if outcome == SearchOutcome::Error && answered >= ERROR_RATE_WARN_MIN_SAMPLES {
            let rate = guard.errors as f64 / answered as f64;
            if rate >= ERROR_RATE_WARN_THRESHOLD {
                warn!(errors = guard.errors, answered, rate, "summary error rate is high");
            }
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let guard = self.shared.read();
        TelemetrySnapshot {
            submissions: guard.submissions,
            ignored: guard.ignored,
            results: guard.results,
            empty: guard.empty,
            errors: guard.errors,
            recent: guard.recent.iter().rev().cloned().collect(),
        }
    }
}

#[derive(Default)]
struct TelemetryData {
    submissions: u64,
    ignored: u64,
    results: u64,
    empty: u64,
    errors: u64,
    recent: VecDeque<RecentSearch>,
}

impl TelemetryData {
    fn push_recent(&mut self, search: RecentSearch) {
        if self.recent.len() >= MAX_RECENT_SEARCHES {
            self.recent.pop_front();
        }
        self.recent.push_back(search);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOutcome {
    Pending,
    Result,
    Empty,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentSearch {
    pub term: String,
    pub outcome: SearchOutcome,
    pub at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub submissions: u64,
    pub ignored: u64,
    pub results: u64,
    pub empty: u64,
    pub errors: u64,
    /// Newest first.
    pub recent: Vec<RecentSearch>,
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{SearchTerm, SummaryResult};

    fn term(value: &str) -> SearchTerm {
        SearchTerm::parse(value).unwrap()
    }

    #[test]
    fn counts_each_outcome() {
        let telemetry = SearchTelemetry::new();
        telemetry.record(&DisplayState::Idle);
        telemetry.record(&DisplayState::Empty { term: term("謎") });
        telemetry.record(&DisplayState::Error { term: term("AI") });
        telemetry.record(&DisplayState::Result {
            term: term("RAG"),
            summary: SummaryResult::new("RAG", ""),
        });

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.submissions, 4);
        assert_eq!(snapshot.ignored, 1);
        assert_eq!((snapshot.results, snapshot.empty, snapshot.errors), (1, 1, 1));
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0].term, "RAG");
        assert_eq!(snapshot.recent[0].outcome, SearchOutcome::Result);
    }

    #[test]
    fn recent_list_is_bounded() {
        let telemetry = SearchTelemetry::new();
        for idx in 0..(MAX_RECENT_SEARCHES + 5) {
            telemetry.record(&DisplayState::Empty {
                term: term(&format!("t{idx}")),
            });
        }
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.recent.len(), MAX_RECENT_SEARCHES);
        assert_eq!(
            snapshot.recent[0].term,
            format!("t{}", MAX_RECENT_SEARCHES + 4)
        );
    }
}

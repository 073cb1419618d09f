mod data;

pub mod accordion;
pub mod controller;
pub mod error;
pub mod escape;
pub mod highlight;
pub mod render;
pub mod simplify;
pub mod summary;
pub mod telemetry;
#[cfg(feature = "web")]
pub mod web;

pub use accordion::{Accordion, AccordionSection, KeyActivation};
pub use controller::{
    Completion, DisplayState, SearchController, SearchTicket, SharedSearchController,
};
pub use error::SearchError;
pub use escape::escape_html;
pub use highlight::{Highlighter, Vocabulary};
pub use render::{BufferRegion, OutputRegion, ResultRenderer, ScrollBehavior, ScrollBlock, ScrollIntoView};
pub use simplify::ContentSimplifier;
pub use summary::{SearchTerm, SummaryConfig, SummaryResult, SummarySource, WikipediaClient};
pub use telemetry::{SearchTelemetry, TelemetrySnapshot};

use data::{
    ArchivedCompressedTextStore, ArchivedGlossaryStore, ArchivedPackedStrings, ArchivedRange,
    ArchivedStringId, ArchivedTermRecord, ArchivedTextId,
};
use fst::Automaton;
use fst::automaton::Str;
use fst::{IntoStreamer, Map, Streamer};
use once_cell::sync::Lazy;
use rkyv::access_unchecked;
use rkyv::util::AlignedVec;
use std::io::{Cursor, Read};
use std::str;
use zstd::stream::{Decoder as ZstdDecoder, decode_all};

static GLOSSARY_FST_BYTES: &[u8] = include_bytes!(env!("GLOSSARY_FST"));
static DATA_BYTES: &[u8] = include_bytes!(env!("GLOSSARY_DATA"));

static TERM_MAP: Lazy<Map<&'static [u8]>> =
    Lazy::new(|| Map::new(GLOSSARY_FST_BYTES).expect("valid glossary fst"));
static DATA_SLICE: Lazy<&'static AlignedVec> = Lazy::new(|| {
    let decompressed = decode_all(Cursor::new(DATA_BYTES)).expect("decompress glossary data");
    let mut aligned = AlignedVec::with_capacity(decompressed.len());
    aligned.extend_from_slice(&decompressed);
    Box::leak(Box::new(aligned))
});
static DATA_STORE: Lazy<&'static ArchivedGlossaryStore> =
    Lazy::new(|| unsafe { access_unchecked::<ArchivedGlossaryStore>(DATA_SLICE.as_slice()) });

/// Read-only access to the embedded glossary.
pub struct GlossaryIndex;

impl GlossaryIndex {
    /// Returns the term ID for an exact term match.
    pub fn get(term: &str) -> Option<u32> {
        TERM_MAP.get(term).map(|value| value as u32)
    }

    /// Returns up to `limit` terms that start with the provided prefix, in byte order.
    pub fn prefix(prefix: &str, limit: usize) -> Vec<(String, u32)> {
        let automaton = Str::new(prefix).starts_with();
        let mut stream = TERM_MAP.search(automaton).into_stream();
        let mut results = Vec::new();
        while let Some((key, value)) = stream.next() {
            let term = String::from_utf8(key.to_vec()).expect("stored term is valid UTF-8");
            results.push((term, value as u32));
            if results.len() >= limit {
                break;
            }
        }
        results
    }

    /// Returns the entry for the given ID, if available.
    pub fn entry_by_id(term_id: u32) -> Option<GlossaryEntry<'static>> {
        store()
            .terms
            .get(term_id as usize)
            .map(|record| GlossaryEntry {
                store: store(),
                record,
            })
    }

    /// Resolves a term to its entry.
    pub fn entry_by_term(term: &str) -> Option<GlossaryEntry<'static>> {
        Self::get(term).and_then(Self::entry_by_id)
    }

    pub fn entry_by_slug(slug: &str) -> Option<GlossaryEntry<'static>> {
        Self::entries().find(|entry| entry.slug() == slug)
    }

    /// All entries in dataset order (the order the page lists them in).
    pub fn entries() -> impl Iterator<Item = GlossaryEntry<'static>> {
        let store = store();
        store
            .terms
            .iter()
            .map(move |record| GlossaryEntry { store, record })
    }

    pub fn len() -> usize {
        store().terms.len()
    }

    pub fn is_empty() -> bool {
        Self::len() == 0
    }
}

fn store() -> &'static ArchivedGlossaryStore {
    *DATA_STORE
}

pub struct GlossaryEntry<'a> {
    store: &'a ArchivedGlossaryStore,
    record: &'a ArchivedTermRecord,
}

impl<'a> GlossaryEntry<'a> {
    pub fn term_id(&self) -> u32 {
        self.record.term_id.to_native()
    }

    pub fn slug(&self) -> &'a str {
        self.store.strings.get(self.record.slug)
    }

    pub fn term(&self) -> &'a str {
        self.store.strings.get(self.record.term)
    }

    pub fn reading(&self) -> Option<&'a str> {
        self.record
            .reading
            .as_ref()
            .map(|id| self.store.strings.get(*id))
    }

    pub fn category(&self) -> Option<&'a str> {
        self.record
            .category
            .as_ref()
            .map(|id| self.store.strings.get(*id))
    }

    pub fn summary(&self) -> &'a str {
        self.store.strings.get(self.record.summary)
    }

    /// Long-form explanation, decompressed on every call.
    pub fn detail(&self) -> Option<String> {
        self.record
            .detail
            .as_ref()
            .map(|id| self.store.long_texts.decompress(*id))
    }

    pub fn related(&self) -> impl Iterator<Item = &'a str> + 'a {
        let store = self.store;
        range_slice(store.term_related.as_slice(), &self.record.related)
            .iter()
            .map(move |id| store.strings.get(*id))
    }
}

fn range_slice<'a, T>(data: &'a [T], range: &'a ArchivedRange) -> &'a [T] {
    let start = range.start.to_native() as usize;
    let len = range.len.to_native() as usize;
    &data[start..start + len]
}

impl ArchivedPackedStrings {
    fn get(&self, id: ArchivedStringId) -> &str {
        let idx = id.to_native() as usize;
        let start = self.offsets.as_slice()[idx].to_native() as usize;
        let len = self.lengths.as_slice()[idx].to_native() as usize;
        let data = self.data.as_slice();
        let bytes = &data[start..start + len];
        str::from_utf8(bytes).expect("stored string data is valid UTF-8")
    }
}

impl ArchivedCompressedTextStore {
    fn decompress(&self, id: ArchivedTextId) -> String {
        let idx = id.to_native() as usize;
        let start = self.offsets.as_slice()[idx].to_native() as usize;
        let len = self.lengths.as_slice()[idx].to_native() as usize;
        let data = self.data.as_slice();
        let bytes = &data[start..start + len];
        let mut decoder = ZstdDecoder::new(Cursor::new(bytes)).expect("long text chunk decoder");
        let mut output = Vec::new();
        decoder
            .read_to_end(&mut output)
            .expect("long text chunk decompresses");
        String::from_utf8(output).expect("long text chunk is valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_lookup_resolves_entry() {
        let entry = GlossaryIndex::entry_by_term("機械学習").expect("machine learning entry");
        assert_eq!(entry.slug(), "machine-learning");
        assert_eq!(entry.reading(), Some("きかいがくしゅう"));
        assert!(entry.related().any(|term| term == "人工知能"));
    }

    #[test]
    fn detail_text_round_trips_through_zstd() {
        let entry = GlossaryIndex::entry_by_slug("rag").expect("rag entry");
        let detail = entry.detail().expect("detail text");
        assert!(detail.contains("Retrieval-Augmented Generation"));
        assert!(detail.lines().count() >= 2);
    }

    #[test]
    fn prefix_respects_limit() {
        let all = GlossaryIndex::prefix("", usize::MAX);
        assert_eq!(all.len(), GlossaryIndex::len());
        assert_eq!(GlossaryIndex::prefix("", 2).len(), 2);
        let hits = GlossaryIndex::prefix("ト", 10);
        assert!(hits.iter().any(|(term, _)| term == "トークン"));
        assert!(hits.iter().all(|(term, _)| term.starts_with('ト')));
    }

    #[test]
    fn entries_keep_dataset_order() {
        let slugs: Vec<_> = GlossaryIndex::entries().map(|e| e.slug()).take(2).collect();
        assert_eq!(slugs, vec!["ai", "machine-learning"]);
        assert!(GlossaryIndex::get("存在しない用語").is_none());
    }
}

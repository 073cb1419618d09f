use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fst::MapBuilder;
use rkyv::{rancor::Error as RkyvError, to_bytes};
use serde::Deserialize;
use zstd::bulk::compress as zstd_compress;

#[path = "src/data.rs"]
mod data_model;
use data_model::{
    CompressedTextStore, GlossaryStore, PackedStrings, Range, StringId, TermRecord, TextId,
};

// The glossary is tiny; favour ratio over build speed.
const ARCHIVE_COMPRESSION_LEVEL: i32 = 9;
const LONG_TEXT_COMPRESSION_LEVEL: i32 = 9;

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let entries = load_entries(&manifest_dir)?;
    let rows: Vec<(String, u32)> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| (entry.term.clone(), idx as u32))
        .collect();
    build_fst(&rows, &out_dir)?;
    build_glossary_store(entries, &out_dir)?;

    Ok(())
}

fn load_entries(manifest_dir: &Path) -> Result<Vec<EntryJson>, Box<dyn Error>> {
    let entries_path = manifest_dir.join("data/glossary.jsonl");
    println!("cargo:rerun-if-changed={}", entries_path.display());
    if !entries_path.exists() {
        panic!("Missing {}.", entries_path.display());
    }

    let file = BufReader::new(File::open(&entries_path)?);
    let mut entries = Vec::new();
    for (line_idx, line_res) in file.lines().enumerate() {
        let line = line_res?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: EntryJson = serde_json::from_str(&line)
            .map_err(|err| format!("Failed to parse JSON line {}: {err}", line_idx + 1))?;
        if entry.term.trim().is_empty() {
            return Err(format!("Empty term on line {}", line_idx + 1).into());
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn build_fst(rows: &[(String, u32)], out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()).then(a.1.cmp(&b.1)));
    for pair in sorted.windows(2) {
        if pair[0].0 == pair[1].0 {
            panic!("Duplicate glossary term {:?}", pair[0].0);
        }
    }

    let fst_path = out_dir.join("terms.fst");
    let writer = BufWriter::new(File::create(&fst_path)?);
    let mut builder = MapBuilder::new(writer)?;
    for (term, id) in &sorted {
        builder.insert(term, u64::from(*id))?;
    }
    builder.finish()?;
    println!("cargo:rustc-env=GLOSSARY_FST={}", fst_path.display());
    Ok(())
}

fn build_glossary_store(entries: Vec<EntryJson>, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut builder = StoreBuilder::new(entries.len());
    for entry in entries {
        builder.add_entry(entry);
    }

    let store = builder.finish();
    let bytes = to_bytes::<RkyvError>(&store)
        .map_err(|err| format!("Failed to serialize glossary store: {err}"))?
        .into_vec();
    let compressed = zstd_compress(&bytes, ARCHIVE_COMPRESSION_LEVEL)?;

    let data_path = out_dir.join("glossary_data.rkyv");
    fs::write(&data_path, compressed)?;
    println!("cargo:rustc-env=GLOSSARY_DATA={}", data_path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    slug: String,
    term: String,
    reading: Option<String>,
    category: Option<String>,
    summary: String,
    detail: Option<String>,
    #[serde(default)]
    related: Vec<String>,
}

struct StoreBuilder {
    strings: StringTable,
    long_texts: CompressedTextTable,
    terms: Vec<TermRecord>,
    term_related: Vec<StringId>,
}

impl StoreBuilder {
    fn new(expected_entries: usize) -> Self {
        Self {
            strings: StringTable::default(),
            long_texts: CompressedTextTable::default(),
            terms: Vec::with_capacity(expected_entries),
            term_related: Vec::new(),
        }
    }

    fn add_entry(&mut self, entry: EntryJson) {
        let term_id = self.terms.len() as u32;
        let slug = self.strings.intern_owned(entry.slug);
        let term = self.strings.intern_owned(entry.term);
        let reading = self.strings.intern_option(entry.reading);
        let category = self.strings.intern_option(entry.category);
        let summary = self.strings.intern_owned(entry.summary);
        let detail = entry
            .detail
            .filter(|text| !text.trim().is_empty())
            .map(|text| self.long_texts.intern_owned(text));

        let start = self.term_related.len() as u32;
        for value in entry.related {
            let id = self.strings.intern_owned(value);
            self.term_related.push(id);
        }
        let related = Range::new(start, self.term_related.len() as u32 - start);

        self.terms.push(TermRecord {
            term_id,
            slug,
            term,
            reading,
            category,
            summary,
            detail,
            related,
        });
    }

    fn finish(self) -> GlossaryStore {
        GlossaryStore {
            strings: self.strings.into_store(),
            long_texts: self.long_texts.into_store(),
            terms: self.terms,
            term_related: self.term_related,
        }
    }
}

#[derive(Default)]
struct StringTable {
    map: HashMap<Box<str>, StringId>,
    offsets: Vec<u32>,
    lengths: Vec<u32>,
    data: Vec<u8>,
}

impl StringTable {
    fn intern_owned(&mut self, value: String) -> StringId {
        if let Some(&id) = self.map.get(value.as_str()) {
            return id;
        }
        let id = self.offsets.len() as u32;
        self.offsets.push(self.data.len() as u32);
        self.lengths.push(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
        self.map.insert(value.into_boxed_str(), id);
        id
    }

    fn intern_option(&mut self, value: Option<String>) -> Option<StringId> {
        value.map(|v| self.intern_owned(v))
    }

    fn into_store(self) -> PackedStrings {
        PackedStrings {
            offsets: self.offsets,
            lengths: self.lengths,
            data: self.data,
        }
    }
}

#[derive(Default)]
struct CompressedTextTable {
    map: HashMap<Box<str>, TextId>,
    offsets: Vec<u32>,
    lengths: Vec<u32>,
    data: Vec<u8>,
}

impl CompressedTextTable {
    fn intern_owned(&mut self, value: String) -> TextId {
        if let Some(&id) = self.map.get(value.as_str()) {
            return id;
        }
        let compressed = zstd_compress(value.as_bytes(), LONG_TEXT_COMPRESSION_LEVEL)
            .expect("compress long-form text with zstd");
        let id = self.offsets.len() as u32;
        self.offsets.push(self.data.len() as u32);
        self.lengths.push(compressed.len() as u32);
        self.data.extend_from_slice(&compressed);
        self.map.insert(value.into_boxed_str(), id);
        id
    }

    fn into_store(self) -> CompressedTextStore {
        CompressedTextStore {
            offsets: self.offsets,
            lengths: self.lengths,
            data: self.data,
        }
    }
}

use rkyv::{Archive, Serialize};

pub type StringId = u32;
#[allow(dead_code)]
pub type ArchivedStringId = <StringId as Archive>::Archived;
pub type TextId = u32;
#[allow(dead_code)]
pub type ArchivedTextId = <TextId as Archive>::Archived;

#[derive(Archive, Serialize, Debug, Clone, Copy)]
pub struct Range {
    pub start: u32,
    pub len: u32,
}

#[allow(dead_code)]
impl Range {
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }
}

#[derive(Archive, Serialize, Debug)]
pub struct TermRecord {
    pub term_id: u32,
    pub slug: StringId,
    pub term: StringId,
    pub reading: Option<StringId>,
    pub category: Option<StringId>,
    pub summary: StringId,
    pub detail: Option<TextId>,
    pub related: Range,
}

#[derive(Archive, Serialize, Debug)]
pub struct PackedStrings {
    pub offsets: Vec<u32>,
    pub lengths: Vec<u32>,
    pub data: Vec<u8>,
}

#[derive(Archive, Serialize, Debug)]
pub struct CompressedTextStore {
    pub offsets: Vec<u32>,
    pub lengths: Vec<u32>,
    pub data: Vec<u8>,
}

#[derive(Archive, Serialize, Debug)]
pub struct GlossaryStore {
    pub strings: PackedStrings,
    pub long_texts: CompressedTextStore,
    pub terms: Vec<TermRecord>,
    pub term_related: Vec<StringId>,
}

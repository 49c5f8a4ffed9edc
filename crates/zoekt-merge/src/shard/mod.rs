//! Shard codec: the on-disk layout read by `ShardReader` and produced by
//! `IndexBuilder` through `WriteShard`.
//!
//! Binary LE format:
//! [magic: u32] [version: u32] [doc_count: u32]
//! [section offsets: u64; SECTION_COUNT], in `Section` order
//! Repos: [json_len: u32][json: Vec<RepoMeta>]
//! Languages: [n: u16] then n x [len: u16][utf8]
//! SubRepos: [repo_count: u32] then per repo [n: u32] then n x [len: u16][utf8]
//! Docs: doc_count fixed records of DOC_RECORD_LEN bytes (see `DocRecord`)
//! Names / Contents: concatenated bytes addressed by the doc records
//! SymbolSections: per doc, symbol_count x [start_delta: varint][len: varint]
//! SymbolStore: [count: u32][rec_off: u32; count] then records of four
//!   [len: u16][utf8] strings (sym, kind, parent, parent_kind)
//! Postings: [term_count: u32] then per term [tri: [u8;3]][n_docs: u32] and
//!   n_docs x [doc_delta: varint][npos: varint][pos_delta: varint; npos]
//! ContentHash: sha256 over every document's content in doc order
//!
//! Sections are laid out back to back in `Section` order, so each section
//! ends where the next one starts.

mod error;
mod reader;
pub(crate) mod utils;
pub(crate) mod writer_utils;

pub use error::DecodeError;
pub use reader::ShardReader;

pub const MAGIC: u32 = 0x5a4f_454b; // 'ZOEK'
pub const INDEX_FORMAT_VERSION: u32 = 16;

pub const SECTION_COUNT: usize = 10;
pub const HEADER_LEN: usize = 12 + 8 * SECTION_COUNT;
pub const DOC_RECORD_LEN: usize = 48;
pub const CONTENT_HASH_LEN: usize = 32;

/// A branch mask is a u64, so a repository can name at most 64 branches.
pub const MAX_BRANCHES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Repos,
    Languages,
    SubRepos,
    Docs,
    Names,
    Contents,
    SymbolSections,
    SymbolStore,
    Postings,
    ContentHash,
}

impl Section {
    pub const ALL: [Section; SECTION_COUNT] = [
        Section::Repos,
        Section::Languages,
        Section::SubRepos,
        Section::Docs,
        Section::Names,
        Section::Contents,
        Section::SymbolSections,
        Section::SymbolStore,
        Section::Postings,
        Section::ContentHash,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Byte position of this section's offset field inside the header.
    pub fn header_pos(self) -> usize {
        12 + 8 * self.index()
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::Repos => "repos",
            Section::Languages => "languages",
            Section::SubRepos => "sub-repos",
            Section::Docs => "docs",
            Section::Names => "names",
            Section::Contents => "contents",
            Section::SymbolSections => "symbol sections",
            Section::SymbolStore => "symbol store",
            Section::Postings => "postings",
            Section::ContentHash => "content hash",
        }
    }
}

/// Fixed-size per-document entry of the docs section. Offsets are relative
/// to the start of the section they point into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DocRecord {
    pub repo: u16,
    pub language: u16,
    pub sub_repo: u32,
    pub branch_mask: u64,
    pub name_off: u32,
    pub name_len: u32,
    pub content_off: u64,
    pub content_len: u32,
    pub sections_off: u32,
    pub symbol_base: u32,
    pub symbol_count: u32,
}

// Field positions inside a record; test helpers patch records in place.
pub(crate) const REC_REPO: usize = 0;
pub(crate) const REC_LANGUAGE: usize = 2;
pub(crate) const REC_SUB_REPO: usize = 4;
pub(crate) const REC_BRANCH_MASK: usize = 8;
pub(crate) const REC_CONTENT_LEN: usize = 32;
pub(crate) const REC_SYMBOL_BASE: usize = 40;

impl DocRecord {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend(&self.repo.to_le_bytes());
        out.extend(&self.language.to_le_bytes());
        out.extend(&self.sub_repo.to_le_bytes());
        out.extend(&self.branch_mask.to_le_bytes());
        out.extend(&self.name_off.to_le_bytes());
        out.extend(&self.name_len.to_le_bytes());
        out.extend(&self.content_off.to_le_bytes());
        out.extend(&self.content_len.to_le_bytes());
        out.extend(&self.sections_off.to_le_bytes());
        out.extend(&self.symbol_base.to_le_bytes());
        out.extend(&self.symbol_count.to_le_bytes());
    }

    pub(crate) fn decode(b: &[u8; DOC_RECORD_LEN]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([b[at], b[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]);
        let u64_at = |at: usize| u64::from(u32_at(at)) | (u64::from(u32_at(at + 4)) << 32);
        Self {
            repo: u16_at(REC_REPO),
            language: u16_at(REC_LANGUAGE),
            sub_repo: u32_at(REC_SUB_REPO),
            branch_mask: u64_at(REC_BRANCH_MASK),
            name_off: u32_at(16),
            name_len: u32_at(20),
            content_off: u64_at(24),
            content_len: u32_at(REC_CONTENT_LEN),
            sections_off: u32_at(36),
            symbol_base: u32_at(REC_SYMBOL_BASE),
            symbol_count: u32_at(44),
        }
    }
}

//! Test-only helpers that require knowledge of the shard layout.
//!
//! This module lives in `src/` so integration tests under `tests/` can
//! produce shards a well-behaved `IndexBuilder` never writes (out-of-order
//! repository ids, truncated contents, dangling table references) without
//! widening the public codec API.

use crate::shard::{
    Section, DOC_RECORD_LEN, HEADER_LEN, REC_BRANCH_MASK, REC_CONTENT_LEN, REC_LANGUAGE,
    REC_REPO, REC_SUB_REPO, REC_SYMBOL_BASE,
};
use std::io;
use std::path::Path;

fn doc_record_pos(bytes: &[u8], doc: u32) -> io::Result<usize> {
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());
    if bytes.len() < HEADER_LEN {
        return Err(invalid("not a shard"));
    }
    let doc_count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if doc >= doc_count {
        return Err(invalid("document out of range"));
    }
    let at = Section::Docs.header_pos();
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    let docs_off = u64::from_le_bytes(raw) as usize;
    Ok(docs_off + doc as usize * DOC_RECORD_LEN)
}

fn patch(path: &Path, doc: u32, field: usize, value: &[u8]) -> io::Result<()> {
    let mut bytes = std::fs::read(path)?;
    let pos = doc_record_pos(&bytes, doc)? + field;
    bytes
        .get_mut(pos..pos + value.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "record out of bounds"))?
        .copy_from_slice(value);
    std::fs::write(path, bytes)
}

/// Rewrite the owning repository id of `doc` in the shard at `path`.
pub fn patch_doc_repo_id(path: &Path, doc: u32, repo: u16) -> io::Result<()> {
    patch(path, doc, REC_REPO, &repo.to_le_bytes())
}

/// Rewrite the stored content length of `doc`, e.g. to point past the
/// contents section.
pub fn patch_doc_content_len(path: &Path, doc: u32, len: u32) -> io::Result<()> {
    patch(path, doc, REC_CONTENT_LEN, &len.to_le_bytes())
}

/// Rewrite the language code of `doc`.
pub fn patch_doc_language(path: &Path, doc: u32, code: u16) -> io::Result<()> {
    patch(path, doc, REC_LANGUAGE, &code.to_le_bytes())
}

/// Rewrite the sub-repository index of `doc`.
pub fn patch_doc_sub_repo(path: &Path, doc: u32, index: u32) -> io::Result<()> {
    patch(path, doc, REC_SUB_REPO, &index.to_le_bytes())
}

/// Rewrite the branch mask of `doc`.
pub fn patch_doc_branch_mask(path: &Path, doc: u32, mask: u64) -> io::Result<()> {
    patch(path, doc, REC_BRANCH_MASK, &mask.to_le_bytes())
}

/// Rewrite the index of the first symbol-store record of `doc`.
pub fn patch_doc_symbol_base(path: &Path, doc: u32, base: u32) -> io::Result<()> {
    patch(path, doc, REC_SYMBOL_BASE, &base.to_le_bytes())
}

/// Overwrite the index-format version in the header.
pub fn patch_format_version(path: &Path, version: u32) -> io::Result<()> {
    let mut bytes = std::fs::read(path)?;
    bytes
        .get_mut(4..8)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "not a shard"))?
        .copy_from_slice(&version.to_le_bytes());
    std::fs::write(path, bytes)
}

use super::utils::{
    read_bytes_at, read_str_u16_at, read_tri_at, read_u16_at, read_u32_at, read_u64_at,
    read_var_u32_at,
};
use super::{
    DecodeError, DocRecord, Section, CONTENT_HASH_LEN, DOC_RECORD_LEN, HEADER_LEN,
    INDEX_FORMAT_VERSION, MAGIC, SECTION_COUNT,
};
use crate::types::{DocumentSection, RepoMeta, Symbol};
use memmap2::Mmap;
use std::{
    fmt,
    fs::File,
    path::{Path, PathBuf},
};

/// Random-access view over one shard file.
///
/// Tables that every document refers to (repositories, languages,
/// sub-repository paths) are decoded at open time. Names, contents, symbol
/// sections and symbol records are decoded on demand from the mapping.
pub struct ShardReader {
    path: PathBuf,
    mmap: Mmap,
    doc_count: u32,
    /// Absolute start of each section; a section ends where the next starts.
    offsets: [usize; SECTION_COUNT],
    repos: Vec<RepoMeta>,
    languages: Vec<String>,
    sub_repo_paths: Vec<Vec<String>>,
    symbol_count: u32,
    content_hash: [u8; CONTENT_HASH_LEN],
}

impl ShardReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // Shards are immutable once renamed into place.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < HEADER_LEN + CONTENT_HASH_LEN {
            return Err(DecodeError::TooSmall { len: mmap.len() });
        }

        let mut off = 0usize;
        let magic = read_u32_at(&mmap, &mut off, "magic")?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = read_u32_at(&mmap, &mut off, "version")?;
        if version != INDEX_FORMAT_VERSION {
            return Err(DecodeError::IncompatibleVersion {
                found: version,
                expected: INDEX_FORMAT_VERSION,
            });
        }
        let doc_count = read_u32_at(&mmap, &mut off, "doc_count")?;

        let mut offsets = [0usize; SECTION_COUNT];
        let mut prev = HEADER_LEN;
        for section in Section::ALL {
            let at = off;
            let raw = read_u64_at(&mmap, &mut off, section.label())?;
            let start = usize::try_from(raw)
                .ok()
                .filter(|&s| s >= prev && s <= mmap.len())
                .ok_or(DecodeError::Truncated {
                    what: section.label(),
                    off: at,
                })?;
            offsets[section.index()] = start;
            prev = start;
        }
        if mmap.len() - offsets[Section::ContentHash.index()] != CONTENT_HASH_LEN {
            return Err(DecodeError::Corrupt(format!(
                "content hash section is {} bytes",
                mmap.len() - offsets[Section::ContentHash.index()]
            )));
        }
        let docs_len = offsets[Section::Names.index()] - offsets[Section::Docs.index()];
        if docs_len != doc_count as usize * DOC_RECORD_LEN {
            return Err(DecodeError::Corrupt(format!(
                "docs section is {} bytes for {} documents",
                docs_len, doc_count
            )));
        }

        let mut reader = Self {
            path,
            mmap,
            doc_count,
            offsets,
            repos: Vec::new(),
            languages: Vec::new(),
            sub_repo_paths: Vec::new(),
            symbol_count: 0,
            content_hash: [0u8; CONTENT_HASH_LEN],
        };
        reader.repos = reader.decode_repos()?;
        reader.languages = reader.decode_languages()?;
        reader.sub_repo_paths = reader.decode_sub_repos()?;
        let store = reader.section(Section::SymbolStore);
        let mut soff = 0;
        let symbol_count = read_u32_at(store, &mut soff, "symbol count")?;
        if (symbol_count as usize) > (store.len() - soff) / 4 {
            return Err(DecodeError::Truncated {
                what: "symbol offsets",
                off: soff,
            });
        }
        let mut content_hash = [0u8; CONTENT_HASH_LEN];
        content_hash.copy_from_slice(reader.section(Section::ContentHash));
        reader.symbol_count = symbol_count;
        reader.content_hash = content_hash;
        Ok(reader)
    }

    fn section(&self, s: Section) -> &[u8] {
        let start = self.offsets[s.index()];
        let end = Section::ALL
            .get(s.index() + 1)
            .map_or(self.mmap.len(), |next| self.offsets[next.index()]);
        &self.mmap[start..end]
    }

    fn decode_repos(&self) -> Result<Vec<RepoMeta>, DecodeError> {
        let buf = self.section(Section::Repos);
        let mut off = 0;
        let len = read_u32_at(buf, &mut off, "repos length")? as usize;
        let json = read_bytes_at(buf, &mut off, len, "repos")?;
        Ok(serde_json::from_slice(json)?)
    }

    fn decode_languages(&self) -> Result<Vec<String>, DecodeError> {
        let buf = self.section(Section::Languages);
        let mut off = 0;
        let n = read_u16_at(buf, &mut off, "language count")?;
        (0..n)
            .map(|_| read_str_u16_at(buf, &mut off, "language name").map(str::to_string))
            .collect()
    }

    fn decode_sub_repos(&self) -> Result<Vec<Vec<String>>, DecodeError> {
        let buf = self.section(Section::SubRepos);
        let mut off = 0;
        let repo_count = read_u32_at(buf, &mut off, "sub-repo table count")? as usize;
        if repo_count != self.repos.len() {
            return Err(DecodeError::Corrupt(format!(
                "{} sub-repo tables for {} repositories",
                repo_count,
                self.repos.len()
            )));
        }
        let mut tables = Vec::with_capacity(repo_count);
        for _ in 0..repo_count {
            let n = read_u32_at(buf, &mut off, "sub-repo count")?;
            let table = (0..n)
                .map(|_| read_str_u16_at(buf, &mut off, "sub-repo path").map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            tables.push(table);
        }
        Ok(tables)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Repository metadata, indexed by repository id.
    pub fn repos(&self) -> &[RepoMeta] {
        &self.repos
    }

    /// Language names, indexed by language code.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn symbol_count(&self) -> u32 {
        self.symbol_count
    }

    /// SHA-256 over all document contents in document order.
    pub fn content_hash(&self) -> [u8; CONTENT_HASH_LEN] {
        self.content_hash
    }

    pub fn content_hash_hex(&self) -> String {
        self.content_hash
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub(crate) fn doc_record(&self, doc: u32) -> Result<DocRecord, DecodeError> {
        if doc >= self.doc_count {
            return Err(DecodeError::DocOutOfRange {
                doc,
                count: self.doc_count,
            });
        }
        let base = doc as usize * DOC_RECORD_LEN;
        let rec: &[u8; DOC_RECORD_LEN] = self.section(Section::Docs)
            [base..base + DOC_RECORD_LEN]
            .try_into()
            .map_err(|_| DecodeError::Truncated {
                what: "doc record",
                off: base,
            })?;
        Ok(DocRecord::decode(rec))
    }

    /// Owning repository id of `doc`, checked against the repository table.
    pub fn repo_id(&self, doc: u32) -> Result<u16, DecodeError> {
        let rec = self.doc_record(doc)?;
        self.repo_meta(doc, rec.repo)?;
        Ok(rec.repo)
    }

    pub(crate) fn repo_meta(&self, doc: u32, repo: u16) -> Result<&RepoMeta, DecodeError> {
        self.repos
            .get(repo as usize)
            .ok_or(DecodeError::UnknownRepo {
                doc,
                repo,
                count: self.repos.len(),
            })
    }

    pub fn file_name(&self, doc: u32) -> Result<&str, DecodeError> {
        let rec = self.doc_record(doc)?;
        self.name_of(&rec)
    }

    pub(crate) fn name_of(&self, rec: &DocRecord) -> Result<&str, DecodeError> {
        let buf = self.section(Section::Names);
        let mut off = rec.name_off as usize;
        let at = off;
        let bytes = read_bytes_at(buf, &mut off, rec.name_len as usize, "doc name")?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
            what: "doc name",
            off: at,
        })
    }

    /// Raw content of `doc`. Fails when the record points outside the
    /// contents section.
    pub fn read_contents(&self, doc: u32) -> Result<&[u8], DecodeError> {
        let rec = self.doc_record(doc)?;
        self.contents_of(&rec)
    }

    pub(crate) fn contents_of(&self, rec: &DocRecord) -> Result<&[u8], DecodeError> {
        let buf = self.section(Section::Contents);
        let mut off = usize::try_from(rec.content_off).map_err(|_| DecodeError::Truncated {
            what: "doc content",
            off: usize::MAX,
        })?;
        read_bytes_at(buf, &mut off, rec.content_len as usize, "doc content")
    }

    /// Symbol occurrence spans of `doc`, in content order.
    pub fn read_doc_sections(&self, doc: u32) -> Result<Vec<DocumentSection>, DecodeError> {
        let rec = self.doc_record(doc)?;
        self.sections_of(&rec)
    }

    pub(crate) fn sections_of(&self, rec: &DocRecord) -> Result<Vec<DocumentSection>, DecodeError> {
        let buf = self.section(Section::SymbolSections);
        let mut off = rec.sections_off as usize;
        // Every section takes at least two bytes; reject counts the section cannot hold.
        let remaining = buf.len().saturating_sub(off);
        if rec.symbol_count as usize > remaining / 2 {
            return Err(DecodeError::Truncated {
                what: "symbol sections",
                off,
            });
        }
        let mut out = Vec::with_capacity(rec.symbol_count as usize);
        let mut prev_end = 0u32;
        for _ in 0..rec.symbol_count {
            let delta = read_var_u32_at(buf, &mut off)?;
            let len = read_var_u32_at(buf, &mut off)?;
            let start = prev_end
                .checked_add(delta)
                .ok_or_else(|| DecodeError::Corrupt(format!("symbol section overflow (off={})", off)))?;
            let end = start
                .checked_add(len)
                .ok_or_else(|| DecodeError::Corrupt(format!("symbol section overflow (off={})", off)))?;
            out.push(DocumentSection { start, end });
            prev_end = end;
        }
        Ok(out)
    }

    /// Index of the first symbol-store record belonging to `doc`; its i-th
    /// section is described by record `symbol_base + i`.
    pub fn symbol_base(&self, doc: u32) -> Result<u32, DecodeError> {
        Ok(self.doc_record(doc)?.symbol_base)
    }

    /// Decode an owned copy of symbol-store record `index`.
    pub fn symbol(&self, index: u32) -> Result<Symbol, DecodeError> {
        if index >= self.symbol_count {
            return Err(DecodeError::SymbolOutOfRange {
                index: u64::from(index),
                count: self.symbol_count,
            });
        }
        let buf = self.section(Section::SymbolStore);
        let mut off = 4 + 4 * index as usize;
        let rel = read_u32_at(buf, &mut off, "symbol offset")? as usize;
        let mut off = (4 + 4 * self.symbol_count as usize)
            .checked_add(rel)
            .ok_or(DecodeError::Truncated {
                what: "symbol record",
                off: rel,
            })?;
        Ok(Symbol {
            sym: read_str_u16_at(buf, &mut off, "symbol name")?.to_string(),
            kind: read_str_u16_at(buf, &mut off, "symbol kind")?.to_string(),
            parent: read_str_u16_at(buf, &mut off, "symbol parent")?.to_string(),
            parent_kind: read_str_u16_at(buf, &mut off, "symbol parent kind")?.to_string(),
        })
    }

    pub fn branch_mask(&self, doc: u32) -> Result<u64, DecodeError> {
        Ok(self.doc_record(doc)?.branch_mask)
    }

    /// Path of sub-repository `index` of repository `repo`; index 0 is the root ("").
    pub fn sub_repo_path(&self, repo: u16, index: u32) -> Option<&str> {
        self.sub_repo_paths
            .get(repo as usize)?
            .get(index as usize)
            .map(String::as_str)
    }

    pub fn language_name(&self, code: u16) -> Option<&str> {
        self.languages.get(code as usize).map(String::as_str)
    }

    /// Documents whose content contains trigram `tri`, ascending.
    pub fn content_term_docs(&self, tri: &[u8; 3]) -> Result<Vec<u32>, DecodeError> {
        let buf = self.section(Section::Postings);
        let mut off = 0;
        let term_count = read_u32_at(buf, &mut off, "term count")?;
        for _ in 0..term_count {
            let t = read_tri_at(buf, &mut off, "trigram")?;
            let n_docs = read_u32_at(buf, &mut off, "n_docs")?;
            let mut docs = Vec::new();
            let mut prev_doc = 0u32;
            for _ in 0..n_docs {
                let doc = prev_doc.wrapping_add(read_var_u32_at(buf, &mut off)?);
                prev_doc = doc;
                let npos = read_var_u32_at(buf, &mut off)?;
                for _ in 0..npos {
                    read_var_u32_at(buf, &mut off)?;
                }
                if &t == tri {
                    docs.push(doc);
                }
            }
            if &t == tri {
                return Ok(docs);
            }
        }
        Ok(Vec::new())
    }
}

impl fmt::Display for ShardReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl fmt::Debug for ShardReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardReader")
            .field("path", &self.path)
            .field("doc_count", &self.doc_count)
            .field("repos", &self.repos.len())
            .finish()
    }
}

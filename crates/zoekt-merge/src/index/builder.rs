use crate::shard::{INDEX_FORMAT_VERSION, MAX_BRANCHES};
use crate::types::{Document, DocumentSection, RepoMeta, Symbol};
use fnv::FnvHashMap;

use super::error::BuildError;

/// A document as the builder keeps it: names resolved to table indexes.
#[derive(Debug, Clone)]
pub(crate) struct StoredDoc {
    pub repo: u16,
    pub language: u16,
    pub sub_repo: u32,
    pub branch_mask: u64,
    pub name: String,
    pub content: Vec<u8>,
    pub sections: Vec<DocumentSection>,
    pub symbols: Vec<Symbol>,
}

/// Accumulates repositories and documents for one output shard.
///
/// Documents are added to the most recently registered repository.
/// Derived search structures (trigram postings, content hash) are computed
/// when the builder is serialized through `WriteShard`.
#[derive(Debug)]
pub struct IndexBuilder {
    format_version: u32,
    max_content_size: usize,
    pub(crate) repos: Vec<RepoMeta>,
    /// Per repository: "" followed by its declared sub-repository paths.
    pub(crate) sub_repo_tables: Vec<Vec<String>>,
    pub(crate) docs: Vec<StoredDoc>,
    pub(crate) languages: Vec<String>,
    language_codes: FnvHashMap<String, u16>,
    content_size: u64,
}

impl IndexBuilder {
    /// Start a builder for the format declared by `template`, typically the
    /// first repository of the first input shard. No repository is
    /// registered; call `set_repository` before adding documents.
    pub fn new(template: &RepoMeta) -> Result<Self, BuildError> {
        if template.index_format_version != 0
            && template.index_format_version != INDEX_FORMAT_VERSION
        {
            return Err(BuildError::IncompatibleVersion {
                found: template.index_format_version,
                expected: INDEX_FORMAT_VERSION,
            });
        }
        Ok(Self {
            format_version: INDEX_FORMAT_VERSION,
            max_content_size: u32::MAX as usize,
            repos: Vec::new(),
            sub_repo_tables: Vec::new(),
            docs: Vec::new(),
            languages: Vec::new(),
            language_codes: FnvHashMap::default(),
            content_size: 0,
        })
    }

    /// Reject documents whose content exceeds `sz` bytes. Capped at the
    /// format limit of `u32::MAX`.
    pub fn max_content_size(mut self, sz: usize) -> Self {
        self.max_content_size = sz.min(u32::MAX as usize);
        self
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Append `meta` to the output's repository list and make it current.
    /// Registering metadata equal to an earlier repository still creates a
    /// new, independent entry.
    pub fn set_repository(&mut self, meta: &RepoMeta) -> Result<(), BuildError> {
        if self.repos.len() >= u16::MAX as usize {
            return Err(BuildError::TooManyRepositories {
                max: u16::MAX as usize,
            });
        }
        if meta.branches.len() > MAX_BRANCHES {
            return Err(BuildError::TooManyBranches {
                repo: meta.name.clone(),
                count: meta.branches.len(),
                max: MAX_BRANCHES,
            });
        }
        for p in &meta.sub_repo_paths {
            check_len(&meta.name, "sub-repository path", p)?;
        }
        let mut table = vec![String::new()];
        for p in &meta.sub_repo_paths {
            if !table.contains(p) {
                table.push(p.clone());
            }
        }
        let mut meta = meta.clone();
        meta.index_format_version = self.format_version;
        self.repos.push(meta);
        self.sub_repo_tables.push(table);
        Ok(())
    }

    /// Validate `doc` and append it to the current repository.
    pub fn add(&mut self, doc: Document) -> Result<(), BuildError> {
        let Some(repo) = self.repos.last() else {
            return Err(BuildError::NoRepository(doc.name));
        };
        let repo_id = (self.repos.len() - 1) as u16;

        if doc.name.is_empty() || doc.name.contains('\0') || doc.name.len() > u16::MAX as usize
        {
            return Err(BuildError::InvalidName(doc.name));
        }
        if doc.content.len() > self.max_content_size {
            return Err(BuildError::ContentTooLarge {
                size: doc.content.len(),
                max: self.max_content_size,
                name: doc.name,
            });
        }
        if doc.symbols.len() != doc.symbols_meta.len() {
            return Err(BuildError::SymbolMismatch {
                sections: doc.symbols.len(),
                symbols: doc.symbols_meta.len(),
                name: doc.name,
            });
        }
        check_len(&doc.name, "language name", &doc.language)?;
        for sym in &doc.symbols_meta {
            check_len(&doc.name, "symbol name", &sym.sym)?;
            check_len(&doc.name, "symbol kind", &sym.kind)?;
            check_len(&doc.name, "symbol parent", &sym.parent)?;
            check_len(&doc.name, "symbol parent kind", &sym.parent_kind)?;
        }
        let mut prev_end = 0u32;
        for (index, s) in doc.symbols.iter().enumerate() {
            if s.start < prev_end || s.end < s.start || s.end as usize > doc.content.len() {
                return Err(BuildError::InvalidSection {
                    name: doc.name,
                    index,
                    start: s.start,
                    end: s.end,
                });
            }
            prev_end = s.end;
        }

        let mut branch_mask = 0u64;
        for b in &doc.branches {
            match repo.branches.iter().position(|rb| &rb.name == b) {
                Some(i) => branch_mask |= 1u64 << i,
                None => {
                    return Err(BuildError::UnknownBranch {
                        branch: b.clone(),
                        repo: repo.name.clone(),
                        name: doc.name,
                    })
                }
            }
        }

        let table = &self.sub_repo_tables[repo_id as usize];
        let Some(sub_repo) = table.iter().position(|p| p == &doc.sub_repo_path) else {
            return Err(BuildError::UnknownSubRepo {
                path: doc.sub_repo_path,
                repo: repo.name.clone(),
                name: doc.name,
            });
        };

        let known = self.language_codes.get(&doc.language).copied();
        let language = match known {
            Some(code) => code,
            None if self.languages.len() >= u16::MAX as usize => {
                return Err(BuildError::TooManyLanguages {
                    max: u16::MAX as usize,
                })
            }
            None => {
                let code = self.languages.len() as u16;
                self.languages.push(doc.language.clone());
                self.language_codes.insert(doc.language, code);
                code
            }
        };

        self.content_size += doc.content.len() as u64;
        self.docs.push(StoredDoc {
            repo: repo_id,
            language,
            sub_repo: sub_repo as u32,
            branch_mask,
            name: doc.name,
            content: doc.content,
            sections: doc.symbols,
            symbols: doc.symbols_meta,
        });
        Ok(())
    }

    /// Total content bytes added so far.
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    /// Registered repositories in registration order.
    pub fn repos(&self) -> &[RepoMeta] {
        &self.repos
    }
}

/// Strings stored with a `u16` length prefix.
fn check_len(name: &str, field: &'static str, value: &str) -> Result<(), BuildError> {
    if value.len() > u16::MAX as usize {
        return Err(BuildError::FieldTooLong {
            name: name.to_string(),
            field,
            len: value.len(),
            max: u16::MAX as usize,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> IndexBuilder {
        let repo = RepoMeta::new("r").with_branches(["HEAD", "dev"]);
        let mut ib = IndexBuilder::new(&repo).unwrap();
        ib.set_repository(&repo).unwrap();
        ib
    }

    #[test]
    fn new_registers_nothing() {
        let ib = IndexBuilder::new(&RepoMeta::new("r")).unwrap();
        assert!(ib.repos().is_empty());
        assert_eq!(ib.format_version(), INDEX_FORMAT_VERSION);
    }

    #[test]
    fn rejects_foreign_format_version() {
        let mut repo = RepoMeta::new("r");
        repo.index_format_version = INDEX_FORMAT_VERSION + 1;
        assert!(matches!(
            IndexBuilder::new(&repo),
            Err(BuildError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn add_without_repository_fails() {
        let mut ib = IndexBuilder::new(&RepoMeta::new("r")).unwrap();
        let err = ib.add(Document::new("a.go", "x")).unwrap_err();
        assert!(matches!(err, BuildError::NoRepository(n) if n == "a.go"));
    }

    #[test]
    fn branch_names_become_mask_bits() {
        let mut ib = builder();
        let mut doc = Document::new("a.go", "package a");
        doc.branches = vec!["dev".into(), "HEAD".into()];
        ib.add(doc).unwrap();
        assert_eq!(ib.docs[0].branch_mask, 0b11);
        assert_eq!(ib.content_size(), 9);
    }

    #[test]
    fn rejection_leaves_state_untouched() {
        let mut ib = builder();
        ib.add(Document::new("ok.go", "fine")).unwrap();

        let mut bad_branch = Document::new("b.go", "x");
        bad_branch.branches = vec!["nope".into()];
        bad_branch.language = "go".into();
        assert!(matches!(
            ib.add(bad_branch),
            Err(BuildError::UnknownBranch { .. })
        ));

        let mut bad_section = Document::new("c.go", "abc");
        bad_section.symbols = vec![DocumentSection { start: 1, end: 9 }];
        bad_section.symbols_meta = vec![Symbol::default()];
        assert!(matches!(
            ib.add(bad_section),
            Err(BuildError::InvalidSection { index: 0, .. })
        ));

        assert!(matches!(
            ib.add(Document::new("", "x")),
            Err(BuildError::InvalidName(_))
        ));

        assert_eq!(ib.doc_count(), 1);
        assert_eq!(ib.content_size(), 4);
        // the rejected document's language was never interned
        assert_eq!(ib.languages, vec![String::new()]);
    }

    #[test]
    fn content_limit_and_symbol_counts() {
        let mut ib = builder().max_content_size(3);
        assert!(matches!(
            ib.add(Document::new("big", "four")),
            Err(BuildError::ContentTooLarge { size: 4, max: 3, .. })
        ));
        let mut doc = Document::new("s", "abc");
        doc.symbols = vec![DocumentSection { start: 0, end: 1 }];
        assert!(matches!(
            ib.add(doc),
            Err(BuildError::SymbolMismatch { sections: 1, symbols: 0, .. })
        ));
    }

    #[test]
    fn sub_repo_paths_resolve_against_current_repo() {
        let repo = RepoMeta::new("r").with_sub_repos(["vendor/x"]);
        let mut ib = IndexBuilder::new(&repo).unwrap();
        ib.set_repository(&repo).unwrap();
        let mut doc = Document::new("vendor/x/a.c", "int a;");
        doc.sub_repo_path = "vendor/x".into();
        ib.add(doc).unwrap();
        assert_eq!(ib.docs[0].sub_repo, 1);

        let mut other = Document::new("y/b.c", "int b;");
        other.sub_repo_path = "y".into();
        assert!(matches!(
            ib.add(other),
            Err(BuildError::UnknownSubRepo { .. })
        ));
    }

    #[test]
    fn oversized_strings_are_rejected_before_serialization() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let mut ib = builder();

        let mut doc = Document::new("a.rs", "fn a() {}");
        doc.symbols = vec![DocumentSection { start: 3, end: 4 }];
        doc.symbols_meta = vec![Symbol {
            sym: "a".into(),
            parent: long.clone(),
            ..Default::default()
        }];
        assert!(matches!(
            ib.add(doc),
            Err(BuildError::FieldTooLong { field: "symbol parent", .. })
        ));

        let mut doc = Document::new("b.rs", "b");
        doc.language = long.clone();
        assert!(matches!(
            ib.add(doc),
            Err(BuildError::FieldTooLong { field: "language name", .. })
        ));
        assert_eq!(ib.doc_count(), 0);
        assert!(ib.languages.is_empty());

        let repo = RepoMeta::new("big").with_sub_repos([long]);
        assert!(matches!(
            ib.set_repository(&repo),
            Err(BuildError::FieldTooLong { field: "sub-repository path", .. })
        ));
        assert_eq!(ib.repos().len(), 1);
    }

    #[test]
    fn too_many_branches() {
        let names: Vec<String> = (0..=MAX_BRANCHES).map(|i| format!("b{}", i)).collect();
        let repo = RepoMeta::new("r").with_branches(names);
        let mut ib = IndexBuilder::new(&RepoMeta::new("r")).unwrap();
        assert!(matches!(
            ib.set_repository(&repo),
            Err(BuildError::TooManyBranches { count: 65, .. })
        ));
        assert!(ib.repos().is_empty());
    }
}

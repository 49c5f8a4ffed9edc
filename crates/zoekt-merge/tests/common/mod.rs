#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;

pub use tempfile;

use anyhow::Result;
use zoekt_merge::{
    write_atomically, Document, DocumentSection, IndexBuilder, MergeOptions, RepoMeta, Symbol,
};

static LOGGING: Once = Once::new();

/// Route tracing output through the test harness; honors RUST_LOG.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Plain document on HEAD.
pub fn doc(name: &str, content: &str) -> Document {
    Document::new(name, content.as_bytes().to_vec())
}

/// Document carrying one symbol over the first occurrence of `sym`.
pub fn doc_with_symbol(name: &str, content: &str, sym: &str, kind: &str) -> Document {
    let start = content.find(sym).expect("symbol in content") as u32;
    let mut d = doc(name, content);
    d.language = "rust".to_string();
    d.symbols = vec![DocumentSection {
        start,
        end: start + sym.len() as u32,
    }];
    d.symbols_meta = vec![Symbol {
        sym: sym.to_string(),
        kind: kind.to_string(),
        ..Default::default()
    }];
    d
}

/// Build a builder holding `repos` in order, each with its documents.
pub fn build(repos: Vec<(RepoMeta, Vec<Document>)>) -> Result<IndexBuilder> {
    let template = repos
        .first()
        .map(|(m, _)| m.clone())
        .unwrap_or_else(|| RepoMeta::new("empty"));
    let mut ib = IndexBuilder::new(&template)?;
    for (meta, docs) in repos {
        ib.set_repository(&meta)?;
        for d in docs {
            ib.add(d)?;
        }
    }
    Ok(ib)
}

/// Build and write a shard called `name` into `dir`.
pub fn write_shard(
    dir: &Path,
    name: &str,
    repos: Vec<(RepoMeta, Vec<Document>)>,
) -> Result<PathBuf> {
    let ib = build(repos)?;
    let stats = write_atomically(dir, name, &ib, &MergeOptions::default())?;
    Ok(stats.path)
}

/// One repository named `repo` with documents `a.txt` and `b.txt`.
pub fn simple_shard(dir: &Path, name: &str, repo: &str) -> Result<PathBuf> {
    write_shard(
        dir,
        name,
        vec![(
            RepoMeta::new(repo),
            vec![
                doc("a.txt", &format!("hello from {repo}")),
                doc("b.txt", "fn shared_function() {}"),
            ],
        )],
    )
}

/// Names of all entries in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shard merging: fold N decoded shards into one `IndexBuilder` and write
//! the result as a new shard.

mod assemble;
mod write;

pub use assemble::{assemble_document, decode_branch_mask};
pub use write::{write_atomically, WriteStats};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::index::{BuildError, IndexBuilder};
use crate::shard::{DecodeError, ShardReader, INDEX_FORMAT_VERSION};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("usage: {0}")]
    Usage(String),
    #[error(
        "non-contiguous repo ids in {shard} for document {doc}: old={} current={current}",
        .last.map_or(-1i64, i64::from)
    )]
    NonContiguousRepo {
        shard: String,
        doc: u32,
        last: Option<u16>,
        current: u16,
    },
    #[error("decode {shard}: {source}")]
    Decode {
        shard: String,
        #[source]
        source: DecodeError,
    },
    #[error("{shard}: rejected by index builder: {source}")]
    Rejected {
        shard: String,
        doc: Option<u32>,
        #[source]
        source: BuildError,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Sequence number of the output file; the next unused one when `None`.
    pub sequence: Option<u32>,
    /// Per-document content limit enforced by the output builder.
    pub max_content_size: Option<usize>,
    /// Keep the temp file of a failed write for inspection instead of removing it.
    pub keep_temp_on_error: bool,
}

/// Result of `merge_shards`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub overhead: f64,
    pub docs: usize,
    pub repos: usize,
}

/// Merge `shards` in order into a new builder using default options.
pub fn merge(shards: &[ShardReader]) -> Result<IndexBuilder, MergeError> {
    merge_with_options(shards, &MergeOptions::default())
}

/// Merge `shards` in order into a new builder.
///
/// Within each shard documents must be grouped by repository with ids
/// 0, 1, 2, ... in document order. Repository ids are local to a shard, so
/// the first document of every shard registers its repository afresh, even
/// when an earlier shard held a repository with the same identity.
pub fn merge_with_options(
    shards: &[ShardReader],
    opts: &MergeOptions,
) -> Result<IndexBuilder, MergeError> {
    let Some(first) = shards.first() else {
        return Err(MergeError::Usage(
            "need 1 or more shards to merge".to_string(),
        ));
    };
    let Some(template) = first.repos().first() else {
        return Err(MergeError::Usage(format!(
            "{} has no repositories",
            first
        )));
    };
    let mut ib = IndexBuilder::new(template).map_err(|source| MergeError::Rejected {
        shard: first.to_string(),
        doc: None,
        source,
    })?;
    if let Some(max) = opts.max_content_size {
        ib = ib.max_content_size(max);
    }

    for shard in shards {
        debug!(shard = %shard, docs = shard.doc_count(), "merging shard");
        let decode = |source| MergeError::Decode {
            shard: shard.to_string(),
            source,
        };
        let reject = |doc, source| MergeError::Rejected {
            shard: shard.to_string(),
            doc: Some(doc),
            source,
        };

        // Repository ids restart at 0 in every shard.
        let mut last: Option<u16> = None;
        for doc in 0..shard.doc_count() {
            let repo_id = shard.repo_id(doc).map_err(decode)?;
            if last != Some(repo_id) {
                let expected = last.map_or(0u32, |l| u32::from(l) + 1);
                if u32::from(repo_id) != expected {
                    return Err(MergeError::NonContiguousRepo {
                        shard: shard.to_string(),
                        doc,
                        last,
                        current: repo_id,
                    });
                }
                let meta = shard.repo_meta(doc, repo_id).map_err(decode)?;
                ib.set_repository(meta).map_err(|e| reject(doc, e))?;
                debug!(repo = %meta.name, id = repo_id, "registered repository");
                last = Some(repo_id);
            }

            let document = assemble_document(shard, doc).map_err(decode)?;
            ib.add(document).map_err(|e| reject(doc, e))?;
        }
    }

    info!(
        shards = shards.len(),
        docs = ib.doc_count(),
        repos = ib.repos().len(),
        content_bytes = ib.content_size(),
        "merged shards"
    );
    Ok(ib)
}

/// Open `paths`, merge them and write the result into `dst_dir`.
///
/// Every input is opened, and its format version checked, before anything
/// is written.
pub fn merge_shards<P: AsRef<Path>>(
    dst_dir: &Path,
    paths: &[P],
    opts: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    if paths.is_empty() {
        return Err(MergeError::Usage(
            "need 1 or more shards to merge".to_string(),
        ));
    }
    let shards = paths
        .iter()
        .map(|p| {
            ShardReader::open(p).map_err(|source| MergeError::Decode {
                shard: p.as_ref().display().to_string(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ib = merge_with_options(&shards, opts)?;
    drop(shards);

    let sequence = match opts.sequence {
        Some(s) => s,
        None => next_sequence(dst_dir)?,
    };
    let name = merged_shard_name(sequence);
    let stats = write_atomically(dst_dir, &name, &ib, opts)?;
    Ok(MergeOutcome {
        path: stats.path,
        bytes: stats.bytes,
        overhead: stats.overhead,
        docs: ib.doc_count(),
        repos: ib.repos().len(),
    })
}

/// File name of the `sequence`-th merged shard for the current format,
/// e.g. `merged_v16.00000.zoekt`.
pub fn merged_shard_name(sequence: u32) -> String {
    format!("merged_v{}.{:05}.zoekt", INDEX_FORMAT_VERSION, sequence)
}

fn parse_merged_sequence(name: &str) -> Option<u32> {
    let prefix = format!("merged_v{}.", INDEX_FORMAT_VERSION);
    name.strip_prefix(&prefix)?
        .strip_suffix(".zoekt")?
        .parse()
        .ok()
}

/// One past the highest merged-shard sequence in `dir`; 0 when there is
/// none or the directory does not exist yet. Fails once the highest
/// possible sequence is taken, so an existing shard is never reused.
pub fn next_sequence(dir: &Path) -> io::Result<u32> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut highest: Option<u32> = None;
    for entry in entries {
        let entry = entry?;
        if let Some(seq) = entry.file_name().to_str().and_then(parse_merged_sequence) {
            highest = highest.max(Some(seq));
        }
    }
    match highest {
        None => Ok(0),
        Some(seq) => seq.checked_add(1).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "merged shard sequence numbers exhausted in {}",
                    dir.display()
                ),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_names_are_zero_padded() {
        assert_eq!(
            merged_shard_name(0),
            format!("merged_v{}.00000.zoekt", INDEX_FORMAT_VERSION)
        );
        assert_eq!(parse_merged_sequence(&merged_shard_name(42)), Some(42));
        assert_eq!(parse_merged_sequence("merged_v1.00003.zoekt"), None);
        assert_eq!(parse_merged_sequence("repo_v16.00000.zoekt"), None);
    }

    #[test]
    fn next_sequence_skips_used_numbers() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_sequence(&dir.path().join("missing")).unwrap(), 0);
        assert_eq!(next_sequence(dir.path()).unwrap(), 0);
        std::fs::write(dir.path().join(merged_shard_name(0)), b"").unwrap();
        std::fs::write(dir.path().join(merged_shard_name(4)), b"").unwrap();
        std::fs::write(dir.path().join("other.zoekt"), b"").unwrap();
        assert_eq!(next_sequence(dir.path()).unwrap(), 5);
    }

    #[test]
    fn next_sequence_refuses_to_wrap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(merged_shard_name(u32::MAX - 1)), b"").unwrap();
        assert_eq!(next_sequence(dir.path()).unwrap(), u32::MAX);
        std::fs::write(dir.path().join(merged_shard_name(u32::MAX)), b"").unwrap();
        assert!(next_sequence(dir.path()).is_err());
    }

    #[test]
    fn empty_input_is_a_usage_error() {
        assert!(matches!(merge(&[]), Err(MergeError::Usage(_))));
        let dir = tempfile::tempdir().unwrap();
        let none: [&Path; 0] = [];
        let err = merge_shards(dir.path(), &none, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MergeError::Usage(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn contiguity_error_reports_sentinel_as_minus_one() {
        let err = MergeError::NonContiguousRepo {
            shard: "s.zoekt".into(),
            doc: 0,
            last: None,
            current: 1,
        };
        assert_eq!(
            err.to_string(),
            "non-contiguous repo ids in s.zoekt for document 0: old=-1 current=1"
        );
    }
}

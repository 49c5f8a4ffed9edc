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

use crate::shard::{DecodeError, ShardReader};
use crate::types::{Document, RepoBranch};

/// Rebuild document `doc` of `shard` as a self-contained `Document`.
///
/// Symbol records are copied out of the shard's shared store, so the result
/// holds no references into the source shard. Content is passed through as
/// stored; documents the original indexer skipped already carry their skip
/// notice in place of the content.
pub fn assemble_document(shard: &ShardReader, doc: u32) -> Result<Document, DecodeError> {
    let rec = shard.doc_record(doc)?;
    let repo = shard.repo_meta(doc, rec.repo)?;

    let name = shard.name_of(&rec)?.to_string();
    let content = shard.contents_of(&rec)?.to_vec();
    let symbols = shard.sections_of(&rec)?;

    let mut symbols_meta = Vec::with_capacity(symbols.len());
    for i in 0..symbols.len() as u32 {
        let index = rec
            .symbol_base
            .checked_add(i)
            .ok_or(DecodeError::SymbolOutOfRange {
                index: u64::from(rec.symbol_base) + u64::from(i),
                count: shard.symbol_count(),
            })?;
        symbols_meta.push(shard.symbol(index)?);
    }

    let sub_repo_path = shard
        .sub_repo_path(rec.repo, rec.sub_repo)
        .ok_or(DecodeError::UnknownSubRepo {
            doc,
            repo: rec.repo,
            index: rec.sub_repo,
        })?
        .to_string();
    let language = shard
        .language_name(rec.language)
        .ok_or(DecodeError::UnknownLanguage {
            doc,
            code: rec.language,
        })?
        .to_string();

    let branches = decode_branch_mask(rec.branch_mask, &repo.branches)
        .map_err(|bit| DecodeError::UnknownBranch {
            doc,
            repo: rec.repo,
            bit,
        })?
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(Document {
        name,
        content,
        language,
        sub_repo_path,
        branches,
        symbols,
        symbols_meta,
    })
}

/// Translate a branch mask into branch names, lowest bit first. Bit `i`
/// stands for the branch with 1-based id `i + 1`, i.e. `branches[i]`.
/// An empty mask is valid and yields no branches; a set bit without a
/// matching branch is reported as `Err(bit)`.
pub fn decode_branch_mask(mask: u64, branches: &[RepoBranch]) -> Result<Vec<&str>, u32> {
    let mut out = Vec::with_capacity(mask.count_ones() as usize);
    let mut rest = mask;
    let mut bit = 0u32;
    while rest != 0 {
        if rest & 1 != 0 {
            let b = branches.get(bit as usize).ok_or(bit)?;
            out.push(b.name.as_str());
        }
        rest >>= 1;
        bit += 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepoMeta;

    fn branches() -> Vec<RepoBranch> {
        RepoMeta::new("r")
            .with_branches(["HEAD", "release", "dev", "feature"])
            .branches
    }

    #[test]
    fn empty_mask_has_no_branches() {
        assert!(decode_branch_mask(0b0000, &branches()).unwrap().is_empty());
        assert!(decode_branch_mask(0, &[]).unwrap().is_empty());
    }

    #[test]
    fn low_bit_is_head() {
        assert_eq!(decode_branch_mask(0b0001, &branches()).unwrap(), vec!["HEAD"]);
    }

    #[test]
    fn bits_decode_in_ascending_order() {
        assert_eq!(
            decode_branch_mask(0b0101, &branches()).unwrap(),
            vec!["HEAD", "dev"]
        );
        assert_eq!(
            decode_branch_mask(0b1010, &branches()).unwrap(),
            vec!["release", "feature"]
        );
    }

    #[test]
    fn bit_without_branch_is_reported() {
        assert_eq!(decode_branch_mask(0b1_0001, &branches()), Err(4));
        assert_eq!(decode_branch_mask(1 << 63, &branches()), Err(63));
    }
}

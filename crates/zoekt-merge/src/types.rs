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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and configuration of one repository inside a shard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoMeta {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Indexed branches. The branch at position `i` has the 1-based id `i + 1`,
    /// so bit `i` of a document's branch mask refers to it. "HEAD" is usually first.
    pub branches: Vec<RepoBranch>,
    /// Sub-repository paths relative to the repository root. The root itself
    /// (the empty path) is implicit and never listed here.
    #[serde(default)]
    pub sub_repo_paths: Vec<String>,
    /// Format version of the shard this repository was written into; 0 when unknown.
    #[serde(default)]
    pub index_format_version: u32,
    /// Free-form attributes carried through merges untouched.
    #[serde(default)]
    pub raw_config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoBranch {
    pub name: String,
    /// Commit the branch pointed at when it was indexed.
    #[serde(default)]
    pub version: String,
}

impl RepoMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: vec![RepoBranch {
                name: "HEAD".to_string(),
                version: String::new(),
            }],
            ..Default::default()
        }
    }

    /// Replace the branch list, keeping names in the given order.
    pub fn with_branches<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches = names
            .into_iter()
            .map(|n| RepoBranch {
                name: n.into(),
                version: String::new(),
            })
            .collect();
        self
    }

    pub fn with_sub_repos<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_repo_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|b| b.name.as_str())
    }
}

/// Byte range of one symbol occurrence inside a document's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub start: u32,
    pub end: u32,
}

/// Metadata for a symbol occurrence, e.g. as produced by ctags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub sym: String,
    pub kind: String,
    pub parent: String,
    pub parent_kind: String,
}

/// A self-contained document ready to be added to an `IndexBuilder`.
///
/// `symbols[i]` is the span of the occurrence described by `symbols_meta[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Repository-relative path.
    pub name: String,
    pub content: Vec<u8>,
    pub language: String,
    /// Empty for documents that live in the repository root.
    pub sub_repo_path: String,
    /// Branches this document is live on, in branch-id order.
    pub branches: Vec<String>,
    pub symbols: Vec<DocumentSection>,
    pub symbols_meta: Vec<Symbol>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            branches: vec!["HEAD".to_string()],
            ..Default::default()
        }
    }
}

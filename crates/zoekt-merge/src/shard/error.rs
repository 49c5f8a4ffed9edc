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

use thiserror::Error;

/// Errors raised while decoding a shard. Any of these makes the shard
/// unusable as a merge input.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("open shard: {0}")]
    Io(#[from] std::io::Error),
    #[error("file too small ({len} bytes)")]
    TooSmall { len: usize },
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("incompatible index format version {found} (want {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("shard truncated while reading {what} (off={off})")]
    Truncated { what: &'static str, off: usize },
    #[error("shard corrupted: {what} not valid UTF-8 (off={off})")]
    InvalidUtf8 { what: &'static str, off: usize },
    #[error("shard corrupted: {0}")]
    Corrupt(String),
    #[error("shard metadata corrupted: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("document {doc} out of range ({count} documents)")]
    DocOutOfRange { doc: u32, count: u32 },
    #[error("document {doc}: repository id {repo} out of range ({count} repositories)")]
    UnknownRepo { doc: u32, repo: u16, count: usize },
    #[error("document {doc}: branch bit {bit} has no name in repository {repo}")]
    UnknownBranch { doc: u32, repo: u16, bit: u32 },
    #[error("document {doc}: language code {code} out of range")]
    UnknownLanguage { doc: u32, code: u16 },
    #[error("document {doc}: sub-repository index {index} out of range for repository {repo}")]
    UnknownSubRepo { doc: u32, repo: u16, index: u32 },
    #[error("symbol {index} out of range ({count} symbols)")]
    SymbolOutOfRange { index: u64, count: u32 },
}

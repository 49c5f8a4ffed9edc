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

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::time::Instant;

use crate::shard::writer_utils::{radix_sort_u128, write_str_u16, write_var_u32};
use crate::shard::{DocRecord, Section, HEADER_LEN, MAGIC, SECTION_COUNT};
use crate::trigram::{tri_to_u24, trigrams_with_pos, u24_to_tri};

use super::builder::{IndexBuilder, StoredDoc};

/// Something that can be serialized as one shard file.
pub trait WriteShard {
    /// Raw content bytes the shard holds; used for overhead reporting.
    fn content_size(&self) -> u64;

    fn write_shard(&self, w: &mut dyn Write) -> io::Result<()>;
}

impl WriteShard for IndexBuilder {
    fn content_size(&self) -> u64 {
        IndexBuilder::content_size(self)
    }

    fn write_shard(&self, w: &mut dyn Write) -> io::Result<()> {
        let started = Instant::now();

        let repos_json = serde_json::to_vec(&self.repos)?;
        let mut repos = Vec::with_capacity(repos_json.len() + 4);
        repos.extend(&to_u32(repos_json.len(), "repos section")?.to_le_bytes());
        repos.extend(&repos_json);

        let mut languages = Vec::new();
        languages.extend(&(self.languages.len() as u16).to_le_bytes());
        for l in &self.languages {
            write_str_u16(&mut languages, l, "language name")?;
        }

        let mut sub_repos = Vec::new();
        sub_repos.extend(&to_u32(self.sub_repo_tables.len(), "sub-repo tables")?.to_le_bytes());
        for table in &self.sub_repo_tables {
            sub_repos.extend(&to_u32(table.len(), "sub-repo table")?.to_le_bytes());
            for p in table {
                write_str_u16(&mut sub_repos, p, "sub-repo path")?;
            }
        }

        let mut docs = Vec::with_capacity(self.docs.len() * crate::shard::DOC_RECORD_LEN);
        let mut names = Vec::new();
        let mut contents = Vec::with_capacity(IndexBuilder::content_size(self) as usize);
        let mut sections = Vec::new();
        let mut symbol_offsets: Vec<u32> = Vec::new();
        let mut symbol_data = Vec::new();
        let mut hasher = Sha256::new();
        for d in &self.docs {
            let rec = DocRecord {
                repo: d.repo,
                language: d.language,
                sub_repo: d.sub_repo,
                branch_mask: d.branch_mask,
                name_off: to_u32(names.len(), "names section")?,
                name_len: to_u32(d.name.len(), "doc name")?,
                content_off: contents.len() as u64,
                content_len: to_u32(d.content.len(), "doc content")?,
                sections_off: to_u32(sections.len(), "symbol sections")?,
                symbol_base: to_u32(symbol_offsets.len(), "symbol store")?,
                symbol_count: to_u32(d.sections.len(), "doc symbols")?,
            };
            rec.encode(&mut docs);
            names.extend(d.name.as_bytes());
            contents.extend(&d.content);
            hasher.update(&d.content);

            let mut prev_end = 0u32;
            for s in &d.sections {
                write_var_u32(&mut sections, s.start - prev_end);
                write_var_u32(&mut sections, s.end - s.start);
                prev_end = s.end;
            }
            for sym in &d.symbols {
                symbol_offsets.push(to_u32(symbol_data.len(), "symbol store")?);
                write_str_u16(&mut symbol_data, &sym.sym, "symbol name")?;
                write_str_u16(&mut symbol_data, &sym.kind, "symbol kind")?;
                write_str_u16(&mut symbol_data, &sym.parent, "symbol parent")?;
                write_str_u16(&mut symbol_data, &sym.parent_kind, "symbol parent kind")?;
            }
        }

        let mut symbols = Vec::with_capacity(4 + 4 * symbol_offsets.len() + symbol_data.len());
        symbols.extend(&(symbol_offsets.len() as u32).to_le_bytes());
        for off in &symbol_offsets {
            symbols.extend(&off.to_le_bytes());
        }
        symbols.extend(&symbol_data);

        let postings_start = Instant::now();
        let postings = build_postings(&self.docs);
        let postings_ms = postings_start.elapsed().as_millis();

        let hash = hasher.finalize();

        let bodies: [&[u8]; SECTION_COUNT] = [
            &repos,
            &languages,
            &sub_repos,
            &docs,
            &names,
            &contents,
            &sections,
            &symbols,
            &postings,
            &hash[..],
        ];

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend(&MAGIC.to_le_bytes());
        header.extend(&self.format_version().to_le_bytes());
        header.extend(&to_u32(self.docs.len(), "doc count")?.to_le_bytes());
        let mut off = HEADER_LEN as u64;
        for (section, body) in Section::ALL.iter().zip(bodies.iter()) {
            debug_assert_eq!(header.len(), section.header_pos());
            header.extend(&off.to_le_bytes());
            off += body.len() as u64;
        }

        w.write_all(&header)?;
        for body in bodies {
            w.write_all(body)?;
        }

        tracing::debug!(
            docs = self.docs.len(),
            repos = self.repos.len(),
            bytes = off,
            postings_ms = postings_ms as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "serialized shard"
        );
        Ok(())
    }
}

fn to_u32(n: usize, what: &str) -> io::Result<u32> {
    u32::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} exceeds the shard format limit ({} bytes)", what, n),
        )
    })
}

/// Encode content trigram postings. Keys pack `tri24 | doc32 | pos32` so one
/// sort groups them by trigram, then document, then position.
fn build_postings(docs: &[StoredDoc]) -> Vec<u8> {
    let mut keys: Vec<u128> = docs
        .par_iter()
        .enumerate()
        .flat_map_iter(|(doc_idx, d)| {
            trigrams_with_pos(&d.content).map(move |(tri, pos)| {
                (u128::from(tri_to_u24(tri)) << 64) | ((doc_idx as u128) << 32) | u128::from(pos)
            })
        })
        .collect();
    radix_sort_u128(&mut keys);

    let tri_of = |k: u128| (k >> 64) as u32 & 0xFF_FFFF;
    let doc_of = |k: u128| (k >> 32) as u32;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend(&0u32.to_le_bytes()); // term count, patched below
    let mut term_count = 0u32;
    for term in keys.chunk_by(|a, b| tri_of(*a) == tri_of(*b)) {
        let n_docs = term.chunk_by(|a, b| doc_of(*a) == doc_of(*b)).count();
        buf.extend(&u24_to_tri(tri_of(term[0])));
        buf.extend(&(n_docs as u32).to_le_bytes());
        let mut prev_doc = 0u32;
        for run in term.chunk_by(|a, b| doc_of(*a) == doc_of(*b)) {
            let doc = doc_of(run[0]);
            write_var_u32(&mut buf, doc - prev_doc);
            write_var_u32(&mut buf, run.len() as u32);
            let mut prev_pos = 0u32;
            for &k in run {
                let pos = k as u32;
                write_var_u32(&mut buf, pos - prev_pos);
                prev_pos = pos;
            }
            prev_doc = doc;
        }
        term_count += 1;
    }
    buf[0..4].copy_from_slice(&term_count.to_le_bytes());
    buf
}

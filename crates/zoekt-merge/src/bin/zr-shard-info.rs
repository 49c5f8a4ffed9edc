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

use anyhow::{Context, Result};
use clap::Parser;
use zoekt_merge::ShardReader;

#[derive(Parser, Debug)]
#[command(name = "zr-shard-info", about = "Print repositories and counts of a shard")]
struct Args {
    /// Shard file
    shard: std::path::PathBuf,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let reader = ShardReader::open(&args.shard)
        .with_context(|| format!("open {}", args.shard.display()))?;

    // documents per repository id
    let mut per_repo = vec![0u32; reader.repos().len()];
    for doc in 0..reader.doc_count() {
        let id = reader.repo_id(doc)?;
        per_repo[id as usize] += 1;
    }

    if args.json {
        let repos: Vec<serde_json::Value> = reader
            .repos()
            .iter()
            .zip(&per_repo)
            .map(|(r, n)| {
                serde_json::json!({
                    "name": r.name,
                    "branches": r.branch_names().collect::<Vec<_>>(),
                    "sub_repos": r.sub_repo_paths,
                    "docs": n,
                })
            })
            .collect();
        let out = serde_json::json!({
            "path": args.shard.display().to_string(),
            "docs": reader.doc_count(),
            "symbols": reader.symbol_count(),
            "languages": reader.languages(),
            "content_sha256": reader.content_hash_hex(),
            "repos": repos,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", args.shard.display());
        println!("  docs: {}", reader.doc_count());
        println!("  symbols: {}", reader.symbol_count());
        println!("  content sha256: {}", reader.content_hash_hex());
        for (id, (r, n)) in reader.repos().iter().zip(&per_repo).enumerate() {
            let branches: Vec<&str> = r.branch_names().collect();
            println!(
                "  repo {}: {} ({} docs, branches: {})",
                id,
                r.name,
                n,
                branches.join(",")
            );
        }
    }
    Ok(())
}

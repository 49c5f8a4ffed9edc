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

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use zoekt_merge::{load_merge_config, merge_shards, ConfigOpts, MergeConfig};

#[derive(Parser, Debug)]
#[command(name = "zr-merge", about = "Merge index shards into one shard")]
struct Args {
    /// Shard files to merge, in order
    #[arg(required = true)]
    shards: Vec<std::path::PathBuf>,
    /// Output directory (defaults to the configured index dir)
    #[arg(long)]
    out_dir: Option<std::path::PathBuf>,
    /// Optional TOML config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Sequence number of the output shard (defaults to the next unused one)
    #[arg(long)]
    sequence: Option<u32>,
    /// Reject documents whose content is larger than this many bytes
    #[arg(long)]
    max_content_size: Option<usize>,
    /// Keep the temp file if writing the merged shard fails
    #[arg(long)]
    keep_temp_on_error: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let cfg = load_merge_config(
        MergeConfig::default(),
        ConfigOpts {
            config_path: args.config.clone(),
            cli_index_dir: args.out_dir.clone(),
            cli_max_content_size: args.max_content_size,
            cli_keep_temp_on_error: args.keep_temp_on_error.then_some(true),
        },
    )?;

    let outcome = merge_shards(&cfg.index_dir, &args.shards, &cfg.merge_options(args.sequence))?;
    println!(
        "wrote shard: {} ({} repos, {} docs, {} bytes, overhead {:3.1})",
        outcome.path.display(),
        outcome.repos,
        outcome.docs,
        outcome.bytes,
        outcome.overhead
    );
    Ok(())
}

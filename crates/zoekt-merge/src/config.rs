use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::merge::MergeOptions;

/// Settings shared by merge invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeConfig {
    /// Directory merged shards are written to.
    pub index_dir: PathBuf,
    pub max_content_size: Option<usize>,
    pub keep_temp_on_error: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("index"),
            max_content_size: None,
            keep_temp_on_error: false,
        }
    }
}

impl MergeConfig {
    pub fn merge_options(&self, sequence: Option<u32>) -> MergeOptions {
        MergeOptions {
            sequence,
            max_content_size: self.max_content_size,
            keep_temp_on_error: self.keep_temp_on_error,
        }
    }
}

/// CLI-level options that binaries pass to `load_merge_config`.
#[derive(Clone, Debug, Default)]
pub struct ConfigOpts {
    pub config_path: Option<PathBuf>,
    pub cli_index_dir: Option<PathBuf>,
    pub cli_max_content_size: Option<usize>,
    pub cli_keep_temp_on_error: Option<bool>,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load and merge MergeConfig from: defaults <- config file <- env vars <- CLI
pub fn load_merge_config(mut base: MergeConfig, opts: ConfigOpts) -> Result<MergeConfig> {
    if let Some(path) = opts.config_path.as_ref() {
        if path.exists() {
            let s = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let v: toml::Value =
                toml::from_str(&s).with_context(|| format!("parse config {}", path.display()))?;
            if let Some(d) = v.get("index_dir").and_then(|x| x.as_str()) {
                base.index_dir = PathBuf::from(d);
            }
            if let Some(n) = v.get("max_content_size").and_then(|x| x.as_integer()) {
                base.max_content_size = usize::try_from(n).ok();
            }
            if let Some(k) = v.get("keep_temp_on_error").and_then(|x| x.as_bool()) {
                base.keep_temp_on_error = k;
            }
        } else {
            tracing::warn!(path = %path.display(), "config file not found; using defaults");
        }
    }

    // env vars override file
    if let Ok(d) = std::env::var("ZOEKT_MERGE_INDEX_DIR") {
        base.index_dir = PathBuf::from(d);
    }
    if let Ok(n) = std::env::var("ZOEKT_MERGE_MAX_CONTENT_SIZE") {
        match n.parse::<usize>() {
            Ok(v) => base.max_content_size = Some(v),
            Err(_) => tracing::warn!(value = %n, "ignoring invalid ZOEKT_MERGE_MAX_CONTENT_SIZE"),
        }
    }
    if let Ok(k) = std::env::var("ZOEKT_MERGE_KEEP_TEMP") {
        match parse_bool(&k) {
            Some(v) => base.keep_temp_on_error = v,
            None => tracing::warn!(value = %k, "ignoring invalid ZOEKT_MERGE_KEEP_TEMP"),
        }
    }

    // CLI overrides everything
    if let Some(d) = opts.cli_index_dir {
        base.index_dir = d;
    }
    if let Some(n) = opts.cli_max_content_size {
        base.max_content_size = Some(n);
    }
    if let Some(k) = opts.cli_keep_temp_on_error {
        base.keep_temp_on_error = k;
    }

    Ok(base)
}

//! Zoekt-style shard merging.
//! Decodes existing shards, re-threads every document through an
//! `IndexBuilder` and writes the consolidated shard atomically.

pub mod config;
pub mod index;
pub mod merge;
pub mod shard;
pub mod test_helpers;
pub mod trigram;
pub mod types;

pub use crate::config::{load_merge_config, ConfigOpts, MergeConfig};
pub use crate::index::{BuildError, IndexBuilder, WriteShard};
pub use crate::merge::{
    assemble_document, merge, merge_shards, merge_with_options, merged_shard_name,
    write_atomically, MergeError, MergeOptions, MergeOutcome,
};
pub use crate::shard::{DecodeError, ShardReader, INDEX_FORMAT_VERSION};
pub use crate::types::{Document, DocumentSection, RepoBranch, RepoMeta, Symbol};

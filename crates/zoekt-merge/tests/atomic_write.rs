mod common;

use anyhow::Result;
use std::io::{self, Write};

use common::*;
use zoekt_merge::{write_atomically, MergeError, MergeOptions, ShardReader, WriteShard};

/// Writes part of a shard, then fails like a full disk would.
struct FailingShard;

impl WriteShard for FailingShard {
    fn content_size(&self) -> u64 {
        0
    }

    fn write_shard(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[0xAB; 4096])?;
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

const NAME: &str = "merged_v16.00000.zoekt";

#[test]
fn failed_write_leaves_no_files() -> Result<()> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let err = write_atomically(dir.path(), NAME, &FailingShard, &MergeOptions::default())
        .unwrap_err();
    assert!(matches!(err, MergeError::Io(_)), "{err}");
    assert!(err.to_string().contains("disk full"));
    assert!(dir_entries(dir.path()).is_empty());
    Ok(())
}

#[test]
fn failed_write_keeps_existing_shard() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join(NAME);
    std::fs::write(&target, b"previous shard")?;

    assert!(write_atomically(dir.path(), NAME, &FailingShard, &MergeOptions::default()).is_err());
    assert_eq!(std::fs::read(&target)?, b"previous shard");
    assert_eq!(dir_entries(dir.path()), vec![NAME.to_string()]);
    Ok(())
}

#[test]
fn temp_file_is_kept_on_request() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let opts = MergeOptions {
        keep_temp_on_error: true,
        ..Default::default()
    };
    assert!(write_atomically(dir.path(), NAME, &FailingShard, &opts).is_err());

    let entries = dir_entries(dir.path());
    assert_eq!(entries.len(), 1, "{entries:?}");
    assert!(entries[0].starts_with(&format!("{NAME}.")));
    assert!(entries[0].ends_with(".tmp"));
    assert!(!dir.path().join(NAME).exists());
    Ok(())
}

#[test]
fn successful_write_replaces_existing_shard() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join(NAME);
    std::fs::write(&target, b"stale")?;

    let ib = build(vec![(
        zoekt_merge::RepoMeta::new("r"),
        vec![doc("a.txt", "fresh content")],
    )])?;
    let stats = write_atomically(dir.path(), NAME, &ib, &MergeOptions::default())?;
    assert_eq!(stats.path, target);
    assert_eq!(stats.bytes, std::fs::metadata(&target)?.len());

    let reader = ShardReader::open(&target)?;
    assert_eq!(reader.read_contents(0)?, b"fresh content");
    assert_eq!(dir_entries(dir.path()), vec![NAME.to_string()]);
    Ok(())
}

#[test]
fn missing_output_directory_is_created() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("a").join("b");
    let ib = build(vec![(zoekt_merge::RepoMeta::new("r"), vec![doc("x", "xyz")])])?;
    write_atomically(&nested, NAME, &ib, &MergeOptions::default())?;
    assert!(nested.join(NAME).is_file());
    Ok(())
}

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

//! Durable shard writes: serialize into a temp file next to the target,
//! fsync, then rename over the target so readers only ever see complete
//! shards.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{MergeError, MergeOptions};
use crate::index::WriteShard;

/// What a successful `write_atomically` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStats {
    pub path: PathBuf,
    pub bytes: u64,
    /// File size divided by (content bytes + 1); a rough index-bloat signal.
    pub overhead: f64,
}

/// Serialize `shard` to `dir/final_name`.
///
/// The temp file lives in `dir` so the final rename stays on one
/// filesystem. An existing file at the final path is replaced. If anything
/// fails before the rename, the final path is untouched and the temp file
/// is removed, or kept when `opts.keep_temp_on_error` is set. Once the
/// rename succeeds the shard is installed and the write reports success;
/// a failed directory fsync after that point is only logged.
pub fn write_atomically<S>(
    dir: &Path,
    final_name: &str,
    shard: &S,
    opts: &MergeOptions,
) -> Result<WriteStats, MergeError>
where
    S: WriteShard + ?Sized,
{
    write_with_dir_sync(dir, final_name, shard, opts, sync_dir)
}

fn write_with_dir_sync<S>(
    dir: &Path,
    final_name: &str,
    shard: &S,
    opts: &MergeOptions,
    sync: fn(&Path) -> io::Result<()>,
) -> Result<WriteStats, MergeError>
where
    S: WriteShard + ?Sized,
{
    create_index_dir(dir)?;
    let final_path = dir.join(final_name);

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{}.", final_name))
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let written = fill_temp(&mut tmp, shard);
    let bytes = match written {
        Ok(n) => n,
        Err(e) => {
            abandon(tmp, opts.keep_temp_on_error);
            return Err(e.into());
        }
    };

    if let Err(e) = tmp.persist(&final_path) {
        abandon(e.file, opts.keep_temp_on_error);
        return Err(e.error.into());
    }
    if let Err(e) = sync(dir) {
        tracing::warn!(
            dir = %dir.display(),
            error = %e,
            "shard installed but directory fsync failed"
        );
    }

    let overhead = bytes as f64 / (shard.content_size() as f64 + 1.0);
    tracing::info!(
        path = %final_path.display(),
        bytes,
        overhead = format!("{:3.1}", overhead),
        "finished shard"
    );
    Ok(WriteStats {
        path: final_path,
        bytes,
        overhead,
    })
}

fn fill_temp<S>(tmp: &mut NamedTempFile, shard: &S) -> io::Result<u64>
where
    S: WriteShard + ?Sized,
{
    set_shard_permissions(tmp.as_file())?;
    let mut w = BufWriter::new(tmp.as_file_mut());
    shard.write_shard(&mut w)?;
    w.flush()?;
    drop(w);
    let file = tmp.as_file();
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

fn abandon(tmp: NamedTempFile, keep: bool) {
    if keep {
        match tmp.keep() {
            Ok((_, path)) => {
                tracing::warn!(path = %path.display(), "kept temp file of failed shard write")
            }
            Err(e) => tracing::warn!(error = %e, "could not keep temp file of failed shard write"),
        }
    } else {
        let path = tmp.path().to_path_buf();
        if let Err(e) = tmp.close() {
            tracing::warn!(path = %path.display(), error = %e, "could not remove temp file");
        }
    }
}

#[cfg(unix)]
fn create_index_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_index_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

// Shards are read by other processes (e.g. a webserver running as another user).
#[cfg(unix)]
fn set_shard_permissions(f: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    f.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_shard_permissions(_f: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    struct Bytes(Vec<u8>);

    impl WriteShard for Bytes {
        fn content_size(&self) -> u64 {
            self.0.len() as u64
        }
        fn write_shard(&self, w: &mut dyn Write) -> io::Result<()> {
            w.write_all(&self.0)
        }
    }

    #[test]
    fn creates_private_dir_and_readable_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a/b");
        let stats =
            write_atomically(&dir, "x.zoekt", &Bytes(vec![1; 10]), &MergeOptions::default())
                .unwrap();
        assert_eq!(stats.bytes, 10);
        assert!((stats.overhead - 10.0 / 11.0).abs() < 1e-9);

        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode & 0o077, 0, "dir mode {:o}", dir_mode);
        let file_mode = fs::metadata(&stats.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o644);

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn dir_sync_failure_after_rename_still_reports_the_shard() {
        fn failing_sync(_: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "fsync failed"))
        }
        let tmp = tempfile::tempdir().unwrap();
        let stats = write_with_dir_sync(
            tmp.path(),
            "x.zoekt",
            &Bytes(vec![7; 5]),
            &MergeOptions::default(),
            failing_sync,
        )
        .unwrap();
        assert_eq!(stats.path, tmp.path().join("x.zoekt"));
        assert_eq!(fs::read(&stats.path).unwrap(), vec![7; 5]);
    }
}

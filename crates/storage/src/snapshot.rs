// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional on-disk snapshot of a whole [`PersistenceStore`] — the spec's
//! in-memory `latest`/`historical` maps are the primary interface; this
//! module adapts the teacher's zstd-compressed, atomically-renamed snapshot
//! idiom to persist and restore them across process restarts.

use crate::error::StorageError;
use crate::record::SerializedVariable;
use crate::store::PersistenceStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    latest: BTreeMap<String, SerializedVariable>,
    historical: BTreeMap<String, SerializedVariable>,
}

/// Write `store`'s current contents to `path`: serialize, compress with
/// zstd, write to a `.tmp` sibling, fsync it, atomically rename over
/// `path`, then fsync the containing directory — the same ordering the
/// teacher's checkpoint writer uses to make a rename durable.
pub fn save_snapshot(store: &PersistenceStore, path: &Path, compression_level: i32) -> Result<(), StorageError> {
    let (latest, historical) = store.export();
    let snapshot = StoreSnapshot {
        version: SNAPSHOT_VERSION,
        latest,
        historical,
    };

    let json_bytes = serde_json::to_vec(&snapshot)?;
    let compressed = zstd::encode_all(json_bytes.as_slice(), compression_level).map_err(|e| StorageError::Compress(e.to_string()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&compressed)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

/// Load a snapshot written by [`save_snapshot`], replacing `store`'s
/// contents wholesale. Returns `Ok(false)` without touching `store` if
/// `path` doesn't exist. A corrupt snapshot is rotated to a `.bak` file
/// rather than failing the caller, matching the teacher's recovery stance.
pub fn load_snapshot(store: &PersistenceStore, path: &Path) -> Result<bool, StorageError> {
    if !path.exists() {
        return Ok(false);
    }

    let file = File::open(path)?;
    let decode_result = zstd::stream::read::Decoder::new(file)
        .map_err(|e| StorageError::Compress(e.to_string()))
        .and_then(|decoder| serde_json::from_reader::<_, StoreSnapshot>(decoder).map_err(|e| StorageError::CorruptSnapshot(e.to_string())));

    match decode_result {
        Ok(snapshot) => {
            store.import(snapshot.latest, snapshot.historical);
            Ok(true)
        }
        Err(err) => {
            let bak_path = rotate_bak_path(path);
            warn!(error = %err, path = %path.display(), bak = %bak_path.display(), "corrupt persistence snapshot, moving to .bak and starting fresh");
            fs::rename(path, &bak_path)?;
            Ok(false)
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out. Keeps
/// up to [`MAX_BAK_FILES`] backups, removing the oldest once at capacity.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

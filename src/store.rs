//! Keyed table persistence
//!
//! One JSONL file per entity type, one row per line, keyed by a 64-bit id.
//! Every flush merges the backlog into the in-memory table (backlog values
//! win for overlapping keys) and rewrites the whole backing file.
//!
//! The rewrite is not atomic: a crash mid-write can leave a truncated file.
//! Accepted weakness; the write window is one buffered pass over the table.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::records::Keyed;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// In-memory keyed table backed by a whole-file-rewrite JSONL file.
pub struct TableStore<R> {
    path: PathBuf,
    rows: BTreeMap<u64, R>,
}

impl<R> TableStore<R>
where
    R: Keyed + Serialize + DeserializeOwned,
{
    /// Append mode: load the existing table if the file is present,
    /// otherwise start empty.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let mut rows = BTreeMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let row: R = serde_json::from_str(&line)?;
                rows.insert(row.key(), row);
            }
            log::info!("Loaded {} rows from {}", rows.len(), path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Overwrite mode: start empty regardless of any existing file. The old
    /// file is left on disk until the first flush rewrites it.
    pub fn open_overwrite(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            rows: BTreeMap::new(),
        })
    }

    /// Merge the backlog into the table and rewrite the backing file.
    /// Post-flush the key set is the union of the previous key set and the
    /// backlog's, with backlog values winning on overlap.
    pub fn flush(&mut self, backlog: impl IntoIterator<Item = R>) -> Result<usize, StoreError> {
        let mut merged = 0usize;
        for row in backlog {
            self.rows.insert(row.key(), row);
            merged += 1;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        for row in self.rows.values() {
            let json = serde_json::to_string(row)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        log::debug!(
            "Flushed {} rows ({} merged) to {}",
            self.rows.len(),
            merged,
            self.path.display()
        );

        Ok(merged)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<&R> {
        self.rows.get(&key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        value: String,
    }

    impl Keyed for Row {
        fn key(&self) -> u64 {
            self.id
        }
    }

    fn row(id: u64, value: &str) -> Row {
        Row {
            id,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_flush_then_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let mut store = TableStore::open_append(&path).unwrap();
        store.flush(vec![row(2, "b"), row(1, "a")]).unwrap();

        let reloaded: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(1), Some(&row(1, "a")));
        assert_eq!(reloaded.get(2), Some(&row(2, "b")));

        // Rows iterate in key order regardless of insertion order.
        let ids: Vec<u64> = reloaded.rows().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_backlog_wins_over_stored_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let mut store = TableStore::open_append(&path).unwrap();
        store.flush(vec![row(1, "old")]).unwrap();
        store.flush(vec![row(1, "new"), row(2, "other")]).unwrap();

        let reloaded: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(1).unwrap().value, "new");
    }

    #[test]
    fn test_empty_flush_leaves_table_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let mut store = TableStore::open_append(&path).unwrap();
        store.flush(vec![row(1, "a")]).unwrap();
        let merged = store.flush(Vec::new()).unwrap();

        assert_eq!(merged, 0);
        let reloaded: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(1).unwrap().value, "a");
    }

    #[test]
    fn test_append_mode_starts_empty_without_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");

        let store: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_overwrite_mode_preserves_file_until_first_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let mut seeded = TableStore::open_append(&path).unwrap();
        seeded.flush(vec![row(1, "stale")]).unwrap();

        let mut store: TableStore<Row> = TableStore::open_overwrite(&path).unwrap();
        assert!(store.is_empty());

        // Not flushed yet, so the stale file is still intact on disk.
        let on_disk: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert_eq!(on_disk.get(1).unwrap().value, "stale");

        store.flush(vec![row(2, "fresh")]).unwrap();

        let on_disk: TableStore<Row> = TableStore::open_append(&path).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.get(2).unwrap().value, "fresh");
    }

    #[test]
    fn test_one_row_per_key_after_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let mut store = TableStore::open_append(&path).unwrap();
        store
            .flush(vec![row(1, "first"), row(1, "second"), row(3, "c")])
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().value, "second");
    }
}

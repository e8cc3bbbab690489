//! # Modification Persistence
//!
//! The world itself is never saved: terrain is regenerated deterministically.
//! What is saved is the player's diff against that terrain, per column, keyed by
//! a column-local flat voxel index.
//!
//! A record remembers the generated block it replaced once that is known, so an
//! edit that restores the original block deletes the record instead of storing a
//! no-op. Records are applied when their column finishes generating.
//!
//! The file is JSON. Saves go to a sibling temporary file that is then renamed
//! over the target, so a crash mid-save leaves the previous file intact. A
//! missing or unreadable file is not fatal: the store starts empty.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use cgmath::Point2;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{
    block::BlockId,
    chunk::column::{local_position, ChunkColumn, ColumnPosition},
};
use crate::error::PersistenceError;

const FILE_FORMAT_VERSION: u32 = 1;

/// One edited voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRecord {
    /// The block the player placed.
    pub block: BlockId,
    /// The generated block underneath, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<BlockId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnModifications {
    x: i32,
    z: i32,
    blocks: BTreeMap<u32, ModificationRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModificationFile {
    version: u32,
    columns: Vec<ColumnModifications>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModificationStore {
    columns: HashMap<ColumnPosition, BTreeMap<u32, ModificationRecord>>,
}

impl ModificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a modification file.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModificationFile =
            serde_json::from_str(&contents).map_err(|source| PersistenceError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let columns = file
            .columns
            .into_iter()
            .filter(|column| !column.blocks.is_empty())
            .map(|column| (Point2::new(column.x, column.z), column.blocks))
            .collect();
        Ok(Self { columns })
    }

    /// Reads a modification file, treating a missing or corrupt file as empty.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => {
                info!(
                    "Loaded {} block modifications from {}",
                    store.len(),
                    path.display()
                );
                store
            }
            Err(PersistenceError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!("No modification file at {}", path.display());
                Self::default()
            }
            Err(error) => {
                warn!("{error}; starting without modifications");
                Self::default()
            }
        }
    }

    /// Writes every record to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut columns: Vec<ColumnModifications> = self
            .columns
            .iter()
            .filter(|(_, blocks)| !blocks.is_empty())
            .map(|(position, blocks)| ColumnModifications {
                x: position.x,
                z: position.y,
                blocks: blocks.clone(),
            })
            .collect();
        columns.sort_by_key(|column| (column.x, column.z));

        let encoded = serde_json::to_string(&ModificationFile {
            version: FILE_FORMAT_VERSION,
            columns,
        })?;

        let io_error = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let temporary = temporary_path(path);
        fs::write(&temporary, encoded).map_err(io_error)?;
        fs::rename(&temporary, path).map_err(io_error)?;

        info!("Saved {} block modifications to {}", self.len(), path.display());
        Ok(())
    }

    /// Records an edit that replaced `previous` with `block`.
    ///
    /// `previous` is only taken as the generated original when the voxel has no
    /// record yet. Restoring the original removes the record.
    pub fn record(
        &mut self,
        column: ColumnPosition,
        index: u32,
        block: BlockId,
        previous: BlockId,
    ) {
        let records = self.columns.entry(column).or_default();

        match records.get(&index).copied() {
            Some(record) if record.original == Some(block) => {
                records.remove(&index);
            }
            Some(record) => {
                records.insert(index, ModificationRecord { block, ..record });
            }
            None if block == previous => {}
            None => {
                records.insert(
                    index,
                    ModificationRecord {
                        block,
                        original: Some(previous),
                    },
                );
            }
        }

        if records.is_empty() {
            self.columns.remove(&column);
        }
    }

    /// Writes this column's records into its freshly generated blocks, capturing
    /// the generated originals. Returns the number of records applied.
    pub fn apply(&mut self, column: &ChunkColumn) -> usize {
        let Some(records) = self.columns.get_mut(&column.position()) else {
            return 0;
        };

        let mut applied = 0;
        records.retain(|index, record| {
            let Some((x, y, z)) = local_position(*index) else {
                warn!("Dropping modification with invalid index {index}");
                return false;
            };
            let Some(generated) = column.set_block(x, y, z, record.block) else {
                return false;
            };
            applied += 1;
            record.original = Some(generated);
            // The terrain now produces the edited block by itself.
            generated != record.block
        });

        if records.is_empty() {
            self.columns.remove(&column.position());
        }
        applied
    }

    pub fn records_for(
        &self,
        column: ColumnPosition,
    ) -> Option<&BTreeMap<u32, ModificationRecord>> {
        self.columns.get(&column)
    }

    /// Total number of modified voxels.
    pub fn len(&self) -> usize {
        self.columns.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{block::AIR, chunk::column::local_index};

    #[test]
    fn test_restoring_the_original_removes_the_record() {
        let mut store = ModificationStore::new();
        let column = Point2::new(0, 0);

        store.record(column, 10, 3, AIR);
        store.record(column, 10, 4, 3);
        assert_eq!(
            store.records_for(column).unwrap()[&10],
            ModificationRecord {
                block: 4,
                original: Some(AIR)
            }
        );

        store.record(column, 10, AIR, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_noop_edit_is_not_recorded() {
        let mut store = ModificationStore::new();
        store.record(Point2::new(1, 1), 0, 2, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves").join("modifications.json");

        let mut store = ModificationStore::new();
        store.record(Point2::new(-3, 2), 77, 5, AIR);
        store.record(Point2::new(4, 0), 1, AIR, 2);
        store.save(&path).unwrap();

        assert!(!temporary_path(&path).exists());
        assert_eq!(ModificationStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_corrupt_or_missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modifications.json");
        assert!(ModificationStore::load_or_default(&path).is_empty());

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ModificationStore::load(&path),
            Err(PersistenceError::Malformed { .. })
        ));
        assert!(ModificationStore::load_or_default(&path).is_empty());
    }

    #[test]
    fn test_apply_writes_blocks_and_captures_originals() {
        let mut store = ModificationStore::new();
        let position = Point2::new(0, 0);
        let index = local_index(1, 2, 3).unwrap();
        store.columns.insert(
            position,
            BTreeMap::from([(
                index,
                ModificationRecord {
                    block: 9,
                    original: None,
                },
            )]),
        );

        let column = ChunkColumn::new(position);
        column.section_mut(0).unwrap().fill(2);

        assert_eq!(store.apply(&column), 1);
        assert_eq!(column.get_block(1, 2, 3), 9);
        assert_eq!(store.records_for(position).unwrap()[&index].original, Some(2));
    }
}

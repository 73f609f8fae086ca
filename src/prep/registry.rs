use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::pipeline::SkipTally;
use crate::io;
use crate::model::leaving_group::{LeavingGroup, StructureKey};

/// Progress of one split, committed together with the vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// First raw reaction not yet processed.
    pub next_reaction: usize,
    /// Records written so far; also the index of the next record file.
    pub written: usize,
    /// Hex SHA-256 of the raw CSV this cursor was computed over.
    pub input_sha256: String,
    /// [`PrepConfig::fingerprint`](super::PrepConfig::fingerprint) of the
    /// settings the records were built with.
    pub settings_sha256: String,
    pub skipped: SkipTally,
    pub complete: bool,
}

impl Cursor {
    pub fn new(input_sha256: impl Into<String>, settings_sha256: impl Into<String>) -> Self {
        Self {
            input_sha256: input_sha256.into(),
            settings_sha256: settings_sha256.into(),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    groups: &'a [LeavingGroup],
    cursors: &'a BTreeMap<String, Cursor>,
}

#[derive(Deserialize)]
struct Snapshot {
    groups: Vec<LeavingGroup>,
    cursors: BTreeMap<String, Cursor>,
}

/// Deduplicating, append-only leaving-group vocabulary.
///
/// Ids are positions in insertion order and never change. Lookups go
/// through a [`StructureKey`] index rebuilt on load.
#[derive(Debug, Clone, Default)]
pub struct LeavingGroupRegistry {
    groups: Vec<LeavingGroup>,
    index: HashMap<StructureKey, usize>,
    cursors: BTreeMap<String, Cursor>,
}

impl LeavingGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a saved snapshot; a missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self, io::Error> {
        let Some(snapshot) = io::read_optional::<Snapshot>(path)? else {
            info!(
                "no leaving-group registry at '{}', starting empty",
                path.display()
            );
            return Ok(Self::new());
        };
        let index = snapshot
            .groups
            .iter()
            .enumerate()
            .map(|(id, g)| (g.structure_key(), id))
            .collect();
        debug!(
            "loaded {} leaving groups from '{}'",
            snapshot.groups.len(),
            path.display()
        );
        Ok(Self {
            groups: snapshot.groups,
            index,
            cursors: snapshot.cursors,
        })
    }

    /// Writes the vocabulary and all cursors in one atomic replace.
    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        io::write_blob(
            path,
            &SnapshotRef {
                groups: &self.groups,
                cursors: &self.cursors,
            },
        )
    }

    /// Returns the id of `candidate`'s structure and whether it was new.
    ///
    /// A hit bumps the occurrence count and unions in the candidate's
    /// bridge, reaction type and center count.
    pub fn lookup_or_insert(&mut self, candidate: &LeavingGroup) -> (usize, bool) {
        let key = candidate.structure_key();
        if let Some(&id) = self.index.get(&key) {
            self.groups[id].absorb(candidate);
            return (id, false);
        }
        let id = self.groups.len();
        let mut entry = candidate.clone();
        entry.n = 1;
        self.groups.push(entry);
        self.index.insert(key, id);
        (id, true)
    }

    pub fn find(&self, candidate: &LeavingGroup) -> Option<usize> {
        self.index.get(&candidate.structure_key()).copied()
    }

    pub fn get(&self, id: usize) -> Option<&LeavingGroup> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> &[LeavingGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn cursor(&self, split: &str) -> Option<&Cursor> {
        self.cursors.get(split)
    }

    pub fn set_cursor(&mut self, split: &str, cursor: Cursor) {
        self.cursors.insert(split.to_string(), cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leaving_group::BridgeBond;
    use crate::model::molecule::{MoleculeInfo, features::*};
    use crate::model::types::BondOrder;
    use ndarray::{Array2, array};
    use tempfile::TempDir;

    fn group(z: f32, map: u32, rxn_type: Option<u32>) -> LeavingGroup {
        let mut fea = Array2::zeros((FEATURE_DIM, 2));
        fea[[ATOMIC_NUMBER, 0]] = z;
        fea[[ATOMIC_NUMBER, 1]] = 6.0;
        let mol = MoleculeInfo::new(fea, array![[0.0, 1.0], [1.0, 0.0]], None);
        let bridge = vec![BridgeBond {
            map_number: map,
            order: BondOrder::Single,
        }];
        LeavingGroup::new(&mol, vec![1], bridge, rxn_type, 1)
    }

    #[test]
    fn identical_structures_share_an_id() {
        let mut registry = LeavingGroupRegistry::new();
        assert_eq!(registry.lookup_or_insert(&group(8.0, 3, Some(0))), (0, true));
        assert_eq!(registry.lookup_or_insert(&group(7.0, 3, Some(0))), (1, true));
        assert_eq!(registry.lookup_or_insert(&group(8.0, 5, Some(2))), (0, false));
        assert_eq!(registry.lookup_or_insert(&group(8.0, 3, None)), (0, false));

        let entry = registry.get(0).unwrap();
        assert_eq!(entry.n, 3);
        assert_eq!(entry.rxn_type, vec![0, 2]);
        assert_eq!(entry.bridge.len(), 2);
        assert_eq!(registry.get(1).unwrap().n, 1);
        assert_eq!(registry.find(&group(7.0, 9, None)), Some(1));
        assert_eq!(registry.find(&group(9.0, 9, None)), None);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let registry = LeavingGroupRegistry::load(&dir.path().join("leaving_group.bin")).unwrap();
        assert!(registry.is_empty());
        assert!(registry.cursor("train").is_none());
    }

    #[test]
    fn save_and_load_preserve_ids_and_cursors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed/leaving_group.bin");

        let mut registry = LeavingGroupRegistry::new();
        registry.lookup_or_insert(&group(8.0, 3, Some(1)));
        registry.lookup_or_insert(&group(7.0, 3, Some(1)));
        let mut cursor = Cursor::new("abc", "def");
        cursor.next_reaction = 5;
        cursor.written = 4;
        registry.set_cursor("train", cursor.clone());
        registry.save(&path).unwrap();

        let mut loaded = LeavingGroupRegistry::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.cursor("train"), Some(&cursor));
        assert_eq!(loaded.lookup_or_insert(&group(7.0, 1, None)), (1, false));
        assert_eq!(loaded.get(1).unwrap().n, 2);
    }
}

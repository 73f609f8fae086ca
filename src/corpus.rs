//! Read access to a prepared split.

use log::{debug, info};

use crate::io::{self, StoreLayout};
use crate::model::record::Record;
use crate::prep::PrepConfig;

/// How [`CachedCorpus::open`] reaches the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusOptions {
    /// Hold every record in memory, from the consolidated cache if present.
    pub fast_read: bool,
    /// Persist the consolidated cache after building it.
    pub save_cache: bool,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            fast_read: true,
            save_cache: true,
        }
    }
}

impl From<&PrepConfig> for CorpusOptions {
    fn from(config: &PrepConfig) -> Self {
        Self {
            fast_read: config.fast_read,
            save_cache: config.save_cache,
        }
    }
}

#[derive(Debug)]
enum Backing {
    Cold { layout: StoreLayout, split: String },
    Hot(Vec<Record>),
}

/// Random access over the records of one split.
///
/// The split must have been prepared; its record count comes from
/// `num_files`.
#[derive(Debug)]
pub struct CachedCorpus {
    len: usize,
    backing: Backing,
}

impl CachedCorpus {
    pub fn open(
        layout: &StoreLayout,
        split: &str,
        options: CorpusOptions,
    ) -> Result<Self, io::Error> {
        let len: usize = io::read_blob(&layout.count_file(split))?;
        if !options.fast_read {
            return Ok(Self {
                len,
                backing: Backing::Cold {
                    layout: layout.clone(),
                    split: split.to_string(),
                },
            });
        }

        let cache = layout.cache_file(split);
        if options.save_cache {
            if let Some(records) = io::read_optional::<Vec<Record>>(&cache)? {
                if records.len() == len {
                    debug!("loaded {len} records from '{}'", cache.display());
                    return Ok(Self {
                        len,
                        backing: Backing::Hot(records),
                    });
                }
                info!(
                    "cache '{}' holds {} records, expected {len}; rebuilding",
                    cache.display(),
                    records.len()
                );
            }
        }

        let records = (0..len)
            .map(|i| io::read_blob::<Record>(&layout.record_file(split, i)))
            .collect::<Result<Vec<_>, _>>()?;
        if options.save_cache {
            io::write_blob(&cache, &records)?;
            info!("wrote {len} records to '{}'", cache.display());
        }
        Ok(Self {
            len,
            backing: Backing::Hot(records),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record `idx`, or `None` past the end.
    pub fn get(&self, idx: usize) -> Result<Option<Record>, io::Error> {
        if idx >= self.len {
            return Ok(None);
        }
        match &self.backing {
            Backing::Hot(records) => Ok(records.get(idx).cloned()),
            Backing::Cold { layout, split } => {
                io::read_blob(&layout.record_file(split, idx)).map(Some)
            }
        }
    }

    /// True when every record is held in memory.
    pub fn is_hot(&self) -> bool {
        matches!(self.backing, Backing::Hot(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::MoleculeInfo;
    use ndarray::{Array1, Array2};
    use tempfile::TempDir;

    fn record(lg_id: usize) -> Record {
        Record {
            product: MoleculeInfo::empty(false).padded(4),
            lg: MoleculeInfo::empty(false).padded(2),
            rea_bond_adj: Array2::zeros((4, 4)),
            rc_h: Array1::zeros(4),
            rc_target: Array2::from_elem((4, 4), false),
            rxn_type: None,
            ct_target: Array2::zeros((4, 2)),
            gate_token: Array1::zeros(2),
            center_cnt: 0,
            lg_id,
        }
    }

    fn seed(dir: &TempDir, n: usize) -> StoreLayout {
        let layout = StoreLayout::new(dir.path());
        for i in 0..n {
            io::write_blob(&layout.record_file("train", i), &record(i)).unwrap();
        }
        io::write_blob(&layout.count_file("train"), &n).unwrap();
        layout
    }

    #[test]
    fn cold_reads_each_record_file() {
        let dir = TempDir::new().unwrap();
        let layout = seed(&dir, 3);
        let options = CorpusOptions {
            fast_read: false,
            save_cache: true,
        };
        let corpus = CachedCorpus::open(&layout, "train", options).unwrap();
        assert!(!corpus.is_hot());
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.get(2).unwrap().unwrap().lg_id, 2);
        assert!(corpus.get(3).unwrap().is_none());
        assert!(!layout.cache_file("train").exists());
    }

    #[test]
    fn fast_read_builds_and_reuses_cache() {
        let dir = TempDir::new().unwrap();
        let layout = seed(&dir, 2);
        let corpus = CachedCorpus::open(&layout, "train", CorpusOptions::default()).unwrap();
        assert!(corpus.is_hot());
        assert!(layout.cache_file("train").exists());

        // A second open must not need the per-record files.
        std::fs::remove_file(layout.record_file("train", 1)).unwrap();
        let reopened = CachedCorpus::open(&layout, "train", CorpusOptions::default()).unwrap();
        assert_eq!(reopened.get(1).unwrap().unwrap().lg_id, 1);
    }

    #[test]
    fn fast_read_without_save_leaves_no_cache() {
        let dir = TempDir::new().unwrap();
        let layout = seed(&dir, 2);
        let options = CorpusOptions {
            fast_read: true,
            save_cache: false,
        };
        let corpus = CachedCorpus::open(&layout, "train", options).unwrap();
        assert!(corpus.is_hot());
        assert_eq!(corpus.get(0).unwrap().unwrap().lg_id, 0);
        assert!(!layout.cache_file("train").exists());
    }

    #[test]
    fn unprepared_split_is_an_error() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        let err = CachedCorpus::open(&layout, "test", CorpusOptions::default()).unwrap_err();
        assert!(err.is_not_found());
    }
}

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::Error;

/// Reaction-center size above which an example is dropped.
pub const CENTER_CUTOFF: usize = 10;

/// Corpus family; selects the alignment variant and the map-number policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DatasetType {
    /// USPTO-50k. Its original atom maps leak the product atom order, so
    /// they are shuffled before alignment.
    #[default]
    #[serde(rename = "uspto-50k")]
    Uspto50k,
    #[serde(rename = "uspto-full")]
    UsptoFull,
    /// MIT/USPTO-480k, where reactant strings also carry spectator regents.
    #[serde(rename = "mit")]
    Mit,
}

impl DatasetType {
    pub fn shuffles_map_numbers(&self) -> bool {
        matches!(self, DatasetType::Uspto50k)
    }

    pub fn has_regents(&self) -> bool {
        matches!(self, DatasetType::Mit)
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatasetType::Uspto50k => "uspto-50k",
            DatasetType::UsptoFull => "uspto-full",
            DatasetType::Mit => "mit",
        })
    }
}

/// Every knob of a preparation run.
///
/// Deserializes from TOML with kebab-case keys; absent keys keep their
/// defaults.
///
/// ```toml
/// max-node = 50
/// max-lg-na = 30
/// dataset-type = "uspto-50k"
/// workers = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PrepConfig {
    pub max_node: usize,
    pub min_node: usize,
    pub max_lg_na: usize,
    pub max_gate_num_size: usize,
    /// Extra product slots for regent atoms; ignored unless `known_regents`.
    pub max_regents_na: usize,
    pub use_3d_info: bool,
    pub known_regents: bool,
    pub dataset_type: DatasetType,
    pub save_cache: bool,
    pub fast_read: bool,
    pub center_cutoff: usize,
    pub seed: u64,
    /// Threads for the per-reaction stage; 1 runs everything inline.
    pub workers: usize,
    pub checkpoint_every: usize,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            max_node: 50,
            min_node: 3,
            max_lg_na: 30,
            max_gate_num_size: 4,
            max_regents_na: 0,
            use_3d_info: false,
            known_regents: false,
            dataset_type: DatasetType::default(),
            save_cache: true,
            fast_read: true,
            center_cutoff: CENTER_CUTOFF,
            seed: 0,
            workers: 1,
            checkpoint_every: 1000,
        }
    }
}

impl PrepConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(crate::io::Error::io(path, e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.min_node >= self.max_node {
            return Err(Error::config(format!(
                "min-node ({}) must be below max-node ({})",
                self.min_node, self.max_node
            )));
        }
        if self.max_lg_na == 0 {
            return Err(Error::config("max-lg-na must be positive"));
        }
        if self.max_gate_num_size == 0 {
            return Err(Error::config("max-gate-num-size must be positive"));
        }
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.checkpoint_every == 0 {
            return Err(Error::config("checkpoint-every must be at least 1"));
        }
        Ok(())
    }

    /// Hex SHA-256 over every setting that decides which records are written
    /// and how they are shaped.
    ///
    /// Worker count, checkpoint interval and the cache toggles are left out;
    /// they never change what lands on disk.
    pub fn fingerprint(&self) -> String {
        let limits = self.limits();
        let mut hasher = Sha256::new();
        for n in [
            limits.max_node,
            limits.min_node,
            limits.max_lg_na,
            limits.max_gate_num_size,
            limits.max_regents_na,
            self.center_cutoff,
        ] {
            hasher.update((n as u64).to_le_bytes());
        }
        hasher.update(self.seed.to_le_bytes());
        hasher.update([u8::from(limits.known_regents), u8::from(self.use_3d_info)]);
        hasher.update(self.dataset_type.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_node: self.max_node,
            min_node: self.min_node,
            max_lg_na: self.max_lg_na,
            max_gate_num_size: self.max_gate_num_size,
            max_regents_na: if self.known_regents {
                self.max_regents_na
            } else {
                0
            },
            known_regents: self.known_regents,
        }
    }
}

/// Size bounds and padding targets used while building records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_node: usize,
    pub min_node: usize,
    pub max_lg_na: usize,
    pub max_gate_num_size: usize,
    /// Effective regent slots: 0 unless regents are merged into the product.
    pub max_regents_na: usize,
    pub known_regents: bool,
}

impl Limits {
    /// Padded atom count of product-sized tensors.
    pub fn padded_nodes(&self) -> usize {
        self.max_node + self.max_regents_na
    }
}

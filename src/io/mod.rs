//! On-disk record store.
//!
//! Everything lives under one dataset root:
//!
//! ```text
//! <root>/raw/<split>.csv                        raw reactions
//! <root>/processed/leaving_group.bin            registry snapshot
//! <root>/processed/cache_<split>.bin            consolidated records
//! <root>/processed/<split>/rxn_data_<i>.bin     one record per example
//! <root>/processed/<split>/num_files.bin        example count
//! <root>/processed/<split>/smiles_lists.csv     audit trail
//! ```
//!
//! Binary blobs are bincode-encoded and replaced atomically.

mod audit;
pub mod error;
mod raw;
mod store;

use std::path::{Path, PathBuf};

pub use audit::{AuditLog, count_rows};
pub use error::Error;
pub use raw::{RawReaction, read_raw_reactions};
pub use store::{read_blob, read_optional, remove_if_exists, sha256_file, write_blob};

/// File extension of every binary blob.
pub const BLOB_EXTENSION: &str = "bin";

/// Resolves artifact paths for one dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_file(&self, split: &str) -> PathBuf {
        self.root.join("raw").join(format!("{split}.csv"))
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.processed_dir().join(split)
    }

    pub fn record_file(&self, split: &str, idx: usize) -> PathBuf {
        self.split_dir(split)
            .join(format!("rxn_data_{idx}.{BLOB_EXTENSION}"))
    }

    pub fn count_file(&self, split: &str) -> PathBuf {
        self.split_dir(split)
            .join(format!("num_files.{BLOB_EXTENSION}"))
    }

    pub fn audit_file(&self, split: &str) -> PathBuf {
        self.split_dir(split).join("smiles_lists.csv")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.processed_dir()
            .join(format!("leaving_group.{BLOB_EXTENSION}"))
    }

    pub fn cache_file(&self, split: &str) -> PathBuf {
        self.processed_dir()
            .join(format!("cache_{split}.{BLOB_EXTENSION}"))
    }
}

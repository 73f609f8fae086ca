//! A pure Rust library that turns atom-mapped reaction corpora into padded,
//! fixed-shape training examples for graph-based retrosynthesis models.
//! It aligns reactant atoms to product atoms, extracts leaving groups and
//! reaction centers, and deduplicates leaving groups into a shared vocabulary.
//!
//! # Features
//!
//! - **Reaction alignment**: reactant atoms are reordered as product atoms,
//!   then leaving-group atoms, then spectator regents
//! - **Leaving-group vocabulary**: structurally identical groups share one id
//!   across the whole corpus, with reaction types and attachment bonds merged
//! - **Reaction centers**: bonds that change between reactant and product,
//!   with a configurable size cutoff
//! - **Resumable preparation**: progress is checkpointed atomically together
//!   with the vocabulary and validated against the raw input checksum
//! - **Parallel stage**: parsing and alignment run on a worker pool while
//!   commits stay in input order
//!
//! # Quick Start
//!
//! [`DatasetPipeline::process`] runs every per-reaction check without touching
//! the disk:
//!
//! ```
//! use retro_forge::prep::{DatasetPipeline, DatasetType, Outcome, PrepConfig};
//! use retro_forge::io::{RawReaction, StoreLayout};
//!
//! let config = PrepConfig {
//!     dataset_type: DatasetType::UsptoFull,
//!     ..PrepConfig::default()
//! };
//! let pipeline = DatasetPipeline::new(StoreLayout::new("data/uspto"), config)?;
//!
//! // Methyl benzoate hydrolysis: the methoxy group leaves.
//! let raw = RawReaction {
//!     rxn_smiles: "[CH3:1][O:2][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1.[OH2:11]\
//!                  >>[OH:11][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1"
//!         .to_string(),
//!     class: Some(6),
//! };
//!
//! let Outcome::Ready(prepared) = pipeline.process(0, &raw) else {
//!     panic!("reaction should be accepted");
//! };
//! assert_eq!(prepared.n_product, 9);
//! assert_eq!(prepared.n_lg, 2);
//!
//! let record = prepared.draft.finish(0);
//! assert_eq!(record.center_cnt, 1);
//! assert_eq!(record.rxn_type, Some(5));
//! assert_eq!(record.product.atom_fea.ncols(), 50);
//! # Ok::<(), retro_forge::prep::Error>(())
//! ```
//!
//! Whole splits are prepared with [`prep::prepare`], which reads
//! `<root>/raw/<split>.csv` and writes under `<root>/processed/`. The result
//! is read back through [`CachedCorpus`].
//!
//! # Module Organization
//!
//! - [`model`]: molecules, leaving groups and records
//! - [`parse`]: SMILES reading behind the [`MoleculeParser`] trait
//! - [`prep`]: alignment, centers, vocabulary and the dataset pipeline
//! - [`io`]: on-disk layout, binary blobs, raw CSV and the audit trail
//! - [`corpus`]: random access to prepared splits

pub mod corpus;
pub mod io;
pub mod model;
pub mod parse;
pub mod prep;

pub use corpus::{CachedCorpus, CorpusOptions};
pub use model::leaving_group::{Bridge, BridgeBond, LeavingGroup};
pub use model::molecule::MoleculeInfo;
pub use model::record::{ProductInput, Record};
pub use model::types::{BondOrder, Element, ParseBondOrderError, ParseElementError};
pub use parse::{MoleculeParser, ParseError, SmilesParser};
pub use prep::{
    DatasetPipeline, DatasetType, LeavingGroupRegistry, PrepConfig, RunSummary, prepare,
};

pub use prep::Error as PrepError;

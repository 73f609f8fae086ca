//! Reaction alignment, leaving-group extraction and record assembly.
//!
//! A reaction flows through the stages below; any stage may reject it with
//! a [`Rejection`], which the [`DatasetPipeline`] counts and moves past.
//!
//! 1. [`MoleculeParser`](crate::parse::MoleculeParser) turns both sides into
//!    tensors (after an optional map-number shuffle).
//! 2. [`AlignmentResolver`] orders reactant atoms as product atoms, then
//!    leaving group, then regents.
//! 3. [`center::extract`] diffs the aligned bond matrices.
//! 4. [`RecordBuilder::prepare`] checks every size bound and pads.
//! 5. [`LeavingGroupRegistry::lookup_or_insert`] assigns the vocabulary id,
//!    and the finished [`Record`](crate::model::record::Record) is written.

mod align;
mod builder;
pub mod center;
mod config;
mod error;
mod pipeline;
mod registry;

pub use align::{AlignmentResolver, AlignmentResult, NoRegents, RegentStrategy, SpectatorFragments};
pub use builder::{Draft, RecordBuilder};
pub use center::ReactionCenter;
pub use config::{CENTER_CUTOFF, DatasetType, Limits, PrepConfig};
pub use error::{AlignmentError, Error, Rejection, Side, SizeExceeded, SkipReason};
pub use pipeline::{
    DatasetPipeline, Event, Observer, Outcome, Prepared, RunSummary, Silent, SkipTally,
};
pub use registry::{Cursor, LeavingGroupRegistry};

use std::path::PathBuf;

use crate::io::StoreLayout;
use crate::model::record::ProductInput;
use crate::parse::{MoleculeParser, ParseError};

/// Prepares one split of the dataset rooted at `root` with the built-in
/// SMILES parser and no progress reporting.
pub fn prepare(
    root: impl Into<PathBuf>,
    split: &str,
    config: &PrepConfig,
) -> Result<RunSummary, Error> {
    DatasetPipeline::new(StoreLayout::new(root), config.clone())?.run(split, &mut Silent)
}

/// Builds the padded product-only input used when planning multi-step
/// routes, where no reactant is known yet.
pub fn single_product_record(
    parser: &dyn MoleculeParser,
    smiles: &str,
    config: &PrepConfig,
) -> Result<ProductInput, ParseError> {
    let product = parser.parse(smiles, config.use_3d_info, true)?;
    Ok(ProductInput {
        product: product.padded(config.limits().padded_nodes()),
        max_lg_na: config.max_lg_na,
        rxn_type: 0,
        center_cnt: 0,
    })
}

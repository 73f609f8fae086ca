//! Turning SMILES text into [`MoleculeInfo`] tensors.
//!
//! The preparation pipeline only talks to the [`MoleculeParser`] trait, so a
//! richer cheminformatics backend can be plugged in without touching the
//! alignment code. [`SmilesParser`] is the built-in implementation; it reads
//! the atom-mapped SMILES subset used by reaction corpora and derives
//! topological (bond-count) distances instead of 3-D ones.

mod error;
mod remap;
mod smiles;

pub use error::ParseError;
pub use remap::shuffle_map_numbers;
pub use smiles::atom_map_numbers;

use crate::model::molecule::MoleculeInfo;
use smiles::Graph;

/// Source of molecule tensors.
///
/// Implementations must be deterministic and callable from several worker
/// threads at once.
pub trait MoleculeParser: Send + Sync {
    /// Parses `smiles`.
    ///
    /// When `use_3d` is set the returned `dist_adj` must hold spatial
    /// distances, or be `None` when none are available. Otherwise `dist_adj`
    /// is filled only if `calc_dist` is set.
    fn parse(&self, smiles: &str, use_3d: bool, calc_dist: bool)
    -> Result<MoleculeInfo, ParseError>;
}

/// Built-in SMILES reader. Carries no 3-D information.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesParser;

impl MoleculeParser for SmilesParser {
    fn parse(
        &self,
        smiles: &str,
        use_3d: bool,
        calc_dist: bool,
    ) -> Result<MoleculeInfo, ParseError> {
        let graph = Graph::parse(smiles)?;
        Ok(graph.into_molecule(calc_dist && !use_3d))
    }
}

/// Splits `"<reactants>>><product>"` into its two sides.
///
/// An agent section (`reactants>agents>product`) is accepted and discarded.
pub fn split_reaction(rxn: &str) -> Result<(&str, &str), ParseError> {
    let rxn = rxn.trim();
    let mut parts = rxn.split('>');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(reactants), Some(_agents), Some(product), None)
            if !reactants.is_empty() && !product.is_empty() =>
        {
            Ok((reactants, product))
        }
        _ => Err(ParseError::Reaction(rxn.to_string())),
    }
}

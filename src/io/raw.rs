use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use super::error::Error;

/// One row of a raw reaction CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawReaction {
    /// `"<reactants>>><product>"`.
    pub rxn_smiles: String,
    /// 1-indexed reaction class, when the corpus has one.
    #[serde(default)]
    pub class: Option<u32>,
}

impl RawReaction {
    /// The reaction class shifted to 0-indexed form.
    pub fn reaction_type(&self) -> Option<u32> {
        self.class.and_then(|c| c.checked_sub(1))
    }
}

/// Reads every row of a raw reaction CSV.
///
/// Only `rxn_smiles` is required; other columns are ignored.
pub fn read_raw_reactions(path: &Path) -> Result<Vec<RawReaction>, Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let headers = reader.headers().map_err(|e| Error::csv(path, e))?;
    if !headers.iter().any(|h| h == "rxn_smiles") {
        return Err(Error::MissingColumn {
            path: path.to_path_buf(),
            column: "rxn_smiles",
        });
    }

    reader
        .deserialize()
        .collect::<Result<Vec<RawReaction>, _>>()
        .map_err(|e| Error::csv(path, e))
}

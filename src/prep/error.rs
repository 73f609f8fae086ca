//! Error types for dataset preparation.
//!
//! Two tiers exist. [`Error`] is fatal and aborts a run. [`Rejection`] (and
//! the more specific [`AlignmentError`] and [`SizeExceeded`]) describe why a
//! single reaction was skipped; the pipeline counts them under a
//! [`SkipReason`] and moves on.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse::ParseError;

/// Fatal failures of a preparation run.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw reaction CSV for the requested split is absent.
    #[error("raw reaction file '{}' does not exist", path.display())]
    MissingRawFile { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The raw CSV differs from the one a saved cursor was computed over.
    #[error(
        "raw input '{}' changed since the last checkpoint (recorded sha256 {expected}, found {found}); remove the processed directory to start over",
        path.display()
    )]
    InputChanged {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The split was started with different record-shaping settings.
    #[error(
        "settings for split '{split}' differ from the ones its records were built with (recorded {expected}, found {found}); restore them or remove the processed directory to start over"
    )]
    SettingsChanged {
        split: String,
        expected: String,
        found: String,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] crate::io::Error),
}

impl Error {
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config(detail.into())
    }
}

/// Which side of a reaction a problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Product,
    Reactant,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Product => "product",
            Side::Reactant => "reactant",
        })
    }
}

/// The atom maps of a reaction cannot be turned into an alignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("product atom {index} carries no atom-map number")]
    UnmappedProductAtom { index: usize },

    #[error("atom-map number {map_number} appears more than once in the {side}")]
    DuplicateMap { map_number: u32, side: Side },

    #[error("product atom-map number {map_number} has no reactant counterpart")]
    MissingMap { map_number: u32 },

    #[error("regent atom {index} is mapped into the product")]
    RegentOverlap { index: usize },

    #[error("reactant fragments hold {fragments} atoms but the parsed reactant has {atoms}")]
    FragmentMismatch { fragments: usize, atoms: usize },

    #[error("cannot read reactant fragment: {0}")]
    Fragment(ParseError),
}

impl AlignmentError {
    /// Whether the failure came from regent classification rather than
    /// from the atom maps themselves.
    pub fn is_regent_failure(&self) -> bool {
        matches!(
            self,
            Self::RegentOverlap { .. } | Self::FragmentMismatch { .. } | Self::Fragment(_)
        )
    }
}

/// A size or range bound was violated; the example is dropped, never
/// truncated or clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeExceeded {
    #[error("product has {n} atoms, allowed range is ({min}, {max}) exclusive")]
    Product { n: usize, min: usize, max: usize },

    #[error("reactant has {n} atoms, allowed range is ({min}, {max}) exclusive")]
    Reactant { n: usize, min: usize, max: usize },

    #[error("{count} regent atoms exceed the {max} reserved slots")]
    Regents { count: usize, max: usize },

    #[error("leaving group has {na} atoms, limit is below {max}")]
    LeavingGroup { na: usize, max: usize },

    #[error("{count} gates, limit is below {max}")]
    Gates { count: usize, max: usize },

    #[error("hydrogen-change bucket {bucket} at atom {atom} is outside 0..=6")]
    ValenceBucket { atom: usize, bucket: i64 },
}

/// Why one reaction was not written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("3-D distances required but unavailable")]
    Missing3d,

    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("reaction center has {count} bonds, cutoff is {cutoff}")]
    CenterCount { count: usize, cutoff: usize },

    #[error(transparent)]
    Size(#[from] SizeExceeded),
}

impl Rejection {
    pub fn reason(&self) -> SkipReason {
        match self {
            Rejection::Parse(_) => SkipReason::Parse,
            Rejection::Missing3d => SkipReason::Missing3d,
            Rejection::Alignment(e) if e.is_regent_failure() => SkipReason::Regents,
            Rejection::Alignment(_) => SkipReason::Alignment,
            Rejection::CenterCount { .. } => SkipReason::CenterCount,
            Rejection::Size(e) => match e {
                SizeExceeded::Product { .. } => SkipReason::ProductSize,
                SizeExceeded::Reactant { .. } => SkipReason::ReactantSize,
                SizeExceeded::Regents { .. } => SkipReason::Regents,
                SizeExceeded::LeavingGroup { .. } => SkipReason::LeavingGroupSize,
                SizeExceeded::Gates { .. } => SkipReason::GateCount,
                SizeExceeded::ValenceBucket { .. } => SkipReason::ValenceBucket,
            },
        }
    }
}

/// Counter key for skipped reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkipReason {
    Parse,
    Missing3d,
    ProductSize,
    ReactantSize,
    Alignment,
    Regents,
    CenterCount,
    LeavingGroupSize,
    GateCount,
    ValenceBucket,
}

impl SkipReason {
    pub const ALL: [SkipReason; 10] = [
        SkipReason::Parse,
        SkipReason::Missing3d,
        SkipReason::ProductSize,
        SkipReason::ReactantSize,
        SkipReason::Alignment,
        SkipReason::Regents,
        SkipReason::CenterCount,
        SkipReason::LeavingGroupSize,
        SkipReason::GateCount,
        SkipReason::ValenceBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Parse => "parse",
            SkipReason::Missing3d => "missing-3d",
            SkipReason::ProductSize => "product-size",
            SkipReason::ReactantSize => "reactant-size",
            SkipReason::Alignment => "alignment",
            SkipReason::Regents => "regents",
            SkipReason::CenterCount => "center-count",
            SkipReason::LeavingGroupSize => "leaving-group-size",
            SkipReason::GateCount => "gate-count",
            SkipReason::ValenceBucket => "valence-bucket",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons() {
        assert_eq!(Rejection::from(ParseError::Empty).reason(), SkipReason::Parse);
        assert_eq!(Rejection::Missing3d.reason(), SkipReason::Missing3d);
        assert_eq!(
            Rejection::from(AlignmentError::MissingMap { map_number: 4 }).reason(),
            SkipReason::Alignment
        );
        assert_eq!(
            Rejection::from(AlignmentError::RegentOverlap { index: 2 }).reason(),
            SkipReason::Regents
        );
        assert_eq!(
            Rejection::from(SizeExceeded::Gates { count: 4, max: 4 }).reason(),
            SkipReason::GateCount
        );
        assert_eq!(
            Rejection::from(SizeExceeded::Regents { count: 9, max: 0 }).reason(),
            SkipReason::Regents
        );
    }

    #[test]
    fn reason_names_are_unique() {
        let mut names: Vec<_> = SkipReason::ALL.iter().map(|r| r.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SkipReason::ALL.len());
    }

    #[test]
    fn messages_are_readable() {
        let e = AlignmentError::DuplicateMap {
            map_number: 7,
            side: Side::Reactant,
        };
        assert_eq!(e.to_string(), "atom-map number 7 appears more than once in the reactant");
    }
}

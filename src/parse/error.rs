use thiserror::Error;

/// Failure to turn a SMILES string into a molecule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty SMILES string")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of SMILES inside {context}")]
    UnexpectedEnd { context: &'static str },

    #[error("unknown element '{symbol}' at position {pos}")]
    UnknownElement { symbol: String, pos: usize },

    #[error("'{symbol}' cannot be aromatic (position {pos})")]
    NonAromaticElement { symbol: String, pos: usize },

    #[error("{what} at position {pos} has no preceding atom")]
    Dangling { what: &'static str, pos: usize },

    #[error("{what} at position {pos} is out of range")]
    OutOfRange { what: &'static str, pos: usize },

    #[error("unclosed ring bond(s): {0:?}")]
    UnclosedRing(Vec<u16>),

    #[error("unbalanced parentheses")]
    UnbalancedBranch,

    #[error("invalid reaction SMILES '{0}': expected '<reactants>>><product>'")]
    Reaction(String),
}

impl ParseError {
    pub(crate) fn unexpected(ch: u8, pos: usize) -> Self {
        Self::UnexpectedChar {
            ch: ch as char,
            pos,
        }
    }

    pub(crate) fn out_of_range(what: &'static str, pos: usize) -> Self {
        Self::OutOfRange { what, pos }
    }

    pub(crate) fn dangling(what: &'static str, pos: usize) -> Self {
        Self::Dangling { what, pos }
    }
}

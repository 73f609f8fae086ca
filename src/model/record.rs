use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::molecule::MoleculeInfo;

/// One fully padded training example.
///
/// With `N = max_node + max_regents_na`:
///
/// | field | shape |
/// |---|---|
/// | `product` | padded to `N` atoms (regents appended when known) |
/// | `lg` | padded to `max_lg_na` atoms |
/// | `rea_bond_adj` | `[N, N]` reordered reactant bond orders |
/// | `rc_h` | `[N]` hydrogen-change bucket `0..=6` |
/// | `rc_target` | `[N, N]` reaction-center bond mask |
/// | `ct_target` | `[N, max_gate_num_size]` gate attachment targets |
/// | `gate_token` | `[max_lg_na]` padded gate counts |
///
/// Every entry past the real sizes is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub product: MoleculeInfo,
    pub lg: MoleculeInfo,
    pub rea_bond_adj: Array2<f32>,
    pub rc_h: Array1<i64>,
    pub rc_target: Array2<bool>,
    pub rxn_type: Option<u32>,
    pub ct_target: Array2<u8>,
    pub gate_token: Array1<i64>,
    pub center_cnt: usize,
    pub lg_id: usize,
}

impl Record {
    /// Number of reaction-center bonds marked in `rc_target`.
    pub fn marked_center_bonds(&self) -> usize {
        self.rc_target.iter().filter(|b| **b).count() / 2
    }
}

/// Product-only input for multi-step planning, where no reactant is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub product: MoleculeInfo,
    pub max_lg_na: usize,
    pub rxn_type: u32,
    pub center_cnt: usize,
}

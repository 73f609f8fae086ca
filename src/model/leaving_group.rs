use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::molecule::MoleculeInfo;
use super::types::BondOrder;

/// A gating bond seen from the scaffold side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BridgeBond {
    /// Atom-map number of the scaffold atom the leaving group attaches to.
    pub map_number: u32,
    pub order: BondOrder,
}

/// All gating bonds of one example, in gate order.
pub type Bridge = Vec<BridgeBond>;

/// Content-addressed identity of a leaving-group structure.
///
/// Built from `na`, the tensor shapes and the raw `f32` bits of `atom_fea`
/// and `bond_adj`, so two keys are equal exactly when the tensors are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureKey(Vec<u8>);

impl StructureKey {
    fn encode(na: usize, atom_fea: &Array2<f32>, bond_adj: &Array2<f32>) -> Self {
        let mut bytes = Vec::with_capacity(24 + 4 * (atom_fea.len() + bond_adj.len()));
        bytes.extend_from_slice(&(na as u64).to_le_bytes());
        for m in [atom_fea, bond_adj] {
            bytes.extend_from_slice(&(m.nrows() as u32).to_le_bytes());
            bytes.extend_from_slice(&(m.ncols() as u32).to_le_bytes());
            for v in m.iter() {
                bytes.extend_from_slice(&v.to_bits().to_le_bytes());
            }
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One vocabulary entry: a leaving-group graph plus the metadata accumulated
/// over every example that produced it.
///
/// Only `na`, `atom_fea` and `bond_adj` take part in identity; see
/// [`LeavingGroup::structure_key`]. The accumulating lists behave as ordered
/// sets: first-seen order, no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeavingGroup {
    pub na: usize,
    pub atom_fea: Array2<f32>,
    pub bond_adj: Array2<f32>,
    pub dist_adj: Option<Array2<f32>>,
    pub gate_num: Vec<u32>,

    /// Number of written examples sharing this structure.
    pub n: usize,
    pub bridge: Vec<Bridge>,
    pub rxn_type: Vec<u32>,
    pub center_cnt: Vec<usize>,
}

impl LeavingGroup {
    /// Creates a single-occurrence entry from an unpadded leaving-group
    /// molecule.
    pub fn new(
        group: &MoleculeInfo,
        gate_num: Vec<u32>,
        bridge: Bridge,
        rxn_type: Option<u32>,
        center_cnt: usize,
    ) -> Self {
        let na = group.n_atom;
        Self {
            na,
            atom_fea: group.atom_fea.slice(ndarray::s![.., ..na]).to_owned(),
            bond_adj: group.bond_adj.slice(ndarray::s![..na, ..na]).to_owned(),
            dist_adj: group
                .dist_adj
                .as_ref()
                .map(|d| d.slice(ndarray::s![..na, ..na]).to_owned()),
            gate_num,
            n: 1,
            bridge: vec![bridge],
            rxn_type: rxn_type.into_iter().collect(),
            center_cnt: vec![center_cnt],
        }
    }

    pub fn structure_key(&self) -> StructureKey {
        StructureKey::encode(self.na, &self.atom_fea, &self.bond_adj)
    }

    /// Counts one more occurrence and unions in `other`'s metadata.
    pub fn absorb(&mut self, other: &LeavingGroup) {
        self.n += 1;
        for b in &other.bridge {
            push_unique(&mut self.bridge, b);
        }
        for t in &other.rxn_type {
            push_unique(&mut self.rxn_type, t);
        }
        for c in &other.center_cnt {
            push_unique(&mut self.center_cnt, c);
        }
    }
}

fn push_unique<T: PartialEq + Clone>(items: &mut Vec<T>, item: &T) {
    if !items.contains(item) {
        items.push(item.clone());
    }
}

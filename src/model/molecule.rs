use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use serde::{Deserialize, Serialize};

/// Row indices of the per-atom feature matrix.
pub mod features {
    /// Atom-map number; 0 for unmapped atoms.
    pub const MAP_NUMBER: usize = 0;
    pub const ATOMIC_NUMBER: usize = 1;
    pub const FORMAL_CHARGE: usize = 2;
    /// Total hydrogen count, the valence feature behind `rc_h`.
    pub const HYDROGENS: usize = 3;
    pub const AROMATIC: usize = 4;
    /// Number of heavy-atom neighbors.
    pub const DEGREE: usize = 5;

    pub const FEATURE_DIM: usize = 6;
}

/// Normalized tensor view of one molecule.
///
/// `atom_fea` is `[FEATURE_DIM, capacity]`, `bond_adj` and `dist_adj` are
/// `[capacity, capacity]`. `capacity` equals `n_atom` for freshly parsed
/// molecules and a configured maximum for padded copies; columns past
/// `n_atom` are always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeInfo {
    pub n_atom: usize,
    pub atom_fea: Array2<f32>,
    pub bond_adj: Array2<f32>,
    pub dist_adj: Option<Array2<f32>>,
}

impl MoleculeInfo {
    /// Builds an unpadded molecule; the atom count is taken from `atom_fea`.
    pub fn new(
        atom_fea: Array2<f32>,
        bond_adj: Array2<f32>,
        dist_adj: Option<Array2<f32>>,
    ) -> Self {
        debug_assert_eq!(atom_fea.nrows(), features::FEATURE_DIM);
        debug_assert_eq!(bond_adj.dim(), (atom_fea.ncols(), atom_fea.ncols()));
        Self {
            n_atom: atom_fea.ncols(),
            atom_fea,
            bond_adj,
            dist_adj,
        }
    }

    /// An empty molecule, used for reactions without a leaving group.
    pub fn empty(with_dist: bool) -> Self {
        Self::new(
            Array2::zeros((features::FEATURE_DIM, 0)),
            Array2::zeros((0, 0)),
            with_dist.then(|| Array2::zeros((0, 0))),
        )
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.atom_fea.ncols()
    }

    #[inline]
    pub fn feature(&self, row: usize, atom: usize) -> f32 {
        self.atom_fea[[row, atom]]
    }

    #[inline]
    pub fn map_number(&self, atom: usize) -> u32 {
        self.feature(features::MAP_NUMBER, atom) as u32
    }

    #[inline]
    pub fn bond(&self, i: usize, j: usize) -> f32 {
        self.bond_adj[[i, j]]
    }

    /// Bonded neighbors of `atom` with their bond-order values.
    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        (0..self.n_atom).filter_map(move |j| {
            let v = self.bond_adj[[atom, j]];
            (v > 0.0).then_some((j, v))
        })
    }

    /// Map numbers of all real atoms, in index order.
    pub fn map_numbers(&self) -> Vec<u32> {
        (0..self.n_atom).map(|i| self.map_number(i)).collect()
    }

    /// Returns the sub-molecule made of `atoms`, in the given order.
    ///
    /// Passing a full permutation reorders the molecule.
    pub fn select(&self, atoms: &[usize]) -> Self {
        Self {
            n_atom: atoms.len(),
            atom_fea: self.atom_fea.select(Axis(1), atoms),
            bond_adj: select_square(&self.bond_adj, atoms),
            dist_adj: self.dist_adj.as_ref().map(|d| select_square(d, atoms)),
        }
    }

    /// Zero-padded copy with `size` atom slots; `n_atom` is preserved.
    ///
    /// Atoms beyond `size` are dropped.
    pub fn padded(&self, size: usize) -> Self {
        let n = self.n_atom.min(size);
        let mut atom_fea = Array2::zeros((self.atom_fea.nrows(), size));
        atom_fea
            .slice_mut(s![.., ..n])
            .assign(&self.atom_fea.slice(s![.., ..n]));
        Self {
            n_atom: self.n_atom,
            atom_fea,
            bond_adj: pad_square(&self.bond_adj, n, size),
            dist_adj: self.dist_adj.as_ref().map(|d| pad_square(d, n, size)),
        }
    }

    /// Writes `other`'s atoms into slots `n_atom..n_atom + other.n_atom` of a
    /// padded molecule and grows `n_atom`. No bonds are added between the
    /// two parts.
    pub fn append_disconnected(&mut self, other: &MoleculeInfo) {
        let start = self.n_atom;
        let end = start + other.n_atom;
        debug_assert!(end <= self.capacity());
        self.atom_fea
            .slice_mut(s![.., start..end])
            .assign(&other.atom_fea.slice(s![.., ..other.n_atom]));
        self.bond_adj
            .slice_mut(s![start..end, start..end])
            .assign(&other.bond_adj.slice(s![..other.n_atom, ..other.n_atom]));
        if let (Some(dst), Some(src)) = (self.dist_adj.as_mut(), other.dist_adj.as_ref()) {
            dst.slice_mut(s![start..end, start..end])
                .assign(&src.slice(s![..other.n_atom, ..other.n_atom]));
        }
        self.n_atom = end;
    }

    /// Feature row restricted to real atoms.
    pub fn feature_row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.atom_fea.slice(s![row, ..self.n_atom])
    }
}

fn select_square(m: &Array2<f32>, idx: &[usize]) -> Array2<f32> {
    m.select(Axis(0), idx).select(Axis(1), idx)
}

fn pad_square<T: Clone + Default>(m: &Array2<T>, n: usize, size: usize) -> Array2<T> {
    let mut out = Array2::from_elem((size, size), T::default());
    out.slice_mut(s![..n, ..n]).assign(&m.slice(s![..n, ..n]));
    out
}

/// Copies the top-left `min(rows, size)` block of a square matrix into a
/// zeroed `[size, size]` matrix.
pub fn pad_adj<T: Clone + Default>(m: &Array2<T>, size: usize) -> Array2<T> {
    pad_square(m, m.nrows().min(size), size)
}

/// Copies the leading `min(len, size)` entries into a zeroed vector of `size`.
pub fn pad_1d<T: Clone + Default>(v: &[T], size: usize) -> Array1<T> {
    let mut out = Array1::from_elem(size, T::default());
    let n = v.len().min(size);
    out.slice_mut(s![..n]).assign(&ArrayView1::from(&v[..n]));
    out
}

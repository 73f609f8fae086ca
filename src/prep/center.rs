use ndarray::{Array2, Zip, s};

/// Bonds that differ between product and aligned reactant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCenter {
    /// `[n_pro, n_pro]`, symmetric.
    pub mask: Array2<bool>,
    /// Differing bonds, each counted once.
    pub count: usize,
}

impl ReactionCenter {
    pub fn exceeds(&self, cutoff: usize) -> bool {
        self.count > cutoff
    }
}

/// Diffs the top-left `n_pro` block of the reordered reactant adjacency
/// against the product adjacency.
///
/// Both matrices must be at least `n_pro` square; padding beyond `n_pro` is
/// ignored.
pub fn extract(
    product_bond_adj: &Array2<f32>,
    reactant_bond_adj: &Array2<f32>,
    n_pro: usize,
) -> ReactionCenter {
    let mask = Zip::from(product_bond_adj.slice(s![..n_pro, ..n_pro]))
        .and(reactant_bond_adj.slice(s![..n_pro, ..n_pro]))
        .map_collect(|p, r| p != r);
    let count = mask.iter().filter(|&&b| b).count() / 2;
    ReactionCenter { mask, count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn identical_blocks_have_empty_center() {
        let p = array![[0.0, 1.0], [1.0, 0.0]];
        let r = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let center = extract(&p, &r, 2);
        assert_eq!(center.count, 0);
        assert!(!center.exceeds(0));
    }

    #[test]
    fn broken_and_changed_bonds_are_counted_once() {
        let p = array![[0.0, 2.0, 0.0], [2.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let r = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let center = extract(&p, &r, 3);

        assert_eq!(center.count, 2);
        assert_eq!(center.mask, center.mask.t());
        assert!(center.mask[[0, 1]] && center.mask[[1, 2]]);
        assert!(!center.mask[[0, 2]]);
        assert!(center.exceeds(1));
        assert!(!center.exceeds(2));
    }
}

use ndarray::Array2;

use super::align::AlignmentResult;
use super::center::ReactionCenter;
use super::config::Limits;
use super::error::SizeExceeded;
use crate::model::leaving_group::LeavingGroup;
use crate::model::molecule::{MoleculeInfo, features, pad_1d, pad_adj};
use crate::model::record::Record;

/// Offset that recenters a hydrogen-count delta into an unsigned bucket.
const RC_H_OFFSET: i64 = 3;
const RC_H_MAX: i64 = 6;

/// Pads and assembles [`Record`]s.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    limits: Limits,
}

/// A fully checked example waiting for its leaving-group id.
///
/// Producing a draft never touches shared state, so drafts can be built in
/// parallel and committed later in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Registry candidate for this example's leaving group.
    pub group: LeavingGroup,
    record: Record,
}

impl Draft {
    pub fn finish(mut self, lg_id: usize) -> Record {
        self.record.lg_id = lg_id;
        self.record
    }

    pub fn n_product(&self) -> usize {
        self.record.product.n_atom
    }
}

impl RecordBuilder {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn check_product(&self, n: usize) -> Result<(), SizeExceeded> {
        let Limits {
            min_node, max_node, ..
        } = self.limits;
        if n <= min_node || n >= max_node {
            return Err(SizeExceeded::Product {
                n,
                min: min_node,
                max: max_node,
            });
        }
        Ok(())
    }

    /// The upper bound widens by the number of regent atoms.
    pub fn check_reactant(&self, n: usize, n_regents: usize) -> Result<(), SizeExceeded> {
        let min = self.limits.min_node;
        let max = self.limits.max_node + n_regents;
        if n <= min || n >= max {
            return Err(SizeExceeded::Reactant { n, min, max });
        }
        Ok(())
    }

    /// Regents only need slots when they are merged into the product.
    pub fn check_regents(&self, count: usize) -> Result<(), SizeExceeded> {
        if self.limits.known_regents && count > self.limits.max_regents_na {
            return Err(SizeExceeded::Regents {
                count,
                max: self.limits.max_regents_na,
            });
        }
        Ok(())
    }

    /// Runs every bound check and builds all tensors except the id.
    ///
    /// `reactant` must already be permuted by `alignment.order`.
    pub fn prepare(
        &self,
        product: &MoleculeInfo,
        reactant: &MoleculeInfo,
        alignment: &AlignmentResult,
        center: &ReactionCenter,
        rxn_type: Option<u32>,
    ) -> Result<Draft, SizeExceeded> {
        let limits = &self.limits;
        let n_pro = product.n_atom;
        let n_lg = alignment.n_lg;
        let n_regents = alignment.regents_idx.len();
        let size = limits.padded_nodes();

        self.check_product(n_pro)?;
        self.check_reactant(reactant.n_atom, n_regents)?;
        self.check_regents(n_regents)?;
        if n_lg >= limits.max_lg_na {
            return Err(SizeExceeded::LeavingGroup {
                na: n_lg,
                max: limits.max_lg_na,
            });
        }
        let gates = alignment.gate_num.len();
        if gates >= limits.max_gate_num_size {
            return Err(SizeExceeded::Gates {
                count: gates,
                max: limits.max_gate_num_size,
            });
        }

        let mut rc_h = Vec::with_capacity(n_pro);
        for atom in 0..n_pro {
            let bucket = reactant.feature(features::HYDROGENS, atom) as i64
                - product.feature(features::HYDROGENS, atom) as i64
                + RC_H_OFFSET;
            if !(0..=RC_H_MAX).contains(&bucket) {
                return Err(SizeExceeded::ValenceBucket { atom, bucket });
            }
            rc_h.push(bucket);
        }

        let lg_atoms: Vec<usize> = alignment.leaving_group_range().collect();
        let mut lg = reactant.select(&lg_atoms);
        lg.atom_fea.row_mut(features::MAP_NUMBER).fill(0.0);
        let group = LeavingGroup::new(
            &lg,
            alignment.gate_num.clone(),
            alignment.bridge.clone(),
            rxn_type,
            center.count,
        );

        let mut padded_product = product.padded(size);
        if limits.known_regents && n_regents > 0 {
            let regent_atoms: Vec<usize> = alignment.regent_range().collect();
            padded_product.append_disconnected(&reactant.select(&regent_atoms));
        }

        let mut ct_target = Array2::<u8>::zeros((size, limits.max_gate_num_size));
        for gate in 0..gates {
            for atom in 0..n_pro {
                if reactant.bond(n_pro + gate, atom) > 0.0 {
                    ct_target[[atom, gate]] = 1;
                }
            }
        }

        let gate_token: Vec<i64> = alignment.gate_num.iter().map(|&g| g as i64).collect();

        let record = Record {
            product: padded_product,
            lg: lg.padded(limits.max_lg_na),
            rea_bond_adj: pad_adj(&reactant.bond_adj, size),
            rc_h: pad_1d(&rc_h, size),
            rc_target: pad_adj(&center.mask, size),
            rxn_type,
            ct_target,
            gate_token: pad_1d(&gate_token, limits.max_lg_na),
            center_cnt: center.count,
            lg_id: 0,
        };
        Ok(Draft { group, record })
    }

    pub fn build(
        &self,
        product: &MoleculeInfo,
        reactant: &MoleculeInfo,
        alignment: &AlignmentResult,
        center: &ReactionCenter,
        rxn_type: Option<u32>,
        lg_id: usize,
    ) -> Result<Record, SizeExceeded> {
        Ok(self
            .prepare(product, reactant, alignment, center, rxn_type)?
            .finish(lg_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{MoleculeParser, SmilesParser};
    use crate::prep::align::{AlignmentResolver, NoRegents, SpectatorFragments};
    use crate::prep::center;
    use crate::prep::config::PrepConfig;
    use ndarray::s;

    const ESTER: &str =
        "[CH3:1][O:2][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1.[OH2:11]";
    const ACID: &str = "[OH:11][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1";

    struct Case {
        product: MoleculeInfo,
        reordered: MoleculeInfo,
        alignment: AlignmentResult,
        center: ReactionCenter,
    }

    fn case(resolver: &AlignmentResolver, product: &str, reactant: &str) -> Case {
        let product_mol = SmilesParser.parse(product, false, true).unwrap();
        let reactant_mol = SmilesParser.parse(reactant, false, true).unwrap();
        let alignment = resolver.resolve(&product_mol, &reactant_mol, reactant).unwrap();
        let reordered = reactant_mol.select(&alignment.order);
        let center =
            center::extract(&product_mol.bond_adj, &reordered.bond_adj, product_mol.n_atom);
        Case {
            product: product_mol,
            reordered,
            alignment,
            center,
        }
    }

    fn builder(config: PrepConfig) -> RecordBuilder {
        RecordBuilder::new(config.limits())
    }

    fn prepare(b: &RecordBuilder, c: &Case) -> Result<Draft, SizeExceeded> {
        b.prepare(&c.product, &c.reordered, &c.alignment, &c.center, Some(1))
    }

    #[test]
    fn ester_record_shapes_and_targets() {
        let config = PrepConfig {
            max_node: 20,
            max_lg_na: 5,
            ..PrepConfig::default()
        };
        let c = case(&AlignmentResolver::new(NoRegents), ACID, ESTER);
        let record = builder(config)
            .build(&c.product, &c.reordered, &c.alignment, &c.center, Some(1), 7)
            .unwrap();

        assert_eq!(record.lg_id, 7);
        assert_eq!(record.center_cnt, 1);
        assert_eq!(record.marked_center_bonds(), 1);
        assert_eq!(record.product.n_atom, 9);
        assert_eq!(record.product.atom_fea.dim(), (features::FEATURE_DIM, 20));
        assert_eq!(record.rea_bond_adj.dim(), (20, 20));
        assert_eq!(record.rc_target.dim(), (20, 20));
        assert_eq!(record.ct_target.dim(), (20, 4));
        assert_eq!(record.gate_token.len(), 5);
        assert_eq!(record.rc_h.len(), 20);

        assert_eq!(record.lg.n_atom, 2);
        assert_eq!(record.lg.atom_fea.dim(), (features::FEATURE_DIM, 5));
        assert_eq!(record.lg.feature(features::ATOMIC_NUMBER, 0), 8.0);
        assert_eq!(record.lg.feature(features::ATOMIC_NUMBER, 1), 6.0);
        assert!(record.lg.feature_row(features::MAP_NUMBER).iter().all(|m| *m == 0.0));

        assert_eq!(record.gate_token.to_vec(), vec![1, 0, 0, 0, 0]);
        // The leaving O (reordered index 9) was bonded to C3 (product index 1).
        let gate_col: Vec<u8> = record.ct_target.column(0).to_vec();
        assert_eq!(gate_col.iter().map(|&v| v as usize).sum::<usize>(), 1);
        assert_eq!(gate_col[1], 1);
        // Water lost one hydrogen to become the acid OH.
        assert_eq!(record.rc_h[0], 4);
        assert!(record.rc_h.slice(s![1..9]).iter().all(|&h| h == 3));
        assert!(record.rc_h.slice(s![9..]).iter().all(|&h| h == 0));
        assert!(record.rc_target[[0, 1]] && record.rc_target[[1, 0]]);
    }

    #[test]
    fn padding_is_zero_beyond_real_sizes() {
        let c = case(&AlignmentResolver::new(NoRegents), ACID, ESTER);
        let record = builder(PrepConfig::default())
            .build(&c.product, &c.reordered, &c.alignment, &c.center, None, 0)
            .unwrap();

        assert!(record.product.atom_fea.slice(s![.., 9..]).iter().all(|v| *v == 0.0));
        assert!(record.rea_bond_adj.slice(s![11.., ..]).iter().all(|v| *v == 0.0));
        assert!(record.rc_target.slice(s![9.., ..]).iter().all(|v| !*v));
        assert!(record.ct_target.slice(s![9.., ..]).iter().all(|v| *v == 0));
        assert!(record.lg.bond_adj.slice(s![2.., ..]).iter().all(|v| *v == 0.0));
        assert_eq!(record.rxn_type, None);
    }

    #[test]
    fn product_bounds_are_exclusive() {
        let b = builder(PrepConfig {
            min_node: 3,
            max_node: 10,
            ..PrepConfig::default()
        });
        assert!(b.check_product(3).is_err());
        assert!(b.check_product(4).is_ok());
        assert!(b.check_product(9).is_ok());
        assert_eq!(
            b.check_product(10),
            Err(SizeExceeded::Product { n: 10, min: 3, max: 10 })
        );
        assert!(b.check_reactant(11, 2).is_ok());
        assert!(b.check_reactant(12, 2).is_err());
    }

    #[test]
    fn leaving_group_size_bound() {
        let c = case(&AlignmentResolver::new(NoRegents), ACID, ESTER);
        let accept = builder(PrepConfig {
            max_lg_na: 3,
            ..PrepConfig::default()
        });
        assert!(prepare(&accept, &c).is_ok());

        let reject = builder(PrepConfig {
            max_lg_na: 2,
            ..PrepConfig::default()
        });
        assert_eq!(
            prepare(&reject, &c).unwrap_err(),
            SizeExceeded::LeavingGroup { na: 2, max: 2 }
        );
    }

    #[test]
    fn gate_count_bound() {
        let c = case(&AlignmentResolver::new(NoRegents), ACID, ESTER);
        let b = builder(PrepConfig {
            max_gate_num_size: 1,
            ..PrepConfig::default()
        });
        assert_eq!(
            prepare(&b, &c).unwrap_err(),
            SizeExceeded::Gates { count: 1, max: 1 }
        );
    }

    #[test]
    fn hydrogen_bucket_out_of_range_is_dropped() {
        // Four hydrogens appear on a product carbon that had none.
        let c = case(
            &AlignmentResolver::new(NoRegents),
            "[CH4:1].[CH3:2][CH3:3][CH3:4]",
            "[C:1].[CH3:2][CH3:3][CH3:4]",
        );
        let err = prepare(&builder(PrepConfig::default()), &c).unwrap_err();
        assert_eq!(err, SizeExceeded::ValenceBucket { atom: 0, bucket: -1 });
    }

    #[test]
    fn known_regents_are_merged_into_product() {
        let reactant = "[CH3:1][O:2][C:3](=O)[CH3:4].[Na+].[OH-]";
        let product = "[CH3:1][CH2:3][OH:2].[CH4:4]";
        let c = case(&AlignmentResolver::new(SpectatorFragments), product, reactant);
        let config = PrepConfig {
            known_regents: true,
            max_regents_na: 4,
            max_node: 10,
            ..PrepConfig::default()
        };
        let record = builder(config)
            .build(&c.product, &c.reordered, &c.alignment, &c.center, None, 0)
            .unwrap();

        assert_eq!(record.product.capacity(), 14);
        assert_eq!(record.product.n_atom, 6);
        assert_eq!(record.product.feature(features::ATOMIC_NUMBER, 4), 11.0);
        assert_eq!(record.product.feature(features::ATOMIC_NUMBER, 5), 8.0);
        assert_eq!(record.product.bond(3, 4), 0.0);

        let tight = builder(PrepConfig {
            known_regents: true,
            max_regents_na: 1,
            max_node: 10,
            ..PrepConfig::default()
        });
        assert_eq!(
            prepare(&tight, &c).unwrap_err(),
            SizeExceeded::Regents { count: 2, max: 1 }
        );
    }
}

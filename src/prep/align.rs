use std::collections::{HashMap, HashSet};

use super::config::DatasetType;
use super::error::{AlignmentError, Side};
use crate::model::leaving_group::{Bridge, BridgeBond};
use crate::model::molecule::MoleculeInfo;
use crate::model::types::BondOrder;
use crate::parse::atom_map_numbers;

/// Where every reactant atom goes once product and reactant are aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentResult {
    /// Permutation of reactant indices: product-mapped atoms in product
    /// order, then leaving-group attachment atoms, then the remaining
    /// leaving-group atoms, then regents.
    pub order: Vec<usize>,
    pub n_pro: usize,
    pub n_lg: usize,
    /// Scaffold bonds per attachment atom, in gate order.
    pub gate_num: Vec<u32>,
    pub bridge: Bridge,
    /// Reactant indices of spectator atoms, ascending.
    pub regents_idx: Vec<usize>,
}

impl AlignmentResult {
    /// Reordered positions holding the leaving group.
    pub fn leaving_group_range(&self) -> std::ops::Range<usize> {
        self.n_pro..self.n_pro + self.n_lg
    }

    /// Reordered positions holding regents.
    pub fn regent_range(&self) -> std::ops::Range<usize> {
        self.n_pro + self.n_lg..self.order.len()
    }
}

/// Picks out spectator atoms that belong to neither the product nor the
/// leaving group.
pub trait RegentStrategy: Send + Sync {
    /// Returns reactant atom indices, ascending.
    fn regents(
        &self,
        product: &MoleculeInfo,
        reactant: &MoleculeInfo,
        reactant_smiles: &str,
    ) -> Result<Vec<usize>, AlignmentError>;
}

/// Every unmapped reactant atom belongs to the leaving group.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegents;

impl RegentStrategy for NoRegents {
    fn regents(
        &self,
        _product: &MoleculeInfo,
        _reactant: &MoleculeInfo,
        _reactant_smiles: &str,
    ) -> Result<Vec<usize>, AlignmentError> {
        Ok(Vec::new())
    }
}

/// Treats every dot-separated reactant fragment that shares no atom-map
/// number with the product as a regent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectatorFragments;

impl RegentStrategy for SpectatorFragments {
    fn regents(
        &self,
        product: &MoleculeInfo,
        reactant: &MoleculeInfo,
        reactant_smiles: &str,
    ) -> Result<Vec<usize>, AlignmentError> {
        let product_maps: HashSet<u32> = product
            .map_numbers()
            .into_iter()
            .filter(|&m| m > 0)
            .collect();

        let mut regents = Vec::new();
        let mut offset = 0;
        for fragment in reactant_smiles.split('.').filter(|f| !f.is_empty()) {
            let maps = atom_map_numbers(fragment).map_err(AlignmentError::Fragment)?;
            if !maps.iter().any(|m| product_maps.contains(m)) {
                regents.extend(offset..offset + maps.len());
            }
            offset += maps.len();
        }

        if offset != reactant.n_atom {
            return Err(AlignmentError::FragmentMismatch {
                fragments: offset,
                atoms: reactant.n_atom,
            });
        }
        Ok(regents)
    }
}

/// Computes reactant atom orderings from shared atom-map numbers.
pub struct AlignmentResolver {
    strategy: Box<dyn RegentStrategy>,
}

impl std::fmt::Debug for AlignmentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentResolver").finish_non_exhaustive()
    }
}

impl AlignmentResolver {
    pub fn new(strategy: impl RegentStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    pub fn for_dataset(dataset: DatasetType) -> Self {
        if dataset.has_regents() {
            Self::new(SpectatorFragments)
        } else {
            Self::new(NoRegents)
        }
    }

    pub fn resolve(
        &self,
        product: &MoleculeInfo,
        reactant: &MoleculeInfo,
        reactant_smiles: &str,
    ) -> Result<AlignmentResult, AlignmentError> {
        let n_pro = product.n_atom;
        let n_rea = reactant.n_atom;

        let mut product_index = HashMap::with_capacity(n_pro);
        for index in 0..n_pro {
            let map_number = product.map_number(index);
            if map_number == 0 {
                return Err(AlignmentError::UnmappedProductAtom { index });
            }
            if product_index.insert(map_number, index).is_some() {
                return Err(AlignmentError::DuplicateMap {
                    map_number,
                    side: Side::Product,
                });
            }
        }

        let mut slots: Vec<Option<usize>> = vec![None; n_pro];
        let mut unmatched = Vec::new();
        for r in 0..n_rea {
            let map_number = reactant.map_number(r);
            match product_index.get(&map_number) {
                Some(&p) => {
                    if slots[p].replace(r).is_some() {
                        return Err(AlignmentError::DuplicateMap {
                            map_number,
                            side: Side::Reactant,
                        });
                    }
                }
                _ => unmatched.push(r),
            }
        }
        let scaffold = slots
            .into_iter()
            .enumerate()
            .map(|(p, slot)| {
                slot.ok_or(AlignmentError::MissingMap {
                    map_number: product.map_number(p),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regents_idx = self
            .strategy
            .regents(product, reactant, reactant_smiles)?;
        if let Some(&index) = regents_idx
            .iter()
            .find(|&&r| product_index.contains_key(&reactant.map_number(r)))
        {
            return Err(AlignmentError::RegentOverlap { index });
        }

        let mut in_scaffold = vec![false; n_rea];
        for &r in &scaffold {
            in_scaffold[r] = true;
        }
        let is_regent: HashSet<usize> = regents_idx.iter().copied().collect();

        let mut gate_num = Vec::new();
        let mut bridge = Bridge::new();
        let mut attachments = Vec::new();
        let mut interior = Vec::new();
        for r in unmatched.into_iter().filter(|r| !is_regent.contains(r)) {
            let gates: Vec<BridgeBond> = reactant
                .neighbors(r)
                .filter(|&(j, _)| in_scaffold[j])
                .filter_map(|(j, v)| {
                    BondOrder::from_value(v).map(|order| BridgeBond {
                        map_number: reactant.map_number(j),
                        order,
                    })
                })
                .collect();
            if gates.is_empty() {
                interior.push(r);
            } else {
                gate_num.push(gates.len() as u32);
                bridge.extend(gates);
                attachments.push(r);
            }
        }

        let n_lg = attachments.len() + interior.len();
        let mut order = scaffold;
        order.extend(attachments);
        order.extend(interior);
        order.extend(regents_idx.iter().copied());

        Ok(AlignmentResult {
            order,
            n_pro,
            n_lg,
            gate_num,
            bridge,
            regents_idx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{MoleculeParser, SmilesParser};

    const ESTER: &str =
        "[CH3:1][O:2][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1.[OH2:11]";
    const ACID: &str = "[OH:11][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1";

    fn mol(smiles: &str) -> MoleculeInfo {
        SmilesParser.parse(smiles, false, true).unwrap()
    }

    fn resolve(product: &str, reactant: &str) -> Result<AlignmentResult, AlignmentError> {
        AlignmentResolver::new(NoRegents).resolve(&mol(product), &mol(reactant), reactant)
    }

    fn assert_permutation(order: &[usize], n: usize) {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn ester_hydrolysis_alignment() {
        let product = mol(ACID);
        let reactant = mol(ESTER);
        let result = AlignmentResolver::new(NoRegents)
            .resolve(&product, &reactant, ESTER)
            .unwrap();

        assert_permutation(&result.order, reactant.n_atom);
        assert_eq!(result.n_pro, 9);
        assert_eq!(result.n_lg, 2);
        for (p, &r) in result.order[..result.n_pro].iter().enumerate() {
            assert_eq!(reactant.map_number(r), product.map_number(p));
        }
        // O2 gates to C3; C1 hangs off O2.
        assert_eq!(&result.order[9..], &[1, 0]);
        assert_eq!(result.gate_num, vec![1]);
        assert_eq!(
            result.bridge,
            vec![BridgeBond {
                map_number: 3,
                order: BondOrder::Single
            }]
        );
        assert!(result.regents_idx.is_empty());
    }

    #[test]
    fn unmapped_product_atom_is_rejected() {
        let err = resolve("[OH:4][C:3](=O)C", "[CH3:1][O:2][C:3](=[O:4])C").unwrap_err();
        assert_eq!(err, AlignmentError::UnmappedProductAtom { index: 2 });
    }

    #[test]
    fn duplicate_maps_are_rejected() {
        assert_eq!(
            resolve("[CH3:1][OH:1]", "[CH3:1][OH:2]").unwrap_err(),
            AlignmentError::DuplicateMap {
                map_number: 1,
                side: Side::Product
            }
        );
        assert_eq!(
            resolve("[CH3:1][OH:2]", "[CH3:1][OH:2].[CH4:1]").unwrap_err(),
            AlignmentError::DuplicateMap {
                map_number: 1,
                side: Side::Reactant
            }
        );
    }

    #[test]
    fn product_map_missing_from_reactant() {
        assert_eq!(
            resolve("[CH3:1][OH:5]", "[CH3:1][OH:2]").unwrap_err(),
            AlignmentError::MissingMap { map_number: 5 }
        );
    }

    #[test]
    fn attachment_atoms_precede_interior_atoms() {
        // Leaving chain C-C-O where only the O (index 3) touches the scaffold.
        let result = resolve("[CH3:1][CH3:2]", "[CH2:1]([CH3:2])OCC").unwrap();
        assert_eq!(result.n_lg, 3);
        assert_eq!(&result.order[2..], &[2, 3, 4]);

        let result = resolve("[CH3:1][CH3:2]", "CC[O][CH2:1][CH3:2]").unwrap();
        assert_eq!(&result.order[..2], &[3, 4]);
        assert_eq!(&result.order[2..], &[2, 0, 1]);
        assert_eq!(result.gate_num, vec![1]);
    }

    #[test]
    fn ring_closure_gate_counts_both_bonds() {
        // The leaving O bridges two scaffold carbons.
        let result = resolve("[CH3:1][CH3:2]", "[CH2:1]1[CH2:2]O1").unwrap();
        assert_eq!(result.gate_num, vec![2]);
        let maps: Vec<u32> = result.bridge.iter().map(|b| b.map_number).collect();
        assert_eq!(maps, vec![1, 2]);
    }

    #[test]
    fn spectator_fragments_become_regents() {
        let reactant_smiles = "[CH3:1][O:2][C:3](=O)C.[Na+].[OH-]";
        let product = mol("[CH3:1][OH:2]");
        let reactant = mol(reactant_smiles);
        let result = AlignmentResolver::for_dataset(DatasetType::Mit)
            .resolve(&product, &reactant, reactant_smiles)
            .unwrap();

        assert_eq!(result.regents_idx, vec![5, 6]);
        assert_eq!(result.n_lg, 3);
        assert_eq!(&result.order[result.regent_range()], &[5, 6]);
        assert_permutation(&result.order, reactant.n_atom);
    }

    #[test]
    fn fragment_count_mismatch_is_reported() {
        let product = mol("[CH3:1][OH:2]");
        let reactant = mol("[CH3:1][OH:2].C");
        let err = SpectatorFragments
            .regents(&product, &reactant, "[CH3:1][OH:2]")
            .unwrap_err();
        assert_eq!(
            err,
            AlignmentError::FragmentMismatch {
                fragments: 2,
                atoms: 3
            }
        );
    }
}

use std::collections::BTreeMap;

use retro_forge::model::molecule::features::{ATOMIC_NUMBER, HYDROGENS};
use retro_forge::{Element, LeavingGroup};

/// Hill-order formula of a leaving group, hydrogens included.
pub fn hill_formula(group: &LeavingGroup) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut hydrogens = 0usize;

    for atom in 0..group.na {
        let z = group.atom_fea[[ATOMIC_NUMBER, atom]] as u8;
        let symbol = Element::from_atomic_number(z).map_or("?", |e| e.symbol());
        *counts.entry(symbol).or_insert(0) += 1;
        hydrogens += group.atom_fea[[HYDROGENS, atom]].max(0.0) as usize;
    }
    if hydrogens > 0 {
        *counts.entry("H").or_insert(0) += hydrogens;
    }

    let mut out = String::new();
    let mut push = |symbol: &str, n: usize| {
        out.push_str(symbol);
        if n > 1 {
            out.push_str(&n.to_string());
        }
    };

    if let Some(c) = counts.remove("C") {
        push("C", c);
        if let Some(h) = counts.remove("H") {
            push("H", h);
        }
    }
    for (symbol, n) in counts {
        push(symbol, n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use retro_forge::MoleculeInfo;
    use retro_forge::model::molecule::features::FEATURE_DIM;

    fn group(atoms: &[(f32, f32)]) -> LeavingGroup {
        let mut fea = Array2::zeros((FEATURE_DIM, atoms.len()));
        for (i, (z, h)) in atoms.iter().enumerate() {
            fea[[ATOMIC_NUMBER, i]] = *z;
            fea[[HYDROGENS, i]] = *h;
        }
        let bonds = Array2::zeros((atoms.len(), atoms.len()));
        LeavingGroup::new(&MoleculeInfo::new(fea, bonds, None), vec![1], vec![], None, 0)
    }

    #[test]
    fn methoxy() {
        assert_eq!(hill_formula(&group(&[(8.0, 0.0), (6.0, 3.0)])), "CH3O");
    }

    #[test]
    fn carbon_free_groups_are_alphabetical() {
        assert_eq!(hill_formula(&group(&[(17.0, 0.0)])), "Cl");
        assert_eq!(hill_formula(&group(&[(8.0, 1.0)])), "HO");
        assert_eq!(hill_formula(&group(&[(11.0, 0.0), (35.0, 0.0)])), "BrNa");
    }
}

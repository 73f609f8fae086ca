use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

/// Randomly permutes the atom-map numbers shared by a reaction's two sides.
///
/// The same bijection is applied to `reactant` and `product`, so every
/// mapped pair stays paired and unmapped atoms stay unmapped. Only the
/// `:<n>]` suffix of bracket atoms is rewritten; everything else is copied
/// verbatim.
pub fn shuffle_map_numbers<R: Rng + ?Sized>(
    reactant: &str,
    product: &str,
    rng: &mut R,
) -> (String, String) {
    let mut seen = Vec::new();
    for side in [product, reactant] {
        rewrite_maps(side, |n| {
            if !seen.contains(&n) {
                seen.push(n);
            }
            n
        });
    }

    let mut shuffled = seen.clone();
    shuffled.shuffle(rng);
    let mapping: HashMap<u32, u32> = seen.into_iter().zip(shuffled).collect();
    let remap = |n: u32| mapping.get(&n).copied().unwrap_or(n);

    (rewrite_maps(reactant, remap), rewrite_maps(product, remap))
}

/// Copies `smiles`, passing every non-zero bracket map number through `f`.
fn rewrite_maps(smiles: &str, mut f: impl FnMut(u32) -> u32) -> String {
    let mut out = String::with_capacity(smiles.len() + 8);
    let mut rest = smiles;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        rest = &rest[open..];
        let Some(close) = rest.find(']') else {
            break;
        };
        let atom = &rest[..close];
        match atom.rfind(':') {
            Some(colon) => match atom[colon + 1..].parse::<u32>() {
                Ok(n) if n > 0 => {
                    out.push_str(&atom[..=colon]);
                    out.push_str(&f(n).to_string());
                }
                _ => out.push_str(atom),
            },
            None => out.push_str(atom),
        }
        out.push(']');
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::atom_map_numbers;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const REACTANT: &str = "[CH3:1][O:2][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1.[OH2:11]";
    const PRODUCT: &str = "[OH:11][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1";

    #[test]
    fn rewrite_is_identity_for_identity_map() {
        assert_eq!(rewrite_maps(REACTANT, |n| n), REACTANT);
        assert_eq!(rewrite_maps("CC(=O)O", |n| n + 1), "CC(=O)O");
    }

    #[test]
    fn rewrite_only_touches_map_suffix() {
        assert_eq!(rewrite_maps("[13CH3:2][NH4+:10]O", |n| n * 3), "[13CH3:6][NH4+:30]O");
    }

    #[test]
    fn shuffle_keeps_pairs_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let (rea, pro) = shuffle_map_numbers(REACTANT, PRODUCT, &mut rng);

        let old_rea = atom_map_numbers(REACTANT).unwrap();
        let old_pro = atom_map_numbers(PRODUCT).unwrap();
        let new_rea = atom_map_numbers(&rea).unwrap();
        let new_pro = atom_map_numbers(&pro).unwrap();

        let mut sorted = new_rea.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=11).collect::<Vec<_>>());

        // Same old number on both sides must land on the same new number.
        for (i, old) in old_pro.iter().enumerate() {
            let j = old_rea.iter().position(|m| m == old).unwrap();
            assert_eq!(new_pro[i], new_rea[j]);
        }
    }

    #[test]
    fn shuffle_is_seed_deterministic() {
        let a = shuffle_map_numbers(REACTANT, PRODUCT, &mut StdRng::seed_from_u64(3));
        let b = shuffle_map_numbers(REACTANT, PRODUCT, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}

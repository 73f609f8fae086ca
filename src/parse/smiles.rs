use std::collections::{BTreeMap, VecDeque};

use ndarray::Array2;

use super::error::ParseError;
use crate::model::molecule::{MoleculeInfo, features};
use crate::model::types::{BondOrder, Element};

#[derive(Debug, Clone)]
struct Atom {
    element: Element,
    aromatic: bool,
    charge: i8,
    /// Explicit count for bracket atoms; `None` means "derive from valence".
    hydrogens: Option<u8>,
    map_number: u32,
}

#[derive(Debug, Clone, Copy)]
struct Bond {
    a: usize,
    b: usize,
    order: BondOrder,
}

/// Atom/bond graph read from one SMILES string. Dot-separated fragments
/// share a single graph with no bonds between them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Graph {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl Graph {
    pub(crate) fn parse(smiles: &str) -> Result<Self, ParseError> {
        if smiles.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let mut reader = Reader::new(smiles.trim());
        reader.read()?;
        reader.finish()
    }

    pub(crate) fn map_numbers(&self) -> Vec<u32> {
        self.atoms.iter().map(|a| a.map_number).collect()
    }

    fn degree(&self) -> Vec<usize> {
        let mut degree = vec![0; self.atoms.len()];
        for bond in &self.bonds {
            degree[bond.a] += 1;
            degree[bond.b] += 1;
        }
        degree
    }

    fn hydrogen_count(&self, idx: usize, degree: usize, valence_used: f32) -> u8 {
        let atom = &self.atoms[idx];
        if let Some(h) = atom.hydrogens {
            return h;
        }
        let valences = atom.element.default_valences();
        if atom.aromatic {
            // One valence unit goes to the delocalized system.
            return valences
                .first()
                .map(|&v| (v as usize).saturating_sub(degree + 1) as u8)
                .unwrap_or(0);
        }
        let used = valence_used.round() as u8;
        valences
            .iter()
            .find(|&&v| v >= used)
            .map(|&v| v - used)
            .unwrap_or(0)
    }

    /// Lowers the graph into feature and adjacency tensors.
    pub(crate) fn into_molecule(self, calc_dist: bool) -> MoleculeInfo {
        let n = self.atoms.len();
        let mut bond_adj = Array2::<f32>::zeros((n, n));
        let mut valence_used = vec![0.0f32; n];
        for bond in &self.bonds {
            let v = bond.order.value();
            bond_adj[[bond.a, bond.b]] = v;
            bond_adj[[bond.b, bond.a]] = v;
            valence_used[bond.a] += v;
            valence_used[bond.b] += v;
        }

        let degree = self.degree();
        let mut atom_fea = Array2::<f32>::zeros((features::FEATURE_DIM, n));
        for (i, atom) in self.atoms.iter().enumerate() {
            let h = self.hydrogen_count(i, degree[i], valence_used[i]);
            atom_fea[[features::MAP_NUMBER, i]] = atom.map_number as f32;
            atom_fea[[features::ATOMIC_NUMBER, i]] = atom.element.atomic_number() as f32;
            atom_fea[[features::FORMAL_CHARGE, i]] = atom.charge as f32;
            atom_fea[[features::HYDROGENS, i]] = h as f32;
            atom_fea[[features::AROMATIC, i]] = if atom.aromatic { 1.0 } else { 0.0 };
            atom_fea[[features::DEGREE, i]] = degree[i] as f32;
        }

        let dist_adj = calc_dist.then(|| self.topological_distances());
        MoleculeInfo::new(atom_fea, bond_adj, dist_adj)
    }

    /// All-pairs bond-count distances; unreachable pairs stay 0.
    fn topological_distances(&self) -> Array2<f32> {
        let n = self.atoms.len();
        let mut adjacency = vec![Vec::new(); n];
        for bond in &self.bonds {
            adjacency[bond.a].push(bond.b);
            adjacency[bond.b].push(bond.a);
        }

        let mut dist = Array2::<f32>::zeros((n, n));
        let mut queue = VecDeque::new();
        for source in 0..n {
            let mut seen = vec![false; n];
            seen[source] = true;
            queue.push_back((source, 0u32));
            while let Some((atom, d)) = queue.pop_front() {
                dist[[source, atom]] = d as f32;
                for &next in &adjacency[atom] {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back((next, d + 1));
                    }
                }
            }
        }
        dist
    }
}

/// Atom-map numbers of every atom in `smiles`, in atom order; 0 for
/// unmapped atoms.
pub fn atom_map_numbers(smiles: &str) -> Result<Vec<u32>, ParseError> {
    Graph::parse(smiles).map(|g| g.map_numbers())
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    graph: Graph,
    open_rings: BTreeMap<u16, (usize, Option<BondOrder>)>,
    branches: Vec<usize>,
    prev: Option<usize>,
    pending: Option<BondOrder>,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            graph: Graph::default(),
            open_rings: BTreeMap::new(),
            branches: Vec::new(),
            prev: None,
            pending: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn expect_byte(&mut self, context: &'static str) -> Result<u8, ParseError> {
        self.bump().ok_or(ParseError::UnexpectedEnd { context })
    }

    fn read(&mut self) -> Result<(), ParseError> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    let prev = self.prev.ok_or(ParseError::dangling("branch", self.pos))?;
                    self.branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    self.prev = Some(self.branches.pop().ok_or(ParseError::UnbalancedBranch)?);
                    self.pending = None;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b':' | b'/' | b'\\' => {
                    if self.prev.is_none() {
                        return Err(ParseError::dangling("bond", self.pos));
                    }
                    self.pending = Some(match ch {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pos += 1;
                }
                b'.' => {
                    self.prev = None;
                    self.pending = None;
                    self.pos += 1;
                }
                b'%' => {
                    self.pos += 1;
                    let hi = self.ring_digit()?;
                    let lo = self.ring_digit()?;
                    self.ring_bond(hi * 10 + lo)?;
                }
                b'0'..=b'9' => {
                    self.pos += 1;
                    self.ring_bond((ch - b'0') as u16)?;
                }
                b'[' => self.bracket_atom()?,
                _ => self.organic_atom()?,
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Graph, ParseError> {
        if !self.open_rings.is_empty() {
            return Err(ParseError::UnclosedRing(
                self.open_rings.keys().copied().collect(),
            ));
        }
        if !self.branches.is_empty() {
            return Err(ParseError::UnbalancedBranch);
        }
        Ok(self.graph)
    }

    fn ring_digit(&mut self) -> Result<u16, ParseError> {
        let pos = self.pos;
        match self.expect_byte("ring number")? {
            d @ b'0'..=b'9' => Ok((d - b'0') as u16),
            other => Err(ParseError::unexpected(other, pos)),
        }
    }

    fn ring_bond(&mut self, ring: u16) -> Result<(), ParseError> {
        let current = self
            .prev
            .ok_or(ParseError::dangling("ring closure", self.pos))?;
        let pending = self.pending.take();
        match self.open_rings.remove(&ring) {
            Some((open, open_order)) => {
                let order = pending
                    .or(open_order)
                    .unwrap_or_else(|| self.default_order(open, current));
                self.graph.bonds.push(Bond {
                    a: open,
                    b: current,
                    order,
                });
            }
            None => {
                self.open_rings.insert(ring, (current, pending));
            }
        }
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.graph.atoms[a].aromatic && self.graph.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn push_atom(&mut self, atom: Atom) {
        let idx = self.graph.atoms.len();
        self.graph.atoms.push(atom);
        if let Some(prev) = self.prev {
            let order = self
                .pending
                .take()
                .unwrap_or_else(|| self.default_order(prev, idx));
            self.graph.bonds.push(Bond {
                a: prev,
                b: idx,
                order,
            });
        }
        self.pending = None;
        self.prev = Some(idx);
    }

    fn organic_atom(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let ch = self.expect_byte("atom")?;
        let (element, aromatic) = match (ch, self.peek()) {
            (b'B', Some(b'r')) => {
                self.pos += 1;
                (Element::Br, false)
            }
            (b'C', Some(b'l')) => {
                self.pos += 1;
                (Element::Cl, false)
            }
            (b'B', _) => (Element::B, false),
            (b'C', _) => (Element::C, false),
            (b'N', _) => (Element::N, false),
            (b'O', _) => (Element::O, false),
            (b'P', _) => (Element::P, false),
            (b'S', _) => (Element::S, false),
            (b'F', _) => (Element::F, false),
            (b'I', _) => (Element::I, false),
            (b'b', _) => (Element::B, true),
            (b'c', _) => (Element::C, true),
            (b'n', _) => (Element::N, true),
            (b'o', _) => (Element::O, true),
            (b'p', _) => (Element::P, true),
            (b's', _) => (Element::S, true),
            (other, _) => return Err(ParseError::unexpected(other, start)),
        };
        self.push_atom(Atom {
            element,
            aromatic,
            charge: 0,
            hydrogens: None,
            map_number: 0,
        });
        Ok(())
    }

    fn bracket_atom(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let _isotope = self.number();
        let (element, aromatic) = self.bracket_symbol()?;
        self.chirality();

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.pos += 1;
            let pos = self.pos;
            hydrogens = match self.number() {
                Some(n) => u8::try_from(n)
                    .map_err(|_| ParseError::out_of_range("hydrogen count", pos))?,
                None => 1,
            };
        }

        let charge = self.charge()?;

        let mut map_number = 0;
        if self.peek() == Some(b':') {
            self.pos += 1;
            let pos = self.pos;
            map_number = match self.number() {
                Some(n) => n,
                None => return Err(ParseError::unexpected(self.expect_byte("atom map")?, pos)),
            };
        }

        let pos = self.pos;
        match self.expect_byte("bracket atom")? {
            b']' => {}
            other => return Err(ParseError::unexpected(other, pos)),
        }

        self.push_atom(Atom {
            element,
            aromatic,
            charge,
            hydrogens: Some(hydrogens),
            map_number,
        });
        Ok(())
    }

    fn bracket_symbol(&mut self) -> Result<(Element, bool), ParseError> {
        let start = self.pos;
        let first = self.expect_byte("bracket atom")?;
        let aromatic = first.is_ascii_lowercase();
        let head = first.to_ascii_uppercase() as char;

        let two_letter = self.peek().filter(u8::is_ascii_lowercase).and_then(|next| {
            let symbol = format!("{head}{}", next as char);
            symbol.parse::<Element>().ok()
        });
        let element = match two_letter {
            Some(e) => {
                self.pos += 1;
                e
            }
            None => head
                .to_string()
                .parse::<Element>()
                .map_err(|_| ParseError::UnknownElement {
                    symbol: (first as char).to_string(),
                    pos: start,
                })?,
        };

        if aromatic && !element.can_be_aromatic() {
            return Err(ParseError::NonAromaticElement {
                symbol: element.symbol().to_lowercase(),
                pos: start,
            });
        }
        Ok((element, aromatic))
    }

    /// Stereo marks carry no information for the tensors and are skipped.
    fn chirality(&mut self) {
        if self.peek() != Some(b'@') {
            return;
        }
        while self.peek() == Some(b'@') {
            self.pos += 1;
        }
        let class = [self.peek(), self.peek_at(1)];
        if matches!(
            class,
            [Some(b'T'), Some(b'H')]
                | [Some(b'A'), Some(b'L')]
                | [Some(b'S'), Some(b'P')]
                | [Some(b'T'), Some(b'B')]
                | [Some(b'O'), Some(b'H')]
        ) && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())
        {
            self.pos += 2;
            self.number();
        }
    }

    fn charge(&mut self) -> Result<i8, ParseError> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let start = self.pos;
        let symbol = self.input[start];
        self.pos += 1;
        if let Some(n) = self.number() {
            let n = i8::try_from(n).map_err(|_| ParseError::out_of_range("charge", start))?;
            return Ok(sign * n);
        }
        let mut count = 1i8;
        while self.peek() == Some(symbol) {
            self.pos += 1;
            count = count
                .checked_add(1)
                .ok_or_else(|| ParseError::out_of_range("charge", start))?;
        }
        Ok(sign * count)
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut n: u32 = 0;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            n = n.saturating_mul(10).saturating_add((d - b'0') as u32);
            self.pos += 1;
        }
        (self.pos > start).then_some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::features::*;

    fn parse(smiles: &str) -> MoleculeInfo {
        Graph::parse(smiles).unwrap().into_molecule(true)
    }

    fn row(mol: &MoleculeInfo, r: usize) -> Vec<f32> {
        mol.feature_row(r).to_vec()
    }

    #[test]
    fn ethanol_implicit_hydrogens() {
        let mol = parse("CCO");
        assert_eq!(mol.n_atom, 3);
        assert_eq!(row(&mol, ATOMIC_NUMBER), vec![6.0, 6.0, 8.0]);
        assert_eq!(row(&mol, HYDROGENS), vec![3.0, 2.0, 1.0]);
        assert_eq!(row(&mol, DEGREE), vec![1.0, 2.0, 1.0]);
        assert_eq!(mol.bond(0, 1), 1.0);
        assert_eq!(mol.bond(0, 2), 0.0);
    }

    #[test]
    fn double_and_triple_bonds() {
        let mol = parse("C=CC#N");
        assert_eq!(mol.bond(0, 1), 2.0);
        assert_eq!(mol.bond(2, 3), 3.0);
        assert_eq!(row(&mol, HYDROGENS), vec![2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn benzene_ring_is_aromatic() {
        let mol = parse("c1ccccc1");
        assert_eq!(mol.n_atom, 6);
        assert_eq!(mol.bond(0, 5), 1.5);
        assert_eq!(mol.bond(0, 1), 1.5);
        assert!(row(&mol, HYDROGENS).iter().all(|h| *h == 1.0));
        assert!(row(&mol, AROMATIC).iter().all(|a| *a == 1.0));
    }

    #[test]
    fn pyridine_and_thiophene_heteroatoms_have_no_hydrogen() {
        let pyridine = parse("c1ccncc1");
        assert_eq!(pyridine.feature(HYDROGENS, 3), 0.0);
        let thiophene = parse("c1ccsc1");
        assert_eq!(thiophene.feature(HYDROGENS, 3), 0.0);
    }

    #[test]
    fn branches_attach_to_branch_point() {
        let mol = parse("CC(C)(C)O");
        assert_eq!(row(&mol, DEGREE), vec![1.0, 4.0, 1.0, 1.0, 1.0]);
        assert_eq!(mol.bond(1, 4), 1.0);
        assert_eq!(mol.bond(3, 4), 0.0);
    }

    #[test]
    fn bracket_atom_fields() {
        let mol = parse("[NH4+:7].[O-:8][13CH3:9]");
        assert_eq!(row(&mol, MAP_NUMBER), vec![7.0, 8.0, 9.0]);
        assert_eq!(row(&mol, FORMAL_CHARGE), vec![1.0, -1.0, 0.0]);
        assert_eq!(row(&mol, HYDROGENS), vec![4.0, 0.0, 3.0]);
        assert_eq!(mol.bond(0, 1), 0.0);
        assert_eq!(mol.bond(1, 2), 1.0);
    }

    #[test]
    fn bracket_atoms_with_chirality_and_two_letter_symbols() {
        let mol = parse("[C@@H:1]([Cl:2])([Br:3])[Si:4]");
        assert_eq!(row(&mol, ATOMIC_NUMBER), vec![6.0, 17.0, 35.0, 14.0]);
        assert_eq!(mol.feature(HYDROGENS, 0), 1.0);
        assert_eq!(row(&mol, MAP_NUMBER), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn percent_ring_numbers() {
        let mol = parse("C%12CC%12");
        assert_eq!(mol.bond(0, 2), 1.0);
    }

    #[test]
    fn explicit_single_between_aromatic_rings() {
        let mol = parse("c1ccccc1-c1ccccc1");
        assert_eq!(mol.bond(5, 6), 1.0);
        assert_eq!(mol.bond(6, 11), 1.5);
    }

    #[test]
    fn distances_follow_bonds_and_stay_zero_across_fragments() {
        let mol = parse("CCO.C");
        let dist = mol.dist_adj.unwrap();
        assert_eq!(dist[[0, 2]], 2.0);
        assert_eq!(dist[[2, 0]], 2.0);
        assert_eq!(dist[[0, 3]], 0.0);
    }

    #[test]
    fn distances_skipped_when_not_requested() {
        let mol = Graph::parse("CC").unwrap().into_molecule(false);
        assert!(mol.dist_adj.is_none());
    }

    #[test]
    fn map_numbers_of_fragment() {
        assert_eq!(atom_map_numbers("[CH3:1][OH:2]").unwrap(), vec![1, 2]);
        assert_eq!(atom_map_numbers("O=[C:3]").unwrap(), vec![0, 3]);
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(Graph::parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(Graph::parse("C1CC").unwrap_err(), ParseError::UnclosedRing(vec![1]));
        assert_eq!(Graph::parse("CC(C").unwrap_err(), ParseError::UnbalancedBranch);
        assert_eq!(Graph::parse("CC)C").unwrap_err(), ParseError::UnbalancedBranch);
        assert!(matches!(
            Graph::parse("C[Xx]").unwrap_err(),
            ParseError::UnknownElement { .. }
        ));
        assert!(matches!(
            Graph::parse("[CH3").unwrap_err(),
            ParseError::UnexpectedEnd { .. }
        ));
        assert!(matches!(
            Graph::parse("=C").unwrap_err(),
            ParseError::Dangling { what: "bond", .. }
        ));
        assert!(matches!(
            Graph::parse("[CH300]").unwrap_err(),
            ParseError::OutOfRange { what: "hydrogen count", pos: 3 }
        ));
        assert!(matches!(
            Graph::parse("[N+200]").unwrap_err(),
            ParseError::OutOfRange { what: "charge", pos: 2 }
        ));
        let runaway = format!("[O{}]", "-".repeat(128));
        assert!(matches!(
            Graph::parse(&runaway).unwrap_err(),
            ParseError::OutOfRange { what: "charge", .. }
        ));
        assert_eq!(parse("[O--]").feature(FORMAL_CHARGE, 0), -2.0);
        assert!(matches!(
            Graph::parse("CQ").unwrap_err(),
            ParseError::UnexpectedChar { ch: 'Q', pos: 1 }
        ));
    }
}

use crate::*;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use tracing::*;

/// Longest proton shift considered, in atoms (a 1,7 shift).
const MAX_SHIFT_ATOMS: usize = 7;

/// Enumerates tautomers by moving a hydrogen along alternating single and
/// double bonds, and picks a canonical one by score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TautomerEnumerator {
    /// Enumeration stops once this many distinct tautomers are found.
    pub max_tautomers: usize,
}

impl Default for TautomerEnumerator {
    fn default() -> Self {
        Self {
            max_tautomers: 1000,
        }
    }
}

/// A proton move: the hydrogen leaves the first atom of `path` for the
/// last, and every bond along `edges` flips between single and double.
#[derive(Debug, Clone)]
struct ProtonShift {
    path: Vec<NodeIndex>,
    edges: Vec<EdgeIndex>,
}

impl TautomerEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tautomers reachable from `mol`, the input included, keyed and
    /// ordered by canonical SMILES. Explicit hydrogen atoms are folded first.
    pub fn enumerate(&self, mol: &Molecule) -> BTreeMap<String, Molecule> {
        let start = Molecule::new(remove_hydrogens(mol.graph()));
        let mut found: BTreeMap<String, Molecule> = BTreeMap::new();
        let mut queue: VecDeque<Molecule> = VecDeque::new();
        found.insert(start.to_smiles(), start.clone());
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for shift in proton_shifts(current.graph()) {
                if found.len() >= self.max_tautomers {
                    warn!(
                        "Tautomer enumeration of {} stopped at {} tautomers",
                        mol.to_smiles(),
                        self.max_tautomers
                    );
                    return found;
                }
                let next = apply_shift(current.graph(), &shift);
                let smiles = next.to_smiles();
                if !found.contains_key(&smiles) {
                    trace!("Found tautomer {smiles}");
                    found.insert(smiles, next.clone());
                    queue.push_back(next);
                }
            }
        }
        debug!("Enumerated {} tautomer(s) of {}", found.len(), mol.to_smiles());
        found
    }

    /// The best scoring tautomer, atoms in canonical order and without
    /// properties. Ties go to the alphabetically first SMILES.
    pub fn canonicalize(&self, mol: &Molecule) -> Molecule {
        let best = self
            .enumerate(mol)
            .into_iter()
            .max_by_key(|(smiles, tautomer)| {
                (score_tautomer(tautomer.graph()), Reverse(smiles.clone()))
            });
        match best {
            Some((smiles, tautomer)) => {
                debug!("Canonical tautomer of {} is {smiles}", mol.to_smiles());
                tautomer.graph().morgan_canonize().into()
            }
            None => Molecule::default(),
        }
    }
}

fn is_hetero_end(atom: &Atom) -> bool {
    matches!(atom.element.atomic_number(), 7 | 8 | 16 | 34 | 52)
}

fn is_donor(graph: &MoleculeGraph, node: NodeIndex) -> bool {
    let atom = &graph[node];
    if atom.charge != 0 || atom.hydrogens == 0 {
        return false;
    }
    if is_hetero_end(atom) {
        return true;
    }
    atom.element == Element::C
        && bonded(graph, node)
            .iter()
            .all(|(_, bond, _)| *bond == Bond::Single)
}

fn is_acceptor(atom: &Atom) -> bool {
    atom.charge == 0 && (atom.element == Element::C || is_hetero_end(atom))
}

fn is_bridge(atom: &Atom) -> bool {
    atom.charge == 0 && (atom.element == Element::C || atom.element == Element::N)
}

/// Every proton shift available in `graph`: paths of three, five or seven
/// atoms from a donor whose bonds alternate single, double, ..., double.
fn proton_shifts(graph: &MoleculeGraph) -> Vec<ProtonShift> {
    let mut shifts = Vec::new();
    for donor in graph.node_indices() {
        if !is_donor(graph, donor) {
            continue;
        }
        let mut path = vec![donor];
        let mut edges = Vec::new();
        extend_shift(graph, &mut path, &mut edges, &mut shifts);
    }
    shifts
}

fn extend_shift(
    graph: &MoleculeGraph,
    path: &mut Vec<NodeIndex>,
    edges: &mut Vec<EdgeIndex>,
    shifts: &mut Vec<ProtonShift>,
) {
    let Some(&last) = path.last() else {
        return;
    };
    let wanted = if edges.len() % 2 == 0 {
        Bond::Single
    } else {
        Bond::Double
    };
    for (next, bond, edge) in bonded(graph, last) {
        if bond != wanted || path.contains(&next) {
            continue;
        }
        path.push(next);
        edges.push(edge);
        if wanted == Bond::Double
            && is_acceptor(&graph[next])
            && (is_hetero_end(&graph[path[0]]) || is_hetero_end(&graph[next]))
        {
            shifts.push(ProtonShift {
                path: path.clone(),
                edges: edges.clone(),
            });
        }
        if path.len() < MAX_SHIFT_ATOMS && is_bridge(&graph[next]) {
            extend_shift(graph, path, edges, shifts);
        }
        path.pop();
        edges.pop();
    }
}

fn apply_shift(graph: &MoleculeGraph, shift: &ProtonShift) -> Molecule {
    let mut graph = graph.clone();
    if let (Some(&donor), Some(&acceptor)) = (shift.path.first(), shift.path.last()) {
        graph[donor].hydrogens -= 1;
        graph[acceptor].hydrogens += 1;
    }
    for &edge in &shift.edges {
        graph[edge] = match graph[edge] {
            Bond::Single => Bond::Double,
            _ => Bond::Single,
        };
    }
    Molecule::new(graph)
}

/// Heuristic stability score; higher is preferred.
///
/// Aromatic rings dominate (250 for all-carbon rings, 100 for others).
/// Smaller terms favour C=O, N=O and P=O bonds, carbonyls bearing
/// heteroatoms, oximes and methyl groups, and penalize exocyclic C=N on
/// aromatic carbons and hydrogens on P, S, Se and Te.
pub fn score_tautomer(graph: &MoleculeGraph) -> i32 {
    let (view, rings) = aromatic_view(graph);
    let mut score = 0;

    for ring in &rings {
        score += if ring.iter().all(|&node| view[node].element == Element::C) {
            250
        } else {
            100
        };
    }

    for edge in view.edge_indices() {
        let Some((a, b)) = view.edge_endpoints(edge) else {
            continue;
        };
        let bond = view[edge];
        for (x, y) in [(a, b), (b, a)] {
            let (ax, ay) = (&view[x], &view[y]);
            let (zx, zy) = (ax.element.atomic_number(), ay.element.atomic_number());

            if matches!(bond, Bond::Double | Bond::Aromatic)
                && matches!(zx, 6 | 7 | 15)
                && zy == 8
            {
                score += 2;
            }
            if bond != Bond::Double {
                continue;
            }
            if zx == 6 && !ax.aromatic && ay.element.is_hetero() {
                score += 1;
                let others = bonded(&view, x)
                    .iter()
                    .filter(|(other, _, _)| *other != y && view[*other].element.is_hetero())
                    .count() as i32;
                score += 2 * others;
            }
            if zx == 6 && ax.aromatic && zy == 7 && !ay.aromatic {
                score -= 1;
            }
            if zx == 6 && zy == 7 {
                let oxime = bonded(&view, y).iter().any(|(other, bond, _)| {
                    *bond == Bond::Single
                        && view[*other].element == Element::O
                        && view[*other].hydrogens > 0
                });
                if oxime {
                    score += 4;
                }
            }
        }
    }

    for node in view.node_indices() {
        let atom = &view[node];
        let connections = view.neighbors(node).count() + atom.hydrogens as usize;
        if atom.element == Element::C && atom.hydrogens == 3 && connections == 4 {
            score += 1;
        }
        if matches!(atom.element.atomic_number(), 15 | 16 | 34 | 52) {
            score -= atom.hydrogens as i32;
        }
    }
    score
}

use crate::*;
use petgraph::graph::NodeIndex;
use tracing::*;

/// Neutralizes charges by adding or removing hydrogens.
///
/// Cations that carry hydrogens lose them, unless they sit next to an
/// anion (zwitterions and nitro groups are left alone). Anions gain
/// hydrogens, except that in balanced mode enough of them stay charged to
/// offset cations that cannot be neutralized, such as quaternary ammonium
/// or metal ions. Stronger acids keep their charge first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uncharger {
    /// Neutralize every anion regardless of the remaining positive charge.
    pub force: bool,
}

impl Uncharger {
    pub fn new() -> Self {
        Self { force: false }
    }

    pub fn forced() -> Self {
        Self { force: true }
    }

    /// Returns a neutralized copy of `mol` without properties.
    pub fn uncharge(&self, mol: &Molecule) -> Molecule {
        let mut graph = mol.graph().clone();
        let adjacent_to = |graph: &MoleculeGraph, node: NodeIndex, positive: bool| {
            graph.neighbors(node).any(|other| {
                let charge = graph[other].charge;
                if positive {
                    charge > 0
                } else {
                    charge < 0
                }
            })
        };

        let cations: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&node| graph[node].charge > 0 && !adjacent_to(&graph, node, false))
            .collect();
        let mut anions: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&node| graph[node].charge < 0 && !adjacent_to(&graph, node, true))
            .collect();

        for &node in &cations {
            let atom = &mut graph[node];
            while atom.charge > 0 && atom.hydrogens > 0 {
                atom.charge -= 1;
                atom.hydrogens -= 1;
            }
        }

        let fixed_positive: i32 = cations
            .iter()
            .map(|&node| graph[node].charge.max(0) as i32)
            .sum();
        let negative: i32 = anions
            .iter()
            .map(|&node| -(graph[node].charge as i32))
            .sum();
        let mut to_neutralize = if self.force {
            negative
        } else {
            (negative - fixed_positive).max(0)
        };

        if to_neutralize > 0 {
            let (view, _) = aromatic_view(&graph);
            let ranks = canonical_ranks(&view);
            anions.sort_by_key(|&node| (is_acid_anion(&graph, node), ranks[node.index()]));
            for node in anions {
                while to_neutralize > 0 && graph[node].charge < 0 && can_protonate(&graph, node) {
                    let atom = &mut graph[node];
                    atom.charge += 1;
                    atom.hydrogens = atom.hydrogens.saturating_add(1);
                    to_neutralize -= 1;
                }
            }
        }

        let uncharged = Molecule::new(graph);
        trace!("Uncharged {} to {}", mol.to_smiles(), uncharged.to_smiles());
        uncharged
    }
}

/// Whether one more hydrogen at one less negative charge still gives the
/// atom an allowed valence. `[B-]F4` and `[P-]F6` stay charged.
fn can_protonate(graph: &MoleculeGraph, node: NodeIndex) -> bool {
    let atom = &graph[node];
    let valence = explicit_valence(graph, node).saturating_add(1);
    atom.element
        .valences_with_charge(atom.charge + 1)
        .contains(&valence)
}

/// An O or S anion on an atom that also carries `=O` or `=S`, as in
/// carboxylates, sulfonates and phosphates.
fn is_acid_anion(graph: &MoleculeGraph, node: NodeIndex) -> bool {
    if !matches!(graph[node].element.atomic_number(), 8 | 16) {
        return false;
    }
    graph.neighbors(node).any(|center| {
        bonded(graph, center).iter().any(|(other, bond, _)| {
            *other != node
                && *bond == Bond::Double
                && matches!(graph[*other].element.atomic_number(), 8 | 16)
        })
    })
}

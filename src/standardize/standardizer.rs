use crate::*;
use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum StandardizeError {
    #[error("Explicit valence {valence} for atom #{index} {symbol} is greater than permitted")]
    Valence {
        index: usize,
        symbol: String,
        valence: u8,
    },
    #[error("Formal charge of atom #{index} {symbol} is out of range")]
    Charge { index: usize, symbol: String },
}

/// Elements whose bonds to a metal are broken by [`disconnect_metals`].
const METAL_PARTNERS: [u8; 7] = [7, 8, 16, 9, 17, 35, 53];

/// Upper bound on normalization passes, so a rule set that cycles still stops.
const MAX_NORMALIZE_PASSES: usize = 200;

/// Bring a molecule into a standard form:
///
/// 1. fold explicit hydrogen atoms into their neighbours,
/// 2. break bonds between metals and N, O, S or halogens,
/// 3. rewrite functional groups into one representation
///    (charge separated nitro groups and N-oxides, neutral S/P/Se oxides),
/// 4. reject atoms above their permitted valence,
/// 5. neutralize charges where that keeps the molecule balanced.
///
/// The result carries no properties.
pub fn standardize(mol: &Molecule) -> Result<Molecule> {
    let mut graph = remove_hydrogens(mol.graph());
    disconnect_metals(&mut graph).context(format!("Failed to standardize {}", mol.to_smiles()))?;
    normalize_groups(&mut graph);
    check_valences(&graph).context(format!("Failed to standardize {}", mol.to_smiles()))?;
    let standardized = Uncharger::new().uncharge(&Molecule::new(graph));
    debug!("Standardized {} to {}", mol.to_smiles(), standardized.to_smiles());
    Ok(standardized)
}

/// Fold neutral, non-isotopic hydrogen atoms bonded to a single heavy atom
/// into that atom's hydrogen count.
pub fn remove_hydrogens(graph: &MoleculeGraph) -> MoleculeGraph {
    let mut graph = graph.clone();
    let mut removable: Vec<NodeIndex> = Vec::new();
    for node in graph.node_indices() {
        let atom = &graph[node];
        if atom.element != Element::H || atom.isotope != 0 || atom.charge != 0 {
            continue;
        }
        if let [(heavy, Bond::Single, _)] = bonded(&graph, node).as_slice() {
            if graph[*heavy].element != Element::H {
                removable.push(node);
            }
        }
    }

    // Highest index first, as removal moves the last node into the hole.
    removable.sort_by(|a, b| b.cmp(a));
    for node in removable {
        if let Some((heavy, _, _)) = bonded(&graph, node).first().copied() {
            graph[heavy].hydrogens = graph[heavy].hydrogens.saturating_add(1);
        }
        graph.remove_node(node);
    }
    graph
}

/// Break every bond between a metal and N, O, S, F, Cl, Br or I. The metal
/// takes a positive charge and the non-metal a negative charge equal to
/// the bond order.
pub fn disconnect_metals(graph: &mut MoleculeGraph) -> Result<(), StandardizeError> {
    let mut broken = Vec::new();
    for edge in graph.edge_indices() {
        let Some((a, b)) = graph.edge_endpoints(edge) else {
            continue;
        };
        let (metal, other) = if graph[a].element.is_metal() {
            (a, b)
        } else {
            (b, a)
        };
        if graph[metal].element.is_metal()
            && METAL_PARTNERS.contains(&graph[other].element.atomic_number())
        {
            broken.push((edge, metal, other));
        }
    }

    // Same ordering concern as node removal.
    broken.sort_by(|a, b| b.0.cmp(&a.0));
    for (edge, metal, other) in broken {
        let order = graph[edge].order() as i8;
        graph[metal].charge = shifted_charge(graph, metal, order)?;
        graph[other].charge = shifted_charge(graph, other, -order)?;
        graph.remove_edge(edge);
        debug!(
            "Disconnected {} from {}",
            graph[metal].element,
            graph[other].element
        );
    }
    Ok(())
}

fn shifted_charge(graph: &MoleculeGraph, node: NodeIndex, delta: i8) -> Result<i8, StandardizeError> {
    graph[node]
        .charge
        .checked_add(delta)
        .ok_or_else(|| StandardizeError::Charge {
            index: node.index(),
            symbol: graph[node].element.symbol().to_string(),
        })
}

/// Apply functional group rewrites until none applies.
pub fn normalize_groups(graph: &mut MoleculeGraph) {
    for _ in 0..MAX_NORMALIZE_PASSES {
        let changed = separate_n_oxide(graph)
            || separate_diazo(graph)
            || join_charged_oxide(graph);
        if !changed {
            return;
        }
    }
    warn!("Stopped normalizing after {MAX_NORMALIZE_PASSES} passes");
}

fn is_terminal(graph: &MoleculeGraph, node: NodeIndex) -> bool {
    graph.neighbors(node).count() == 1
}

/// Pentavalent nitrogen with a double bonded oxygen, as in `N(=O)=O` nitro
/// groups or `C=N(C)=O` oxides, becomes `[N+][O-]`.
fn separate_n_oxide(graph: &mut MoleculeGraph) -> bool {
    for node in graph.node_indices() {
        let atom = &graph[node];
        if atom.element != Element::N || atom.charge != 0 || explicit_valence(graph, node) != 5 {
            continue;
        }
        let oxygen = bonded(graph, node).into_iter().find(|(other, bond, _)| {
            *bond == Bond::Double
                && graph[*other].element == Element::O
                && graph[*other].charge == 0
                && is_terminal(graph, *other)
        });
        if let Some((oxygen, _, edge)) = oxygen {
            trace!("Charge separating N=O at atom {}", node.index());
            graph[edge] = Bond::Single;
            graph[node].charge = 1;
            graph[oxygen].charge = -1;
            return true;
        }
    }
    false
}

/// Pentavalent `N#N` in diazo and azide groups becomes `[N+]=[N-]`.
fn separate_diazo(graph: &mut MoleculeGraph) -> bool {
    for node in graph.node_indices() {
        let atom = &graph[node];
        if atom.element != Element::N || atom.charge != 0 || explicit_valence(graph, node) != 5 {
            continue;
        }
        let terminal = bonded(graph, node).into_iter().find(|(other, bond, _)| {
            *bond == Bond::Triple
                && graph[*other].element == Element::N
                && graph[*other].charge == 0
                && is_terminal(graph, *other)
        });
        if let Some((terminal, _, edge)) = terminal {
            trace!("Charge separating N#N at atom {}", node.index());
            graph[edge] = Bond::Double;
            graph[node].charge = 1;
            graph[terminal].charge = -1;
            return true;
        }
    }
    false
}

/// `[S+][O-]`, `[P+][O-]` and `[Se+][O-]` become neutral double bonds.
fn join_charged_oxide(graph: &mut MoleculeGraph) -> bool {
    for node in graph.node_indices() {
        let atom = &graph[node];
        if !matches!(atom.element.atomic_number(), 15 | 16 | 34) || atom.charge != 1 {
            continue;
        }
        let oxygen = bonded(graph, node).into_iter().find(|(other, bond, _)| {
            *bond == Bond::Single
                && graph[*other].element == Element::O
                && graph[*other].charge == -1
                && graph[*other].hydrogens == 0
                && is_terminal(graph, *other)
        });
        if let Some((oxygen, _, edge)) = oxygen {
            trace!("Neutralizing charged oxide at atom {}", node.index());
            graph[edge] = Bond::Double;
            graph[node].charge = 0;
            graph[oxygen].charge = 0;
            return true;
        }
    }
    false
}

/// Fail on the first atom whose explicit valence exceeds the largest valence
/// its element allows at its charge. Atoms without a known valence pass.
pub fn check_valences(graph: &MoleculeGraph) -> Result<(), StandardizeError> {
    for node in graph.node_indices() {
        let atom = &graph[node];
        let allowed = atom.element.valences_with_charge(atom.charge);
        let Some(&max) = allowed.last() else {
            continue;
        };
        let valence = explicit_valence(graph, node);
        if valence > max {
            return Err(StandardizeError::Valence {
                index: node.index(),
                symbol: atom.element.symbol().to_string(),
                valence,
            });
        }
    }
    Ok(())
}

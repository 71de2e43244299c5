use crate::*;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KekulizeError {
    #[error("cannot kekulize aromatic system: unmatched atoms {0:?}")]
    Unkekulizable(Vec<usize>),
}

/// Replace every aromatic bond with a single or double bond so that each
/// aromatic atom reaches its valence, and clear the aromatic atom flags.
///
/// Atoms that are one bond order short of their (charge adjusted) valence
/// must receive exactly one double bond; these are paired up over the
/// aromatic bonds with augmenting paths.
pub fn kekulize(graph: &mut MoleculeGraph) -> Result<(), KekulizeError> {
    let n = graph.node_count();
    let mut aromatic_adj: Vec<Vec<(NodeIndex, EdgeIndex)>> = vec![vec![]; n];
    let mut aromatic_edges = Vec::new();
    for edge in graph.edge_indices() {
        if graph[edge] != Bond::Aromatic {
            continue;
        }
        if let Some((a, b)) = graph.edge_endpoints(edge) {
            aromatic_adj[a.index()].push((b, edge));
            aromatic_adj[b.index()].push((a, edge));
            aromatic_edges.push(edge);
        }
    }

    let mut needs_double = vec![false; n];
    for node in graph.node_indices() {
        if aromatic_adj[node.index()].is_empty() {
            continue;
        }
        let atom = &graph[node];
        let used = explicit_valence(graph, node);
        let target = atom
            .element
            .valences_with_charge(atom.charge)
            .iter()
            .copied()
            .find(|&v| v >= used);
        if let Some(target) = target {
            needs_double[node.index()] = target - used == 1;
        }
    }

    // Atoms with the fewest partners first, so chains are matched from their ends.
    let mut candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|node| needs_double[node.index()])
        .collect();
    candidates.sort_by_key(|node| {
        let partners = aromatic_adj[node.index()]
            .iter()
            .filter(|(other, _)| needs_double[other.index()])
            .count();
        (partners, node.index())
    });

    let mut matched_edge: Vec<Option<EdgeIndex>> = vec![None; n];
    for &start in &candidates {
        if matched_edge[start.index()].is_none() {
            augment(graph, &aromatic_adj, &needs_double, &mut matched_edge, start);
        }
    }

    let mut unmatched: Vec<usize> = candidates
        .iter()
        .filter(|node| matched_edge[node.index()].is_none())
        .map(|node| node.index())
        .collect();
    if !unmatched.is_empty() {
        unmatched.sort();
        return Err(KekulizeError::Unkekulizable(unmatched));
    }

    let doubles: HashSet<EdgeIndex> = matched_edge.iter().filter_map(|e| *e).collect();
    for edge in aromatic_edges {
        graph[edge] = if doubles.contains(&edge) {
            Bond::Double
        } else {
            Bond::Single
        };
    }
    for atom in graph.node_weights_mut() {
        atom.aromatic = false;
    }
    trace!("Kekulized {} double bonds", doubles.len());
    Ok(())
}

fn augment(
    graph: &MoleculeGraph,
    aromatic_adj: &[Vec<(NodeIndex, EdgeIndex)>],
    needs_double: &[bool],
    matched_edge: &mut [Option<EdgeIndex>],
    start: NodeIndex,
) -> bool {
    let n = graph.node_count();
    let mut prev: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();

    visited[start.index()] = true;
    queue.push_back(start);

    while let Some(u) = queue.pop_front() {
        for &(v, e) in &aromatic_adj[u.index()] {
            if !needs_double[v.index()] || visited[v.index()] {
                continue;
            }
            if Some(e) == matched_edge[u.index()] {
                continue;
            }
            visited[v.index()] = true;
            prev[v.index()] = Some((u, e));

            let Some(matched) = matched_edge[v.index()] else {
                flip_path(matched_edge, &prev, start, v);
                return true;
            };
            let Some((a, b)) = graph.edge_endpoints(matched) else {
                continue;
            };
            let w = if a == v { b } else { a };
            if !visited[w.index()] {
                visited[w.index()] = true;
                prev[w.index()] = Some((v, matched));
                queue.push_back(w);
            }
        }
    }
    false
}

/// Swap matched and unmatched edges along the path ending at `end`.
fn flip_path(
    matched_edge: &mut [Option<EdgeIndex>],
    prev: &[Option<(NodeIndex, EdgeIndex)>],
    start: NodeIndex,
    end: NodeIndex,
) {
    let mut cur = end;
    let mut is_new_match = true;
    while cur != start {
        let Some((p, e)) = prev[cur.index()] else {
            break;
        };
        if is_new_match {
            matched_edge[cur.index()] = Some(e);
            matched_edge[p.index()] = Some(e);
        }
        is_new_match = !is_new_match;
        cur = p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_double_bonds(mol: &Molecule) -> usize {
        mol.graph()
            .edge_weights()
            .filter(|&&bond| bond == Bond::Double)
            .count()
    }

    fn max_double_bonds_per_atom(mol: &Molecule) -> usize {
        mol.graph()
            .node_indices()
            .map(|node| {
                bonded(mol.graph(), node)
                    .iter()
                    .filter(|(_, bond, _)| *bond == Bond::Double)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_benzene() {
        init_logging("trace");
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(count_double_bonds(&mol), 3);
        assert_eq!(max_double_bonds_per_atom(&mol), 1);
    }

    #[test]
    fn test_naphthalene() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(mol.graph().edge_count(), 11);
        assert_eq!(count_double_bonds(&mol), 5);
        assert_eq!(max_double_bonds_per_atom(&mol), 1);
    }

    #[test]
    fn test_heteroaromatics() {
        // pyrrole nitrogen keeps its hydrogen and takes no double bond
        let mol = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(count_double_bonds(&mol), 2);
        let mol = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(count_double_bonds(&mol), 3);
        let mol = parse_smiles("c1ccsc1").unwrap();
        assert_eq!(count_double_bonds(&mol), 2);
        let mol = parse_smiles("O=c1cccc[nH]1").unwrap();
        assert_eq!(count_double_bonds(&mol), 3);
        let mol = parse_smiles("C[n+]1ccccc1").unwrap();
        assert_eq!(count_double_bonds(&mol), 3);
    }

    #[test]
    fn test_unkekulizable() {
        init_logging("trace");
        let mut graph = MoleculeGraph::new_undirected();
        let atoms: Vec<NodeIndex> = (0..5)
            .map(|_| {
                let mut atom = Atom::new(Element::C).with_hydrogens(1);
                atom.aromatic = true;
                graph.add_node(atom)
            })
            .collect();
        for i in 0..5 {
            graph.add_edge(atoms[i], atoms[(i + 1) % 5], Bond::Aromatic);
        }
        match kekulize(&mut graph) {
            Err(KekulizeError::Unkekulizable(unmatched)) => assert_eq!(unmatched.len(), 1),
            Ok(()) => panic!("cyclopentadienyl radical should not kekulize"),
        }
    }
}

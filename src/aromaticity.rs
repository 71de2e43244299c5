use crate::*;
use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{HashSet, VecDeque};
use tracing::*;

/// Smallest rings of the graph: the shortest cycle through every ring
/// bond, deduplicated and truncated to the cyclomatic number.
///
/// Each ring lists its atoms in cyclic order, starting from the lowest index.
pub fn find_rings(graph: &MoleculeGraph) -> Vec<Vec<NodeIndex>> {
    let expected = graph.edge_count() as isize - graph.node_count() as isize
        + connected_components(graph) as isize;
    if expected <= 0 {
        return Vec::new();
    }

    let mut rings: Vec<Vec<NodeIndex>> = Vec::new();
    for edge in graph.edge_indices() {
        let Some((a, b)) = graph.edge_endpoints(edge) else {
            continue;
        };
        if let Some(mut ring) = shortest_path_avoiding(graph, a, b, edge) {
            normalize_ring(&mut ring);
            if !rings.contains(&ring) {
                rings.push(ring);
            }
        }
    }
    rings.sort_by_key(|ring| ring.len());
    rings.truncate(expected as usize);
    rings
}

fn shortest_path_avoiding(
    graph: &MoleculeGraph,
    start: NodeIndex,
    end: NodeIndex,
    excluded: EdgeIndex,
) -> Option<Vec<NodeIndex>> {
    let n = graph.node_count();
    let mut parent: Vec<Option<NodeIndex>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    visited[start.index()] = true;
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        if current == end {
            let mut path = vec![end];
            let mut node = end;
            while let Some(p) = parent[node.index()] {
                path.push(p);
                node = p;
            }
            path.reverse();
            return Some(path);
        }
        for (neighbor, _, edge) in bonded(graph, current) {
            if edge == excluded || visited[neighbor.index()] {
                continue;
            }
            visited[neighbor.index()] = true;
            parent[neighbor.index()] = Some(current);
            queue.push_back(neighbor);
        }
    }
    None
}

fn normalize_ring(ring: &mut [NodeIndex]) {
    let Some(min_pos) = ring
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| **node)
        .map(|(i, _)| i)
    else {
        return;
    };
    ring.rotate_left(min_pos);
    let n = ring.len();
    if n > 2 && ring[n - 1] < ring[1] {
        ring[1..].reverse();
    }
}

/// Pi electrons `node` donates to `ring`, or `None` when the atom cannot
/// take part in an aromatic system.
fn pi_electrons(
    graph: &MoleculeGraph,
    node: NodeIndex,
    ring_atoms: &HashSet<NodeIndex>,
) -> Option<u8> {
    let atom = &graph[node];
    let bonds = bonded(graph, node);
    if bonds.iter().any(|(_, bond, _)| *bond == Bond::Triple) {
        return None;
    }
    let doubles: Vec<NodeIndex> = bonds
        .iter()
        .filter(|(_, bond, _)| *bond == Bond::Double)
        .map(|(other, _, _)| *other)
        .collect();
    match doubles.as_slice() {
        [] => {}
        [other] if ring_atoms.contains(other) => return Some(1),
        [other] if atom.element == Element::C && graph[*other].element.is_hetero() => {
            return Some(0)
        }
        _ => return None,
    }

    let connections = bonds.len() + atom.hydrogens as usize;
    let number = atom.element.atomic_number();
    match (number, atom.charge) {
        // N, P, As with a lone pair
        (7 | 15 | 33, 0) if connections == 3 => Some(2),
        (7, -1) if connections == 2 => Some(2),
        // O, S, Se, Te
        (8 | 16 | 34 | 52, 0) if connections == 2 => Some(2),
        (6, -1) => Some(2),
        (6, 1) => Some(0),
        (5, 0) if connections == 3 => Some(0),
        _ => None,
    }
}

/// Total pi electrons of `atoms`, or `None` if one of them cannot take part.
fn pi_total<'a>(
    graph: &MoleculeGraph,
    atoms: impl IntoIterator<Item = &'a NodeIndex>,
    ring_atoms: &HashSet<NodeIndex>,
) -> Option<u32> {
    atoms
        .into_iter()
        .map(|&node| pi_electrons(graph, node, ring_atoms).map(u32::from))
        .sum()
}

fn is_huckel(total: Option<u32>) -> bool {
    matches!(total, Some(total) if total % 4 == 2)
}

/// Rings of a kekulé graph that satisfy the 4n+2 rule.
///
/// Each ring is tested alone first. Two rings sharing a bond, at least one
/// of them not yet aromatic, are then tested as their combined perimeter,
/// which marks azulene and indolizine aromatic.
pub fn aromatic_rings(graph: &MoleculeGraph) -> Vec<Vec<NodeIndex>> {
    let rings = find_rings(graph);
    let ring_atoms: HashSet<NodeIndex> = rings.iter().flatten().copied().collect();
    let mut aromatic: Vec<bool> = rings
        .iter()
        .map(|ring| is_huckel(pi_total(graph, ring, &ring_atoms)))
        .collect();

    for i in 0..rings.len() {
        for j in i + 1..rings.len() {
            if aromatic[i] && aromatic[j] {
                continue;
            }
            let first: HashSet<NodeIndex> = rings[i].iter().copied().collect();
            let shared = rings[j].iter().filter(|node| first.contains(node)).count();
            if shared != 2 {
                continue;
            }
            let mut combined = first;
            combined.extend(rings[j].iter().copied());
            if is_huckel(pi_total(graph, &combined, &ring_atoms)) {
                trace!("Rings {i} and {j} are aromatic as a fused pair");
                aromatic[i] = true;
                aromatic[j] = true;
            }
        }
    }

    rings
        .into_iter()
        .zip(aromatic)
        .filter_map(|(ring, aromatic)| aromatic.then_some(ring))
        .collect()
}

/// A copy of `graph` with aromatic rings marked: their atoms flagged and
/// their bonds set to [`Bond::Aromatic`]. Also returns the aromatic rings.
///
/// Ring membership is decided on the kekulé bonds before anything is
/// changed, so the result does not depend on ring order.
pub fn aromatic_view(graph: &MoleculeGraph) -> (MoleculeGraph, Vec<Vec<NodeIndex>>) {
    let rings = aromatic_rings(graph);
    let mut view = graph.clone();
    for ring in &rings {
        for (i, &node) in ring.iter().enumerate() {
            view[node].aromatic = true;
            let next = ring[(i + 1) % ring.len()];
            if let Some(edge) = view.find_edge(node, next) {
                view[edge] = Bond::Aromatic;
            }
        }
    }
    if !rings.is_empty() {
        trace!("Perceived {} aromatic ring(s)", rings.len());
    }
    (view, rings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rings_of(smiles: &str) -> (usize, usize) {
        let mol = parse_smiles(smiles).unwrap();
        (find_rings(mol.graph()).len(), aromatic_rings(mol.graph()).len())
    }

    #[test]
    fn test_find_rings() {
        init_logging("trace");
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let rings = find_rings(mol.graph());
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|ring| ring.len() == 6));
        assert!(find_rings(parse_smiles("CCCC").unwrap().graph()).is_empty());
    }

    #[test]
    fn test_aromatic_perception() {
        init_logging("trace");
        assert_eq!(rings_of("C1=CC=CC=C1"), (1, 1));
        assert_eq!(rings_of("c1ccc2ccccc2c1"), (2, 2));
        assert_eq!(rings_of("c1cc[nH]c1"), (1, 1));
        assert_eq!(rings_of("c1ccoc1"), (1, 1));
        assert_eq!(rings_of("c1ccc2[nH]ccc2c1"), (2, 2));
        // 2-pyridone counts as aromatic, the exocyclic carbonyl donates nothing
        assert_eq!(rings_of("O=C1C=CC=CN1"), (1, 1));
        assert_eq!(rings_of("C1CCCCC1"), (1, 0));
        assert_eq!(rings_of("C1=CCC=C1"), (1, 0));
        assert_eq!(rings_of("O=C1C=CC(=O)C=C1"), (1, 0));
        assert_eq!(rings_of("C1=CC=CC=CC=C1"), (1, 0));
        // aromatic only as a fused pair
        assert_eq!(rings_of("C1=CC=C2C=CC=C2C=C1"), (2, 2));
        assert_eq!(rings_of("c1ccc2cccc2cc1"), (2, 2));
        assert_eq!(rings_of("c1ccn2cccc2c1"), (2, 2));
        assert_eq!(rings_of("C1=CC2=CC=CC2=C1"), (2, 0));
    }

    #[test]
    fn test_fused_pairs_write_aromatic() {
        init_logging("trace");
        for (aromatic, kekule) in [
            ("c1ccc2cccc2cc1", "C1=CC=C2C=CC=C2C=C1"),
            ("c1ccn2cccc2c1", "C1=CC=CN2C=CC=C12"),
        ] {
            let written = parse_smiles(aromatic).unwrap().to_smiles();
            assert!(!written.contains('='), "{aromatic} -> {written}");
            assert!(!written.contains('C'), "{aromatic} -> {written}");
            assert_eq!(parse_smiles(kekule).unwrap().to_smiles(), written);
            assert_eq!(parse_smiles(&written).unwrap().to_smiles(), written);
        }
    }

    #[test]
    fn test_aromatic_view() {
        let mol = parse_smiles("Cc1ccccc1").unwrap();
        let (view, rings) = aromatic_view(mol.graph());
        assert_eq!(rings.len(), 1);
        assert_eq!(view.node_weights().filter(|a| a.aromatic).count(), 6);
        assert_eq!(view.edge_weights().filter(|&&b| b == Bond::Aromatic).count(), 6);
        assert!(!view[NodeIndex::new(0)].aromatic);
    }
}

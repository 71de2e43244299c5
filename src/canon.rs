use crate::*;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Renumber a graph's atoms into canonical order.
pub trait MorganCanonize {
    fn morgan_canonize(&self) -> Self;
}

impl MorganCanonize for MoleculeGraph {
    fn morgan_canonize(&self) -> Self {
        let (view, _) = aromatic_view(self);
        let ranks = canonical_ranks(&view);
        rebuild_canonical_graph(self, &ranks)
    }
}

/// Rebuilds a molecule graph with nodes ordered by `ranks`.
///
/// # Arguments
/// * `graph` - The original molecule graph.
/// * `ranks` - The canonical rank of each node, indexed by node index.
///
/// # Returns
/// A new molecule graph whose node `i` is the atom of rank `i`.
pub fn rebuild_canonical_graph(graph: &MoleculeGraph, ranks: &[usize]) -> MoleculeGraph {
    let mut nodes: Vec<NodeIndex> = graph.node_indices().collect();
    nodes.sort_by_key(|node| (ranks[node.index()], node.index()));

    let mut mapping: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut new_graph = MoleculeGraph::new_undirected();
    for old_node in nodes {
        mapping.insert(old_node, new_graph.add_node(graph[old_node].clone()));
    }

    let mut edges: Vec<(NodeIndex, NodeIndex, Bond)> = graph
        .edge_references()
        .map(|edge| {
            let a = mapping[&edge.source()];
            let b = mapping[&edge.target()];
            (a.min(b), a.max(b), *edge.weight())
        })
        .collect();
    edges.sort();
    for (a, b, bond) in edges {
        new_graph.add_edge(a, b, bond);
    }
    new_graph
}

/// Dense ranks (0, 1, 2, ...) of `keys`; equal keys share a rank.
fn dense_rank<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut sorted: Vec<&T> = keys.iter().collect();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|key| sorted.binary_search(&key).unwrap_or(0))
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().collect::<BTreeSet<_>>().len()
}

/// Split rank classes by the sorted (rank, bond) lists of each atom's
/// neighbours until the number of classes stops growing.
fn refine(graph: &MoleculeGraph, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut classes = class_count(&ranks);
    loop {
        let keys: Vec<(usize, Vec<(usize, Bond)>)> = graph
            .node_indices()
            .map(|node| {
                let mut neighbors: Vec<(usize, Bond)> = bonded(graph, node)
                    .into_iter()
                    .map(|(other, bond, _)| (ranks[other.index()], bond))
                    .collect();
                neighbors.sort();
                (ranks[node.index()], neighbors)
            })
            .collect();
        ranks = dense_rank(&keys);
        let next = class_count(&ranks);
        if next == classes {
            return ranks;
        }
        classes = next;
    }
}

/// Canonical rank of every atom, indexed by node index.
///
/// Atoms are first ranked by a local invariant (degree, atomic number,
/// isotope, charge, hydrogens, aromaticity) and the ranks are refined by
/// neighbourhood. Atoms still tied afterwards are symmetry equivalent in
/// practice; the tie is broken by promoting the lowest indexed one, and
/// refinement is repeated until every rank is unique.
pub fn canonical_ranks(graph: &MoleculeGraph) -> Vec<usize> {
    let invariants: Vec<_> = graph
        .node_indices()
        .map(|node| {
            let atom = &graph[node];
            (
                graph.neighbors(node).count(),
                atom.element.atomic_number(),
                atom.isotope,
                atom.charge.unsigned_abs(),
                atom.charge,
                atom.hydrogens,
                atom.aromatic,
            )
        })
        .collect();
    let mut ranks = refine(graph, dense_rank(&invariants));

    loop {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, &rank) in ranks.iter().enumerate() {
            members.entry(rank).or_default().push(index);
        }
        let Some((&tied, nodes)) = members.iter().find(|(_, nodes)| nodes.len() > 1) else {
            return ranks;
        };
        let chosen = nodes[0];
        let keys: Vec<(usize, bool)> = ranks
            .iter()
            .enumerate()
            .map(|(index, &rank)| (rank, rank == tied && index != chosen))
            .collect();
        ranks = refine(graph, dense_rank(&keys));
    }
}

#[derive(Debug, Clone)]
struct RingClosure {
    opening: NodeIndex,
    closing: NodeIndex,
    bond: Bond,
}

/// Canonical SMILES for a (kekulé) molecule graph.
///
/// Aromaticity is perceived first, so kekulé and aromatic spellings of the
/// same structure give the same string. Fragments are written separately,
/// sorted, and joined with `.`.
pub fn to_smiles(graph: &MoleculeGraph) -> String {
    let (view, _) = aromatic_view(graph);
    let ranks = canonical_ranks(&view);

    let mut order: Vec<NodeIndex> = view.node_indices().collect();
    order.sort_by_key(|node| ranks[node.index()]);

    let mut visited = vec![false; view.node_count()];
    let mut fragments = Vec::new();
    for start in order {
        if visited[start.index()] {
            continue;
        }
        let (children, ring_closures) =
            compute_spanning_tree_and_ring_closures(&view, &ranks, start, &mut visited);
        fragments.push(generate_smiles_from_tree(&view, &ranks, start, &children, &ring_closures));
    }
    fragments.sort();
    fragments.join(".")
}

/// First pass: a depth first spanning tree that visits neighbours in rank
/// order. Every non-tree edge is recorded once as a ring closure, opened at
/// the ancestor and closed at the descendant.
fn compute_spanning_tree_and_ring_closures(
    graph: &MoleculeGraph,
    ranks: &[usize],
    start: NodeIndex,
    visited: &mut [bool],
) -> (BTreeMap<NodeIndex, Vec<NodeIndex>>, Vec<RingClosure>) {
    let mut children: BTreeMap<NodeIndex, Vec<NodeIndex>> = BTreeMap::new();
    let mut ring_closures = Vec::new();
    let mut on_path = vec![false; graph.node_count()];

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        graph: &MoleculeGraph,
        ranks: &[usize],
        current: NodeIndex,
        parent: Option<NodeIndex>,
        visited: &mut [bool],
        on_path: &mut [bool],
        children: &mut BTreeMap<NodeIndex, Vec<NodeIndex>>,
        ring_closures: &mut Vec<RingClosure>,
    ) {
        visited[current.index()] = true;
        on_path[current.index()] = true;
        let mut neighbors = bonded(graph, current);
        neighbors.sort_by_key(|(other, _, _)| ranks[other.index()]);
        for (other, bond, _) in neighbors {
            if Some(other) == parent {
                continue;
            }
            if !visited[other.index()] {
                children.entry(current).or_default().push(other);
                dfs(graph, ranks, other, Some(current), visited, on_path, children, ring_closures);
            } else if on_path[other.index()] {
                ring_closures.push(RingClosure {
                    opening: other,
                    closing: current,
                    bond,
                });
            }
        }
        on_path[current.index()] = false;
    }

    dfs(
        graph,
        ranks,
        start,
        None,
        visited,
        &mut on_path,
        &mut children,
        &mut ring_closures,
    );
    (children, ring_closures)
}

/// Second pass: write atoms in tree order. Ring closure digits are handed
/// out as the openings are written, lowest free digit first, and freed when
/// the ring closes.
fn generate_smiles_from_tree(
    graph: &MoleculeGraph,
    ranks: &[usize],
    root: NodeIndex,
    children: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
    ring_closures: &[RingClosure],
) -> String {
    let mut open_map: BTreeMap<NodeIndex, Vec<&RingClosure>> = BTreeMap::new();
    let mut close_map: BTreeMap<NodeIndex, Vec<&RingClosure>> = BTreeMap::new();
    for rc in ring_closures {
        open_map.entry(rc.opening).or_default().push(rc);
        close_map.entry(rc.closing).or_default().push(rc);
    }
    for list in open_map.values_mut() {
        list.sort_by_key(|rc| ranks[rc.closing.index()]);
    }
    for list in close_map.values_mut() {
        list.sort_by_key(|rc| ranks[rc.opening.index()]);
    }

    struct Writer<'a> {
        graph: &'a MoleculeGraph,
        children: &'a BTreeMap<NodeIndex, Vec<NodeIndex>>,
        open_map: BTreeMap<NodeIndex, Vec<&'a RingClosure>>,
        close_map: BTreeMap<NodeIndex, Vec<&'a RingClosure>>,
        digits: HashMap<(NodeIndex, NodeIndex), usize>,
        in_use: BTreeSet<usize>,
        out: String,
    }

    impl Writer<'_> {
        fn write(&mut self, current: NodeIndex) {
            self.out.push_str(&atom_symbol(self.graph, current));

            let openings = self.open_map.get(&current).cloned().unwrap_or_default();
            for rc in openings {
                let digit = (1..).find(|d| !self.in_use.contains(d)).unwrap_or(1);
                self.in_use.insert(digit);
                self.digits.insert((rc.opening, rc.closing), digit);
                self.out
                    .push_str(bond_symbol(self.graph, rc.opening, rc.closing, rc.bond));
                self.out.push_str(&format_ring(digit));
            }
            let closings = self.close_map.get(&current).cloned().unwrap_or_default();
            for rc in closings {
                if let Some(digit) = self.digits.remove(&(rc.opening, rc.closing)) {
                    self.in_use.remove(&digit);
                    self.out.push_str(&format_ring(digit));
                }
            }

            let Some(child_nodes) = self.children.get(&current) else {
                return;
            };
            let last = child_nodes.len().saturating_sub(1);
            for (i, &child) in child_nodes.iter().enumerate() {
                let bond = self
                    .graph
                    .find_edge(current, child)
                    .map(|edge| self.graph[edge])
                    .unwrap_or(Bond::Single);
                let symbol = bond_symbol(self.graph, current, child, bond);
                if i < last {
                    self.out.push('(');
                    self.out.push_str(symbol);
                    self.write(child);
                    self.out.push(')');
                } else {
                    self.out.push_str(symbol);
                    self.write(child);
                }
            }
        }
    }

    let mut writer = Writer {
        graph,
        children,
        open_map,
        close_map,
        digits: HashMap::new(),
        in_use: BTreeSet::new(),
        out: String::new(),
    };
    writer.write(root);
    writer.out
}

/// Returns the bond symbol written between `a` and `b`.
fn bond_symbol(graph: &MoleculeGraph, a: NodeIndex, b: NodeIndex, bond: Bond) -> &'static str {
    match bond {
        Bond::Single if graph[a].aromatic && graph[b].aromatic => "-",
        Bond::Single | Bond::Aromatic => "",
        Bond::Double => "=",
        Bond::Triple => "#",
    }
}

/// Formats a ring closure digit according to SMILES rules.
fn format_ring(digit: usize) -> String {
    if digit < 10 {
        digit.to_string()
    } else {
        format!("%{}", digit)
    }
}

fn atom_symbol(graph: &MoleculeGraph, node: NodeIndex) -> String {
    let atom = &graph[node];
    let symbol = if atom.aromatic {
        atom.element.symbol().to_lowercase()
    } else {
        atom.element.symbol().to_string()
    };
    let bare = atom.element.is_organic_subset()
        && atom.charge == 0
        && atom.isotope == 0
        && (!atom.aromatic || atom.element.is_bare_aromatic())
        && atom.hydrogens == default_implicit_hydrogens(graph, node);
    if bare {
        return symbol;
    }

    let mut s = String::from("[");
    if atom.isotope > 0 {
        s.push_str(&atom.isotope.to_string());
    }
    s.push_str(&symbol);
    match atom.hydrogens {
        0 => {}
        1 => s.push('H'),
        n => s.push_str(&format!("H{n}")),
    }
    match atom.charge {
        0 => {}
        1 => s.push('+'),
        -1 => s.push('-'),
        c if c > 0 => s.push_str(&format!("+{c}")),
        c => s.push_str(&format!("-{}", c.unsigned_abs())),
    }
    s.push(']');
    s
}

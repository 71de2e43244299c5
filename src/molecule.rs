use crate::*;
use anyhow::Result;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The property that holds a molecule's title.
pub const NAME_PROP: &str = "_Name";

/// A value stored in a molecule's property map.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Display for PropValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PropValue::Str(s) => write!(f, "{s}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

pub type Properties = BTreeMap<String, PropValue>;

/// A molecular graph together with its named properties.
///
/// The graph is kept in kekulé form: aromaticity is only perceived when the
/// molecule is written out or scored.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: MoleculeGraph,
    props: Properties,
}

impl Molecule {
    pub fn new(graph: MoleculeGraph) -> Self {
        Self {
            graph,
            props: Properties::new(),
        }
    }

    /// Parse a SMILES string. See [`parse_smiles`].
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        parse_smiles(smiles)
    }

    pub fn graph(&self) -> &MoleculeGraph {
        &self.graph
    }

    pub fn set_prop(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.props.insert(key.into(), value.into());
    }

    pub fn get_prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn has_prop(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn clear_prop(&mut self, key: &str) -> Option<PropValue> {
        self.props.remove(key)
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    /// Deep copy of the property map.
    ///
    /// # Arguments
    ///
    /// * `include_private` - Whether to keep keys starting with an underscore,
    ///   such as `_Name`.
    pub fn props_as_dict(&self, include_private: bool) -> Properties {
        self.props
            .iter()
            .filter(|(key, _)| include_private || !key.starts_with('_'))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// The `_Name` property rendered as a string, or `""` when unset.
    pub fn name(&self) -> String {
        self.props
            .get(NAME_PROP)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set_prop(NAME_PROP, PropValue::Str(name.into()));
    }

    /// Number of atom nodes, including explicit hydrogen atoms.
    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|atom| atom.element != Element::H)
            .count()
    }

    /// Atom count with every attached hydrogen counted as an atom.
    pub fn total_atom_count(&self) -> usize {
        self.graph
            .node_weights()
            .map(|atom| 1 + atom.hydrogens as usize)
            .sum()
    }

    /// Average molecular weight in g/mol.
    pub fn molecular_weight(&self) -> f64 {
        self.graph
            .node_weights()
            .map(|atom| atom.element.mass() + atom.hydrogens as f64 * Element::H.mass())
            .sum()
    }

    /// Node sets of the connected components, ordered by their lowest index.
    pub fn fragment_indices(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = BTreeSet::new();
        let mut fragments = Vec::new();
        for start in self.graph.node_indices() {
            if seen.contains(&start) {
                continue;
            }
            let mut dfs = Dfs::new(&self.graph, start);
            let mut nodes = Vec::new();
            while let Some(node) = dfs.next(&self.graph) {
                seen.insert(node);
                nodes.push(node);
            }
            nodes.sort();
            fragments.push(nodes);
        }
        fragments
    }

    /// Split into connected components. Properties are not copied.
    pub fn fragments(&self) -> Vec<Molecule> {
        self.fragment_indices()
            .iter()
            .map(|nodes| self.extract(nodes))
            .collect()
    }

    /// The induced subgraph on `nodes` as a new molecule without properties.
    pub fn extract(&self, nodes: &[NodeIndex]) -> Molecule {
        let mut graph = MoleculeGraph::new_undirected();
        let mut mapping: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        for &node in nodes {
            mapping.insert(node, graph.add_node(self.graph[node].clone()));
        }
        for edge in self.graph.edge_references() {
            if let (Some(&a), Some(&b)) = (mapping.get(&edge.source()), mapping.get(&edge.target())) {
                graph.add_edge(a, b, *edge.weight());
            }
        }
        Molecule::new(graph)
    }

    /// Join several molecules into one disconnected molecule.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Molecule>) -> Molecule {
        let mut graph = MoleculeGraph::new_undirected();
        for part in parts {
            let mut mapping = HashMap::new();
            for node in part.graph.node_indices() {
                mapping.insert(node, graph.add_node(part.graph[node].clone()));
            }
            for edge in part.graph.edge_references() {
                graph.add_edge(mapping[&edge.source()], mapping[&edge.target()], *edge.weight());
            }
        }
        Molecule::new(graph)
    }

    /// Canonical SMILES. See [`to_smiles`](crate::to_smiles).
    pub fn to_smiles(&self) -> String {
        to_smiles(&self.graph)
    }
}

impl From<MoleculeGraph> for Molecule {
    fn from(graph: MoleculeGraph) -> Self {
        Molecule::new(graph)
    }
}

impl Display for Molecule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_smiles())
    }
}

/// Neighbours of `node` with the connecting bond and its edge index.
pub(crate) fn bonded(graph: &MoleculeGraph, node: NodeIndex) -> Vec<(NodeIndex, Bond, EdgeIndex)> {
    graph
        .edges(node)
        .map(|edge| {
            let other = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            (other, *edge.weight(), edge.id())
        })
        .collect()
}

/// Sum of bond orders at `node`, aromatic bonds counting one.
pub(crate) fn bond_order_sum(graph: &MoleculeGraph, node: NodeIndex) -> u8 {
    graph
        .edges(node)
        .map(|edge| edge.weight().order())
        .fold(0u8, |acc, order| acc.saturating_add(order))
}

/// Bond orders plus attached hydrogens.
pub(crate) fn explicit_valence(graph: &MoleculeGraph, node: NodeIndex) -> u8 {
    bond_order_sum(graph, node).saturating_add(graph[node].hydrogens)
}

/// Hydrogens an unbracketed atom carries under the default valence rule.
/// Aromatic atoms count one extra bond and only use their lowest valence.
pub(crate) fn default_implicit_hydrogens(graph: &MoleculeGraph, node: NodeIndex) -> u8 {
    let atom = &graph[node];
    let valences = atom.element.default_valences();
    let used = bond_order_sum(graph, node);
    if atom.aromatic {
        return valences
            .first()
            .map(|&valence| valence.saturating_sub(used.saturating_add(1)))
            .unwrap_or(0);
    }
    valences
        .iter()
        .find(|&&valence| valence >= used)
        .map(|&valence| valence - used)
        .unwrap_or(0)
}

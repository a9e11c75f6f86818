use std::collections::{BTreeMap, HashMap};

use crate::error::TreeError;
use crate::node::{ClassDef, Node, PointsDef, TreeDef, TreeKind};

/// The loaded tree: interned node records plus symmetric adjacency and the
/// membership indices every query needs. Immutable after construction; node
/// indices handed out by [`TreeGraph::index_of`] stay valid for its lifetime.
#[derive(Debug, Clone)]
pub struct TreeGraph {
    version: u32,
    kind: TreeKind,
    classes: Vec<ClassDef>,
    points: PointsDef,
    nodes: Vec<Node>,
    id_to_index: HashMap<String, usize>,
    out: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
    class_start_nodes: BTreeMap<u32, usize>,
    ascendancy_nodes: Vec<usize>,
    /// First multiple-choice parent in a node's inbound list, if any.
    choice_parent: Vec<Option<usize>>,
}

impl TreeGraph {
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let def: TreeDef = serde_json::from_str(json)?;
        Self::new(def)
    }

    /// Validate a definition and build the graph. Refuses definitions with
    /// duplicate ids, dangling edges, duplicate class-start indices, or a
    /// class start placed inside an ascendancy.
    pub fn new(def: TreeDef) -> Result<Self, TreeError> {
        let mut id_to_index = HashMap::with_capacity(def.nodes.len());
        for (index, node) in def.nodes.iter().enumerate() {
            if id_to_index.insert(node.id.clone(), index).is_some() {
                return Err(TreeError::InvalidTreeDef(format!(
                    "duplicate node id {:?}",
                    node.id
                )));
            }
        }

        let mut out = vec![Vec::new(); def.nodes.len()];
        let mut inbound = vec![Vec::new(); def.nodes.len()];
        for (index, node) in def.nodes.iter().enumerate() {
            for target in &node.out {
                let Some(&target_index) = id_to_index.get(target) else {
                    return Err(TreeError::InvalidNodeReference(target.clone()));
                };
                // Storage is symmetric: either declared direction produces
                // both directed entries. Asymmetry exists only in traversal.
                push_edge(&mut out, &mut inbound, index, target_index);
                push_edge(&mut out, &mut inbound, target_index, index);
            }
        }

        let mut class_start_nodes = BTreeMap::new();
        let mut ascendancy_nodes = Vec::new();
        for (index, node) in def.nodes.iter().enumerate() {
            if let Some(class_index) = node.class_start_index {
                if class_start_nodes.insert(class_index, index).is_some() {
                    return Err(TreeError::InvalidTreeDef(format!(
                        "class start index {class_index} appears on more than one node"
                    )));
                }
                if !node.ascendancy_name.is_empty() {
                    return Err(TreeError::InvalidTreeDef(format!(
                        "class start {:?} is inside ascendancy {:?}",
                        node.id, node.ascendancy_name
                    )));
                }
            }
            if !node.ascendancy_name.is_empty() {
                ascendancy_nodes.push(index);
            }
        }

        let nodes: Vec<Node> = def.nodes.iter().map(Node::from_def).collect();
        let choice_parent = (0..nodes.len())
            .map(|index| {
                inbound[index]
                    .iter()
                    .copied()
                    .find(|&parent| nodes[parent].is_multiple_choice)
            })
            .collect();

        Ok(Self {
            version: def.version,
            kind: def.kind,
            classes: def.classes,
            points: def.points,
            nodes,
            id_to_index,
            out,
            inbound,
            class_start_nodes,
            ascendancy_nodes,
            choice_parent,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn points(&self) -> PointsDef {
        self.points
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    pub fn out(&self, index: usize) -> &[usize] {
        &self.out[index]
    }

    pub fn inbound(&self, index: usize) -> &[usize] {
        &self.inbound[index]
    }

    /// Class-start nodes in ascending class-index order.
    pub fn class_start_nodes(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.class_start_nodes
            .iter()
            .map(|(&class_index, &node)| (class_index, node))
    }

    pub fn class_start(&self, class_index: u32) -> Option<usize> {
        self.class_start_nodes.get(&class_index).copied()
    }

    /// Every node with a non-empty ascendancy name, in definition order.
    pub fn ascendancy_nodes(&self) -> &[usize] {
        &self.ascendancy_nodes
    }

    /// The multiple-choice parent of an option node. Nodes with several such
    /// parents keep only the first inbound one; see DESIGN.md.
    pub fn choice_parent(&self, index: usize) -> Option<usize> {
        self.choice_parent[index]
    }
}

fn push_edge(out: &mut [Vec<usize>], inbound: &mut [Vec<usize>], from: usize, to: usize) {
    if !out[from].contains(&to) {
        out[from].push(to);
    }
    if !inbound[to].contains(&from) {
        inbound[to].push(from);
    }
}

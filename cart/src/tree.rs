//! Arena-backed decision tree.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Every
//! non-root node records its mother and the daughter slot it occupies, so a
//! leaf can be replaced in place without walking down from the root.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::CartError;
use crate::feature::{FeatureSchema, FeatureValue, FeatureVector};

/// Stable index of a node in a [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Back-reference from a node to its mother.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub node: NodeId,
    /// Daughter slot in the mother. Always 0 for a graph node's leaf.
    pub slot: usize,
}

/// A binary test on one feature. Passing vectors go to daughter 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTest {
    /// Discrete feature equals a value.
    Equals { feature: usize, value: i32 },
    /// Feature value is strictly below a threshold.
    LessThan { feature: usize, threshold: f32 },
}

impl FeatureTest {
    pub fn feature(&self) -> usize {
        match *self {
            FeatureTest::Equals { feature, .. } | FeatureTest::LessThan { feature, .. } => feature,
        }
    }

    pub fn passes(&self, fv: &FeatureVector) -> Result<bool, CartError> {
        let value = fv.value(self.feature()).ok_or_else(|| {
            CartError::InvalidInput(format!(
                "feature {} missing from vector for unit {}",
                self.feature(),
                fv.unit_index()
            ))
        })?;
        Ok(match *self {
            FeatureTest::Equals { value: want, .. } => match value {
                FeatureValue::Byte(v) => v as i32 == want,
                FeatureValue::Short(v) => v as i32 == want,
                FeatureValue::Continuous(v) => v == want as f32,
            },
            FeatureTest::LessThan { threshold, .. } => value.as_f32() < threshold,
        })
    }

    /// Renders the test with schema names, e.g. `phone == a`.
    pub fn describe(&self, schema: &FeatureSchema) -> String {
        let name = schema
            .name_of(self.feature())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("#{}", self.feature()));
        match *self {
            FeatureTest::Equals { feature, value } => match schema.value_name(feature, value) {
                Some(v) => format!("{name} == {v}"),
                None => format!("{name} == {value}"),
            },
            FeatureTest::LessThan { threshold, .. } => format!("{name} < {threshold}"),
        }
    }
}

/// Leaf summary in the persisted `[stddev, mean]` layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafStats([f32; 2]);

impl LeafStats {
    pub fn new(stddev: f32, mean: f32) -> Self {
        Self([stddev, mean])
    }

    pub fn stddev(&self) -> f32 {
        self.0[0]
    }

    pub fn mean(&self) -> f32 {
        self.0[1]
    }

    pub fn as_array(&self) -> [f32; 2] {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Decision {
        test: FeatureTest,
        daughters: Vec<NodeId>,
        mother: Option<Link>,
    },
    /// Holds exactly one terminal leaf.
    Graph { leaf: NodeId, mother: Option<Link> },
    /// Transient leaf: positions of the member vectors in the builder input.
    ClusterLeaf {
        members: Vec<usize>,
        mother: Option<Link>,
    },
    StatLeaf {
        stats: LeafStats,
        mother: Option<Link>,
    },
}

impl Node {
    pub fn mother(&self) -> Option<Link> {
        match self {
            Node::Decision { mother, .. }
            | Node::Graph { mother, .. }
            | Node::ClusterLeaf { mother, .. }
            | Node::StatLeaf { mother, .. } => *mother,
        }
    }

    pub(crate) fn set_mother(&mut self, link: Option<Link>) {
        match self {
            Node::Decision { mother, .. }
            | Node::Graph { mother, .. }
            | Node::ClusterLeaf { mother, .. }
            | Node::StatLeaf { mother, .. } => *mother = link,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::ClusterLeaf { .. } | Node::StatLeaf { .. })
    }

    /// Child ids in slot order.
    fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Decision { daughters, .. } => daughters.clone(),
            Node::Graph { leaf, .. } => vec![*leaf],
            Node::ClusterLeaf { .. } | Node::StatLeaf { .. } => Vec::new(),
        }
    }
}

/// Which phase of agglomeration produced a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    /// Members were unioned into one cluster leaf.
    Leaf,
    /// A decision node was created over two subtrees.
    Tree,
}

/// One recorded merge. `left` and `right` are cluster slots, which equal the
/// lowest input position in each cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    pub phase: MergePhase,
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    merges: Vec<MergeStep>,
}

impl Tree {
    pub(crate) fn with_root_node(nodes: Vec<Node>, root: NodeId, merges: Vec<MergeStep>) -> Self {
        Self {
            nodes,
            root,
            merges,
        }
    }

    pub(crate) fn push(nodes: &mut Vec<Node>, node: Node) -> NodeId {
        nodes.push(node);
        NodeId(nodes.len() - 1)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Merge history in the order merges happened.
    pub fn merges(&self) -> &[MergeStep] {
        &self.merges
    }

    /// Leaf ids reachable from the root, left to right.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.nodes.get(id.0).is_some_and(Node::is_leaf))
            .collect()
    }

    pub fn decision_count(&self) -> usize {
        self.count(|n| matches!(n, Node::Decision { .. }))
    }

    pub fn cluster_leaf_count(&self) -> usize {
        self.count(|n| matches!(n, Node::ClusterLeaf { .. }))
    }

    pub fn stat_leaf_count(&self) -> usize {
        self.count(|n| matches!(n, Node::StatLeaf { .. }))
    }

    fn count(&self, pred: impl Fn(&Node) -> bool) -> usize {
        self.preorder()
            .into_iter()
            .filter(|id| self.nodes.get(id.0).is_some_and(&pred))
            .count()
    }

    /// Node ids reachable from the root in depth-first, left-first order.
    /// Dangling ids are skipped; a node is visited at most once.
    pub(crate) fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            if seen[id.0] {
                continue;
            }
            seen[id.0] = true;
            out.push(id);
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    /// Checks that mother and daughter links agree everywhere, that every
    /// node is reachable exactly once, and that graph nodes hold a leaf.
    pub fn validate(&self) -> Result<(), CartError> {
        let root = self
            .nodes
            .get(self.root.0)
            .ok_or_else(|| CartError::MalformedTree(format!("root {} out of range", self.root.0)))?;
        if root.mother().is_some() {
            return Err(CartError::MalformedTree("root has a mother".into()));
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if seen[id.0] {
                return Err(CartError::MalformedTree(format!("node {} reached twice", id.0)));
            }
            seen[id.0] = true;
            let node = &self.nodes[id.0];

            if let Node::Decision { daughters, .. } = node {
                if daughters.len() != 2 {
                    return Err(CartError::MalformedTree(format!(
                        "decision node {} has {} daughters",
                        id.0,
                        daughters.len()
                    )));
                }
            }

            for (slot, child) in node.children().into_iter().enumerate() {
                let child_node = self.nodes.get(child.0).ok_or_else(|| {
                    CartError::MalformedTree(format!("node {} points at missing node {}", id.0, child.0))
                })?;
                if matches!(node, Node::Graph { .. }) && !child_node.is_leaf() {
                    return Err(CartError::MalformedTree(format!(
                        "graph node {} holds non-leaf {}",
                        id.0, child.0
                    )));
                }
                if child_node.mother() != Some(Link { node: id, slot }) {
                    return Err(CartError::MalformedTree(format!(
                        "node {} in slot {} of node {} records mother {:?}",
                        child.0,
                        slot,
                        id.0,
                        child_node.mother()
                    )));
                }
                stack.push(child);
            }
        }

        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(CartError::MalformedTree(format!("node {orphan} is unreachable")));
        }
        Ok(())
    }

    /// Descends from the root to the leaf the vector falls into.
    pub fn interpret(&self, fv: &FeatureVector) -> Result<NodeId, CartError> {
        let mut id = self.root;
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(id.0)
                .ok_or_else(|| CartError::MalformedTree(format!("missing node {}", id.0)))?;
            id = match node {
                Node::Decision { test, daughters, .. } => {
                    let slot = if test.passes(fv)? { 0 } else { 1 };
                    *daughters.get(slot).ok_or_else(|| {
                        CartError::MalformedTree(format!("decision node {} lacks slot {slot}", id.0))
                    })?
                }
                Node::Graph { leaf, .. } => *leaf,
                Node::ClusterLeaf { .. } | Node::StatLeaf { .. } => return Ok(id),
            };
        }
        Err(CartError::MalformedTree("cycle while interpreting".into()))
    }

    /// Statistics of the leaf the vector falls into. `None` while the leaf
    /// still holds cluster members.
    pub fn predict(&self, fv: &FeatureVector) -> Result<Option<LeafStats>, CartError> {
        let id = self.interpret(fv)?;
        Ok(match &self.nodes[id.0] {
            Node::StatLeaf { stats, .. } => Some(*stats),
            _ => None,
        })
    }

    /// Indented text rendering, one node per line.
    pub fn dump(&self, schema: &FeatureSchema) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            let pad = "  ".repeat(depth);
            let _ = match node {
                Node::Decision { test, .. } => writeln!(out, "{pad}({})", test.describe(schema)),
                Node::Graph { .. } => writeln!(out, "{pad}graph"),
                Node::ClusterLeaf { members, .. } => writeln!(out, "{pad}cluster {members:?}"),
                Node::StatLeaf { stats, .. } => {
                    writeln!(out, "{pad}[{} {}]", stats.stddev(), stats.mean())
                }
            };
            for child in node.children().into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CartError> {
        rmp_serde::to_vec_named(self).map_err(|e| CartError::Serialization(e.to_string()))
    }

    /// Decodes a tree and validates its links.
    pub fn from_msgpack(data: &[u8]) -> Result<Self, CartError> {
        let tree: Tree =
            rmp_serde::from_slice(data).map_err(|e| CartError::Serialization(e.to_string()))?;
        tree.validate()?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureDef;

    fn link(node: usize, slot: usize) -> Option<Link> {
        Some(Link {
            node: NodeId(node),
            slot,
        })
    }

    // root: phone == 1 ? [0.1 1.0] : graph -> [0.2 2.0]
    fn small_tree() -> Tree {
        let nodes = vec![
            Node::Decision {
                test: FeatureTest::Equals { feature: 0, value: 1 },
                daughters: vec![NodeId(1), NodeId(2)],
                mother: None,
            },
            Node::StatLeaf {
                stats: LeafStats::new(0.1, 1.0),
                mother: link(0, 0),
            },
            Node::Graph {
                leaf: NodeId(3),
                mother: link(0, 1),
            },
            Node::StatLeaf {
                stats: LeafStats::new(0.2, 2.0),
                mother: link(2, 0),
            },
        ];
        Tree::with_root_node(nodes, NodeId(0), Vec::new())
    }

    fn schema() -> FeatureSchema {
        FeatureSchema {
            bytes: vec![FeatureDef::with_values("phone", ["_", "a"])],
            ..Default::default()
        }
    }

    #[test]
    fn valid_tree_passes_validation() {
        let tree = small_tree();
        tree.validate().unwrap();
        assert_eq!(tree.leaves(), vec![NodeId(1), NodeId(3)]);
        assert_eq!(tree.decision_count(), 1);
        assert_eq!(tree.stat_leaf_count(), 2);
        assert_eq!(tree.cluster_leaf_count(), 0);
    }

    #[test]
    fn interpret_follows_tests() {
        let tree = small_tree();
        let a = FeatureVector::new(vec![1], vec![], vec![], 0);
        let b = FeatureVector::new(vec![0], vec![], vec![], 1);
        assert_eq!(tree.interpret(&a).unwrap(), NodeId(1));
        assert_eq!(tree.predict(&a).unwrap().unwrap().mean(), 1.0);
        assert_eq!(tree.interpret(&b).unwrap(), NodeId(3));
        assert_eq!(tree.predict(&b).unwrap().unwrap().stddev(), 0.2);
    }

    #[test]
    fn interpret_rejects_short_vector() {
        let tree = small_tree();
        let empty = FeatureVector::new(vec![], vec![], vec![], 0);
        assert!(matches!(tree.interpret(&empty), Err(CartError::InvalidInput(_))));
    }

    #[test]
    fn inconsistent_mother_is_malformed() {
        let mut tree = small_tree();
        tree.node_mut(NodeId(1)).unwrap().set_mother(link(0, 1));
        assert!(matches!(tree.validate(), Err(CartError::MalformedTree(_))));
    }

    #[test]
    fn graph_holding_decision_is_malformed() {
        let nodes = vec![
            Node::Graph {
                leaf: NodeId(1),
                mother: None,
            },
            Node::Decision {
                test: FeatureTest::LessThan { feature: 0, threshold: 1.0 },
                daughters: vec![],
                mother: link(0, 0),
            },
        ];
        let tree = Tree::with_root_node(nodes, NodeId(0), Vec::new());
        assert!(matches!(tree.validate(), Err(CartError::MalformedTree(_))));
    }

    #[test]
    fn unreachable_node_is_malformed() {
        let mut tree = small_tree();
        tree.nodes.push(Node::StatLeaf {
            stats: LeafStats::new(0.0, 0.0),
            mother: None,
        });
        let err = tree.validate().unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn msgpack_keeps_stat_layout() {
        let tree = small_tree();
        let data = tree.to_msgpack().unwrap();
        let back = Tree::from_msgpack(&data).unwrap();
        assert_eq!(back, tree);

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["nodes"][1]["stat_leaf"]["stats"], serde_json::json!([0.1f32, 1.0f32]));
    }

    #[test]
    fn from_msgpack_rejects_garbage() {
        assert!(matches!(
            Tree::from_msgpack(&[0xc1, 0x00]),
            Err(CartError::Serialization(_))
        ));
    }

    #[test]
    fn dump_uses_schema_names() {
        let text = small_tree().dump(&schema());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "(phone == a)");
        assert_eq!(lines[1], "  [0.1 1]");
        assert_eq!(lines[2], "  graph");
        assert_eq!(lines[3], "    [0.2 2]");
    }
}

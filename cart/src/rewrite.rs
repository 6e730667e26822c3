//! Replaces cluster leaves with `[stddev, mean]` statistics leaves.

use tracing::info;

use crate::error::CartError;
use crate::feature::FeatureVector;
use crate::stats::mean_stddev;
use crate::tree::{LeafStats, Node, NodeId, Tree};
use crate::units::ScalarSource;

/// Outcome of a [`rewrite`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteSummary {
    /// Cluster leaves turned into statistics leaves.
    pub leaves: usize,
    /// Member vectors summarized across all leaves.
    pub members: usize,
}

/// Checks that `leaf` sits where its mother link says it does.
fn check_placement(tree: &Tree, leaf: NodeId) -> Result<(), CartError> {
    let node = tree
        .node(leaf)
        .ok_or_else(|| CartError::MalformedTree(format!("missing leaf {}", leaf.index())))?;
    let Some(link) = node.mother() else {
        if leaf == tree.root() {
            return Ok(());
        }
        return Err(CartError::MalformedTree(format!(
            "leaf {} has no mother",
            leaf.index()
        )));
    };

    let held = match tree.node(link.node) {
        Some(Node::Decision { daughters, .. }) => daughters.get(link.slot).copied(),
        Some(Node::Graph { leaf, .. }) if link.slot == 0 => Some(*leaf),
        _ => None,
    };
    if held != Some(leaf) {
        return Err(CartError::MalformedTree(format!(
            "leaf {} is not in slot {} of node {}",
            leaf.index(),
            link.slot,
            link.node.index()
        )));
    }
    Ok(())
}

/// Summarizes every cluster leaf reachable from the root.
///
/// `vectors` must be the slice the tree was built from. Every leaf is checked
/// and summarized before any node is replaced; on error the tree is left
/// untouched.
pub fn rewrite<S>(tree: &mut Tree, vectors: &[FeatureVector], scalar: &S) -> Result<RewriteSummary, CartError>
where
    S: ScalarSource + ?Sized,
{
    let mut pending: Vec<(NodeId, LeafStats)> = Vec::new();
    let mut summary = RewriteSummary::default();

    for id in tree.leaves() {
        let Some(Node::ClusterLeaf { members, .. }) = tree.node(id) else {
            continue;
        };
        check_placement(tree, id)?;
        if members.is_empty() {
            return Err(CartError::MalformedTree(format!("leaf {} has no members", id.index())));
        }

        let mut values = Vec::with_capacity(members.len());
        for &pos in members {
            let fv = vectors.get(pos).ok_or_else(|| {
                CartError::MalformedTree(format!(
                    "leaf {} refers to vector {pos} of {}",
                    id.index(),
                    vectors.len()
                ))
            })?;
            values.push(scalar.scalar(fv)?);
        }

        let (mean, stddev) = mean_stddev(&values);
        summary.leaves += 1;
        summary.members += values.len();
        pending.push((id, LeafStats::new(stddev as f32, mean as f32)));
    }

    for (id, stats) in pending {
        if let Some(node) = tree.node_mut(id) {
            let mother = node.mother();
            *node = Node::StatLeaf { stats, mother };
        }
    }

    info!(
        "cart: rewrote {} leaves covering {} vectors",
        summary.leaves, summary.members
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ClusterBuilder;
    use crate::config::{BuildConfig, Termination};
    use crate::distance::ScalarMeanDistance;
    use crate::feature::{FeatureDef, FeatureSchema};
    use crate::tree::{FeatureTest, Link};
    use crate::units::UnitTable;

    fn schema() -> FeatureSchema {
        FeatureSchema {
            bytes: vec![FeatureDef::new("phone")],
            ..Default::default()
        }
    }

    fn fv(phone: u8, unit: usize) -> FeatureVector {
        FeatureVector::new(vec![phone], vec![], vec![], unit)
    }

    fn built(vectors: &[FeatureVector], table: &UnitTable) -> Tree {
        ClusterBuilder::new(schema(), BuildConfig::new(Termination::max_distance(0.05)))
            .build(vectors, &ScalarMeanDistance::new(table.clone()))
            .unwrap()
    }

    #[test]
    fn leaves_get_mean_and_stddev() {
        // Durations 0.10, 0.12, 0.50, 0.52 seconds.
        let table = UnitTable::new(vec![1000, 1200, 5000, 5200], 10000).unwrap();
        let vectors = vec![fv(1, 0), fv(1, 1), fv(2, 2), fv(2, 3)];
        let mut tree = built(&vectors, &table);

        let summary = rewrite(&mut tree, &vectors, &table).unwrap();
        assert_eq!(summary, RewriteSummary { leaves: 2, members: 4 });
        tree.validate().unwrap();
        assert_eq!(tree.cluster_leaf_count(), 0);
        assert_eq!(tree.stat_leaf_count(), 2);

        let short = tree.predict(&fv(1, 0)).unwrap().unwrap();
        assert!((short.mean() - 0.11).abs() < 1e-6);
        assert!((short.stddev() - 0.01).abs() < 1e-6);
        let long = tree.predict(&fv(2, 0)).unwrap().unwrap();
        assert!((long.mean() - 0.51).abs() < 1e-6);
    }

    #[test]
    fn singleton_has_zero_stddev() {
        let table = UnitTable::new(vec![3000], 10000).unwrap();
        let vectors = vec![fv(0, 0)];
        let mut tree = built(&vectors, &table);
        rewrite(&mut tree, &vectors, &table).unwrap();
        let stats = tree.predict(&vectors[0]).unwrap().unwrap();
        assert_eq!(stats.stddev(), 0.0);
        assert!((stats.mean() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn decision_nodes_are_kept() {
        let table = UnitTable::new(vec![1000, 5000], 10000).unwrap();
        let vectors = vec![fv(1, 0), fv(2, 1)];
        let mut tree = built(&vectors, &table);
        let before = tree.decision_count();
        rewrite(&mut tree, &vectors, &table).unwrap();
        assert_eq!(tree.decision_count(), before);
        assert!(matches!(tree.node(tree.root()), Some(Node::Decision { .. })));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let table = UnitTable::new(vec![1000, 5000], 10000).unwrap();
        let vectors = vec![fv(1, 0), fv(2, 1)];
        let mut tree = built(&vectors, &table);
        rewrite(&mut tree, &vectors, &table).unwrap();
        let again = rewrite(&mut tree, &vectors, &table).unwrap();
        assert_eq!(again, RewriteSummary::default());
    }

    fn hand_tree(leaf_mother: Option<Link>, members: Vec<usize>) -> Tree {
        let nodes = vec![
            Node::Decision {
                test: FeatureTest::Equals { feature: 0, value: 1 },
                daughters: vec![NodeId(1), NodeId(2)],
                mother: None,
            },
            Node::ClusterLeaf {
                members,
                mother: leaf_mother,
            },
            Node::ClusterLeaf {
                members: vec![0],
                mother: Some(Link { node: NodeId(0), slot: 1 }),
            },
        ];
        Tree::with_root_node(nodes, NodeId(0), Vec::new())
    }

    #[test]
    fn missing_mother_is_malformed() {
        let mut tree = hand_tree(None, vec![0]);
        let err = rewrite(&mut tree, &[fv(1, 0)], &|_: &FeatureVector| 1.0_f64).unwrap_err();
        assert!(matches!(err, CartError::MalformedTree(_)));
    }

    #[test]
    fn wrong_slot_is_malformed() {
        let mut tree = hand_tree(Some(Link { node: NodeId(0), slot: 1 }), vec![0]);
        let err = rewrite(&mut tree, &[fv(1, 0)], &|_: &FeatureVector| 1.0_f64).unwrap_err();
        assert!(matches!(err, CartError::MalformedTree(_)));
        // Nothing was overwritten.
        assert_eq!(tree.cluster_leaf_count(), 2);
    }

    #[test]
    fn out_of_range_member_is_malformed() {
        let mut tree = hand_tree(Some(Link { node: NodeId(0), slot: 0 }), vec![4]);
        let err = rewrite(&mut tree, &[fv(1, 0)], &|_: &FeatureVector| 1.0_f64).unwrap_err();
        assert!(err.to_string().contains("vector 4"));
    }

    #[test]
    fn empty_leaf_is_malformed() {
        let mut tree = hand_tree(Some(Link { node: NodeId(0), slot: 0 }), vec![]);
        assert!(matches!(
            rewrite(&mut tree, &[fv(1, 0)], &|_: &FeatureVector| 1.0_f64),
            Err(CartError::MalformedTree(_))
        ));
    }

    #[test]
    fn unknown_unit_propagates() {
        let table = UnitTable::new(vec![1000], 10000).unwrap();
        let mut tree = hand_tree(Some(Link { node: NodeId(0), slot: 0 }), vec![0]);
        let vectors = vec![fv(1, 9)];
        assert!(matches!(
            rewrite(&mut tree, &vectors, &table),
            Err(CartError::UnknownUnit(9))
        ));
        assert_eq!(tree.stat_leaf_count(), 0);
    }
}

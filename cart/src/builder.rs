//! Agglomerative clustering tree builder.
//!
//! Building runs in two phases over the same distance cache:
//!
//! 1. **Leaf phase**: the closest eligible pair of clusters is unioned
//!    until the [`Termination`] limits forbid any further merge. The
//!    survivors become cluster leaves.
//! 2. **Tree phase**: the closest pair of subtrees is joined under a new
//!    decision node until a single root remains.
//!
//! Clusters live in slots named after their lowest input position. Pairs are
//! scanned as `(i, j)` with `i < j` in ascending order and only a strictly
//! smaller distance replaces the current best, so ties go to the pair with
//! the lowest input position. Repeated builds over the same input
//! produce identical trees.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{BuildConfig, Termination};
use crate::distance::DistanceMeasure;
use crate::error::CartError;
use crate::feature::{FeatureSchema, FeatureVector};
use crate::split::choose_split;
use crate::tree::{Link, MergePhase, MergeStep, Node, NodeId, Tree};

/// Builds clustering trees for one feature schema.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    schema: FeatureSchema,
    config: BuildConfig,
}

impl ClusterBuilder {
    pub fn new(schema: FeatureSchema, config: BuildConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Clusters `vectors` under `measure` and returns the tree.
    ///
    /// Cluster leaves refer to their members by position in `vectors`; pass
    /// the same slice to [`crate::rewrite`].
    pub fn build<M>(&self, vectors: &[FeatureVector], measure: &M) -> Result<Tree, CartError>
    where
        M: DistanceMeasure + ?Sized,
    {
        if vectors.is_empty() {
            return Err(CartError::InvalidInput("no feature vectors to cluster".into()));
        }
        if self.schema.is_empty() {
            return Err(CartError::InvalidInput("feature schema is empty".into()));
        }
        self.config.validate()?;
        for fv in vectors {
            self.schema.check(fv)?;
        }

        let mut state = Agglomeration::new(vectors, measure)?;
        state.leaf_phase(&self.config.termination)?;
        let leaves = state.active_slots().len();
        let tree = state.tree_phase(&self.schema, self.config.graph_leaves)?;

        info!(
            "cart: built tree over {} vectors: {} leaves, {} decision nodes",
            vectors.len(),
            leaves,
            tree.decision_count()
        );
        Ok(tree)
    }
}

/// Upper-triangular cache of cluster distances, `rows[i][j - i - 1]`.
struct DistanceCache {
    rows: Vec<Vec<f64>>,
}

impl DistanceCache {
    fn get(&self, i: usize, j: usize) -> f64 {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.rows[a][b - a - 1]
    }

    fn set(&mut self, i: usize, j: usize, d: f64) {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.rows[a][b - a - 1] = d;
    }
}

fn checked(left: usize, right: usize, distance: f64) -> Result<f64, CartError> {
    if distance.is_nan() || distance < 0.0 {
        return Err(CartError::InvalidMeasure {
            left,
            right,
            distance,
        });
    }
    Ok(distance)
}

struct Agglomeration<'a, M: ?Sized> {
    vectors: &'a [FeatureVector],
    measure: &'a M,
    /// Member positions per slot; `None` once the slot was merged away.
    members: Vec<Option<Vec<usize>>>,
    cache: DistanceCache,
    merges: Vec<MergeStep>,
}

impl<'a, M> Agglomeration<'a, M>
where
    M: DistanceMeasure + ?Sized,
{
    fn new(vectors: &'a [FeatureVector], measure: &'a M) -> Result<Self, CartError> {
        let n = vectors.len();
        let members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

        // Errors surface in (i, j) order, independent of scheduling.
        let rows: Vec<Result<Vec<f64>, CartError>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let a = [&vectors[i]];
                ((i + 1)..n)
                    .map(|j| measure.distance(&a, &[&vectors[j]]))
                    .collect()
            })
            .collect();

        let mut checked_rows = Vec::with_capacity(n);
        for (i, row) in rows.into_iter().enumerate() {
            let row = row?;
            for (k, &d) in row.iter().enumerate() {
                checked(i, i + k + 1, d)?;
            }
            checked_rows.push(row);
        }

        Ok(Self {
            vectors,
            measure,
            members,
            cache: DistanceCache { rows: checked_rows },
            merges: Vec::new(),
        })
    }

    fn active_slots(&self) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|_| i))
            .collect()
    }

    fn size(&self, slot: usize) -> usize {
        self.members[slot].as_ref().map_or(0, Vec::len)
    }

    fn refs(&self, slot: usize) -> Vec<&'a FeatureVector> {
        let vectors = self.vectors;
        self.members[slot]
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|&p| &vectors[p])
            .collect()
    }

    /// Closest pair accepted by `eligible`, ties to the lowest `(i, j)`.
    fn closest_pair(&self, eligible: impl Fn(usize, usize, f64) -> bool) -> Option<(usize, usize, f64)> {
        let slots = self.active_slots();
        let mut best: Option<(usize, usize, f64)> = None;
        for (x, &i) in slots.iter().enumerate() {
            for &j in &slots[x + 1..] {
                let d = self.cache.get(i, j);
                if !eligible(i, j, d) {
                    continue;
                }
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }
        best
    }

    /// Folds slot `j` into slot `i` and refreshes the distances of `i`.
    fn absorb(&mut self, i: usize, j: usize) -> Result<(), CartError> {
        let moved = self.members[j].take().unwrap_or_default();
        if let Some(m) = self.members[i].as_mut() {
            m.extend(moved);
            m.sort_unstable();
        }

        let others: Vec<usize> = self.active_slots().into_iter().filter(|&k| k != i).collect();
        let merged = self.refs(i);
        let this = &*self;
        let fresh: Vec<Result<f64, CartError>> = others
            .par_iter()
            .map(|&k| {
                let other = this.refs(k);
                if i < k {
                    this.measure.distance(&merged, &other)
                } else {
                    this.measure.distance(&other, &merged)
                }
            })
            .collect();

        for (&k, d) in others.iter().zip(fresh) {
            let d = checked(i.min(k), i.max(k), d?)?;
            self.cache.set(i, k, d);
        }
        Ok(())
    }

    fn leaf_phase(&mut self, termination: &Termination) -> Result<(), CartError> {
        loop {
            let active = self.active_slots().len();
            let pick = self.closest_pair(|i, j, d| {
                termination.allows(d, self.size(i) + self.size(j), active)
            });
            let Some((i, j, d)) = pick else {
                return Ok(());
            };
            let size = self.size(i) + self.size(j);
            debug!("cart: leaf merge {} <- {} (distance {:.6}, size {})", i, j, d, size);
            self.merges.push(MergeStep {
                phase: MergePhase::Leaf,
                left: i,
                right: j,
                distance: d,
                size,
            });
            self.absorb(i, j)?;
        }
    }

    fn tree_phase(mut self, schema: &FeatureSchema, graph_leaves: bool) -> Result<Tree, CartError> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut node_of: Vec<Option<NodeId>> = vec![None; self.members.len()];

        for slot in self.active_slots() {
            let members = self.members[slot].clone().unwrap_or_default();
            let leaf = Tree::push(&mut nodes, Node::ClusterLeaf { members, mother: None });
            let top = if graph_leaves {
                let graph = Tree::push(&mut nodes, Node::Graph { leaf, mother: None });
                nodes[leaf.index()].set_mother(Some(Link { node: graph, slot: 0 }));
                graph
            } else {
                leaf
            };
            node_of[slot] = Some(top);
        }

        while let Some((i, j, d)) = self.closest_pair(|_, _, _| true) {
            let split = choose_split(schema, &self.refs(i), &self.refs(j))
                .ok_or_else(|| CartError::InvalidInput("no feature available for a decision test".into()))?;
            let (left, right) = match (node_of[i], node_of[j]) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(CartError::MalformedTree(format!(
                        "cluster slot {i} or {j} has no node"
                    )));
                }
            };
            let daughters = if split.flipped {
                vec![right, left]
            } else {
                vec![left, right]
            };
            let decision = Tree::push(
                &mut nodes,
                Node::Decision {
                    test: split.test,
                    daughters: daughters.clone(),
                    mother: None,
                },
            );
            for (slot, child) in daughters.into_iter().enumerate() {
                nodes[child.index()].set_mother(Some(Link {
                    node: decision,
                    slot,
                }));
            }

            let size = self.size(i) + self.size(j);
            debug!(
                "cart: tree merge {} <- {} (distance {:.6}, size {}, {} of {} routed)",
                i, j, d, size, split.correct, size
            );
            self.merges.push(MergeStep {
                phase: MergePhase::Tree,
                left: i,
                right: j,
                distance: d,
                size,
            });
            node_of[i] = Some(decision);
            node_of[j] = None;
            self.absorb(i, j)?;
        }

        let root = self
            .active_slots()
            .first()
            .and_then(|&slot| node_of[slot])
            .ok_or_else(|| CartError::MalformedTree("no root after clustering".into()))?;
        Ok(Tree::with_root_node(nodes, root, self.merges))
    }
}

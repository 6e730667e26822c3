use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// When the leaf phase stops merging clusters.
///
/// A pair of clusters may still be merged into one leaf only while every
/// configured limit allows it. Has no `Default`; callers pick the criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Termination {
    /// Largest distance at which two clusters are still merged into one leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_merge_distance: Option<f64>,

    /// Largest number of members a leaf may hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leaf_size: Option<usize>,

    /// Leaf merging stops once this many clusters remain.
    #[serde(default = "one")]
    pub min_leaves: usize,
}

fn one() -> usize {
    1
}

impl Termination {
    pub fn max_distance(threshold: f64) -> Self {
        Self {
            max_merge_distance: Some(threshold),
            max_leaf_size: None,
            min_leaves: 1,
        }
    }

    pub fn max_leaf_size(size: usize) -> Self {
        Self {
            max_merge_distance: None,
            max_leaf_size: Some(size),
            min_leaves: 1,
        }
    }

    pub fn leaf_count(count: usize) -> Self {
        Self {
            max_merge_distance: None,
            max_leaf_size: None,
            min_leaves: count,
        }
    }

    pub fn with_max_distance(mut self, threshold: f64) -> Self {
        self.max_merge_distance = Some(threshold);
        self
    }

    pub fn with_max_leaf_size(mut self, size: usize) -> Self {
        self.max_leaf_size = Some(size);
        self
    }

    pub fn with_min_leaves(mut self, count: usize) -> Self {
        self.min_leaves = count;
        self
    }

    pub fn validate(&self) -> Result<(), CartError> {
        if let Some(t) = self.max_merge_distance {
            if !t.is_finite() || t < 0.0 {
                return Err(CartError::InvalidConfig(format!(
                    "max_merge_distance must be finite and non-negative, got {t}"
                )));
            }
        }
        if self.max_leaf_size == Some(0) {
            return Err(CartError::InvalidConfig("max_leaf_size must be positive".into()));
        }
        if self.min_leaves == 0 {
            return Err(CartError::InvalidConfig("min_leaves must be positive".into()));
        }
        Ok(())
    }

    /// Whether two clusters may still be merged into one leaf.
    pub(crate) fn allows(&self, distance: f64, merged_size: usize, active: usize) -> bool {
        if active <= self.min_leaves {
            return false;
        }
        if self.max_merge_distance.is_some_and(|t| distance > t) {
            return false;
        }
        if self.max_leaf_size.is_some_and(|n| merged_size > n) {
            return false;
        }
        true
    }
}

/// Controls tree building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub termination: Termination,

    /// Wrap every cluster leaf in a graph node.
    #[serde(default)]
    pub graph_leaves: bool,
}

impl BuildConfig {
    pub fn new(termination: Termination) -> Self {
        Self {
            termination,
            graph_leaves: false,
        }
    }

    pub fn with_graph_leaves(mut self, graph_leaves: bool) -> Self {
        self.graph_leaves = graph_leaves;
        self
    }

    /// Parses a YAML config and validates it.
    pub fn from_yaml(data: &str) -> Result<Self, CartError> {
        let cfg: BuildConfig =
            serde_yaml::from_str(data).map_err(|e| CartError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CartError> {
        self.termination.validate()
    }
}

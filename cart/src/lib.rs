//! Duration model trees built by agglomerative clustering.
//!
//! Unit feature vectors are clustered bottom-up under a pluggable
//! [`DistanceMeasure`]. Close clusters are merged into leaves until a
//! [`Termination`] limit is reached; the remaining leaves are then joined
//! under decision nodes into a single binary tree. [`rewrite`] finally
//! replaces every cluster leaf with the `[stddev, mean]` of a per-unit scalar,
//! typically the unit duration from a [`UnitTable`].
//!
//! # Usage
//!
//! ```
//! use prosody_cart::{
//!     rewrite, BuildConfig, ClusterBuilder, FeatureDef, FeatureSchema, FeatureVector,
//!     ScalarVarianceDistance, Termination, UnitTable,
//! };
//!
//! let schema = FeatureSchema {
//!     bytes: vec![FeatureDef::with_values("phone", ["_", "a", "o"])],
//!     ..Default::default()
//! };
//! let vectors = vec![
//!     FeatureVector::new(vec![1], vec![], vec![], 0),
//!     FeatureVector::new(vec![2], vec![], vec![], 1),
//!     FeatureVector::new(vec![1], vec![], vec![], 2),
//! ];
//! let units = UnitTable::new(vec![1600, 4800, 1700], 16000).unwrap();
//!
//! let builder = ClusterBuilder::new(schema, BuildConfig::new(Termination::max_distance(0.05)));
//! let mut tree = builder
//!     .build(&vectors, &ScalarVarianceDistance::new(units.clone()))
//!     .unwrap();
//! rewrite(&mut tree, &vectors, &units).unwrap();
//!
//! let stats = tree.predict(&vectors[1]).unwrap().unwrap();
//! assert_eq!(stats.stddev(), 0.0);
//! ```

mod builder;
mod config;
mod distance;
mod error;
mod eval;
mod feature;
mod rewrite;
mod split;
mod stats;
mod tree;
mod units;

pub use builder::ClusterBuilder;
pub use config::{BuildConfig, Termination};
pub use distance::{AverageLinkage, DistanceMeasure, ScalarMeanDistance, ScalarVarianceDistance};
pub use error::CartError;
pub use eval::{rms_error, split_held_out};
pub use feature::{FeatureDef, FeatureKind, FeatureSchema, FeatureValue, FeatureVector};
pub use rewrite::{rewrite, RewriteSummary};
pub use tree::{FeatureTest, LeafStats, Link, MergePhase, MergeStep, Node, NodeId, Tree};
pub use units::{ScalarSource, UnitTable};

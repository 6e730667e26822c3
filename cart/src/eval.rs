//! Held-out evaluation of a statistics tree.

use crate::error::CartError;
use crate::feature::FeatureVector;
use crate::tree::{Node, Tree};
use crate::units::ScalarSource;

/// Splits `vectors` into `(training, test)`.
///
/// Every `round(1 / proportion)`-th vector, starting with the first, goes to
/// the test set. `proportion` must lie in `(0, 1]`.
pub fn split_held_out(
    vectors: &[FeatureVector],
    proportion: f64,
) -> Result<(Vec<FeatureVector>, Vec<FeatureVector>), CartError> {
    if !(proportion > 0.0 && proportion <= 1.0) {
        return Err(CartError::InvalidConfig(format!(
            "held-out proportion must be in (0, 1], got {proportion}"
        )));
    }
    let skip = ((1.0 / proportion).round() as usize).max(1);

    let mut training = Vec::with_capacity(vectors.len());
    let mut test = Vec::with_capacity(vectors.len() / skip + 1);
    for (i, fv) in vectors.iter().enumerate() {
        if i % skip == 0 {
            test.push(fv.clone());
        } else {
            training.push(fv.clone());
        }
    }
    Ok((training, test))
}

/// Root mean square difference between each test vector's scalar and the
/// mean of the leaf it falls into.
///
/// Fails with [`CartError::MalformedTree`] if a test vector lands in a leaf
/// that has not been rewritten yet.
pub fn rms_error<S>(tree: &Tree, test: &[FeatureVector], scalar: &S) -> Result<f64, CartError>
where
    S: ScalarSource + ?Sized,
{
    if test.is_empty() {
        return Err(CartError::InvalidInput("no test vectors".into()));
    }
    let mut sum = 0.0f64;
    for fv in test {
        let leaf = tree.interpret(fv)?;
        let Some(Node::StatLeaf { stats, .. }) = tree.node(leaf) else {
            return Err(CartError::MalformedTree(format!(
                "leaf {} has no statistics",
                leaf.index()
            )));
        };
        let diff = scalar.scalar(fv)? - stats.mean() as f64;
        sum += diff * diff;
    }
    Ok((sum / test.len() as f64).sqrt())
}

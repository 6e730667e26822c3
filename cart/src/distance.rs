//! Pluggable cluster-to-cluster distance measures.

use crate::error::CartError;
use crate::feature::FeatureVector;
use crate::stats::mean_stddev;
use crate::units::ScalarSource;

/// Dissimilarity between two clusters of feature vectors.
///
/// Implementations must be deterministic, symmetric in their arguments and
/// return a non-negative value. The builder rejects negative or NaN results
/// with [`CartError::InvalidMeasure`] rather than clamping them.
///
/// `Sync` is required because the builder evaluates candidate pairs in
/// parallel.
pub trait DistanceMeasure: Sync {
    fn distance(&self, a: &[&FeatureVector], b: &[&FeatureVector]) -> Result<f64, CartError>;
}

fn scalars<S: ScalarSource>(source: &S, members: &[&FeatureVector]) -> Result<Vec<f64>, CartError> {
    members.iter().map(|fv| source.scalar(fv)).collect()
}

/// Absolute difference of the clusters' mean scalar.
pub struct ScalarMeanDistance<S> {
    source: S,
}

impl<S: ScalarSource> ScalarMeanDistance<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: ScalarSource> DistanceMeasure for ScalarMeanDistance<S> {
    fn distance(&self, a: &[&FeatureVector], b: &[&FeatureVector]) -> Result<f64, CartError> {
        let (ma, _) = mean_stddev(&scalars(&self.source, a)?);
        let (mb, _) = mean_stddev(&scalars(&self.source, b)?);
        Ok((ma - mb).abs())
    }
}

/// Growth of the size-weighted standard deviation caused by merging:
/// `n12*sd12 - n1*sd1 - n2*sd2`.
///
/// Merging clusters with similar scalar distributions costs little; merging
/// distant ones costs a lot.
pub struct ScalarVarianceDistance<S> {
    source: S,
}

impl<S: ScalarSource> ScalarVarianceDistance<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: ScalarSource> DistanceMeasure for ScalarVarianceDistance<S> {
    fn distance(&self, a: &[&FeatureVector], b: &[&FeatureVector]) -> Result<f64, CartError> {
        let sa = scalars(&self.source, a)?;
        let sb = scalars(&self.source, b)?;
        let (_, sd_a) = mean_stddev(&sa);
        let (_, sd_b) = mean_stddev(&sb);
        let mut joined = sa.clone();
        joined.extend_from_slice(&sb);
        let (_, sd_ab) = mean_stddev(&joined);

        let delta = joined.len() as f64 * sd_ab - sa.len() as f64 * sd_a - sb.len() as f64 * sd_b;
        if delta.is_nan() {
            return Ok(delta);
        }
        // Rounding noise only.
        Ok(delta.max(0.0))
    }
}

/// Mean pairwise Euclidean distance over the continuous features (average
/// linkage).
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageLinkage;

fn euclidean(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.continuous_features()
        .iter()
        .zip(b.continuous_features())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

impl DistanceMeasure for AverageLinkage {
    fn distance(&self, a: &[&FeatureVector], b: &[&FeatureVector]) -> Result<f64, CartError> {
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0f64;
        for x in a {
            for y in b {
                total += euclidean(x, y);
            }
        }
        Ok(total / (a.len() * b.len()) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(unit: usize, f: f32) -> FeatureVector {
        FeatureVector::new(vec![], vec![], vec![f], unit)
    }

    fn by_unit(fv: &FeatureVector) -> f64 {
        fv.unit_index() as f64
    }

    #[test]
    fn scalar_mean_distance_is_symmetric() {
        let m = ScalarMeanDistance::new(by_unit);
        let (a, b, c) = (fv(1, 0.0), fv(3, 0.0), fv(10, 0.0));
        let d1 = m.distance(&[&a, &b], &[&c]).unwrap();
        let d2 = m.distance(&[&c], &[&a, &b]).unwrap();
        assert_eq!(d1, 8.0);
        assert_eq!(d1, d2);
    }

    #[test]
    fn variance_distance_zero_for_equal_scalars() {
        let m = ScalarVarianceDistance::new(by_unit);
        let (a, b) = (fv(4, 0.0), fv(4, 1.0));
        assert_eq!(m.distance(&[&a], &[&b]).unwrap(), 0.0);
    }

    #[test]
    fn variance_distance_grows_with_separation() {
        let m = ScalarVarianceDistance::new(by_unit);
        let (a, b, c) = (fv(1, 0.0), fv(2, 0.0), fv(9, 0.0));
        let near = m.distance(&[&a], &[&b]).unwrap();
        let far = m.distance(&[&a], &[&c]).unwrap();
        assert!(near >= 0.0);
        assert!(far > near, "far={far} near={near}");
        // Two singletons: 2 * |x - y| / 2.
        assert!((far - 8.0).abs() < 1e-12);
    }

    #[test]
    fn variance_distance_keeps_nan() {
        let m = ScalarVarianceDistance::new(|fv: &FeatureVector| {
            if fv.unit_index() == 0 { f64::NAN } else { 1.0 }
        });
        let (a, b) = (fv(0, 0.0), fv(1, 0.0));
        assert!(m.distance(&[&a], &[&b]).unwrap().is_nan());

        let inf = ScalarVarianceDistance::new(|_: &FeatureVector| f64::INFINITY);
        assert!(inf.distance(&[&a], &[&b]).unwrap().is_nan());
    }

    #[test]
    fn average_linkage() {
        let a = FeatureVector::new(vec![], vec![], vec![0.0, 0.0], 0);
        let b = FeatureVector::new(vec![], vec![], vec![3.0, 4.0], 1);
        let c = FeatureVector::new(vec![9], vec![], vec![0.0, 0.0], 2);
        let d = AverageLinkage.distance(&[&a, &c], &[&b]).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
        assert_eq!(AverageLinkage.distance(&[&a], &[&c]).unwrap(), 0.0);
    }

    #[test]
    fn scalar_errors_propagate() {
        let table = crate::units::UnitTable::new(vec![100], 100).unwrap();
        let m = ScalarMeanDistance::new(table);
        let (a, b) = (fv(0, 0.0), fv(7, 0.0));
        assert!(matches!(m.distance(&[&a], &[&b]), Err(CartError::UnknownUnit(7))));
    }
}

/// Arithmetic mean and population standard deviation.
///
/// Returns `(0, 0)` for an empty slice. A single value has stddev 0.
pub(crate) fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_has_zero_stddev() {
        assert_eq!(mean_stddev(&[3.5]), (3.5, 0.0));
    }

    #[test]
    fn population_stddev() {
        let (mean, sd) = mean_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty() {
        assert_eq!(mean_stddev(&[]), (0.0, 0.0));
    }
}

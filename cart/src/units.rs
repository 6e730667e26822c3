use crate::error::CartError;
use crate::feature::FeatureVector;

/// Maps a feature vector to the scalar a leaf summarizes (e.g. duration in seconds).
pub trait ScalarSource: Sync {
    fn scalar(&self, fv: &FeatureVector) -> Result<f64, CartError>;
}

impl<F> ScalarSource for F
where
    F: Fn(&FeatureVector) -> f64 + Sync,
{
    fn scalar(&self, fv: &FeatureVector) -> Result<f64, CartError> {
        Ok(self(fv))
    }
}

/// Per-unit durations in samples, with the sample rate used to convert them
/// to seconds.
#[derive(Debug, Clone)]
pub struct UnitTable {
    durations: Vec<u64>,
    sample_rate: u32,
}

impl UnitTable {
    pub fn new(durations: Vec<u64>, sample_rate: u32) -> Result<Self, CartError> {
        if sample_rate == 0 {
            return Err(CartError::InvalidConfig("sample rate must be positive".into()));
        }
        Ok(Self {
            durations,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Raw duration of a unit in samples.
    pub fn duration_samples(&self, unit_index: usize) -> Result<u64, CartError> {
        self.durations
            .get(unit_index)
            .copied()
            .ok_or(CartError::UnknownUnit(unit_index))
    }

    /// Duration of the vector's unit in seconds.
    pub fn duration_secs(&self, fv: &FeatureVector) -> Result<f64, CartError> {
        let samples = self.duration_samples(fv.unit_index())?;
        Ok(samples as f64 / self.sample_rate as f64)
    }
}

impl ScalarSource for UnitTable {
    fn scalar(&self, fv: &FeatureVector) -> Result<f64, CartError> {
        self.duration_secs(fv)
    }
}

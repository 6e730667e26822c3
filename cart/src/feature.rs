//! Feature vectors and the schema that describes their layout.

use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// The storage kind of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Byte,
    Short,
    Continuous,
}

/// A single feature value read from a [`FeatureVector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Byte(u8),
    Short(i16),
    Continuous(f32),
}

impl FeatureValue {
    /// Returns the value as a float, for threshold comparisons.
    pub fn as_f32(self) -> f32 {
        match self {
            FeatureValue::Byte(v) => v as f32,
            FeatureValue::Short(v) => v as f32,
            FeatureValue::Continuous(v) => v,
        }
    }
}

/// One unit's features plus its index into the external unit table.
///
/// Features are addressed by a global index: byte-valued features first,
/// then short-valued ones, then continuous ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    bytes: Vec<u8>,
    shorts: Vec<i16>,
    continuous: Vec<f32>,
    unit_index: usize,
}

impl FeatureVector {
    pub fn new(bytes: Vec<u8>, shorts: Vec<i16>, continuous: Vec<f32>, unit_index: usize) -> Self {
        Self {
            bytes,
            shorts,
            continuous,
            unit_index,
        }
    }

    /// Index of the unit this vector describes.
    pub fn unit_index(&self) -> usize {
        self.unit_index
    }

    pub fn byte_features(&self) -> &[u8] {
        &self.bytes
    }

    pub fn short_features(&self) -> &[i16] {
        &self.shorts
    }

    pub fn continuous_features(&self) -> &[f32] {
        &self.continuous
    }

    /// Total number of features across all kinds.
    pub fn len(&self) -> usize {
        self.bytes.len() + self.shorts.len() + self.continuous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value at a global feature index.
    pub fn value(&self, index: usize) -> Option<FeatureValue> {
        let nb = self.bytes.len();
        let ns = self.shorts.len();
        if index < nb {
            Some(FeatureValue::Byte(self.bytes[index]))
        } else if index < nb + ns {
            Some(FeatureValue::Short(self.shorts[index - nb]))
        } else {
            self.continuous
                .get(index - nb - ns)
                .map(|&v| FeatureValue::Continuous(v))
        }
    }
}

/// Describes one feature in a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,

    /// Symbolic names for discrete values, indexed by value.
    /// Empty for continuous features.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FeatureDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Layout of the feature vectors handed to the builder.
///
/// The builder only uses the schema to index features and to label
/// decision tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    #[serde(default)]
    pub bytes: Vec<FeatureDef>,
    #[serde(default)]
    pub shorts: Vec<FeatureDef>,
    #[serde(default)]
    pub continuous: Vec<FeatureDef>,
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.bytes.len() + self.shorts.len() + self.continuous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the kind of the feature at a global index.
    pub fn kind_of(&self, index: usize) -> Option<FeatureKind> {
        let nb = self.bytes.len();
        let ns = self.shorts.len();
        if index < nb {
            Some(FeatureKind::Byte)
        } else if index < nb + ns {
            Some(FeatureKind::Short)
        } else if index < self.len() {
            Some(FeatureKind::Continuous)
        } else {
            None
        }
    }

    fn def(&self, index: usize) -> Option<&FeatureDef> {
        self.bytes
            .iter()
            .chain(self.shorts.iter())
            .chain(self.continuous.iter())
            .nth(index)
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.def(index).map(|d| d.name.as_str())
    }

    /// Returns the global index of a feature by name.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.bytes
            .iter()
            .chain(self.shorts.iter())
            .chain(self.continuous.iter())
            .position(|d| d.name == name)
    }

    /// Returns the symbolic name of a discrete value, if one is defined.
    pub fn value_name(&self, index: usize, value: i32) -> Option<&str> {
        let def = self.def(index)?;
        usize::try_from(value)
            .ok()
            .and_then(|v| def.values.get(v))
            .map(String::as_str)
    }

    /// Checks that a vector has exactly the shape this schema describes.
    pub fn check(&self, fv: &FeatureVector) -> Result<(), CartError> {
        if fv.bytes.len() != self.bytes.len()
            || fv.shorts.len() != self.shorts.len()
            || fv.continuous.len() != self.continuous.len()
        {
            return Err(CartError::InvalidInput(format!(
                "feature vector for unit {} has shape {}/{}/{}, schema expects {}/{}/{}",
                fv.unit_index,
                fv.bytes.len(),
                fv.shorts.len(),
                fv.continuous.len(),
                self.bytes.len(),
                self.shorts.len(),
                self.continuous.len(),
            )));
        }
        Ok(())
    }
}

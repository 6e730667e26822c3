//! Frame and record types.

use serde::{Deserialize, Serialize};

use crate::codec::{decode_payload, encode_payload};
use crate::error::TimelineError;

/// One analysis frame: a duration in samples and its decoded samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub duration: u64,
    pub samples: Vec<f32>,
}

impl DataFrame {
    pub fn new(duration: u64, samples: Vec<f32>) -> Self {
        Self { duration, samples }
    }
}

/// A duration in samples plus an encoded payload.
///
/// An empty payload marks a filler (silence) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedRecord {
    pub duration: u64,
    pub payload: Vec<u8>,
}

impl TimedRecord {
    pub fn new(duration: u64, payload: Vec<u8>) -> Self {
        Self { duration, payload }
    }

    /// A silent record of the given duration.
    pub fn filler(duration: u64) -> Self {
        Self {
            duration,
            payload: Vec::new(),
        }
    }

    pub fn is_filler(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encodes a frame's samples into a record of the same duration.
    pub fn from_frame(frame: &DataFrame) -> Result<Self, TimelineError> {
        Ok(Self {
            duration: frame.duration,
            payload: encode_payload(&frame.samples)?,
        })
    }

    /// Decodes the payload back into a frame. Fillers decode to no samples.
    pub fn decode(&self) -> Result<DataFrame, TimelineError> {
        Ok(DataFrame {
            duration: self.duration,
            samples: decode_payload(&self.payload)?,
        })
    }
}

//! Self-describing msgpack payload envelope.
//!
//! A payload is encoded as the named-field map
//! `{ format: "f32le-frame", version: 1, samples: [f32, ...] }`. Samples are
//! written as msgpack float32, so decoding returns the exact bits encoded.
//! An empty byte payload is a filler and decodes to no samples.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TimelineError;

pub const PAYLOAD_FORMAT: &str = "f32le-frame";
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'a str,
    version: u32,
    samples: &'a [f32],
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    samples: Vec<f32>,
}

pub fn encode_payload(samples: &[f32]) -> Result<Vec<u8>, TimelineError> {
    let env = EnvelopeRef {
        format: PAYLOAD_FORMAT,
        version: PAYLOAD_VERSION,
        samples,
    };
    rmp_serde::to_vec_named(&env).map_err(|e| TimelineError::Encode(e.to_string()))
}

pub fn decode_payload(data: &[u8]) -> Result<Vec<f32>, TimelineError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let env: Envelope = rmp_serde::from_slice(data).map_err(|e| corrupt(e.to_string()))?;
    if env.format != PAYLOAD_FORMAT {
        return Err(corrupt(format!("unknown payload format {:?}", env.format)));
    }
    if env.version != PAYLOAD_VERSION {
        return Err(corrupt(format!("unsupported payload version {}", env.version)));
    }
    Ok(env.samples)
}

fn corrupt(msg: String) -> TimelineError {
    warn!("timeline: corrupt payload: {}", msg);
    TimelineError::CorruptRecord(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Foreign<'a> {
        format: &'a str,
        version: u32,
        samples: Vec<f32>,
    }

    #[test]
    fn bit_exact_round_trip() {
        let samples = vec![0.0, -0.0, 1.5, f32::MIN_POSITIVE, f32::MAX, f32::NAN, f32::INFINITY];
        let data = encode_payload(&samples).unwrap();
        let back = decode_payload(&data).unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&samples));
    }

    #[test]
    fn empty_payload_is_filler() {
        assert!(decode_payload(&[]).unwrap().is_empty());
    }

    #[test]
    fn empty_samples_are_not_a_filler() {
        let data = encode_payload(&[]).unwrap();
        assert!(!data.is_empty());
        assert!(decode_payload(&data).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            decode_payload(&[0xc1, 0x02, 0x03]),
            Err(TimelineError::CorruptRecord(_))
        ));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let data = encode_payload(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            decode_payload(&data[..data.len() - 2]),
            Err(TimelineError::CorruptRecord(_))
        ));
    }

    #[test]
    fn wrong_format_or_version_is_corrupt() {
        let other = rmp_serde::to_vec_named(&Foreign {
            format: "i16le-frame",
            version: PAYLOAD_VERSION,
            samples: vec![1.0],
        })
        .unwrap();
        let err = decode_payload(&other).unwrap_err();
        assert!(err.to_string().contains("i16le-frame"));

        let newer = rmp_serde::to_vec_named(&Foreign {
            format: PAYLOAD_FORMAT,
            version: 2,
            samples: vec![1.0],
        })
        .unwrap();
        assert!(matches!(decode_payload(&newer), Err(TimelineError::CorruptRecord(_))));
    }
}

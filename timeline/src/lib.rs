//! Timed records for concatenative synthesis timelines.
//!
//! Analysis frames carry a duration in samples and a block of `f32`
//! samples. [`normalize`] encodes a frame sequence into [`TimedRecord`]s
//! whose durations add up to an exact target, truncating the overrunning
//! frame or padding with a filler record. Payloads use a small msgpack
//! envelope (see [`encode_payload`]) that round-trips bit for bit.
//!
//! # Usage
//!
//! ```
//! use prosody_timeline::{normalize, DataFrame, Timeline};
//!
//! let frames = vec![
//!     DataFrame::new(10, vec![0.1, 0.2]),
//!     DataFrame::new(10, vec![0.3]),
//!     DataFrame::new(10, vec![0.4]),
//! ];
//! let records = normalize(&frames, 25).unwrap();
//! assert_eq!(records.iter().map(|r| r.duration).sum::<u64>(), 25);
//!
//! let mut timeline = Timeline::new(16000).unwrap();
//! timeline.feed_all(records).unwrap();
//! let (index, _) = timeline.record_at(22).unwrap();
//! assert_eq!(index, 2);
//! ```

mod codec;
mod error;
mod frames;
mod normalize;
mod record;
mod timeline;

pub use codec::{decode_payload, encode_payload, PAYLOAD_FORMAT, PAYLOAD_VERSION};
pub use error::TimelineError;
pub use frames::frame_durations;
pub use normalize::{normalize, normalize_lossless};
pub use record::{DataFrame, TimedRecord};
pub use timeline::Timeline;

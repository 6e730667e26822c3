use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("timeline: corrupt record: {0}")]
    CorruptRecord(String),

    #[error("timeline: encode error: {0}")]
    Encode(String),

    #[error("timeline: total duration overflows u64 samples")]
    DurationOverflow,

    #[error("timeline: sample rate must be positive")]
    InvalidSampleRate,

    #[error("timeline: analysis times decrease at index {index}")]
    NonMonotonicTimes { index: usize },
}

//! Fits a frame sequence to an exact total duration.

use tracing::debug;

use crate::error::TimelineError;
use crate::record::{DataFrame, TimedRecord};

/// Encodes `frames` into records whose durations sum to exactly `target`.
///
/// Frames are taken in order. The first frame that would overrun the target
/// is cut to the remaining duration, possibly 0, keeping its payload, and
/// the frames after it are dropped. If the frames end short of the target, a
/// filler record covers the rest.
pub fn normalize(frames: &[DataFrame], target: u64) -> Result<Vec<TimedRecord>, TimelineError> {
    let mut out = Vec::with_capacity(frames.len() + 1);
    let mut remaining = target;

    for (i, frame) in frames.iter().enumerate() {
        let mut record = TimedRecord::from_frame(frame)?;
        if frame.duration > remaining {
            debug!(
                "timeline: truncating frame {} from {} to {} samples, dropping {} frames",
                i,
                frame.duration,
                remaining,
                frames.len() - i - 1
            );
            record.duration = remaining;
            out.push(record);
            return Ok(out);
        }
        remaining -= frame.duration;
        out.push(record);
    }

    if remaining > 0 {
        debug!("timeline: padding {} samples of filler", remaining);
        out.push(TimedRecord::filler(remaining));
    }
    Ok(out)
}

/// Encodes `frames` unchanged, using their summed duration as the target.
pub fn normalize_lossless(frames: &[DataFrame]) -> Result<Vec<TimedRecord>, TimelineError> {
    let total = frames
        .iter()
        .try_fold(0u64, |acc, f| acc.checked_add(f.duration))
        .ok_or(TimelineError::DurationOverflow)?;
    normalize(frames, total)
}

use crate::error::TimelineError;

/// Frame durations in samples from analysis times in seconds.
///
/// Frame `i` starts where frame `i - 1` ended (the first at 0) and ends at
/// `floor(times[i + 1] * sample_rate)`; the last frame ends at
/// `floor(total_secs * sample_rate)`.
pub fn frame_durations(
    times: &[f64],
    total_secs: f64,
    sample_rate: u32,
) -> Result<Vec<u64>, TimelineError> {
    if sample_rate == 0 {
        return Err(TimelineError::InvalidSampleRate);
    }
    let sr = f64::from(sample_rate);
    let to_samples = |secs: f64| (secs * sr).floor().max(0.0) as u64;

    let mut prev = f64::NEG_INFINITY;
    for (index, &t) in times.iter().enumerate() {
        if t.is_nan() || t < prev {
            return Err(TimelineError::NonMonotonicTimes { index });
        }
        prev = t;
    }
    if !times.is_empty() && (total_secs.is_nan() || total_secs < prev) {
        return Err(TimelineError::NonMonotonicTimes { index: times.len() });
    }

    let mut out = Vec::with_capacity(times.len());
    let mut start = 0u64;
    for i in 0..times.len() {
        let end = match times.get(i + 1) {
            Some(&next) => to_samples(next),
            None => to_samples(total_secs),
        };
        let end = end.max(start);
        out.push(end - start);
        start = end;
    }
    Ok(out)
}

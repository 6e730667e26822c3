//! In-memory index of timed records.

use std::time::Duration;

use crate::error::TimelineError;
use crate::record::TimedRecord;

/// An ordered run of records with cumulative start times, in samples.
#[derive(Debug, Clone)]
pub struct Timeline {
    sample_rate: u32,
    records: Vec<TimedRecord>,
    starts: Vec<u64>,
    total: u64,
}

impl Timeline {
    pub fn new(sample_rate: u32) -> Result<Self, TimelineError> {
        if sample_rate == 0 {
            return Err(TimelineError::InvalidSampleRate);
        }
        Ok(Self {
            sample_rate,
            records: Vec::new(),
            starts: Vec::new(),
            total: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Appends a record after the current end.
    ///
    /// Fails with [`TimelineError::DurationOverflow`] if the total would no
    /// longer fit in `u64`; the timeline is left unchanged.
    pub fn feed(&mut self, record: TimedRecord) -> Result<(), TimelineError> {
        let total = self
            .total
            .checked_add(record.duration)
            .ok_or(TimelineError::DurationOverflow)?;
        self.starts.push(self.total);
        self.total = total;
        self.records.push(record);
        Ok(())
    }

    /// Feeds records in order, stopping at the first that overflows.
    pub fn feed_all(
        &mut self,
        records: impl IntoIterator<Item = TimedRecord>,
    ) -> Result<(), TimelineError> {
        for r in records {
            self.feed(r)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TimedRecord] {
        &self.records
    }

    /// Start time of record `index` in samples.
    pub fn start_of(&self, index: usize) -> Option<u64> {
        self.starts.get(index).copied()
    }

    /// Summed duration of all records, in samples.
    pub fn total_duration(&self) -> u64 {
        self.total
    }

    /// Converts a sample count at this timeline's rate to wall time.
    pub fn duration_of(&self, samples: u64) -> Duration {
        let sr = u128::from(self.sample_rate);
        let nanos = u128::from(samples) * 1_000_000_000 / sr;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn index_at(&self, time: u64) -> Option<usize> {
        // Last record starting at or before `time`; zero-length records share
        // their start with the next one and are skipped over.
        let i = self.starts.partition_point(|&s| s <= time).checked_sub(1)?;
        (time < self.starts[i] + self.records[i].duration).then_some(i)
    }

    /// The record containing sample `time`, with its index.
    pub fn record_at(&self, time: u64) -> Option<(usize, &TimedRecord)> {
        self.index_at(time).map(|i| (i, &self.records[i]))
    }

    /// Records overlapping `[start, start + duration)`, beginning with the
    /// one containing `start`. A zero `duration` returns just that record.
    pub fn records_between(&self, start: u64, duration: u64) -> &[TimedRecord] {
        let Some(first) = self.index_at(start) else {
            return &[];
        };
        let end = start.saturating_add(duration);
        let last = self.starts.partition_point(|&s| s < end).max(first + 1);
        &self.records[first..last]
    }
}

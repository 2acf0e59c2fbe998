//! Session records.
//!
//! One [`SessionRecord`] is produced each time a running or paused timer is
//! stopped. Records are immutable once created and handed to a
//! [`RecordSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Speaker label used when none was entered.
pub const UNTITLED_SPEAKER: &str = "Untitled Speaker";

/// Preset label used for hand-entered markers.
pub const CUSTOM_PRESET: &str = "Custom";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub speaker: String,
    pub duration_ms: u64,
    /// `duration_ms` formatted as `MM:SS.hh`.
    pub duration: String,
    pub preset: String,
    pub recorded_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(speaker: impl Into<String>, duration_ms: u64, preset: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker: speaker.into(),
            duration_ms,
            duration: format_time(duration_ms),
            preset: preset.into(),
            recorded_at: Utc::now(),
        }
    }

    /// One-line summary suitable for pasting into meeting minutes.
    pub fn summary(&self) -> String {
        format!(
            "Speaker: {} | Time: {} | Preset: {}",
            self.speaker, self.duration, self.preset
        )
    }
}

/// Format milliseconds as `MM:SS.hh` (hundredths, truncated).
pub fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hundredths = (ms % 1000) / 10;
    format!(
        "{:02}:{:02}.{:02}",
        total_secs / 60,
        total_secs % 60,
        hundredths
    )
}

/// Destination for completed session records.
pub trait RecordSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<SessionRecord>>;

    /// Remove every record, returning how many were removed.
    fn clear(&mut self) -> Result<usize>;
}

/// In-process record log.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordSink {
    records: Vec<SessionRecord>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSink for MemoryRecordSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.records.iter().rev().cloned().collect())
    }

    fn clear(&mut self) -> Result<usize> {
        let n = self.records.len();
        self.records.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_pads_and_truncates() {
        assert_eq!(format_time(0), "00:00.00");
        assert_eq!(format_time(125_000), "02:05.00");
        assert_eq!(format_time(61_239), "01:01.23");
        assert_eq!(format_time(6_000_000), "100:00.00");
    }

    #[test]
    fn summary_line() {
        let record = SessionRecord::new("Ada", 125_000, "Table Topics");
        assert_eq!(
            record.summary(),
            "Speaker: Ada | Time: 02:05.00 | Preset: Table Topics"
        );
    }

    #[test]
    fn memory_sink_lists_newest_first() {
        let mut sink = MemoryRecordSink::new();
        sink.append(&SessionRecord::new("first", 1_000, CUSTOM_PRESET))
            .unwrap();
        sink.append(&SessionRecord::new("second", 2_000, CUSTOM_PRESET))
            .unwrap();

        let listed = sink.list().unwrap();
        assert_eq!(listed[0].speaker, "second");
        assert_eq!(listed[1].speaker, "first");

        assert_eq!(sink.clear().unwrap(), 2);
        assert!(sink.is_empty());
    }
}

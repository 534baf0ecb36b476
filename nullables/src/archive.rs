//! Nullable archive sink.

use std::sync::Mutex;

use dyad_external::{ArchiveRecord, ArchiveSink, ExternalError};

/// Collects archived records; can be told to fail a number of times first.
#[derive(Debug, Default)]
pub struct NullArchive {
    records: Mutex<Vec<ArchiveRecord>>,
    failures_left: Mutex<u32>,
    attempts: Mutex<u32>,
}

impl NullArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls with `Unavailable`.
    pub fn fail_times(n: u32) -> Self {
        Self {
            failures_left: Mutex::new(n),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ArchiveRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Total calls, failed ones included.
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl ArchiveSink for NullArchive {
    fn archive(&self, record: &ArchiveRecord) -> Result<(), ExternalError> {
        *self.attempts.lock().unwrap() += 1;
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(ExternalError::Unavailable("archive offline".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

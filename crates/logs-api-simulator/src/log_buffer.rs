//! In-memory buffer of log records awaiting delivery.
//!
//! Records are owned by the buffer from the moment they are appended until a
//! delivery drains them. A failed delivery hands the batch back through
//! [`LogBuffer::requeue_front`], so a record is never lost or duplicated
//! across a drain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Source of a log record, as named by the Logs API `types` subscription field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// Platform lifecycle logs.
    Platform,

    /// Logs written by the function.
    Function,

    /// Logs written by extensions.
    Extension,
}

/// A single captured log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was captured.
    pub time: DateTime<Utc>,

    /// Where the record came from.
    #[serde(rename = "type")]
    pub log_type: LogType,

    /// Record payload.
    pub record: serde_json::Value,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(log_type: LogType, record: serde_json::Value) -> Self {
        Self {
            time: Utc::now(),
            log_type,
            record,
        }
    }

    /// Creates a `function` record stamped with the current time.
    pub fn function(record: serde_json::Value) -> Self {
        Self::new(LogType::Function, record)
    }

    /// Size of the record once serialised as JSON.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// Point-in-time summary of the buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Number of buffered records.
    pub items: usize,

    /// Total serialised size of the buffered records.
    pub bytes: usize,

    /// Capture time of the oldest buffered record.
    pub oldest: Option<DateTime<Utc>>,
}

/// Append-only record store with an atomic drain.
#[derive(Debug, Default)]
pub struct LogBuffer {
    records: Mutex<VecDeque<LogRecord>>,

    /// Upper bound on buffered records. `None` leaves the buffer unbounded.
    max_records: Option<usize>,
}

impl LogBuffer {
    /// Creates an unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that drops its oldest records once `max_records` is exceeded.
    pub fn with_capacity_limit(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records: Some(max_records),
        }
    }

    /// Appends records to the tail, preserving their order.
    pub async fn append(&self, batch: Vec<LogRecord>) {
        let mut records = self.records.lock().await;
        records.extend(batch);

        if let Some(max) = self.max_records
            && records.len() > max
        {
            let excess = records.len() - max;
            records.drain(..excess);
            tracing::warn!(
                dropped_records = excess,
                max_records = max,
                "Log buffer overflow, dropped oldest records"
            );
        }
    }

    /// Takes every buffered record and leaves the buffer empty.
    pub async fn drain_all(&self) -> Vec<LogRecord> {
        let mut records = self.records.lock().await;
        std::mem::take(&mut *records).into()
    }

    /// Puts a previously drained batch back at the head of the buffer.
    ///
    /// Records appended since the drain stay behind the requeued batch, so
    /// the buffer keeps capture order. The capacity limit is not applied here.
    pub async fn requeue_front(&self, batch: Vec<LogRecord>) {
        let mut records = self.records.lock().await;
        for record in batch.into_iter().rev() {
            records.push_front(record);
        }
    }

    /// Number of buffered records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns `true` when nothing is buffered.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Copies the current contents without draining them.
    pub async fn snapshot(&self) -> Vec<LogRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    /// Drains the buffer if `predicate` accepts its current summary.
    ///
    /// The summary and the drain happen under one lock, so the decision is
    /// made on exactly the records that get taken. An empty buffer is never
    /// shown to `predicate` and yields `None`.
    pub async fn drain_if<F>(&self, predicate: F) -> Option<Vec<LogRecord>>
    where
        F: FnOnce(&BufferStats) -> bool,
    {
        let mut records = self.records.lock().await;
        if records.is_empty() || !predicate(&summarize(&records)) {
            return None;
        }
        Some(std::mem::take(&mut *records).into())
    }
}

fn summarize(records: &VecDeque<LogRecord>) -> BufferStats {
    BufferStats {
        items: records.len(),
        bytes: records.iter().map(LogRecord::encoded_len).sum(),
        oldest: records.front().map(|r| r.time),
    }
}

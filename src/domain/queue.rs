use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    Add,
    Delete,
    Adjust,
}

impl QueueOperation {
    pub const ALL: [QueueOperation; 3] = [
        QueueOperation::Add,
        QueueOperation::Delete,
        QueueOperation::Adjust,
    ];

    /// Tag persisted in `sync_queue.operation`.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueOperation::Add => "ADD_ACTIVITY",
            QueueOperation::Delete => "DELETE_ACTIVITY",
            QueueOperation::Adjust => "PRIORITY_ADJUST",
        }
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueOperation {
    type Err = ParseQueueOperationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let operation = match normalized.as_str() {
            "ADD_ACTIVITY" | "ADD" => QueueOperation::Add,
            "DELETE_ACTIVITY" | "DELETE" => QueueOperation::Delete,
            "PRIORITY_ADJUST" | "ADJUST" => QueueOperation::Adjust,
            _ => {
                return Err(ParseQueueOperationError {
                    value: value.to_string(),
                });
            }
        };
        Ok(operation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseQueueOperationError {
    value: String,
}

impl fmt::Display for ParseQueueOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid queue operation '{}': expected one of {}",
            self.value,
            QueueOperation::ALL
                .iter()
                .map(|op| op.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseQueueOperationError {}

/// One mutation recorded while the local store was active.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub operation: QueueOperation,
    pub activity: String,
    pub payload: Option<f64>,
    pub queued_at: String,
}

/// A queue row as stored, for inspection. Rows whose tag cannot be replayed
/// are listed too, with `problem` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingEntry {
    pub id: i64,
    pub operation: String,
    pub activity: String,
    pub payload: Option<f64>,
    pub queued_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

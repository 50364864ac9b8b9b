use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique task identifier. Issued from 1 upwards, never reused.
pub type TaskId = u64;

/// Message a task carries while it is running and nothing else was reported.
pub const DEFAULT_MESSAGE: &str = "OK";

/// Lifecycle state of a task.
///
/// ```text
/// running → finished
///         → failed
/// ```
///
/// Both terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a task at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub status: TaskStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let snap = TaskSnapshot {
            id: 7,
            status: TaskStatus::Running,
            message: DEFAULT_MESSAGE.into(),
            target_uri: None,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json, serde_json::json!({"id": 7, "status": "running", "message": "OK"}));
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Finished.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}

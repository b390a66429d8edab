//! The Task Record data model (spec. Data Model, "Task Record"; §4.6
//! "Progress Channel" frame shape).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `in_progress` is the only non-terminal state; `completed` is
/// absorbing (spec §4.5, "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// A worker is (or was, before a restart) actively processing rows.
    InProgress,
    /// The terminal state. Never transitions back to `InProgress`.
    Completed,
}

impl TaskStatus {
    /// The literal string persisted in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// A durable, resumable row tracking one CSV import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTask {
    /// Database-assigned identifier.
    pub id: i64,
    /// The user who submitted the import.
    pub user_id: i64,
    /// Stable object-store URL for the uploaded CSV.
    pub file_path: String,
    /// Counted pre-upload; excludes the header row.
    pub total_rows: i64,
    /// Rows successfully computed and inserted so far.
    pub successful_rows: i64,
    /// Rows that failed validation or computation so far.
    pub failed_rows: i64,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last time `successful_rows`/`failed_rows`/`status` were written.
    pub updated_at: DateTime<Utc>,
}

impl FileTask {
    /// The resume offset: how many rows have already been decided
    /// (successfully or not) by a prior run of this task.
    #[must_use]
    pub const fn processed_rows(&self) -> i64 {
        self.successful_rows + self.failed_rows
    }
}

/// One frame of the Progress Channel's push stream: `{"tasks": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFrame {
    /// Every Task row, newest first.
    pub tasks: Vec<FileTask>,
}

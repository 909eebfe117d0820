//! Task record model for the TaskMate assistant.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;
pub const DEFAULT_PRIORITY: u8 = 3;
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Rejection of raw input at the record boundary. The display strings are the
/// exact texts surfaced to the conversational caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("due_date must be in YYYY-MM-DD format")]
    MalformedDueDate { value: String },
    #[error("priority must be between 1 and 5")]
    PriorityOutOfRange { value: i64 },
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Upper-case tag used by the one-line task rendering.
    pub fn tag(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!(
                "invalid task status '{other}'. valid values: todo, in_progress, done"
            )),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checklist item owned by a single task. Names identify a subtask within its
/// parent only; duplicates are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl SubTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub status: TaskStatus,
    /// Wire format is `YYYY-MM-DD`; legacy records may carry an empty string,
    /// which reads back as no deadline.
    #[serde(default, deserialize_with = "due_date_from_wire")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Deprecated singular subtask. Read for records persisted by older
    /// builds and written back only when already present; new code never
    /// sets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_task: Option<SubTask>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn due_date_from_wire<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, DUE_DATE_FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id),
            description: description.into(),
            priority: DEFAULT_PRIORITY,
            status: TaskStatus::default(),
            due_date: None,
            tags: Vec::new(),
            notes: None,
            sub_task: None,
            sub_tasks: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn mark_done(&mut self) {
        self.status = TaskStatus::Done;
    }

    /// Re-checks the invariants serde cannot express, so deserialized records
    /// meet the same contract as tool input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.0.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "id" });
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(ValidationError::PriorityOutOfRange {
                value: self.priority as i64,
            });
        }
        Ok(())
    }
}

pub fn validate_priority(value: i64) -> Result<u8, ValidationError> {
    if (MIN_PRIORITY as i64..=MAX_PRIORITY as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ValidationError::PriorityOutOfRange { value })
    }
}

/// Validates a raw due-date string. Empty input means "no deadline" and maps
/// to `None` rather than an error.
pub fn validate_due_date(value: &str) -> Result<Option<NaiveDate>, ValidationError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DUE_DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::MalformedDueDate {
            value: value.to_string(),
        })
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::time;
use super::validate::ValidationError;

/// Fallback assignee when a record names nobody.
pub const DEFAULT_ASSIGNEE: &str = "eve";

/// Kanban column vocabulary. Snapshots may still carry the legacy
/// three-state vocabulary (todo / inProgress / completed), which is
/// mapped here on ingest and never stored back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Backlog,
    Assigned,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::Backlog,
        Self::Assigned,
        Self::InProgress,
        Self::Review,
        Self::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Assigned => "assigned",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(Self::Backlog),
            "assigned" => Some(Self::Assigned),
            "in-progress" => Some(Self::InProgress),
            "review" => Some(Self::Review),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Parse either the kanban vocabulary or the legacy one.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        Self::parse(s).or(match s {
            "todo" => Some(Self::Backlog),
            "inProgress" => Some(Self::InProgress),
            "completed" => Some(Self::Done),
            _ => None,
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee: String,
    pub category: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Task {
    /// Check the record shape after normalization or a write-layer read.
    ///
    /// The completion invariant is the important one: `completed_at` is
    /// set exactly when the task sits in the done column.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.status.is_done() != self.completed_at.is_some() {
            return Err(ValidationError::CompletionMismatch);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_done()
    }
}

/// Fields a caller supplies when creating a task. Everything else is
/// defaulted by the store.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub category: String,
    pub due_date: Option<NaiveDate>,
}

/// Partial update, shallow-merged over an existing task. `due_date`
/// is doubly optional so a patch can clear it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Loosely-typed task as it appears in the external snapshot. Ids may
/// be numbers, statuses may use the legacy vocabulary, and most fields
/// may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTask {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub completed_at: Option<String>,
}

impl RawTask {
    /// Normalize into the kanban-vocabulary record. Idempotent: a task
    /// already in the kanban format round-trips unchanged.
    pub fn normalize(self, now: NaiveDateTime) -> Result<Task, ValidationError> {
        let id = self
            .id
            .as_ref()
            .and_then(id_string)
            .ok_or(ValidationError::MissingField("id"))?;

        let status = map_status(self.status.as_deref(), self.completed.unwrap_or(false))?;

        let priority = match self.priority.as_deref() {
            None | Some("") => Priority::Medium,
            Some(p) => {
                Priority::parse(p).ok_or_else(|| ValidationError::UnknownPriority(p.to_string()))?
            }
        };

        let assignee = self
            .assignee
            .or(self.assigned_to)
            .map(|a| a.to_lowercase())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ASSIGNEE.to_string());

        let created_at = match self.created_at.as_deref() {
            Some(s) => {
                time::parse_instant(s).ok_or_else(|| ValidationError::BadTimestamp(s.to_string()))?
            }
            None => now,
        };
        let updated_at = match self.updated_at.as_deref() {
            Some(s) => {
                time::parse_instant(s).ok_or_else(|| ValidationError::BadTimestamp(s.to_string()))?
            }
            None => created_at,
        };

        // Repair the completion stamp so the invariant holds on ingest:
        // a done task without a stamp gets one, a non-done task loses it.
        let completed_at = if status.is_done() {
            self.completed_at
                .as_deref()
                .and_then(time::parse_instant)
                .or(Some(updated_at))
        } else {
            None
        };

        Ok(Task {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status,
            priority,
            assignee,
            category: self.category.unwrap_or_default(),
            due_date: self.due_date.as_deref().and_then(time::parse_date_prefix),
            created_at,
            updated_at,
            completed_at,
        })
    }
}

fn map_status(raw: Option<&str>, completed: bool) -> Result<TaskStatus, ValidationError> {
    let status = match raw {
        None | Some("") => TaskStatus::Backlog,
        Some(s) => TaskStatus::parse_lenient(s)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))?,
    };
    // A completed flag outranks a non-done status.
    if completed && !status.is_done() {
        Ok(TaskStatus::Done)
    } else {
        Ok(status)
    }
}

/// Snapshot ids may be strings or bare numbers; both become strings.
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

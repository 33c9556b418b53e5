use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Longest title the input surfaces accept, in grapheme clusters.
pub const TITLE_MAX: usize = 70;

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// The wire name (`todo`, `in_progress`, `done`)
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Human label used in notifications
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    /// The character shown inside the `[ ]` marker
    pub fn marker_char(self) -> char {
        match self {
            TaskStatus::Todo => ' ',
            TaskStatus::InProgress => '>',
            TaskStatus::Done => 'x',
        }
    }

    /// Cycle: todo → in_progress → done → todo
    pub fn next(self) -> TaskStatus {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" | "in-progress" | "active" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-assigned task identifier. Opaque to the client.
///
/// Row stores hand these out either as strings (UUIDs) or as integers, so
/// both JSON forms are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => TaskId(s),
            Raw::Int(n) => TaskId(n.to_string()),
        })
    }
}

/// A task row as the store returns it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owning identity; every read and write is scoped by it
    pub user_id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Advanced by the store on mutation
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Insert payload for a new row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl NewTask {
    /// A fresh `todo` task for `owner`
    pub fn todo(owner: &str, title: &str, description: &str) -> Self {
        NewTask {
            user_id: owner.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Todo,
        }
    }
}

/// Partial update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn content(title: &str, description: &str) -> Self {
        TaskPatch {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            status: None,
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Length of a title as the input surfaces count it
pub fn title_len(title: &str) -> usize {
    title.graphemes(true).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
        let s: TaskStatus = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(s, TaskStatus::Done);
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
    }

    #[test]
    fn status_cycle_wraps() {
        assert_eq!(TaskStatus::Todo.next(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.next(), TaskStatus::Done);
        assert_eq!(TaskStatus::Done.next(), TaskStatus::Todo);
    }

    #[test]
    fn status_parse_accepts_aliases() {
        assert_eq!(TaskStatus::parse("in-progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("todo"), Some(TaskStatus::Todo));
        assert_eq!(TaskStatus::parse("blocked"), None);
    }

    #[test]
    fn task_id_accepts_numbers_and_strings() {
        let a: TaskId = serde_json::from_str("42").unwrap();
        let b: TaskId = serde_json::from_str("\"9f1c\"").unwrap();
        assert_eq!(a.as_str(), "42");
        assert_eq!(b.as_str(), "9f1c");
    }

    #[test]
    fn task_row_with_null_description() {
        let row = r#"{
            "id": 7,
            "user_id": "u-1",
            "title": "Water plants",
            "description": null,
            "status": "in_progress",
            "created_at": "2025-03-02T10:15:00.123456+00:00",
            "updated_at": null
        }"#;
        let task: Task = serde_json::from_str(row).unwrap();
        assert_eq!(task.id, TaskId::from("7"));
        assert_eq!(task.description, "");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.updated_at.is_none());
    }

    #[test]
    fn patch_skips_unset_fields() {
        let json = serde_json::to_value(TaskPatch::status(TaskStatus::Done)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "done"}));
        let json = serde_json::to_value(TaskPatch::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn title_len_counts_graphemes() {
        assert_eq!(title_len("café"), 4);
        assert_eq!(title_len("👍🏽 ok"), 4);
    }
}

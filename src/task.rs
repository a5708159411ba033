//! Task data structures.
//!
//! This module defines the `Task` work item, its append-only `Comment`s, and `NewTask`,
//! the validated input of the create-task form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::*;

/// A work item scoped to exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    pub project_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_estimate: Option<u32>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u32>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Task {
    /// Short, upper-cased display key such as `WEB-T4` or `WEB-1A2B3C4D`.
    pub fn display_key(&self, project_key: &str) -> String {
        let short: String = self.id.chars().filter(|c| *c != '-').take(8).collect();
        format!("{}-{}", project_key, short.to_uppercase())
    }

    /// Timestamp of the most recent comment, if any.
    pub fn last_comment_at(&self) -> Option<DateTime<Utc>> {
        self.comments.last().map(|c| c.created_at)
    }
}

/// A comment on a task. Never edited or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task. Reporter and project come from the store context.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub time_estimate: Option<u32>,
}

impl Default for NewTask {
    fn default() -> Self {
        NewTask {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assignee_id: None,
            tags: Vec::new(),
            due_date: None,
            time_estimate: None,
        }
    }
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..NewTask::default()
        }
    }

    /// Check required fields before anything reaches the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_defaults_match_create_form() {
        let input = NewTask::new("Write docs");
        assert_eq!(input.status, TaskStatus::Todo);
        assert_eq!(input.priority, TaskPriority::Medium);
        assert!(input.assignee_id.is_none());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_blank_title_is_rejected() {
        assert_eq!(NewTask::new("   ").validate(), Err(ValidationError::EmptyTitle));
        assert_eq!(NewTask::default().validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_display_key() {
        let task = Task {
            id: "t4".into(),
            title: "Set up analytics".into(),
            description: String::new(),
            status: TaskStatus::Backlog,
            priority: TaskPriority::Medium,
            assignee_id: None,
            reporter_id: "u1".into(),
            project_id: "p1".into(),
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: None,
            time_estimate: None,
            time_spent: None,
            comments: vec![],
        };
        assert_eq!(task.display_key("WEB"), "WEB-T4");

        let long = Task { id: "1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809".into(), ..task };
        assert_eq!(long.display_key("WEB"), "WEB-1A2B3C4D");
    }

    #[test]
    fn test_task_json_roundtrip_omits_empty_optionals() {
        let now = Utc::now();
        let task = Task {
            id: "t1".into(),
            title: "Design homepage mockup".into(),
            description: String::new(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            assignee_id: None,
            reporter_id: "u1".into(),
            project_id: "p1".into(),
            tags: vec!["design".into()],
            created_at: now,
            updated_at: now,
            due_date: None,
            time_estimate: None,
            time_spent: None,
            comments: vec![],
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"status\":\"in-progress\""));
        assert!(!json.contains("assignee_id"));
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}

//! The task store: the single owner of the task list.
//!
//! Filtering and board partitioning read `TaskStore::tasks()`; only the store mutates it.
//! Creation takes the reporter and project from a `StoreContext` attached when the store
//! is composed, never from the caller's input.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::board::TaskMover;
use crate::db::split_and_normalise_tags;
use crate::error::{StoreError, ValidationError};
use crate::fields::TaskStatus;
use crate::task::{Comment, NewTask, Task};

/// Identity and selection injected into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContext {
    /// The signed-in user; becomes the reporter of created tasks and the author of comments.
    pub user_id: String,
    /// The active project; created tasks belong to it.
    pub project_id: String,
}

#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    context: Option<StoreContext>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        TaskStore { tasks, context: None }
    }

    pub fn with_context(mut self, context: StoreContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn context(&self) -> Option<&StoreContext> {
        self.context.as_ref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Create a task stamped with the current time.
    pub fn create_task(&mut self, input: NewTask) -> Result<Task, StoreError> {
        self.create_task_at(input, Utc::now())
    }

    /// Create a task at `now`. Invalid input never reaches the list.
    pub fn create_task_at(&mut self, input: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError> {
        input.validate()?;
        let context = self.context.as_ref().ok_or(StoreError::MissingContext)?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            status: input.status,
            priority: input.priority,
            assignee_id: input.assignee_id.filter(|a| !a.trim().is_empty()),
            reporter_id: context.user_id.clone(),
            project_id: context.project_id.clone(),
            tags: split_and_normalise_tags(&input.tags),
            created_at: now,
            updated_at: now,
            due_date: input.due_date,
            time_estimate: input.time_estimate,
            time_spent: None,
            comments: Vec::new(),
        };
        tracing::info!(task = %task.id, project = %task.project_id, status = %task.status, "task created");
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Set the status of `task_id`. Unknown ids are ignored. Returns whether a task changed.
    ///
    /// `updated_at` is refreshed even when the status is already `status`.
    pub fn move_task(&mut self, task_id: &str, status: TaskStatus) -> bool {
        self.move_task_at(task_id, status, Utc::now())
    }

    pub fn move_task_at(&mut self, task_id: &str, status: TaskStatus, now: DateTime<Utc>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            tracing::debug!(task = %task_id, "move ignored: unknown task");
            return false;
        };
        let from = task.status;
        task.status = status;
        touch(task, now);
        tracing::info!(task = %task_id, %from, to = %status, "task moved");
        true
    }

    /// Append a comment authored by the context user. Returns `Ok(None)` for unknown ids.
    pub fn add_comment(&mut self, task_id: &str, content: &str) -> Result<Option<Comment>, StoreError> {
        self.add_comment_at(task_id, content, Utc::now())
    }

    pub fn add_comment_at(
        &mut self,
        task_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Comment>, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let author_id = self
            .context
            .as_ref()
            .ok_or(StoreError::MissingContext)?
            .user_id
            .clone();
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            tracing::debug!(task = %task_id, "comment ignored: unknown task");
            return Ok(None);
        };

        // Append order must stay chronological even if the clock steps back.
        let created_at = task.last_comment_at().map_or(now, |last| last.max(now));
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            author_id,
            content: content.to_string(),
            created_at,
        };
        task.comments.push(comment.clone());
        touch(task, created_at);
        tracing::info!(task = %task_id, comment = %comment.id, "comment added");
        Ok(Some(comment))
    }
}

impl TaskMover for TaskStore {
    fn move_task(&mut self, task_id: &str, status: TaskStatus) -> bool {
        TaskStore::move_task(self, task_id, status)
    }
}

/// Refresh `updated_at`, never letting it fall behind `created_at`.
fn touch(task: &mut Task, now: DateTime<Utc>) {
    task.updated_at = now.max(task.created_at);
}

//! Filter engine: reduces the task list to what the current view shows.
//!
//! Every active rule must hold (project scope, status, priority, assignee, free-text
//! query). The query narrows the structural filters and never overrides them. The
//! output keeps the relative order of the input.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::fields::{AssigneeFilter, Choice, SortKey, TaskPriority, TaskStatus};
use crate::task::Task;

/// Criteria chosen in the toolbar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: String,
    pub status: Choice<TaskStatus>,
    pub priority: Choice<TaskPriority>,
    pub assignee: AssigneeFilter,
    pub query: String,
}

impl TaskFilter {
    /// A filter that shows every task of `project_id`.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        TaskFilter {
            project_id: project_id.into(),
            ..TaskFilter::default()
        }
    }

    pub fn status(mut self, status: Choice<TaskStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: Choice<TaskPriority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn assignee(mut self, assignee: AssigneeFilter) -> Self {
        self.assignee = assignee;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Reset everything except the project scope.
    pub fn clear(&mut self) {
        *self = TaskFilter::for_project(std::mem::take(&mut self.project_id));
    }

    /// True when only the project scope is in effect.
    pub fn is_unfiltered(&self) -> bool {
        self.status.is_all()
            && self.priority.is_all()
            && self.assignee == AssigneeFilter::All
            && self.query.trim().is_empty()
    }

    pub fn matches(&self, task: &Task) -> bool {
        task.project_id == self.project_id
            && self.status.accepts(&task.status)
            && self.priority.accepts(&task.priority)
            && self.assignee.accepts(task.assignee_id.as_deref())
            && self.matches_query(task)
    }

    fn matches_query(&self, task: &Task) -> bool {
        let query = self.query.trim();
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        task.title.to_lowercase().contains(&query) || task.description.to_lowercase().contains(&query)
    }

    /// One-line summary of the active criteria, e.g. `status=todo q="bug"`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.status.is_all() {
            parts.push(format!("status={}", self.status));
        }
        if !self.priority.is_all() {
            parts.push(format!("priority={}", self.priority));
        }
        if self.assignee != AssigneeFilter::All {
            parts.push(format!("assignee={}", self.assignee));
        }
        if !self.query.trim().is_empty() {
            parts.push(format!("q=\"{}\"", self.query.trim()));
        }
        if parts.is_empty() {
            "no filters".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// The visible subsequence of `tasks`, in input order.
pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<&'a Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

/// Stable sort of an already filtered list for the list view.
pub fn sort_tasks(tasks: &mut [&Task], key: SortKey) {
    match key {
        SortKey::Created => tasks.sort_by_key(|t| t.created_at),
        SortKey::Updated => tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
        SortKey::Due => tasks.sort_by_key(|t| t.due_date.unwrap_or(NaiveDate::MAX)),
        SortKey::Title => tasks.sort_by(|a, b| compare_titles(&a.title, &b.title)),
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

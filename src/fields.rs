//! Enumerations and field types for tasks, filters and views.
//!
//! Status and priority are closed sets shared by the store, the filter engine and the
//! board. Filter selectors are explicit tagged variants so the wildcard can never be
//! confused with a real value.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task workflow status. Each variant is one board lane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
}

impl TaskStatus {
    /// All statuses in board display order.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
    ];

    /// Human readable lane title.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "Backlog",
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::InReview => "In Review",
            TaskStatus::Done => "Done",
        }
    }

    /// Wire name, identical to the serde and clap spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::InReview => "in-review",
            TaskStatus::Done => "done",
        }
    }

    /// Position of this status in display order.
    pub fn index(self) -> usize {
        match self {
            TaskStatus::Backlog => 0,
            TaskStatus::Todo => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::InReview => 3,
            TaskStatus::Done => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The lane to the right, if any.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The lane to the left, if any.
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Urgent => "Urgent",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    /// Sort rank, most important first.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Urgent => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
}

impl OrgRole {
    pub fn label(self) -> &'static str {
        match self {
            OrgRole::Owner => "owner",
            OrgRole::Admin => "admin",
            OrgRole::Member => "member",
        }
    }
}

/// How the task collection is presented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Board,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Board => ViewMode::List,
            ViewMode::List => ViewMode::Board,
        }
    }
}

/// Available sorting options for the list view.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SortKey {
    Created,
    Updated,
    Priority,
    Due,
    Title,
}

/// A filter selector over a closed set: either the wildcard or one concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<T> {
    All,
    Exactly(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: PartialEq> Choice<T> {
    /// Whether `value` passes this selector.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Exactly(expected) => expected == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }
}

impl<T: Copy> Choice<T> {
    /// Step through `All` followed by every value of `values`, wrapping around.
    pub fn cycle(self, values: &[T]) -> Self
    where
        T: PartialEq,
    {
        match self {
            Choice::All => values.first().map_or(Choice::All, |v| Choice::Exactly(*v)),
            Choice::Exactly(current) => {
                let position = values.iter().position(|v| *v == current);
                match position.and_then(|i| values.get(i + 1)) {
                    Some(v) => Choice::Exactly(*v),
                    None => Choice::All,
                }
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::All => f.write_str("all"),
            Choice::Exactly(v) => write!(f, "{v}"),
        }
    }
}

impl<T: FromStr<Err = String>> FromStr for Choice<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Choice::All)
        } else {
            T::from_str(s.trim()).map(Choice::Exactly)
        }
    }
}

/// Assignee selector: everyone, nobody, or one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
    #[default]
    All,
    Unassigned,
    User(String),
}

impl AssigneeFilter {
    pub fn accepts(&self, assignee_id: Option<&str>) -> bool {
        match self {
            AssigneeFilter::All => true,
            AssigneeFilter::Unassigned => assignee_id.is_none(),
            AssigneeFilter::User(id) => assignee_id == Some(id.as_str()),
        }
    }

    /// Step through `All`, `Unassigned` and then each user id, wrapping around.
    pub fn cycle(&self, user_ids: &[String]) -> Self {
        match self {
            AssigneeFilter::All => AssigneeFilter::Unassigned,
            AssigneeFilter::Unassigned => user_ids
                .first()
                .map_or(AssigneeFilter::All, |id| AssigneeFilter::User(id.clone())),
            AssigneeFilter::User(current) => {
                let position = user_ids.iter().position(|id| id == current);
                match position.and_then(|i| user_ids.get(i + 1)) {
                    Some(id) => AssigneeFilter::User(id.clone()),
                    None => AssigneeFilter::All,
                }
            }
        }
    }
}

impl fmt::Display for AssigneeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssigneeFilter::All => f.write_str("all"),
            AssigneeFilter::Unassigned => f.write_str("unassigned"),
            AssigneeFilter::User(id) => f.write_str(id),
        }
    }
}

impl FromStr for AssigneeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("assignee filter cannot be empty".to_string());
        }
        Ok(match s.to_ascii_lowercase().as_str() {
            "all" => AssigneeFilter::All,
            "unassigned" | "none" => AssigneeFilter::Unassigned,
            _ => AssigneeFilter::User(s.to_string()),
        })
    }
}

//! Create-task form for the terminal user interface.
//!
//! Text fields and selectors share one navigation order. Submitting turns the form into
//! a validated `NewTask`; the reporter and project are added by the task store.

use chrono::NaiveDate;

use crate::db::parse_due_input;
use crate::error::ValidationError;
use crate::fields::{TaskPriority, TaskStatus};
use crate::project::User;
use crate::task::NewTask;
use crate::tui::input::InputField;

/// Navigation order of the form fields.
pub const TITLE_ORDER: usize = 0;
pub const DESCRIPTION_ORDER: usize = 1;
pub const TAGS_ORDER: usize = 2;
pub const DUE_ORDER: usize = 3;
pub const ESTIMATE_ORDER: usize = 4;
pub const ASSIGNEE_ORDER: usize = 5;
pub const STATUS_ORDER: usize = 6;
pub const PRIORITY_ORDER: usize = 7;
pub const FIELD_COUNT: usize = 8;

/// State of the create-task modal.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub title: InputField,
    pub description: InputField,
    pub tags: InputField,
    pub due: InputField,
    pub estimate: InputField,
    /// Index into `assignees`; 0 means unassigned.
    pub assignee: usize,
    pub status: usize,
    pub priority: usize,
    pub current_field: usize,
    /// `(user id, display name)`, preceded by the unassigned entry.
    pub assignees: Vec<(Option<String>, String)>,
    /// Last validation error, shown under the form.
    pub error: Option<String>,
}

impl TaskForm {
    /// An empty form whose assignee choices are `members`.
    pub fn new(members: &[&User]) -> Self {
        let mut assignees = vec![(None, "Unassigned".to_string())];
        assignees.extend(members.iter().map(|u| (Some(u.id.clone()), u.name.clone())));
        let defaults = NewTask::default();
        let mut form = TaskForm {
            title: InputField::new(),
            description: InputField::new(),
            tags: InputField::new(),
            due: InputField::new(),
            estimate: InputField::new(),
            assignee: 0,
            status: defaults.status.index(),
            priority: TaskPriority::ALL.iter().position(|p| *p == defaults.priority).unwrap_or(0),
            current_field: TITLE_ORDER,
            assignees,
            error: None,
        };
        form.update_active_field();
        form
    }

    pub fn selected_status(&self) -> TaskStatus {
        TaskStatus::ALL[self.status % TaskStatus::ALL.len()]
    }

    pub fn selected_priority(&self) -> TaskPriority {
        TaskPriority::ALL[self.priority % TaskPriority::ALL.len()]
    }

    pub fn selected_assignee(&self) -> &str {
        self.assignees.get(self.assignee).map_or("Unassigned", |(_, name)| name.as_str())
    }

    fn field_mut(&mut self, order: usize) -> Option<&mut InputField> {
        match order {
            TITLE_ORDER => Some(&mut self.title),
            DESCRIPTION_ORDER => Some(&mut self.description),
            TAGS_ORDER => Some(&mut self.tags),
            DUE_ORDER => Some(&mut self.due),
            ESTIMATE_ORDER => Some(&mut self.estimate),
            _ => None,
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
        self.update_active_field();
    }

    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
        self.update_active_field();
    }

    fn update_active_field(&mut self) {
        for order in 0..FIELD_COUNT {
            let active = order == self.current_field;
            if let Some(field) = self.field_mut(order) {
                field.active = active;
            }
        }
    }

    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.field_mut(self.current_field) {
            field.handle_char(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.field_mut(self.current_field) {
            field.handle_backspace();
        }
    }

    /// Move the cursor in text fields, or step through selector values.
    pub fn handle_left_right(&mut self, right: bool) {
        let step = |index: usize, len: usize| {
            if right {
                (index + 1) % len
            } else {
                (index + len - 1) % len
            }
        };
        match self.current_field {
            ASSIGNEE_ORDER => self.assignee = step(self.assignee, self.assignees.len()),
            STATUS_ORDER => self.status = step(self.status, TaskStatus::ALL.len()),
            PRIORITY_ORDER => self.priority = step(self.priority, TaskPriority::ALL.len()),
            order => {
                if let Some(field) = self.field_mut(order) {
                    if right {
                        field.move_cursor_right();
                    } else {
                        field.move_cursor_left();
                    }
                }
            }
        }
    }

    /// Validate the form into store input. Nothing is created here.
    pub fn to_new_task(&self, today: NaiveDate) -> Result<NewTask, ValidationError> {
        let due = self.due.value.trim();
        let due_date = if due.is_empty() {
            None
        } else {
            Some(parse_due_input(due, today).ok_or_else(|| ValidationError::InvalidDueDate(due.to_string()))?)
        };
        let estimate = self.estimate.value.trim();
        let time_estimate = if estimate.is_empty() {
            None
        } else {
            Some(
                estimate
                    .parse::<u32>()
                    .map_err(|_| ValidationError::InvalidEstimate(estimate.to_string()))?,
            )
        };
        let input = NewTask {
            title: self.title.value.clone(),
            description: self.description.value.trim().to_string(),
            status: self.selected_status(),
            priority: self.selected_priority(),
            assignee_id: self.assignees.get(self.assignee).and_then(|(id, _)| id.clone()),
            tags: vec![self.tags.value.clone()],
            due_date,
            time_estimate,
        };
        input.validate()?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: format!("{id}@example.com"),
            avatar_url: None,
        }
    }

    fn type_text(form: &mut TaskForm, text: &str) {
        for c in text.chars() {
            form.handle_char(c);
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    #[test]
    fn test_defaults_are_todo_and_medium() {
        let form = TaskForm::new(&[]);
        assert_eq!(form.selected_status(), TaskStatus::Todo);
        assert_eq!(form.selected_priority(), TaskPriority::Medium);
        assert_eq!(form.selected_assignee(), "Unassigned");
        assert!(form.title.active);
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let form = TaskForm::new(&[]);
        assert_eq!(form.to_new_task(today()), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_filled_form_produces_new_task() {
        let sarah = user("u2", "Sarah Williams");
        let mut form = TaskForm::new(&[&sarah]);
        type_text(&mut form, "Fix login");
        form.next_field();
        type_text(&mut form, "Session expires too early");
        form.next_field();
        type_text(&mut form, "Auth, bug, auth");
        form.next_field();
        type_text(&mut form, "tomorrow");
        form.next_field();
        type_text(&mut form, "90");
        form.next_field();
        form.handle_left_right(true);
        form.next_field();
        form.handle_left_right(true);
        form.next_field();
        form.handle_left_right(true);

        let input = form.to_new_task(today()).unwrap();
        assert_eq!(input.title, "Fix login");
        assert_eq!(input.description, "Session expires too early");
        assert_eq!(input.assignee_id.as_deref(), Some("u2"));
        assert_eq!(input.status, TaskStatus::InProgress);
        assert_eq!(input.priority, TaskPriority::High);
        assert_eq!(input.due_date, NaiveDate::from_ymd_opt(2024, 5, 7));
        assert_eq!(input.time_estimate, Some(90));
        assert_eq!(input.tags, vec!["Auth, bug, auth"]);
    }

    #[test]
    fn test_bad_due_and_estimate_are_rejected() {
        let mut form = TaskForm::new(&[]);
        type_text(&mut form, "X");
        form.current_field = DUE_ORDER;
        type_text(&mut form, "someday");
        assert_eq!(
            form.to_new_task(today()),
            Err(ValidationError::InvalidDueDate("someday".into()))
        );

        form.due.clear();
        type_text(&mut form, "in 99999999d");
        assert_eq!(
            form.to_new_task(today()),
            Err(ValidationError::InvalidDueDate("in 99999999d".into()))
        );

        form.due.clear();
        form.current_field = ESTIMATE_ORDER;
        type_text(&mut form, "1.5h");
        assert_eq!(
            form.to_new_task(today()),
            Err(ValidationError::InvalidEstimate("1.5h".into()))
        );
    }

    #[test]
    fn test_navigation_wraps_and_selectors_cycle() {
        let mut form = TaskForm::new(&[]);
        form.prev_field();
        assert_eq!(form.current_field, PRIORITY_ORDER);
        form.handle_left_right(false);
        assert_eq!(form.selected_priority(), TaskPriority::Low);
        form.next_field();
        assert_eq!(form.current_field, TITLE_ORDER);

        form.current_field = ASSIGNEE_ORDER;
        form.handle_left_right(true);
        assert_eq!(form.assignee, 0);
    }
}

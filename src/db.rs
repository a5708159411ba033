//! JSON document storage and shared helper functions.
//!
//! This module provides the `Database` struct that persists users, projects and tasks,
//! along with utility functions for tag normalisation, due date parsing and formatting.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::project::{Project, User};
use crate::task::Task;

/// In-memory copy of the persisted workspace.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Database {
    /// Load the database from a JSON file. A missing file yields an empty database.
    pub fn load(path: &Path) -> Result<Self> {
        let db: Database = read_json(path)?.unwrap_or_default();
        for issue in db.integrity_issues() {
            tracing::warn!(path = %path.display(), "{issue}");
        }
        tracing::debug!(
            users = db.users.len(),
            projects = db.projects.len(),
            tasks = db.tasks.len(),
            "database loaded"
        );
        Ok(db)
    }

    /// Save the database using an atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Find a project by its key, case-insensitively.
    pub fn project_by_key(&self, key: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.key.eq_ignore_ascii_case(key))
    }

    /// Insert a user or replace the stored copy with the same id.
    pub fn upsert_user(&mut self, user: User) {
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    /// Describe every dangling reference from a task to a project or user.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for t in &self.tasks {
            if self.project(&t.project_id).is_none() {
                issues.push(format!("task {} references unknown project {}", t.id, t.project_id));
            }
            if self.user(&t.reporter_id).is_none() {
                issues.push(format!("task {} references unknown reporter {}", t.id, t.reporter_id));
            }
            if let Some(assignee) = t.assignee_id.as_deref() {
                if self.user(assignee).is_none() {
                    issues.push(format!("task {} references unknown assignee {}", t.id, assignee));
                }
            }
        }
        issues
    }
}

/// Read a JSON document, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let buf = match fs::read_to_string(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&buf).map(Some).map_err(|source| AppError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Atomic-ish write via temp + rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(data.as_bytes())?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Normalise a tag string by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalise each tag.
/// Entry order is kept; later duplicates are dropped.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Parse human-readable due date input relative to `today`.
///
/// Supports:
/// - "today", "tomorrow"
/// - "monday" .. "sunday" and "next <weekday>"
/// - "end of week", "end of month"
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD" format
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "end of week" | "eow" => {
            let (_, end) = start_end_of_this_week(today);
            return Some(end);
        }
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)?;
            return Some(first_of_next - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|w| today.checked_add_signed(w));
            }
        }
    }

    let weekdays = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];
    let (name, skip_week) = match s.strip_prefix("next ") {
        Some(rest) => (rest, true),
        None => (s.as_str(), false),
    };
    if let Some(target) = weekdays.iter().position(|d| *d == name || d[..3] == *name) {
        let current = today.weekday().num_days_from_monday() as i64;
        let ahead = (target as i64 + 7 - current) % 7;
        let ahead = if skip_week { ahead + 7 } else { ahead };
        return Some(today + Duration::days(ahead));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Calculate the start and end dates of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    let end = start + Duration::days(6);
    (start, end)
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let days = (d - today).num_days();
            if days == 0 {
                "today".into()
            } else if days == 1 {
                "tomorrow".into()
            } else if days > 1 {
                format!("in {}d", days)
            } else {
                format!("{}d late", -days)
            }
        }
    }
}

/// Format a past timestamp relative to `now` ("just now", "5m ago", "3d ago").
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - at;
    if elapsed.num_minutes() < 1 {
        "just now".into()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 30 {
        format!("{}d ago", elapsed.num_days())
    } else {
        at.with_timezone(&Local).format("%Y-%m-%d").to_string()
    }
}

/// Format a minute count as `1h 30m`.
pub fn format_minutes(minutes: Option<u32>) -> String {
    match minutes {
        None => "-".into(),
        Some(m) if m < 60 => format!("{}m", m),
        Some(m) if m % 60 == 0 => format!("{}h", m / 60),
        Some(m) => format!("{}h {}m", m / 60, m % 60),
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Display name for an optional user id.
pub fn user_label(db: &Database, id: Option<&str>) -> String {
    match id {
        None => "Unassigned".into(),
        Some(id) => db.user(id).map_or_else(|| id.to_string(), |u| u.name.clone()),
    }
}

/// Print tasks in a formatted table.
pub fn print_table(db: &Database, project: &Project, tasks: &[&Task]) {
    println!(
        "{:<14} {:<12} {:<8} {:<16} {:<10} {}",
        "Key", "Status", "Pri", "Assignee", "Due", "Title [tags]"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<14} {:<12} {:<8} {:<16} {:<10} {}{}",
            truncate(&t.display_key(&project.key), 14),
            t.status.label(),
            t.priority.label(),
            truncate(&user_label(db, t.assignee_id.as_deref()), 16),
            format_due_relative(t.due_date, today),
            t.title,
            tags
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{TaskPriority, TaskStatus};

    fn sample_task(id: &str, project: &str, reporter: &str, assignee: Option<&str>) -> Task {
        let now = Utc::now();
        Task {
            id: id.into(),
            title: format!("Task {id}"),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            assignee_id: assignee.map(str::to_string),
            reporter_id: reporter.into(),
            project_id: project.into(),
            tags: vec![],
            created_at: now,
            updated_at: now,
            due_date: None,
            time_estimate: None,
            time_spent: None,
            comments: vec![],
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::load(&dir.path().join("db.json")).unwrap();
        assert!(db.tasks.is_empty());
        assert!(db.projects.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let mut db = Database::default();
        db.upsert_user(User {
            id: "u1".into(),
            name: "Alex".into(),
            email: "alex@example.com".into(),
            avatar_url: None,
        });
        db.tasks.push(sample_task("t1", "p1", "u1", None));
        db.save(&path).unwrap();

        let loaded = Database::load(&path).unwrap();
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.tasks[0].id, "t1");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Database::load(&path), Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_upsert_user_replaces() {
        let mut db = Database::default();
        let mut u = User {
            id: "u1".into(),
            name: "Alex".into(),
            email: "a@example.com".into(),
            avatar_url: None,
        };
        db.upsert_user(u.clone());
        u.name = "Alex Johnson".into();
        db.upsert_user(u);
        assert_eq!(db.users.len(), 1);
        assert_eq!(db.users[0].name, "Alex Johnson");
    }

    #[test]
    fn test_integrity_issues() {
        let mut db = Database::default();
        db.tasks.push(sample_task("t1", "p9", "u9", Some("u8")));
        let issues = db.integrity_issues();
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("unknown project p9"));
    }

    #[test]
    fn test_split_and_normalise_tags_keeps_order() {
        let tags = split_and_normalise_tags(&[
            "Front End, design".to_string(),
            "design".to_string(),
            " ,api".to_string(),
        ]);
        assert_eq!(tags, vec!["front-end", "design", "api"]);
    }

    #[test]
    fn test_parse_due_input() {
        // 2024-05-15 is a Wednesday.
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(parse_due_input("today", today), d(2024, 5, 15));
        assert_eq!(parse_due_input("Tomorrow", today), d(2024, 5, 16));
        assert_eq!(parse_due_input("in 3d", today), d(2024, 5, 18));
        assert_eq!(parse_due_input("in 2w", today), d(2024, 5, 29));
        assert_eq!(parse_due_input("eow", today), d(2024, 5, 19));
        assert_eq!(parse_due_input("end of month", today), d(2024, 5, 31));
        assert_eq!(parse_due_input("friday", today), d(2024, 5, 17));
        assert_eq!(parse_due_input("next fri", today), d(2024, 5, 24));
        assert_eq!(parse_due_input("2024-12-01", today), d(2024, 12, 1));
        assert_eq!(parse_due_input("someday", today), None);
    }

    #[test]
    fn test_parse_due_input_out_of_range_offsets() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(parse_due_input("in 99999999d", today), None);
        assert_eq!(parse_due_input("in 9999999999999w", today), None);
        assert_eq!(parse_due_input("in -99999999d", today), None);
        assert_eq!(parse_due_input(&format!("in {}d", i64::MAX), today), None);
    }

    #[test]
    fn test_format_helpers() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(Some(today), today), "today");
        assert_eq!(format_due_relative(NaiveDate::from_ymd_opt(2024, 5, 18), today), "in 3d");
        assert_eq!(format_due_relative(NaiveDate::from_ymd_opt(2024, 5, 13), today), "2d late");

        assert_eq!(format_minutes(None), "-");
        assert_eq!(format_minutes(Some(45)), "45m");
        assert_eq!(format_minutes(Some(120)), "2h");
        assert_eq!(format_minutes(Some(150)), "2h 30m");

        let now = Utc::now();
        assert_eq!(format_relative_time(now, now), "just now");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");

        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}

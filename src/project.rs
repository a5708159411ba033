//! Users, projects and naming conventions.
//!
//! Projects carry a short human key (e.g. `WEB`) used to prefix task keys. Organizations
//! are addressed by a slug derived from their name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of a project key.
pub const MAX_KEY_LEN: usize = 10;

/// A person who can report, be assigned to, or comment on tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    /// Up to two upper-case initials for compact card rendering.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// A project groups tasks and has a lead and a member set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lead_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a project with a fresh id. The lead is always a member.
    pub fn new(
        name: &str,
        raw_key: &str,
        description: &str,
        lead_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let key = normalise_project_key(raw_key);
        if key.is_empty() {
            return Err(ValidationError::EmptyProjectKey);
        }
        Ok(Project {
            id: Uuid::new_v4().to_string(),
            key,
            name: name.to_string(),
            description: description.trim().to_string(),
            lead_id: lead_id.to_string(),
            members: vec![lead_id.to_string()],
            created_at: now,
        })
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.lead_id == user_id || self.members.iter().any(|m| m == user_id)
    }

    /// Add a member; no-op if already present.
    pub fn add_member(&mut self, user_id: &str) {
        if !self.members.iter().any(|m| m == user_id) {
            self.members.push(user_id.to_string());
        }
    }
}

/// Convert user input into a project key: ASCII letters and digits, upper-cased, capped
/// at `MAX_KEY_LEN` characters.
pub fn normalise_project_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_KEY_LEN)
        .collect()
}

/// Suggest a key from a project name: initials of its words, or the first letters of a
/// single-word name.
pub fn suggest_project_key(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let raw: String = if words.len() > 1 {
        words.iter().filter_map(|w| w.chars().next()).collect()
    } else {
        name.chars().take(3).collect()
    };
    normalise_project_key(&raw)
}

/// Organization slug: lower-cased, runs of whitespace replaced by a single hyphen.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_project_key() {
        assert_eq!(normalise_project_key("web"), "WEB");
        assert_eq!(normalise_project_key(" m-o b "), "MOB");
        assert_eq!(normalise_project_key("!!!"), "");
        assert_eq!(normalise_project_key("abcdefghijklmnop"), "ABCDEFGHIJ");
    }

    #[test]
    fn test_suggest_project_key() {
        assert_eq!(suggest_project_key("Data Analytics Platform"), "DAP");
        assert_eq!(suggest_project_key("Website"), "WEB");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify("Single"), "single");
    }

    #[test]
    fn test_project_new_validates_and_adds_lead() {
        let now = Utc::now();
        let p = Project::new("Website Redesign", "web", "", "u1", now).unwrap();
        assert_eq!(p.key, "WEB");
        assert!(p.is_member("u1"));
        assert_eq!(p.members, vec!["u1".to_string()]);

        assert_eq!(
            Project::new("  ", "web", "", "u1", now),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            Project::new("Website", "--", "", "u1", now),
            Err(ValidationError::EmptyProjectKey)
        );
    }

    #[test]
    fn test_initials() {
        let u = User {
            id: "u1".into(),
            name: "Alex Johnson".into(),
            email: "alex@example.com".into(),
            avatar_url: None,
        };
        assert_eq!(u.initials(), "AJ");
    }
}

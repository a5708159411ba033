//! Demo workspace: four users, three projects and twelve tasks.
//!
//! Dates and effort numbers are drawn from a seeded `StdRng`, so the same seed always
//! yields the same workspace relative to `now`.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::db::Database;
use crate::fields::{TaskPriority, TaskStatus};
use crate::project::{Project, User};
use crate::task::Task;

pub const DEFAULT_SEED: u64 = 42;

/// Ids of the demo projects.
pub const DEMO_PROJECTS: [&str; 3] = ["p1", "p2", "p3"];

#[derive(Debug, Clone)]
pub struct DemoData {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
}

/// What `install` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub added: usize,
    pub replaced: usize,
    pub skipped: usize,
}

const USERS: [(&str, &str, &str, &str); 4] = [
    ("u1", "Alex Johnson", "alex@example.com", "614810"),
    ("u2", "Sarah Williams", "sarah@example.com", "774909"),
    ("u3", "Michael Brown", "michael@example.com", "220453"),
    ("u4", "Emily Davis", "emily@example.com", "1239291"),
];

struct ProjectRow {
    id: &'static str,
    name: &'static str,
    key: &'static str,
    description: &'static str,
    lead: &'static str,
    members: [&'static str; 3],
    created: (i32, u32, u32),
}

const PROJECTS: [ProjectRow; 3] = [
    ProjectRow {
        id: "p1",
        name: "Website Redesign",
        key: "WEB",
        description: "Redesign the company website with new branding",
        lead: "u1",
        members: ["u1", "u2", "u3"],
        created: (2023, 1, 15),
    },
    ProjectRow {
        id: "p2",
        name: "Mobile App Development",
        key: "MOB",
        description: "Develop a new mobile app for both iOS and Android",
        lead: "u3",
        members: ["u2", "u3", "u4"],
        created: (2023, 3, 10),
    },
    ProjectRow {
        id: "p3",
        name: "Data Analytics Platform",
        key: "DAP",
        description: "Build a data analytics platform for internal use",
        lead: "u2",
        members: ["u1", "u2", "u4"],
        created: (2023, 2, 22),
    },
];

type TaskRow = (
    &'static str,
    &'static str,
    &'static str,
    TaskStatus,
    TaskPriority,
    &'static str,
    &'static str,
    Option<&'static str>,
    &'static [&'static str],
);

#[rustfmt::skip]
const TASKS: [TaskRow; 12] = [
    ("t1", "Design homepage mockup",
     "Create a mockup for the new homepage design based on the approved brand guidelines.",
     TaskStatus::Done, TaskPriority::High, "p1", "u1", Some("u2"), &["design", "homepage"]),
    ("t2", "Implement responsive navigation",
     "Build a responsive navigation menu that works well on all devices.",
     TaskStatus::InProgress, TaskPriority::Medium, "p1", "u1", Some("u3"), &["development", "frontend"]),
    ("t3", "Optimize images for web",
     "Optimize all product images for web to improve load times.",
     TaskStatus::Todo, TaskPriority::Low, "p1", "u2", Some("u4"), &["optimization"]),
    ("t4", "Set up analytics",
     "Set up Google Analytics and configure custom events.",
     TaskStatus::Backlog, TaskPriority::Medium, "p1", "u1", None, &["analytics"]),
    ("t5", "Design user onboarding flow",
     "Create a user-friendly onboarding experience for new app users.",
     TaskStatus::InProgress, TaskPriority::High, "p2", "u3", Some("u2"), &["design", "onboarding"]),
    ("t6", "Implement user authentication",
     "Build a secure authentication system with email and social login options.",
     TaskStatus::Todo, TaskPriority::High, "p2", "u3", Some("u3"), &["development", "security"]),
    ("t7", "Create offline mode",
     "Implement functionality to allow basic app usage without internet connection.",
     TaskStatus::Backlog, TaskPriority::Medium, "p2", "u4", Some("u4"), &["development", "feature"]),
    ("t8", "Beta testing",
     "Organize and conduct beta testing with a small group of users.",
     TaskStatus::Backlog, TaskPriority::Medium, "p2", "u3", None, &["testing"]),
    ("t9", "Design database schema",
     "Create an efficient database schema for the analytics platform.",
     TaskStatus::Done, TaskPriority::High, "p3", "u2", Some("u1"), &["database", "design"]),
    ("t10", "Implement data visualization",
     "Add interactive charts and graphs to visualize the analytics data.",
     TaskStatus::InReview, TaskPriority::High, "p3", "u2", Some("u4"), &["frontend", "visualization"]),
    ("t11", "Create export functionality",
     "Add ability to export reports in CSV and PDF formats.",
     TaskStatus::InProgress, TaskPriority::Medium, "p3", "u4", Some("u1"), &["feature", "export"]),
    ("t12", "Set up automated reports",
     "Create a system for scheduling and sending automated reports.",
     TaskStatus::Todo, TaskPriority::Low, "p3", "u2", Some("u2"), &["automation", "reports"]),
];

fn avatar_url(photo: &str) -> String {
    format!(
        "https://images.pexels.com/photos/{photo}/pexels-photo-{photo}.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=2"
    )
}

fn project_created(ymd: (i32, u32, u32)) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Build the demo workspace for `seed` as of `now`.
pub fn demo_data(seed: u64, now: DateTime<Utc>) -> DemoData {
    let mut rng = StdRng::seed_from_u64(seed);
    let today: NaiveDate = now.date_naive();

    let users = USERS
        .iter()
        .map(|(id, name, email, photo)| User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            avatar_url: Some(avatar_url(photo)),
        })
        .collect();

    let projects = PROJECTS
        .iter()
        .map(|row| Project {
            id: row.id.to_string(),
            key: row.key.to_string(),
            name: row.name.to_string(),
            description: row.description.to_string(),
            lead_id: row.lead.to_string(),
            members: row.members.iter().map(|m| m.to_string()).collect(),
            created_at: project_created(row.created),
        })
        .collect();

    let tasks = TASKS
        .iter()
        .map(|(id, title, description, status, priority, project, reporter, assignee, tags)| {
            let created_at = now - Duration::days(rng.gen_range(0..30));
            let updated_at = (created_at + Duration::days(rng.gen_range(0..7))).min(now);
            let due_date = (rng.gen::<f64>() > 0.3).then(|| today + Duration::days(rng.gen_range(0..14) + 1));
            let time_estimate = (rng.gen::<f64>() > 0.5).then(|| rng.gen_range(0..480) + 60);
            let time_spent = (rng.gen::<f64>() > 0.7).then(|| rng.gen_range(0..360));
            Task {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                status: *status,
                priority: *priority,
                assignee_id: assignee.map(str::to_string),
                reporter_id: reporter.to_string(),
                project_id: project.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_at,
                updated_at,
                due_date,
                time_estimate,
                time_spent,
                comments: Vec::new(),
            }
        })
        .collect();

    DemoData { users, projects, tasks }
}

/// Merge demo data into `db`. Existing ids are kept unless `force` is set. A replaced
/// project keeps the members it already had.
pub fn install(db: &mut Database, data: DemoData, force: bool) -> SeedReport {
    let mut report = SeedReport::default();
    let projects = data
        .projects
        .into_iter()
        .map(|mut project| {
            if let Some(current) = db.project(&project.id) {
                for member in &current.members {
                    project.add_member(member);
                }
            }
            project
        })
        .collect();
    merge(&mut db.users, data.users, |u| u.id.clone(), force, &mut report);
    merge(&mut db.projects, projects, |p| p.id.clone(), force, &mut report);
    merge(&mut db.tasks, data.tasks, |t| t.id.clone(), force, &mut report);
    tracing::info!(
        added = report.added,
        replaced = report.replaced,
        skipped = report.skipped,
        "demo data installed"
    );
    report
}

fn merge<T>(existing: &mut Vec<T>, incoming: Vec<T>, id: impl Fn(&T) -> String, force: bool, report: &mut SeedReport) {
    for item in incoming {
        let key = id(&item);
        match existing.iter().position(|e| id(e) == key) {
            Some(i) if force => {
                existing[i] = item;
                report.replaced += 1;
            }
            Some(_) => report.skipped += 1,
            None => {
                existing.push(item);
                report.added += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{tasks_for_lane, LANES};
    use crate::filter::{filter_tasks, TaskFilter};

    #[test]
    fn test_demo_data_shape() {
        let data = demo_data(DEFAULT_SEED, Utc::now());
        assert_eq!(data.users.len(), 4);
        assert_eq!(data.projects.len(), 3);
        assert_eq!(data.tasks.len(), 12);
        assert_eq!(data.projects[0].key, "WEB");
        assert_eq!(data.users[0].name, "Alex Johnson");
        assert!(data.tasks.iter().all(|t| t.comments.is_empty()));
    }

    #[test]
    fn test_same_seed_same_data() {
        let now = Utc::now();
        let a = demo_data(7, now);
        let b = demo_data(7, now);
        assert_eq!(a.tasks, b.tasks);
    }

    #[test]
    fn test_generated_values_stay_in_range() {
        let now = Utc::now();
        let today = now.date_naive();
        for seed in 0..20 {
            for t in demo_data(seed, now).tasks {
                assert!(t.updated_at >= t.created_at, "{}", t.id);
                assert!(now - t.created_at < Duration::days(30));
                if let Some(due) = t.due_date {
                    assert!(due > today && due <= today + Duration::days(14));
                }
                if let Some(est) = t.time_estimate {
                    assert!((60..540).contains(&est));
                }
                if let Some(spent) = t.time_spent {
                    assert!(spent < 360);
                }
            }
        }
    }

    #[test]
    fn test_install_has_no_dangling_references() {
        let mut db = Database::default();
        let report = install(&mut db, demo_data(1, Utc::now()), false);
        assert_eq!(report.added, 19);
        assert!(db.integrity_issues().is_empty());
    }

    #[test]
    fn test_install_twice_skips_unless_forced() {
        let mut db = Database::default();
        install(&mut db, demo_data(1, Utc::now()), false);
        db.tasks[0].title = "Renamed".into();

        let report = install(&mut db, demo_data(1, Utc::now()), false);
        assert_eq!(report, SeedReport { added: 0, replaced: 0, skipped: 19 });
        assert_eq!(db.tasks[0].title, "Renamed");

        let report = install(&mut db, demo_data(1, Utc::now()), true);
        assert_eq!(report.replaced, 19);
        assert_eq!(db.tasks[0].title, "Design homepage mockup");
        assert_eq!(db.tasks.len(), 12);
    }

    #[test]
    fn test_forced_install_keeps_joined_members() {
        let mut db = Database::default();
        install(&mut db, demo_data(1, Utc::now()), false);
        db.project_mut("p1").unwrap().add_member("late-joiner");
        let seeded = db.project("p1").unwrap().members.clone();

        install(&mut db, demo_data(1, Utc::now()), true);
        let members = &db.project("p1").unwrap().members;
        assert!(members.iter().any(|m| m == "late-joiner"));
        assert!(seeded.iter().all(|m| members.contains(m)));
        assert_eq!(members.len(), seeded.len());
    }

    #[test]
    fn test_demo_board_for_website_project() {
        let data = demo_data(DEFAULT_SEED, Utc::now());
        let visible = filter_tasks(&data.tasks, &TaskFilter::for_project("p1"));
        let counts: Vec<usize> = LANES
            .iter()
            .map(|lane| tasks_for_lane(visible.iter().copied(), lane.status).len())
            .collect();
        assert_eq!(counts, vec![1, 1, 1, 0, 1]);
    }
}

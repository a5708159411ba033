//! Command implementations for the CLI interface.
//!
//! Every handler works on a [`Context`] holding the loaded database and settings. Commands
//! that change tasks need a signed-in session and an active project; they build a
//! [`TaskStore`] scoped to both, apply the change, and write the tasks back.

use std::collections::BTreeMap;

use chrono::{Local, Utc};
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};

use crate::board::Board;
use crate::config::{Config, Settings};
use crate::db::*;
use crate::error::{AppError, Result, ValidationError};
use crate::fields::*;
use crate::filter::{filter_tasks, sort_tasks, TaskFilter};
use crate::gateway::{Gateway, LocalGateway, Session};
use crate::project::{suggest_project_key, Project, User};
use crate::seed::{self, DEFAULT_SEED, DEMO_PROJECTS};
use crate::session::{AuthState, OrganizationsState};
use crate::store::{StoreContext, TaskStore};
use crate::task::{NewTask, Task};
use crate::tui::run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in.
    Signup {
        email: String,
        /// Full name shown on cards and comments.
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },

    /// Sign in to an existing account.
    Signin {
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out.
    Signout,

    /// Show the signed-in account and active project.
    Whoami,

    /// Organizations of the signed-in user.
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },

    /// Install the demo users, projects and tasks.
    Seed {
        /// Seed for generated timestamps, due dates and estimates.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        /// Replace records that already exist.
        #[arg(long)]
        force: bool,
    },

    /// List known users.
    Users,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Add a task to the active project.
    Add {
        title: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = TaskStatus::Todo)]
        status: TaskStatus,
        #[arg(long, value_enum, default_value_t = TaskPriority::Medium)]
        priority: TaskPriority,
        /// User id, email or name.
        #[arg(long)]
        assignee: Option<String>,
        /// Tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Due date: YYYY-MM-DD, today, tomorrow, friday, next monday, in 3d, eow, eom.
        #[arg(long)]
        due: Option<String>,
        /// Time estimate in minutes.
        #[arg(long)]
        estimate: Option<u32>,
    },

    /// List tasks of the active project as a table.
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = SortKey::Updated)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the board, one section per lane.
    Board {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Move a task to another lane.
    Move {
        /// Task id, id prefix, key (WEB-T1) or exact title.
        id: String,
        #[arg(value_enum)]
        status: TaskStatus,
    },

    /// Comment on a task as the signed-in user.
    Comment { id: String, text: String },

    /// Show a task with its comments.
    View { id: String },

    /// Open the interactive board.
    Ui {
        /// Start in this view instead of the remembered one.
        #[arg(long, value_enum)]
        view: Option<ViewMode>,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum OrgAction {
    /// Organizations you belong to, oldest first.
    List,
    /// Create an organization you own.
    Create { name: String },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List projects; the active one is marked with *.
    List,
    /// Create a project and make it active if none is.
    Add {
        name: String,
        /// Short uppercase key used in task keys. Derived from the name by default.
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Lead user id, email or name. Defaults to you.
        #[arg(long)]
        lead: Option<String>,
    },
    /// Select the active project by key.
    Use { key: String },
}

/// Toolbar filters shared by `list` and `board`.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Status: all or a lane name.
    #[arg(long, default_value = "all")]
    pub status: Choice<TaskStatus>,
    /// Priority: all, low, medium, high or urgent.
    #[arg(long, default_value = "all")]
    pub priority: Choice<TaskPriority>,
    /// Assignee: all, unassigned, or a user id, email or name.
    #[arg(long, default_value = "all")]
    pub assignee: AssigneeFilter,
    /// Case-insensitive text matched against title and description.
    #[arg(long, short)]
    pub query: Option<String>,
}

/// Loaded state shared by the handlers.
pub struct Context {
    pub config: Config,
    pub db: Database,
    pub settings: Settings,
}

impl Context {
    pub fn load(config: Config) -> Result<Self> {
        let db = Database::load(&config.db_path())?;
        let settings = Settings::load(&config.settings_path())?;
        Ok(Context { config, db, settings })
    }

    fn save_db(&self) -> Result<()> {
        self.db.save(&self.config.db_path())
    }

    fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.config.settings_path())
    }

    fn gateway(&self) -> Result<LocalGateway> {
        Ok(LocalGateway::open(self.config.gateway_dir())?)
    }

    fn session(&self) -> Result<Session> {
        self.gateway()?.get_session().ok_or(AppError::NotSignedIn)
    }

    fn active_project(&self) -> Result<&Project> {
        let id = self.settings.active_project.as_deref().ok_or(AppError::NoActiveProject)?;
        self.db.project(id).ok_or_else(|| AppError::UnknownProject(id.to_string()))
    }

    /// Store scoped to the signed-in user and the active project.
    fn store(&self) -> Result<TaskStore> {
        let context = StoreContext {
            user_id: self.session()?.user_id,
            project_id: self.active_project()?.id.clone(),
        };
        Ok(TaskStore::new(self.db.tasks.clone()).with_context(context))
    }

    /// Write a store's tasks back into the database file.
    fn commit(&mut self, store: TaskStore) -> Result<()> {
        self.db.tasks = store.into_tasks();
        self.save_db()
    }

    /// Mirror a gateway session into the user table so tasks can reference it.
    fn remember_user(&mut self, session: &Session) -> Result<()> {
        let avatar_url = self.db.user(&session.user_id).and_then(|u| u.avatar_url.clone());
        self.db.upsert_user(User {
            id: session.user_id.clone(),
            name: session.full_name.clone(),
            email: session.email.clone(),
            avatar_url,
        });
        self.save_db()
    }
}

/// Find a user by id, email or name (case-insensitive).
fn resolve_user<'a>(db: &'a Database, identifier: &str) -> Result<&'a User> {
    let needle = identifier.trim();
    db.users
        .iter()
        .find(|u| u.id == needle)
        .or_else(|| db.users.iter().find(|u| u.email.eq_ignore_ascii_case(needle)))
        .or_else(|| db.users.iter().find(|u| u.name.eq_ignore_ascii_case(needle)))
        .ok_or_else(|| AppError::UnknownUser(needle.to_string()))
}

/// Resolve a task identifier within `project`: exact id, task key, unique id prefix,
/// or exact title.
fn resolve_task_identifier<'a>(identifier: &str, db: &'a Database, project: &Project) -> Result<&'a Task> {
    let needle = identifier.trim();
    let tasks: Vec<&Task> = db.tasks.iter().filter(|t| t.project_id == project.id).collect();

    if let Some(task) = tasks.iter().copied().find(|t| t.id == needle) {
        return Ok(task);
    }
    if let Some(task) = tasks
        .iter()
        .copied()
        .find(|t| t.display_key(&project.key).eq_ignore_ascii_case(needle))
    {
        return Ok(task);
    }

    let lowered = needle.to_lowercase();
    let by_prefix: Vec<&Task> = tasks
        .iter()
        .copied()
        .filter(|t| !lowered.is_empty() && t.id.to_lowercase().starts_with(&lowered))
        .collect();
    let matches = if by_prefix.is_empty() {
        tasks
            .iter()
            .copied()
            .filter(|t| t.title.to_lowercase() == lowered)
            .collect()
    } else {
        by_prefix
    };

    match matches.len() {
        0 => Err(AppError::UnknownTask(format!("No task found matching '{needle}' in {}", project.key))),
        1 => Ok(matches[0]),
        _ => {
            let mut msg = format!("Multiple tasks match '{needle}':\n");
            for t in &matches {
                msg.push_str(&format!("  {}: {}\n", t.display_key(&project.key), t.title));
            }
            msg.push_str("Please use the task key instead.");
            Err(AppError::UnknownTask(msg))
        }
    }
}

fn build_filter(db: &Database, project: &Project, args: FilterArgs) -> Result<TaskFilter> {
    let assignee = match args.assignee {
        AssigneeFilter::User(who) => AssigneeFilter::User(resolve_user(db, &who)?.id.clone()),
        other => other,
    };
    Ok(TaskFilter::for_project(project.id.clone())
        .status(args.status)
        .priority(args.priority)
        .assignee(assignee)
        .query(args.query.unwrap_or_default()))
}

pub fn cmd_signup(ctx: &mut Context, email: &str, name: &str, password: &str) -> Result<()> {
    let mut gateway = ctx.gateway()?;
    let mut auth = AuthState::attach(&mut gateway);
    let ok = auth.sign_up(&mut gateway, email, password, name);
    auth.detach(&mut gateway);
    let session = match (ok, auth.user) {
        (true, Some(session)) => session,
        _ => return Err(AppError::Auth(auth.error.unwrap_or_default())),
    };
    ctx.remember_user(&session)?;
    println!("Welcome, {}! You are signed in as {}.", session.full_name, session.email);
    Ok(())
}

pub fn cmd_signin(ctx: &mut Context, email: &str, password: &str) -> Result<()> {
    let mut gateway = ctx.gateway()?;
    let mut auth = AuthState::attach(&mut gateway);
    let ok = auth.sign_in(&mut gateway, email, password);
    auth.detach(&mut gateway);
    let session = match (ok, auth.user) {
        (true, Some(session)) => session,
        _ => return Err(AppError::Auth(auth.error.unwrap_or_default())),
    };
    ctx.remember_user(&session)?;
    println!("Signed in as {} <{}>", session.full_name, session.email);
    Ok(())
}

pub fn cmd_signout(ctx: &mut Context) -> Result<()> {
    let mut gateway = ctx.gateway()?;
    if gateway.get_session().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    let mut auth = AuthState::attach(&mut gateway);
    let ok = auth.sign_out(&mut gateway);
    auth.detach(&mut gateway);
    if !ok {
        return Err(AppError::Auth(auth.error.unwrap_or_default()));
    }
    println!("Signed out.");
    Ok(())
}

pub fn cmd_whoami(ctx: &Context) -> Result<()> {
    match ctx.gateway()?.get_session() {
        Some(session) => {
            println!("User:     {} <{}>", session.full_name, session.email);
            println!("Since:    {}", format_relative_time(session.signed_in_at, Utc::now()));
        }
        None => println!("Not signed in."),
    }
    match ctx.active_project() {
        Ok(project) => println!("Project:  {} ({})", project.name, project.key),
        Err(_) => println!("Project:  -"),
    }
    Ok(())
}

pub fn cmd_org(ctx: &mut Context, action: OrgAction) -> Result<()> {
    let mut gateway = ctx.gateway()?;
    let session = gateway.get_session().ok_or(AppError::NotSignedIn)?;
    let mut orgs = OrganizationsState::default();
    match action {
        OrgAction::List => {
            if !orgs.load(&gateway, &session.user_id) {
                return Err(AppError::Auth(orgs.error.unwrap_or_default()));
            }
            if orgs.organizations.is_empty() {
                println!("You do not belong to any organization yet.");
                return Ok(());
            }
            println!("{:<24} {:<24} {:<8} {}", "Name", "Slug", "Role", "Created");
            for entry in &orgs.organizations {
                println!(
                    "{:<24} {:<24} {:<8} {}",
                    truncate(&entry.organization.name, 24),
                    truncate(&entry.organization.slug, 24),
                    entry.role.label(),
                    entry.organization.created_at.with_timezone(&Local).format("%Y-%m-%d")
                );
            }
        }
        OrgAction::Create { name } => match orgs.create(&mut gateway, &session.user_id, &name) {
            Some(org) => println!("Created organization {} ({}).", org.name, org.slug),
            None => return Err(AppError::Auth(orgs.error.unwrap_or_default())),
        },
    }
    Ok(())
}

pub fn cmd_seed(ctx: &mut Context, seed: u64, force: bool) -> Result<()> {
    let data = seed::demo_data(seed, Utc::now());
    let report = seed::install(&mut ctx.db, data, force);

    // Let the signed-in user work on the demo projects straight away.
    if let Ok(session) = ctx.session() {
        for id in DEMO_PROJECTS {
            if let Some(project) = ctx.db.project_mut(id) {
                project.add_member(&session.user_id);
            }
        }
    }
    if ctx.active_project().is_err() {
        ctx.settings.active_project = ctx.db.projects.first().map(|p| p.id.clone());
        ctx.save_settings()?;
    }
    ctx.save_db()?;
    println!(
        "Demo data installed: {} added, {} replaced, {} skipped.",
        report.added, report.replaced, report.skipped
    );
    Ok(())
}

pub fn cmd_users(ctx: &Context) -> Result<()> {
    println!("{:<38} {:<6} {:<20} {}", "ID", "Init", "Name", "Email");
    for u in &ctx.db.users {
        println!("{:<38} {:<6} {:<20} {}", u.id, u.initials(), truncate(&u.name, 20), u.email);
    }
    Ok(())
}

pub fn cmd_project(ctx: &mut Context, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::List => {
            let active = ctx.settings.active_project.as_deref();
            let counts: BTreeMap<&str, usize> = ctx.db.tasks.iter().fold(BTreeMap::new(), |mut acc, t| {
                *acc.entry(t.project_id.as_str()).or_default() += 1;
                acc
            });
            println!("  {:<10} {:<28} {:<20} {}", "Key", "Name", "Lead", "Tasks");
            for p in &ctx.db.projects {
                let marker = if Some(p.id.as_str()) == active { "*" } else { " " };
                println!(
                    "{} {:<10} {:<28} {:<20} {}",
                    marker,
                    p.key,
                    truncate(&p.name, 28),
                    truncate(&user_label(&ctx.db, Some(&p.lead_id)), 20),
                    counts.get(p.id.as_str()).copied().unwrap_or(0)
                );
            }
        }
        ProjectAction::Add { name, key, desc, lead } => {
            let session = ctx.session()?;
            let lead_id = match lead {
                Some(who) => resolve_user(&ctx.db, &who)?.id.clone(),
                None => session.user_id.clone(),
            };
            let raw_key = key.unwrap_or_else(|| suggest_project_key(&name));
            let mut project = Project::new(&name, &raw_key, desc.as_deref().unwrap_or(""), &lead_id, Utc::now())?;
            if ctx.db.project_by_key(&project.key).is_some() {
                return Err(AppError::DuplicateProjectKey(project.key));
            }
            project.add_member(&session.user_id);
            tracing::info!(project = %project.id, key = %project.key, "project created");
            println!("Created project {} ({}).", project.name, project.key);
            if ctx.active_project().is_err() {
                ctx.settings.active_project = Some(project.id.clone());
                ctx.save_settings()?;
                println!("Now using {}.", project.key);
            }
            ctx.db.projects.push(project);
            ctx.save_db()?;
        }
        ProjectAction::Use { key } => {
            let project = ctx
                .db
                .project_by_key(&key)
                .ok_or_else(|| AppError::UnknownProject(key.clone()))?;
            println!("Now using {} ({}).", project.name, project.key);
            ctx.settings.active_project = Some(project.id.clone());
            ctx.save_settings()?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    ctx: &mut Context,
    title: String,
    desc: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    assignee: Option<String>,
    tags: Vec<String>,
    due: Option<String>,
    estimate: Option<u32>,
) -> Result<()> {
    let today = Local::now().date_naive();
    let due_date = match due {
        Some(raw) => Some(parse_due_input(&raw, today).ok_or(ValidationError::InvalidDueDate(raw))?),
        None => None,
    };
    let assignee_id = match assignee {
        Some(who) => Some(resolve_user(&ctx.db, &who)?.id.clone()),
        None => None,
    };
    if let (Some(id), Ok(project)) = (assignee_id.as_deref(), ctx.active_project()) {
        if !project.is_member(id) {
            tracing::warn!(user = %id, project = %project.key, "assignee is not a project member");
        }
    }
    let input = NewTask {
        title,
        description: desc.unwrap_or_default().trim().to_string(),
        status,
        priority,
        assignee_id,
        tags,
        due_date,
        time_estimate: estimate,
    };
    input.validate()?;

    let mut store = ctx.store()?;
    let task = store.create_task(input)?;
    ctx.commit(store)?;
    let key = ctx.active_project()?.key.clone();
    println!("Created {}: {}", task.display_key(&key), task.title);
    Ok(())
}

pub fn cmd_list(ctx: &Context, filters: FilterArgs, sort: SortKey, limit: Option<usize>) -> Result<()> {
    let project = ctx.active_project()?;
    let filter = build_filter(&ctx.db, project, filters)?;
    let mut tasks = filter_tasks(&ctx.db.tasks, &filter);
    sort_tasks(&mut tasks, sort);
    if let Some(n) = limit {
        tasks.truncate(n);
    }
    if tasks.is_empty() {
        println!("No tasks match ({}).", filter.describe());
        return Ok(());
    }
    print_table(&ctx.db, project, &tasks);
    Ok(())
}

pub fn cmd_board(ctx: &Context, filters: FilterArgs) -> Result<()> {
    let project = ctx.active_project()?;
    let filter = build_filter(&ctx.db, project, filters)?;
    let board = Board::partition(filter_tasks(&ctx.db.tasks, &filter));
    let today = Local::now().date_naive();

    println!("{} ({}), {}", project.name, project.key, filter.describe());
    if board.is_empty() {
        println!("No tasks match.");
        return Ok(());
    }
    for (lane, tasks) in board.iter() {
        println!();
        println!("== {} ({}) ==", lane.title, tasks.len());
        for t in tasks {
            let assignee = t
                .assignee_id
                .as_deref()
                .and_then(|id| ctx.db.user(id))
                .map_or_else(|| "--".to_string(), User::initials);
            println!(
                "  {:<14} {:<6} {:<3} {:<10} {}",
                t.display_key(&project.key),
                t.priority.label(),
                assignee,
                format_due_relative(t.due_date, today),
                t.title
            );
        }
    }
    Ok(())
}

pub fn cmd_move(ctx: &mut Context, id: &str, status: TaskStatus) -> Result<()> {
    let project = ctx.active_project()?.clone();
    let task = resolve_task_identifier(id, &ctx.db, &project)?;
    let (task_id, from) = (task.id.clone(), task.status);

    let mut store = ctx.store()?;
    if !store.move_task(&task_id, status) {
        return Err(AppError::UnknownTask(id.to_string()));
    }
    ctx.commit(store)?;
    let key = ctx
        .db
        .tasks
        .iter()
        .find(|t| t.id == task_id)
        .map(|t| t.display_key(&project.key))
        .unwrap_or_default();
    println!("Moved {key}: {} -> {}", from.label(), status.label());
    Ok(())
}

pub fn cmd_comment(ctx: &mut Context, id: &str, text: &str) -> Result<()> {
    let project = ctx.active_project()?.clone();
    let task_id = resolve_task_identifier(id, &ctx.db, &project)?.id.clone();

    let mut store = ctx.store()?;
    let comment = store
        .add_comment(&task_id, text)?
        .ok_or_else(|| AppError::UnknownTask(id.to_string()))?;
    ctx.commit(store)?;
    println!("Comment {} added.", &comment.id[..8.min(comment.id.len())]);
    Ok(())
}

pub fn cmd_view(ctx: &Context, id: &str) -> Result<()> {
    let project = ctx.active_project()?;
    let task = resolve_task_identifier(id, &ctx.db, project)?;
    let today = Local::now().date_naive();
    let now = Utc::now();

    println!("Key:          {}", task.display_key(&project.key));
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", task.status.label());
    println!("Priority:     {}", task.priority.label());
    println!("Project:      {} ({})", project.name, project.key);
    println!("Assignee:     {}", user_label(&ctx.db, task.assignee_id.as_deref()));
    println!("Reporter:     {}", user_label(&ctx.db, Some(&task.reporter_id)));
    println!(
        "Due:          {}",
        match task.due_date {
            Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Estimate:     {}", format_minutes(task.time_estimate));
    println!("Spent:        {}", format_minutes(task.time_spent));
    println!("Tags:         {}", if task.tags.is_empty() { "-".into() } else { task.tags.join(",") });
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
    println!(
        "Description:\n{}\n",
        if task.description.is_empty() { "-" } else { task.description.as_str() }
    );

    println!("Comments ({}):", task.comments.len());
    for c in &task.comments {
        println!(
            "  {} · {}",
            user_label(&ctx.db, Some(&c.author_id)),
            format_relative_time(c.created_at, now)
        );
        println!("    {}", c.content);
    }
    Ok(())
}

pub fn cmd_ui(ctx: &mut Context, view: Option<ViewMode>) -> Result<()> {
    let session = ctx.session()?;
    let project = ctx.active_project()?;
    let context = StoreContext {
        user_id: session.user_id,
        project_id: project.id.clone(),
    };
    let view = view.unwrap_or(ctx.settings.view_mode);
    let last_view = run_board_tui(ctx.db.clone(), ctx.config.db_path(), context, view)?;
    if last_view != ctx.settings.view_mode {
        ctx.settings.view_mode = last_view;
        ctx.save_settings()?;
    }
    Ok(())
}

/// Generate shell completions.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Run one parsed command.
pub fn dispatch(ctx: &mut Context, command: Commands) -> Result<()> {
    match command {
        Commands::Signup { email, name, password } => cmd_signup(ctx, &email, &name, &password),
        Commands::Signin { email, password } => cmd_signin(ctx, &email, &password),
        Commands::Signout => cmd_signout(ctx),
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Org { action } => cmd_org(ctx, action),
        Commands::Seed { seed, force } => cmd_seed(ctx, seed, force),
        Commands::Users => cmd_users(ctx),
        Commands::Project { action } => cmd_project(ctx, action),
        Commands::Add { title, desc, status, priority, assignee, tags, due, estimate } => {
            cmd_add(ctx, title, desc, status, priority, assignee, tags, due, estimate)
        }
        Commands::List { filters, sort, limit } => cmd_list(ctx, filters, sort, limit),
        Commands::Board { filters } => cmd_board(ctx, filters),
        Commands::Move { id, status } => cmd_move(ctx, &id, status),
        Commands::Comment { id, text } => cmd_comment(ctx, &id, &text),
        Commands::View { id } => cmd_view(ctx, &id),
        Commands::Ui { view } => cmd_ui(ctx, view),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context() -> (TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
        };
        let ctx = Context::load(config).unwrap();
        (dir, ctx)
    }

    fn signed_in() -> (TempDir, Context) {
        let (dir, mut ctx) = context();
        cmd_signup(&mut ctx, "dana@example.com", "Dana Scully", "trustno1").unwrap();
        (dir, ctx)
    }

    fn no_filters() -> FilterArgs {
        FilterArgs {
            status: Choice::All,
            priority: Choice::All,
            assignee: AssigneeFilter::All,
            query: None,
        }
    }

    fn add(ctx: &mut Context, title: &str) {
        cmd_add(ctx, title.into(), None, TaskStatus::Todo, TaskPriority::Medium, None, vec![], None, None).unwrap();
    }

    #[test]
    fn test_signup_records_user() {
        let (_dir, ctx) = signed_in();
        let session = ctx.session().unwrap();
        let user = ctx.db.user(&session.user_id).unwrap();
        assert_eq!(user.name, "Dana Scully");

        let reloaded = Context::load(ctx.config.clone()).unwrap();
        assert!(reloaded.db.user(&session.user_id).is_some());
    }

    #[test]
    fn test_bad_signin_reports_generic_message() {
        let (_dir, mut ctx) = signed_in();
        cmd_signout(&mut ctx).unwrap();
        let err = cmd_signin(&mut ctx, "dana@example.com", "wrong-password").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(matches!(ctx.session(), Err(AppError::NotSignedIn)));
    }

    #[test]
    fn test_task_commands_need_session_and_project() {
        let (_dir, mut ctx) = context();
        assert!(matches!(ctx.store(), Err(AppError::NotSignedIn)));

        cmd_signup(&mut ctx, "dana@example.com", "Dana Scully", "trustno1").unwrap();
        let err = cmd_list(&ctx, no_filters(), SortKey::Updated, None).unwrap_err();
        assert!(matches!(err, AppError::NoActiveProject));
    }

    #[test]
    fn test_project_add_becomes_active_and_rejects_duplicate_key() {
        let (_dir, mut ctx) = signed_in();
        cmd_project(
            &mut ctx,
            ProjectAction::Add {
                name: "Website Redesign".into(),
                key: None,
                desc: None,
                lead: None,
            },
        )
        .unwrap();
        let project = ctx.active_project().unwrap();
        assert_eq!(project.key, "WR");
        assert_eq!(project.lead_id, ctx.session().unwrap().user_id);

        let err = cmd_project(
            &mut ctx,
            ProjectAction::Add {
                name: "Web Rewrite".into(),
                key: Some("wr".into()),
                desc: None,
                lead: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateProjectKey(k) if k == "WR"));
        assert_eq!(ctx.db.projects.len(), 1);
    }

    #[test]
    fn test_seed_then_move_and_comment() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        assert_eq!(ctx.db.tasks.len(), 12);
        let me = ctx.session().unwrap().user_id;
        assert!(ctx.db.project("p1").unwrap().is_member(&me));
        assert_eq!(ctx.active_project().unwrap().id, "p1");

        cmd_move(&mut ctx, "web-t4", TaskStatus::InProgress).unwrap();
        cmd_comment(&mut ctx, "Set up analytics", "Tracking plan drafted").unwrap();

        let reloaded = Context::load(ctx.config.clone()).unwrap();
        let t4 = reloaded.db.tasks.iter().find(|t| t.id == "t4").unwrap();
        assert_eq!(t4.status, TaskStatus::InProgress);
        assert_eq!(t4.comments.len(), 1);
        assert_eq!(t4.comments[0].author_id, me);
    }

    #[test]
    fn test_unknown_task_is_an_error_and_changes_nothing() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        let before = ctx.db.tasks.clone();

        let err = cmd_move(&mut ctx, "does-not-exist", TaskStatus::Done).unwrap_err();
        assert!(matches!(err, AppError::UnknownTask(_)));
        // Tasks of other projects are not addressable from p1.
        assert!(cmd_move(&mut ctx, "t5", TaskStatus::Done).is_err());
        assert_eq!(ctx.db.tasks, before);
    }

    #[test]
    fn test_add_normalises_tags_and_parses_due() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        cmd_add(
            &mut ctx,
            "Audit forms".into(),
            Some("  accessibility pass ".into()),
            TaskStatus::Backlog,
            TaskPriority::Urgent,
            Some("sarah@example.com".into()),
            vec!["A11y, Forms".into(), "a11y".into()],
            Some("tomorrow".into()),
            Some(45),
        )
        .unwrap();

        let task = ctx.db.tasks.last().unwrap();
        assert_eq!(task.project_id, "p1");
        assert_eq!(task.description, "accessibility pass");
        assert_eq!(task.assignee_id.as_deref(), Some("u2"));
        assert_eq!(task.tags, vec!["a11y", "forms"]);
        assert_eq!(task.due_date, Some(Local::now().date_naive() + chrono::Duration::days(1)));
        assert_eq!(task.time_estimate, Some(45));
    }

    #[test]
    fn test_add_rejects_bad_input_before_the_store() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        let before = ctx.db.tasks.len();

        let err = cmd_add(&mut ctx, " ".into(), None, TaskStatus::Todo, TaskPriority::Medium, None, vec![], None, None)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::EmptyTitle)));

        let err = cmd_add(
            &mut ctx,
            "X".into(),
            None,
            TaskStatus::Todo,
            TaskPriority::Medium,
            Some("nobody".into()),
            vec![],
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::UnknownUser(_)));
        assert_eq!(ctx.db.tasks.len(), before);
    }

    #[test]
    fn test_resolve_task_identifier_variants() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        add(&mut ctx, "Optimize images for web");
        let project = ctx.db.project("p1").unwrap().clone();

        assert_eq!(resolve_task_identifier("t1", &ctx.db, &project).unwrap().id, "t1");
        assert_eq!(resolve_task_identifier("WEB-T2", &ctx.db, &project).unwrap().id, "t2");
        assert_eq!(
            resolve_task_identifier("set up ANALYTICS", &ctx.db, &project).unwrap().id,
            "t4"
        );
        // Two tasks share this title now.
        let err = resolve_task_identifier("Optimize images for web", &ctx.db, &project).unwrap_err();
        assert!(err.to_string().contains("Multiple tasks"));
    }

    #[test]
    fn test_filter_args_resolve_assignee_by_email() {
        let (_dir, mut ctx) = signed_in();
        cmd_seed(&mut ctx, 7, false).unwrap();
        let project = ctx.db.project("p1").unwrap().clone();
        let args = FilterArgs {
            assignee: "sarah@example.com".parse().unwrap(),
            ..no_filters()
        };
        let filter = build_filter(&ctx.db, &project, args).unwrap();
        assert_eq!(filter.assignee, AssigneeFilter::User("u2".into()));
        let ids: Vec<&str> = filter_tasks(&ctx.db.tasks, &filter).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);
    }

    #[test]
    fn test_org_commands_need_session() {
        let (_dir, mut ctx) = signed_in();
        cmd_org(&mut ctx, OrgAction::Create { name: "Acme Corp".into() }).unwrap();
        let err = cmd_org(&mut ctx, OrgAction::Create { name: "acme  corp".into() }).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create organization");

        cmd_signout(&mut ctx).unwrap();
        assert!(matches!(cmd_org(&mut ctx, OrgAction::List), Err(AppError::NotSignedIn)));
    }
}

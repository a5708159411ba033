//! # tb - Kanban task tracker
//!
//! A command-line task tracker for small teams, with a terminal board for drag-and-drop
//! triage.
//!
//! ## Key Features
//!
//! - **Five-lane board**: Backlog → To Do → In Progress → In Review → Done
//! - **Rich task metadata**: priority, assignee, reporter, tags, due dates, time estimates,
//!   and an append-only comment thread
//! - **Filtering**: status, priority, assignee and a free-text query, combined
//! - **Accounts and organizations**: local sign-up/sign-in with salted password digests
//! - **Two interfaces**: a scriptable CLI and an interactive board (keyboard and mouse drag)
//!
//! ## Quick Start
//!
//! ```bash
//! tb signup me@example.com --name "Alex Johnson" --password secret1
//! tb seed                       # demo users, projects and tasks
//! tb board                      # print the lanes
//! tb move WEB-T4 in-progress
//! tb ui                         # open the interactive board
//! ```
//!
//! Data is stored in `~/.taskboard/` (`--dir` or `$TASKBOARD_DIR` to override):
//! `db.json` holds users, projects and tasks; `gateway.json` and `session.json` hold
//! accounts and the signed-in session; `settings.json` remembers the active project and view.

use clap::Parser;

pub mod board;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod filter;
pub mod gateway;
pub mod logging;
pub mod project;
pub mod seed;
pub mod session;
pub mod store;
pub mod task;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}

use cli::Cli;
use cmd::{Commands, Context};
use config::Config;

fn main() {
    let cli = Cli::parse();

    let config = match Config::resolve(cli.dir.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // The board owns the terminal, so its events go to a file.
    let log_file = matches!(cli.command, Commands::Ui { .. }).then(|| config.log_path());
    if let Err(e) = logging::init(cli.verbose, log_file.as_deref()) {
        eprintln!("Failed to open log file: {e}");
    }
    tracing::debug!(dir = %config.data_dir.display(), "data directory resolved");

    let result = Context::load(config).and_then(|mut ctx| cmd::dispatch(&mut ctx, cli.command));
    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

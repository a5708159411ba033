use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::cmd::Commands;

/// Kanban task tracker for small teams.
/// Data lives in ~/.taskboard unless --dir or $TASKBOARD_DIR says otherwise.
#[derive(Parser)]
#[command(name = "tb", version, about = "Kanban task tracker with a terminal board")]
pub struct Cli {
    /// Data directory holding db.json, gateway.json, session.json and settings.json.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

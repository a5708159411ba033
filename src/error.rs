//! Error types.
//!
//! Validation errors are raised before anything is mutated. Gateway errors are caught by
//! the auth/organization state holders and turned into generic messages. `AppError` is what
//! command handlers return to `main`.

use std::io;

use thiserror::Error;

/// Result type for command handlers.
pub type Result<T> = std::result::Result<T, AppError>;

/// Rejected user input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("comment cannot be empty")]
    EmptyComment,

    #[error("name cannot be empty")]
    EmptyName,

    #[error("project key must contain at least one letter or digit")]
    EmptyProjectKey,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("unrecognised due date: {0}")]
    InvalidDueDate(String),

    #[error("time estimate must be a whole number of minutes: {0}")]
    InvalidEstimate(String),
}

/// Failures of the task store itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Creation needs a reporter and a project, injected through `StoreContext`.
    #[error("no session or project context is attached to the task store")]
    MissingContext,
}

/// Failures reported by the authentication/persistence gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("user already registered: {email}")]
    AlreadyRegistered { email: String },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("organization slug already taken: {slug}")]
    SlugTaken { slug: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("gateway storage error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed gateway data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl GatewayError {
    /// The message shown to the user. Internal details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::InvalidCredentials => "Invalid email or password".to_string(),
            GatewayError::AlreadyRegistered { .. } => {
                "An account with this email already exists".to_string()
            }
            GatewayError::NotAuthenticated => "You need to sign in first".to_string(),
            GatewayError::SlugTaken { .. } => "Failed to create organization".to_string(),
            GatewayError::Validation(e) => e.to_string(),
            GatewayError::Io(_) | GatewayError::Json(_) | GatewayError::Hashing(_) => {
                "Something went wrong, please try again".to_string()
            }
        }
    }
}

/// Top-level error for CLI and TUI entry points.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A gateway failure that was already logged and reduced to a user-facing message.
    #[error("{0}")]
    Auth(String),

    #[error("not signed in; run `tb signin <email>` first")]
    NotSignedIn,

    #[error("no project selected; run `tb project add` or `tb project use <key>`")]
    NoActiveProject,

    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("a project with key {0} already exists")]
    DuplicateProjectKey(String),

    #[error("{0}")]
    UnknownTask(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),
}

//! Authentication and organization persistence.
//!
//! `Gateway` is the contract the rest of the crate talks to. `LocalGateway` implements it
//! on top of two JSON documents in the data directory: `gateway.json` (accounts,
//! profiles, organizations, memberships) and `session.json` (the signed-in session).

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatewayError, ValidationError};
use crate::fields::OrgRole;
use crate::project::slugify;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
}

/// Delivered to listeners after every session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

pub type SessionListener = Box<dyn FnMut(&SessionChange)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: String,
    pub user_id: String,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
}

/// An organization as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationWithRole {
    pub organization: Organization,
    pub role: OrgRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Identity, session and organization operations.
pub trait Gateway {
    fn get_session(&self) -> Option<Session>;

    /// Register a listener called after every sign-in and sign-out.
    fn on_session_change(&mut self, listener: SessionListener) -> SubscriptionId;

    /// Remove a listener. Returns false if it was already gone.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, GatewayError>;

    /// Create an account and sign it in.
    fn sign_up(&mut self, email: &str, password: &str, full_name: &str) -> Result<Session, GatewayError>;

    fn sign_out(&mut self) -> Result<(), GatewayError>;

    /// Organizations `user_id` belongs to, oldest first, with the user's role.
    fn fetch_organizations_for_user(&self, user_id: &str) -> Result<Vec<OrganizationWithRole>, GatewayError>;

    /// Create an organization owned by the signed-in user.
    fn create_organization(&mut self, name: &str) -> Result<Organization, GatewayError>;

    /// Return the profile of `user_id`, creating it on first call.
    fn ensure_profile(&mut self, user_id: &str, full_name: &str) -> Result<Profile, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    id: String,
    email: String,
    full_name: String,
    /// Argon2 PHC string.
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GatewayData {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    organizations: Vec<Organization>,
    #[serde(default)]
    memberships: Vec<Membership>,
}

/// File-backed gateway. With no directory it keeps everything in memory.
pub struct LocalGateway {
    dir: Option<PathBuf>,
    data: GatewayData,
    session: Option<Session>,
    listeners: Vec<(SubscriptionId, SessionListener)>,
    next_subscription: u64,
}

impl fmt::Debug for LocalGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalGateway")
            .field("dir", &self.dir)
            .field("accounts", &self.data.accounts.len())
            .field("session", &self.session)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl LocalGateway {
    pub fn open(dir: &Path) -> Result<Self, GatewayError> {
        let data: GatewayData = read_document(&dir.join("gateway.json"))?.unwrap_or_default();
        let mut session: Option<Session> = read_document(&dir.join("session.json"))?;
        if let Some(s) = &session {
            if !data.accounts.iter().any(|a| a.id == s.user_id) {
                tracing::warn!(user = %s.user_id, "discarding session for unknown account");
                session = None;
            }
        }
        tracing::debug!(
            accounts = data.accounts.len(),
            organizations = data.organizations.len(),
            signed_in = session.is_some(),
            "gateway opened"
        );
        Ok(LocalGateway {
            dir: Some(dir.to_path_buf()),
            data,
            session,
            listeners: Vec::new(),
            next_subscription: 0,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        LocalGateway {
            dir: None,
            data: GatewayData::default(),
            session: None,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Writes `next` and adopts it only once it is on disk.
    fn commit(&mut self, next: GatewayData) -> Result<(), GatewayError> {
        if let Some(dir) = &self.dir {
            write_document(&dir.join("gateway.json"), &next)?;
        }
        self.data = next;
        Ok(())
    }

    fn commit_session(&mut self, next: Option<Session>) -> Result<(), GatewayError> {
        if let Some(dir) = &self.dir {
            write_document(&dir.join("session.json"), &next)?;
        }
        self.session = next;
        Ok(())
    }

    fn start_session(&mut self, account: &Account) -> Result<Session, GatewayError> {
        let session = Session {
            user_id: account.id.clone(),
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            signed_in_at: Utc::now(),
        };
        self.commit_session(Some(session.clone()))?;
        tracing::info!(user = %session.user_id, "signed in");
        self.notify(SessionEvent::SignedIn);
        Ok(session)
    }

    fn notify(&mut self, event: SessionEvent) {
        let change = SessionChange {
            event,
            session: self.session.clone(),
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    fn find_account(&self, email: &str) -> Option<&Account> {
        self.data.accounts.iter().find(|a| a.email == email)
    }
}

impl Gateway for LocalGateway {
    fn get_session(&self) -> Option<Session> {
        self.session.clone()
    }

    fn on_session_change(&mut self, listener: SessionListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let email = normalise_email(email);
        let account = match self.find_account(&email) {
            Some(a) if verify_password(password, &a.password_hash) => a.clone(),
            _ => {
                tracing::debug!(%email, "sign-in rejected");
                return Err(GatewayError::InvalidCredentials);
            }
        };
        self.start_session(&account)
    }

    fn sign_up(&mut self, email: &str, password: &str, full_name: &str) -> Result<Session, GatewayError> {
        let email = normalise_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN }.into());
        }
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.find_account(&email).is_some() {
            return Err(GatewayError::AlreadyRegistered { email });
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            password_hash: hash_password(password)?,
            email,
            full_name: full_name.to_string(),
            created_at: Utc::now(),
        };
        let mut next = self.data.clone();
        next.accounts.push(account.clone());
        self.commit(next)?;
        tracing::info!(user = %account.id, email = %account.email, "account created");
        self.start_session(&account)
    }

    fn sign_out(&mut self) -> Result<(), GatewayError> {
        let Some(previous) = self.session.clone() else {
            return Ok(());
        };
        self.commit_session(None)?;
        tracing::info!(user = %previous.user_id, "signed out");
        self.notify(SessionEvent::SignedOut);
        Ok(())
    }

    fn fetch_organizations_for_user(&self, user_id: &str) -> Result<Vec<OrganizationWithRole>, GatewayError> {
        let mut orgs: Vec<OrganizationWithRole> = self
            .data
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                self.data
                    .organizations
                    .iter()
                    .find(|o| o.id == m.organization_id)
                    .map(|o| OrganizationWithRole {
                        organization: o.clone(),
                        role: m.role,
                    })
            })
            .collect();
        orgs.sort_by_key(|o| o.organization.created_at);
        Ok(orgs)
    }

    fn create_organization(&mut self, name: &str) -> Result<Organization, GatewayError> {
        let user_id = self
            .session
            .as_ref()
            .map(|s| s.user_id.clone())
            .ok_or(GatewayError::NotAuthenticated)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let slug = slugify(name);
        if self.data.organizations.iter().any(|o| o.slug == slug) {
            return Err(GatewayError::SlugTaken { slug });
        }

        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            slug,
            created_at: now,
            updated_at: now,
        };
        let membership = Membership {
            organization_id: org.id.clone(),
            user_id,
            role: OrgRole::Owner,
            created_at: now,
        };
        let owner = membership.user_id.clone();
        let mut next = self.data.clone();
        next.organizations.push(org.clone());
        next.memberships.push(membership);
        self.commit(next)?;
        tracing::info!(org = %org.id, slug = %org.slug, %owner, "organization created");
        Ok(org)
    }

    fn ensure_profile(&mut self, user_id: &str, full_name: &str) -> Result<Profile, GatewayError> {
        if let Some(existing) = self.data.profiles.iter().find(|p| p.id == user_id) {
            return Ok(existing.clone());
        }
        let profile = Profile {
            id: user_id.to_string(),
            full_name: full_name.trim().to_string(),
            avatar_url: None,
            updated_at: Utc::now(),
        };
        let mut next = self.data.clone();
        next.profiles.push(profile.clone());
        self.commit(next)?;
        tracing::info!(user = %user_id, "profile created");
        Ok(profile)
    }
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

fn hash_password(password: &str) -> Result<String, GatewayError> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| GatewayError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::Hashing(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, GatewayError> {
    match fs::read_to_string(path) {
        Ok(buf) => Ok(serde_json::from_str(&buf)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), GatewayError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(tmp, path)?;
    Ok(())
}

//! Auth and organization view state.
//!
//! Both holders catch gateway failures at the call site: the error is logged, a generic
//! message is kept for display, and the previously loaded data stays in place.

use std::sync::mpsc::{self, Receiver};

use crate::error::GatewayError;
use crate::gateway::{Gateway, Organization, OrganizationWithRole, Session, SessionChange, SessionEvent, SubscriptionId};

/// Who is signed in, as seen by the UI.
#[derive(Debug, Default)]
pub struct AuthState {
    pub user: Option<Session>,
    pub loading: bool,
    pub error: Option<String>,
    subscription: Option<(SubscriptionId, Receiver<SessionChange>)>,
    bootstrapped: Option<Session>,
}

impl AuthState {
    /// Read the current session and subscribe to future changes.
    pub fn attach<G: Gateway + ?Sized>(gateway: &mut G) -> Self {
        let (tx, rx) = mpsc::channel();
        let id = gateway.on_session_change(Box::new(move |change: &SessionChange| {
            // The receiver only goes away on detach, after which events are irrelevant.
            let _ = tx.send(change.clone());
        }));
        let mut state = AuthState {
            user: gateway.get_session(),
            loading: false,
            error: None,
            subscription: Some((id, rx)),
            bootstrapped: None,
        };
        state.bootstrap_profile(gateway);
        state
    }

    pub fn detach<G: Gateway + ?Sized>(&mut self, gateway: &mut G) {
        if let Some((id, _)) = self.subscription.take() {
            gateway.unsubscribe(id);
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Apply pending session changes. Returns how many were applied.
    pub fn pump<G: Gateway + ?Sized>(&mut self, gateway: &mut G) -> usize {
        let changes: Vec<SessionChange> = match &self.subscription {
            Some((_, rx)) => rx.try_iter().collect(),
            None => return 0,
        };
        for change in &changes {
            tracing::debug!(event = ?change.event, "session change");
            self.user = change.session.clone();
            match change.event {
                SessionEvent::SignedIn => self.bootstrap_profile(gateway),
                SessionEvent::SignedOut => self.bootstrapped = None,
            }
        }
        changes.len()
    }

    pub fn sign_in<G: Gateway + ?Sized>(&mut self, gateway: &mut G, email: &str, password: &str) -> bool {
        let result = self.run(|| gateway.sign_in(email, password));
        self.pump(gateway);
        result.is_some()
    }

    pub fn sign_up<G: Gateway + ?Sized>(
        &mut self,
        gateway: &mut G,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> bool {
        let result = self.run(|| gateway.sign_up(email, password, full_name));
        self.pump(gateway);
        result.is_some()
    }

    pub fn sign_out<G: Gateway + ?Sized>(&mut self, gateway: &mut G) -> bool {
        let result = self.run(|| gateway.sign_out());
        self.pump(gateway);
        result.is_some()
    }

    fn run<T>(&mut self, call: impl FnOnce() -> Result<T, GatewayError>) -> Option<T> {
        self.loading = true;
        self.error = None;
        let result = call();
        self.loading = false;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "auth request failed");
                self.error = Some(e.user_message());
                None
            }
        }
    }

    /// Make sure the current session has a profile, once per session.
    fn bootstrap_profile<G: Gateway + ?Sized>(&mut self, gateway: &mut G) {
        let Some(session) = self.user.clone() else {
            return;
        };
        if self.bootstrapped.as_ref() == Some(&session) {
            return;
        }
        match gateway.ensure_profile(&session.user_id, &session.full_name) {
            Ok(profile) => tracing::debug!(user = %profile.id, "profile ready"),
            Err(e) => tracing::error!(user = %session.user_id, error = %e, "error creating profile"),
        }
        self.bootstrapped = Some(session);
    }
}

/// Organizations of the signed-in user.
#[derive(Debug, Default)]
pub struct OrganizationsState {
    pub organizations: Vec<OrganizationWithRole>,
    pub loading: bool,
    pub error: Option<String>,
}

impl OrganizationsState {
    /// Reload the list. On failure the previous list is kept.
    pub fn load<G: Gateway + ?Sized>(&mut self, gateway: &G, user_id: &str) -> bool {
        self.loading = true;
        let result = gateway.fetch_organizations_for_user(user_id);
        self.loading = false;
        match result {
            Ok(orgs) => {
                self.organizations = orgs;
                self.error = None;
                true
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "error fetching organizations");
                self.error = Some(e.user_message());
                false
            }
        }
    }

    /// Create an organization owned by `user_id`, then reload.
    pub fn create<G: Gateway + ?Sized>(&mut self, gateway: &mut G, user_id: &str, name: &str) -> Option<Organization> {
        self.loading = true;
        let result = gateway.create_organization(name);
        self.loading = false;
        match result {
            Ok(org) => {
                self.error = None;
                self.load(gateway, user_id);
                Some(org)
            }
            Err(e) => {
                tracing::warn!(error = %e, "error creating organization");
                self.error = Some(match e {
                    GatewayError::Validation(v) => v.to_string(),
                    _ => "Failed to create organization".to_string(),
                });
                None
            }
        }
    }
}

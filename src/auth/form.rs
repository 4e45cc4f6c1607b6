// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth modal form state.
//!
//! [`AuthForm`] is the plain value a view renders. [`AuthModal`] owns the
//! live form in a `watch` channel, so the view can follow `loading` and
//! `error` while a submission is in flight.

use tokio::sync::watch;
use tracing::debug;

use super::flow::{authenticate_validated, validate, AuthMode};
use super::AuthError;
use crate::identity::{AuthOutcome, IdentityProvider};
use crate::session::SessionGate;

/// Transient state of the sign-up / sign-in modal.
///
/// Created when the modal opens and reset when it closes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub username: String,
    pub password: String,
    /// Inline feedback shown under the fields
    pub error: Option<String>,
    /// True while a provider round trip is in flight
    pub loading: bool,
    pub mode: AuthMode,
}

impl std::fmt::Debug for AuthForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("error", &self.error)
            .field("loading", &self.loading)
            .field("mode", &self.mode)
            .finish()
    }
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            AuthMode::Signup => "Create account",
            AuthMode::Login => "Sign in",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match (self.loading, self.mode) {
            (false, _) => "Continue",
            (true, AuthMode::Signup) => "Signing up...",
            (true, AuthMode::Login) => "Signing in...",
        }
    }
}

/// Live auth modal form with change notification.
pub struct AuthModal {
    form: watch::Sender<AuthForm>,
}

impl Default for AuthModal {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthModal {
    pub fn new() -> Self {
        let (form, _) = watch::channel(AuthForm::default());
        Self { form }
    }

    pub fn snapshot(&self) -> AuthForm {
        self.form.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthForm> {
        self.form.subscribe()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        let username = username.into();
        self.form.send_modify(|form| form.username = username);
    }

    pub fn set_password(&self, password: impl Into<String>) {
        let password = password.into();
        self.form.send_modify(|form| form.password = password);
    }

    pub fn toggle_mode(&self) {
        self.form.send_modify(|form| form.mode = form.mode.toggled());
    }

    /// Back to a blank sign-up form.
    pub fn reset(&self) {
        self.form.send_replace(AuthForm::default());
    }

    /// Validate and submit the current form.
    ///
    /// `loading` is published as true for the whole provider round trip and
    /// cleared on every exit path. On success the user is recorded in the
    /// gate, the modal is closed and the form is reset. On failure the form
    /// stays open with `error` set.
    pub async fn submit(
        &self,
        provider: &dyn IdentityProvider,
        gate: &SessionGate,
    ) -> Result<AuthOutcome, AuthError> {
        let (username, password, mode) = {
            let form = self.form.borrow();
            (form.username.clone(), form.password.clone(), form.mode)
        };

        let credentials = match validate(&username, &password) {
            Ok(credentials) => credentials,
            Err(e) => {
                let message = e.to_string();
                self.form.send_modify(|form| form.error = Some(message));
                return Err(e);
            }
        };

        self.form.send_modify(|form| {
            form.error = None;
            form.loading = true;
        });

        match authenticate_validated(provider, mode, &credentials).await {
            Ok(outcome) => {
                gate.set_user(Some(outcome.user.clone()));
                gate.close_auth();
                self.reset();
                Ok(outcome)
            }
            Err(e) => {
                debug!(%mode, error = %e, "Auth form submission failed");
                let message = e.to_string();
                self.form.send_modify(|form| {
                    form.loading = false;
                    form.error = Some(message);
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Mutex};

    use super::*;
    use crate::identity::{IdentityClient, IdentityError, MemoryIdentity, Session};
    use crate::session::{BoundaryMarker, MemoryMarkerStore, SessionSync};
    use crate::username::NormalizedUsername;

    /// Provider whose transport always fails.
    struct BrokenProvider;

    #[async_trait]
    impl IdentityProvider for BrokenProvider {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn sign_up(
            &self,
            _handle: &str,
            _password: &str,
            _username: &NormalizedUsername,
        ) -> Result<AuthOutcome, IdentityError> {
            Err(IdentityError::Transport("connection reset".to_string()))
        }

        async fn sign_in(&self, _handle: &str, _password: &str) -> Result<AuthOutcome, IdentityError> {
            Err(IdentityError::Unavailable(503))
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<Session, IdentityError> {
            Err(IdentityError::Unavailable(503))
        }
    }

    /// Provider that holds every sign-in until released.
    struct HeldProvider {
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl IdentityProvider for HeldProvider {
        fn name(&self) -> &'static str {
            "held"
        }

        async fn sign_up(
            &self,
            _handle: &str,
            _password: &str,
            _username: &NormalizedUsername,
        ) -> Result<AuthOutcome, IdentityError> {
            Err(IdentityError::Rejected("Signups not allowed".to_string()))
        }

        async fn sign_in(&self, _handle: &str, _password: &str) -> Result<AuthOutcome, IdentityError> {
            let release = self.release.lock().await.take();
            if let Some(release) = release {
                let _ = release.await;
            }
            Err(IdentityError::Rejected("Invalid login credentials".to_string()))
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<Session, IdentityError> {
            Err(IdentityError::Unavailable(503))
        }
    }

    fn gate() -> SessionGate {
        SessionGate::new(Arc::new(MemoryMarkerStore::new()), BoundaryMarker::plain())
    }

    fn filled(username: &str, password: &str) -> AuthModal {
        let modal = AuthModal::new();
        modal.set_username(username);
        modal.set_password(password);
        modal
    }

    #[tokio::test]
    async fn invalid_username_never_reaches_provider() {
        let gate = gate();
        gate.open_auth();
        let modal = filled("x", "hunter22");

        let err = modal.submit(&BrokenProvider, &gate).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidUsername);
        let form = modal.snapshot();
        assert_eq!(
            form.error.as_deref(),
            Some("Username must be 3-24 chars: letters, numbers, _ or -")
        );
        assert!(!form.loading);
        assert!(gate.snapshot().auth_open);
    }

    #[tokio::test]
    async fn short_password_is_reported() {
        let modal = filled("ember", "12345");
        let err = modal.submit(&BrokenProvider, &gate()).await.unwrap_err();
        assert_eq!(err, AuthError::PasswordTooShort);
        assert_eq!(
            modal.snapshot().error.as_deref(),
            Some("Password must be at least 6 characters")
        );
    }

    #[tokio::test]
    async fn transport_failure_uses_generic_message() {
        let gate = gate();
        gate.open_auth();
        let modal = filled("ember", "hunter22");

        let err = modal.submit(&BrokenProvider, &gate).await.unwrap_err();
        assert_eq!(err, AuthError::Unexpected("Sign up failed".to_string()));
        let form = modal.snapshot();
        assert_eq!(form.error.as_deref(), Some("Sign up failed"));
        assert!(!form.loading);
        // Form stays open and editable.
        assert!(gate.snapshot().auth_open);
        assert_eq!(form.username, "ember");
    }

    #[tokio::test]
    async fn provider_rejection_keeps_form_open() {
        let provider = MemoryIdentity::new();
        let gate = gate();
        gate.open_auth();
        let modal = filled("ghost", "hunter22");
        modal.toggle_mode();

        modal.submit(&provider, &gate).await.unwrap_err();
        let form = modal.snapshot();
        assert_eq!(form.error.as_deref(), Some("Invalid login credentials"));
        assert_eq!(form.mode, AuthMode::Login);
        assert!(gate.snapshot().auth_open);
    }

    #[tokio::test]
    async fn loading_is_visible_while_provider_is_pending() {
        let (release, held) = oneshot::channel();
        let provider = Arc::new(HeldProvider {
            release: Mutex::new(Some(held)),
        });
        let gate = Arc::new(gate());
        let modal = Arc::new(filled("ember", "hunter22"));
        modal.toggle_mode();
        let mut rx = modal.subscribe();

        let task = {
            let (provider, gate, modal) = (provider.clone(), gate.clone(), modal.clone());
            tokio::spawn(async move { modal.submit(provider.as_ref(), &gate).await })
        };

        let form = rx.wait_for(|form| form.loading).await.unwrap().clone();
        assert_eq!(form.submit_label(), "Signing in...");
        assert!(form.error.is_none());
        assert!(!task.is_finished());

        release.send(()).unwrap();
        task.await.unwrap().unwrap_err();

        let form = modal.snapshot();
        assert!(!form.loading);
        assert_eq!(form.submit_label(), "Continue");
        assert_eq!(form.error.as_deref(), Some("Invalid login credentials"));
    }

    #[tokio::test]
    async fn success_sets_user_closes_modal_and_resets() {
        let client = Arc::new(IdentityClient::new(Arc::new(MemoryIdentity::new())));
        let gate = Arc::new(gate());
        let sync = SessionSync::start(client.clone(), gate.clone()).await;
        let mut rx = gate.subscribe();
        gate.open_auth();

        let modal = filled("Ember", "hunter22");
        let outcome = modal.submit(client.as_ref(), &gate).await.unwrap();

        assert_eq!(modal.snapshot(), AuthForm::new());
        let snapshot = gate.snapshot();
        assert!(!snapshot.auth_open);
        assert_eq!(snapshot.user, Some(outcome.user));

        rx.wait_for(|state| state.is_authenticated()).await.unwrap();
        assert_eq!(gate.marker().unwrap().value(), "1");

        sync.stop().await;
    }

    #[test]
    fn labels_follow_mode_and_loading() {
        let mut form = AuthForm::new();
        assert_eq!(form.title(), "Create account");
        assert_eq!(form.submit_label(), "Continue");

        form.loading = true;
        assert_eq!(form.submit_label(), "Signing up...");

        form.mode = form.mode.toggled();
        assert_eq!(form.title(), "Sign in");
        assert_eq!(form.submit_label(), "Signing in...");
    }
}

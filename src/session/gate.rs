// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authoritative in-memory record of the current identity.

use std::sync::Arc;

use axum_extra::extract::cookie::Cookie;
use tokio::sync::watch;
use tracing::debug;

use super::marker::{BoundaryMarker, MarkerStore};
use crate::identity::{AuthChange, IdentityUser, Session};

/// Current authentication state as seen by the client runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<IdentityUser>,
    pub session: Option<Session>,
    /// Auth modal visibility
    pub auth_open: bool,
    /// Set once the initial session resolution has completed
    pub session_checked: bool,
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Shared authentication state with change notification.
///
/// Built once by the composition root and handed out by `Arc`. Subscribers
/// are woken only when the snapshot actually changes.
pub struct SessionGate {
    state: watch::Sender<AuthSnapshot>,
    store: Arc<dyn MarkerStore>,
    marker: BoundaryMarker,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl SessionGate {
    pub fn new(store: Arc<dyn MarkerStore>, marker: BoundaryMarker) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            state,
            store,
            marker,
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn set_user(&self, user: Option<IdentityUser>) {
        self.state
            .send_if_modified(|state| replace(&mut state.user, user));
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.state
            .send_if_modified(|state| replace(&mut state.session, session));
    }

    pub fn open_auth(&self) {
        self.state
            .send_if_modified(|state| replace(&mut state.auth_open, true));
    }

    pub fn close_auth(&self) {
        self.state
            .send_if_modified(|state| replace(&mut state.auth_open, false));
    }

    /// Apply an auth-change notification from the identity collaborator.
    ///
    /// Session and user move together, and the boundary marker is written
    /// before this returns.
    pub fn apply_auth_change(&self, change: &AuthChange) {
        let session = change.session.clone();
        let user = session.as_ref().map(|s| s.user.clone());

        // Marker first, so subscribers woken below already see it.
        self.store.write(self.marker.issue(change.session.as_ref()));

        self.state.send_if_modified(|state| {
            let session_changed = replace(&mut state.session, session);
            let user_changed = replace(&mut state.user, user);
            let checked_changed = replace(&mut state.session_checked, true);
            session_changed || user_changed || checked_changed
        });

        debug!(
            event = %change.event,
            authenticated = change.session.is_some(),
            "Session gate applied auth change"
        );
    }

    /// The marker currently held by the store.
    pub fn marker(&self) -> Option<Cookie<'static>> {
        self.store.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthEvent;
    use crate::session::marker::MemoryMarkerStore;

    fn gate() -> SessionGate {
        SessionGate::new(Arc::new(MemoryMarkerStore::new()), BoundaryMarker::plain())
    }

    fn session() -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_type: "bearer".to_string(),
            expires_at: None,
            user: IdentityUser {
                id: "u1".to_string(),
                email: Some("ember@local.invalid".to_string()),
                username: Some("ember".to_string()),
                created_at: None,
            },
        }
    }

    #[test]
    fn initial_state_is_empty() {
        let gate = gate();
        assert_eq!(gate.snapshot(), AuthSnapshot::default());
        assert!(gate.marker().is_none());
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn sign_in_sets_user_session_and_marker() {
        let gate = gate();
        gate.apply_auth_change(&AuthChange::new(AuthEvent::SignedIn, Some(session())));

        let snapshot = gate.snapshot();
        assert_eq!(snapshot.session, Some(session()));
        assert_eq!(snapshot.user, Some(session().user));
        assert!(snapshot.session_checked);

        let marker = gate.marker().unwrap();
        assert_eq!(marker.name(), "lb_auth");
        assert_eq!(marker.value(), "1");
        assert_eq!(marker.path(), Some("/"));
    }

    #[test]
    fn sign_out_restores_pre_sign_in_state() {
        let gate = gate();
        gate.apply_auth_change(&AuthChange::new(AuthEvent::InitialSession, None));
        let before = gate.snapshot();
        let marker_before = gate.marker();

        gate.apply_auth_change(&AuthChange::new(AuthEvent::SignedIn, Some(session())));
        gate.apply_auth_change(&AuthChange::new(AuthEvent::SignedOut, None));

        let after = gate.snapshot();
        assert_eq!(after, before);
        assert!(after.user.is_none());
        assert!(after.session.is_none());
        assert_eq!(gate.marker(), marker_before);
        assert!(gate.marker().is_none());
    }

    #[test]
    fn modal_flag_is_independent_of_auth() {
        let gate = gate();
        gate.open_auth();
        assert!(gate.snapshot().auth_open);

        gate.apply_auth_change(&AuthChange::new(AuthEvent::SignedIn, Some(session())));
        assert!(gate.snapshot().auth_open);

        gate.close_auth();
        assert!(!gate.snapshot().auth_open);
        assert!(gate.is_authenticated());
    }

    #[test]
    fn setters_overwrite_unconditionally() {
        let gate = gate();
        gate.set_user(Some(session().user));
        assert_eq!(gate.snapshot().user, Some(session().user));
        assert!(gate.snapshot().session.is_none());

        gate.set_session(Some(session()));
        gate.set_user(None);
        let snapshot = gate.snapshot();
        assert!(snapshot.user.is_none());
        assert!(snapshot.session.is_some());
    }

    #[tokio::test]
    async fn subscribers_see_changes_but_not_no_ops() {
        let gate = gate();
        let mut rx = gate.subscribe();

        gate.close_auth();
        assert!(!rx.has_changed().unwrap());

        gate.open_auth();
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().auth_open);
    }
}

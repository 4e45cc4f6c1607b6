// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-runtime view of the identity collaborator.
//!
//! Wraps a stateless [`IdentityProvider`] with the behaviour a browser SDK
//! would provide: the current session is remembered, and every sign-in,
//! sign-out and refresh is broadcast to subscribers in emission order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use super::{AuthChange, AuthEvent, AuthOutcome, IdentityError, IdentityProvider, Session};
use crate::username::NormalizedUsername;

/// Buffered notifications per subscriber before it starts lagging.
const CHANGE_BUFFER: usize = 32;

pub struct IdentityClient {
    provider: Arc<dyn IdentityProvider>,
    current: RwLock<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
}

impl IdentityClient {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            provider,
            current: RwLock::new(None),
            changes,
        }
    }

    /// One-shot query for the current session.
    pub async fn get_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Subscribe to auth-state changes.
    ///
    /// Only changes emitted after this call are delivered. Dropping the
    /// returned handle unsubscribes.
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.changes.subscribe(),
        }
    }

    /// Sign out the current session, if any.
    pub async fn sign_out_current(&self) -> Result<(), IdentityError> {
        let token = self
            .current
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone());

        match token {
            Some(token) => self.sign_out(&token).await,
            None => Ok(()),
        }
    }

    /// Exchange the current refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let token = self
            .current
            .read()
            .await
            .as_ref()
            .map(|session| session.refresh_token.clone())
            .ok_or_else(|| IdentityError::Rejected("Auth session missing!".to_string()))?;

        self.refresh(&token).await
    }

    /// Replace the current session and notify subscribers.
    ///
    /// The write lock is held across the send so that notification order
    /// always matches the order of state changes.
    async fn transition(&self, event: AuthEvent, session: Option<Session>) {
        let mut current = self.current.write().await;
        *current = session.clone();

        let receivers = self.changes.receiver_count();
        // No subscribers is not an error: the state is still recorded.
        let _ = self.changes.send(AuthChange::new(event, session));
        debug!(%event, receivers, "Auth state change emitted");
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    fn name(&self) -> &'static str {
        self.provider.name()
    }

    async fn sign_up(
        &self,
        handle: &str,
        password: &str,
        username: &NormalizedUsername,
    ) -> Result<AuthOutcome, IdentityError> {
        let outcome = self.provider.sign_up(handle, password, username).await?;
        if let Some(session) = &outcome.session {
            self.transition(AuthEvent::SignedIn, Some(session.clone()))
                .await;
        }
        Ok(outcome)
    }

    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthOutcome, IdentityError> {
        let outcome = self.provider.sign_in(handle, password).await?;
        if let Some(session) = &outcome.session {
            self.transition(AuthEvent::SignedIn, Some(session.clone()))
                .await;
        }
        Ok(outcome)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let result = self.provider.sign_out(access_token).await;
        if let Err(e) = &result {
            warn!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }
        self.transition(AuthEvent::SignedOut, None).await;
        result
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let session = self.provider.refresh(refresh_token).await?;
        self.transition(AuthEvent::TokenRefreshed, Some(session.clone()))
            .await;
        Ok(session)
    }
}

/// Handle on the auth-change notification stream.
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Wait for the next change. Returns `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth subscriber lagged, skipping stale changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving notifications.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentity;
    use crate::username::normalize;

    fn client() -> IdentityClient {
        IdentityClient::new(Arc::new(MemoryIdentity::new()))
    }

    #[tokio::test]
    async fn starts_without_session() {
        assert!(client().get_session().await.is_none());
    }

    #[tokio::test]
    async fn sign_up_records_session_and_notifies() {
        let client = client();
        let mut sub = client.subscribe();

        let outcome = client
            .sign_up("ember@local.invalid", "hunter22", &normalize("ember"))
            .await
            .unwrap();

        let change = sub.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert_eq!(change.session, outcome.session);
        assert_eq!(client.get_session().await, outcome.session);
    }

    #[tokio::test]
    async fn sign_out_clears_session_and_notifies() {
        let client = client();
        client
            .sign_up("moss@local.invalid", "hunter22", &normalize("moss"))
            .await
            .unwrap();

        let mut sub = client.subscribe();
        client.sign_out_current().await.unwrap();

        let change = sub.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedOut);
        assert!(change.session.is_none());
        assert!(client.get_session().await.is_none());
    }

    #[tokio::test]
    async fn failed_sign_in_emits_nothing() {
        let client = client();
        let mut sub = client.subscribe();

        let err = client
            .sign_in("nobody@local.invalid", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));

        drop(client);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn refresh_rotates_session() {
        let client = client();
        let first = client
            .sign_up("lark@local.invalid", "hunter22", &normalize("lark"))
            .await
            .unwrap()
            .session
            .unwrap();

        let mut sub = client.subscribe();
        let refreshed = client.refresh_session().await.unwrap();

        assert_ne!(refreshed.access_token, first.access_token);
        assert_eq!(refreshed.user, first.user);
        assert_eq!(sub.recv().await.unwrap().event, AuthEvent::TokenRefreshed);
    }

    #[tokio::test]
    async fn refresh_without_session_is_rejected() {
        let err = client().refresh_session().await.unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }
}

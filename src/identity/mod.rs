// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Collaborator
//!
//! Real authentication is delegated to an external email/password identity
//! service. This module defines the capability interface the rest of the
//! crate consumes, plus two implementations:
//!
//! - [`SupabaseIdentity`] talks to a Supabase GoTrue instance over HTTPS
//! - [`MemoryIdentity`] keeps accounts in process (development mode, tests)
//!
//! [`IdentityClient`] layers client-runtime behaviour on top of any provider:
//! it remembers the current session and fans out [`AuthChange`] notifications
//! to subscribers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::username::NormalizedUsername;

pub mod client;
pub mod memory;
pub mod supabase;

pub use client::{AuthSubscription, IdentityClient};
pub use memory::MemoryIdentity;
pub use supabase::SupabaseIdentity;

/// Identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityUser {
    /// Provider-assigned user ID
    pub id: String,
    /// Synthesized login handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Normalized username stored as user metadata at sign-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Session descriptor issued by the provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Expiry as a Unix timestamp (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: IdentityUser,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Kind of authentication-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    /// Result of the one-shot session resolution at startup
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl std::fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// Notification delivered to auth-change subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Result of a successful sign-up or sign-in.
///
/// Sign-up may yield a user without a session when the provider requires
/// confirmation before the first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub user: IdentityUser,
    pub session: Option<Session>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider refused the request; the message is shown to the user verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Identity provider unavailable (HTTP {0})")]
    Unavailable(u16),

    #[error("Identity provider request failed: {0}")]
    Transport(String),

    #[error("Identity provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Capability interface of the external identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    async fn sign_up(
        &self,
        handle: &str,
        password: &str,
        username: &NormalizedUsername,
    ) -> Result<AuthOutcome, IdentityError>;

    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthOutcome, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError>;
}

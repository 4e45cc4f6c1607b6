// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process identity provider.
//!
//! Used when no Supabase project is configured (development mode) and by the
//! test suite. Error messages mirror the hosted provider so that form
//! feedback reads the same in both modes.
//!
//! WARNING: accounts live only as long as the process.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthOutcome, IdentityError, IdentityProvider, IdentityUser, Session};
use crate::username::NormalizedUsername;

/// Default session lifetime (1 hour, matching the hosted provider).
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

const USER_EXISTS: &str = "User already registered";
const INVALID_CREDENTIALS: &str = "Invalid login credentials";
const REFRESH_NOT_FOUND: &str = "Invalid Refresh Token: Refresh Token Not Found";

struct Account {
    user: IdentityUser,
    salt: String,
    digest: String,
}

pub struct MemoryIdentity {
    /// Accounts keyed by login handle
    accounts: RwLock<HashMap<String, Account>>,
    /// Live sessions keyed by access token
    sessions: RwLock<HashMap<String, Session>>,
    session_ttl: Duration,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of sessions held: issued, not revoked, and not yet pruned.
    ///
    /// Expired sessions are dropped whenever a new one is issued.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn issue_session(&self, user: IdentityUser) -> Session {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.session_ttl.as_secs()).unwrap_or(i64::MAX);
        let session = Session {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
            token_type: "bearer".to_string(),
            expires_at: Some(now.saturating_add(ttl)),
            user,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, live| live.expires_at.is_none_or(|expires_at| expires_at > now));
        sessions.insert(session.access_token.clone(), session.clone());
        session
    }
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn sign_up(
        &self,
        handle: &str,
        password: &str,
        username: &NormalizedUsername,
    ) -> Result<AuthOutcome, IdentityError> {
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(handle) {
                return Err(IdentityError::Rejected(USER_EXISTS.to_string()));
            }

            let user = IdentityUser {
                id: Uuid::new_v4().to_string(),
                email: Some(handle.to_string()),
                username: Some(username.to_string()),
                created_at: Some(Utc::now()),
            };
            let salt = Uuid::new_v4().simple().to_string();
            let digest = password_digest(&salt, password);
            accounts.insert(
                handle.to_string(),
                Account {
                    user: user.clone(),
                    salt,
                    digest,
                },
            );
            user
        };

        let session = self.issue_session(user.clone()).await;
        Ok(AuthOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthOutcome, IdentityError> {
        let user = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(handle)
                .ok_or_else(|| IdentityError::Rejected(INVALID_CREDENTIALS.to_string()))?;
            if password_digest(&account.salt, password) != account.digest {
                return Err(IdentityError::Rejected(INVALID_CREDENTIALS.to_string()));
            }
            account.user.clone()
        };

        let session = self.issue_session(user.clone()).await;
        Ok(AuthOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        // Revoking an unknown token is a no-op, as with the hosted provider.
        self.sessions.write().await.remove(access_token);
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let user = {
            let mut sessions = self.sessions.write().await;
            let access_token = sessions
                .values()
                .find(|session| session.refresh_token == refresh_token)
                .map(|session| session.access_token.clone())
                .ok_or_else(|| IdentityError::Rejected(REFRESH_NOT_FOUND.to_string()))?;
            sessions
                .remove(&access_token)
                .map(|session| session.user)
                .ok_or_else(|| IdentityError::Rejected(REFRESH_NOT_FOUND.to_string()))?
        };

        Ok(self.issue_session(user).await)
    }
}

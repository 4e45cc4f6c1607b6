// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supabase GoTrue integration.
//!
//! Only the password grant is used: usernames are mapped onto synthesized
//! `@local.invalid` addresses before they reach this client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{AuthOutcome, IdentityError, IdentityProvider, IdentityUser, Session};
use crate::username::NormalizedUsername;

const AUTH_PATH: &str = "/auth/v1";

#[derive(Debug, Clone)]
pub struct SupabaseIdentity {
    base_url: String,
    anon_key: String,
    http: Client,
}

#[derive(Debug, Deserialize, Default)]
struct GoTrueMetadata {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<GoTrueMetadata>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

/// Sign-up answers with a full session, or with a bare user when email
/// confirmation is enabled on the project.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(GoTrueSession),
    User(GoTrueUser),
}

#[derive(Debug, Deserialize, Default)]
struct GoTrueErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<GoTrueUser> for IdentityUser {
    fn from(user: GoTrueUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.user_metadata.and_then(|m| m.username),
            created_at: user.created_at,
        }
    }
}

impl GoTrueSession {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at,
            user: self.user.into(),
        }
    }
}

impl SupabaseIdentity {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{AUTH_PATH}{path}", self.base_url)
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        payload: &Value,
    ) -> Result<String, IdentityError> {
        let mut request = self
            .http
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .json(payload);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        if status.is_server_error() {
            warn!(status = status.as_u16(), path, "Identity provider returned server error");
            return Err(IdentityError::Unavailable(status.as_u16()));
        }

        Err(IdentityError::Rejected(rejection_message(status, &body)))
    }
}

/// Pull the human-readable message out of a GoTrue error body.
fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed: GoTrueErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request rejected")
                .to_string()
        })
}

fn parse_session(body: &str) -> Result<Session, IdentityError> {
    let session: GoTrueSession = serde_json::from_str(body)
        .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
    Ok(session.into_session(Utc::now().timestamp()))
}

fn parse_sign_up(body: &str) -> Result<AuthOutcome, IdentityError> {
    let response: SignUpResponse = serde_json::from_str(body)
        .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

    Ok(match response {
        SignUpResponse::Session(session) => {
            let session = session.into_session(Utc::now().timestamp());
            AuthOutcome {
                user: session.user.clone(),
                session: Some(session),
            }
        }
        SignUpResponse::User(user) => AuthOutcome {
            user: user.into(),
            session: None,
        },
    })
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn sign_up(
        &self,
        handle: &str,
        password: &str,
        username: &NormalizedUsername,
    ) -> Result<AuthOutcome, IdentityError> {
        let payload = json!({
            "email": handle,
            "password": password,
            "data": { "username": username.as_str() },
        });
        let body = self.post_json("/signup", None, &payload).await?;
        let outcome = parse_sign_up(&body)?;

        info!(
            user_id = %outcome.user.id,
            confirmed = outcome.session.is_some(),
            "Supabase sign-up completed"
        );
        Ok(outcome)
    }

    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthOutcome, IdentityError> {
        let payload = json!({ "email": handle, "password": password });
        let body = self
            .post_json("/token?grant_type=password", None, &payload)
            .await?;
        let session = parse_session(&body)?;

        Ok(AuthOutcome {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.post_json("/logout", Some(access_token), &json!({}))
            .await
            .map(|_| ())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let payload = json!({ "refresh_token": refresh_token });
        let body = self
            .post_json("/token?grant_type=refresh_token", None, &payload)
            .await?;
        parse_session(&body)
    }
}

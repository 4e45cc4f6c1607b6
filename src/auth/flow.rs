// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Username/password authentication against the identity collaborator.
//!
//! Shared by the client-side [`AuthModal`](super::AuthModal) and the HTTP auth
//! endpoints. Validation runs locally first: username, then password. Only
//! valid credentials reach the provider, under a synthesized handle.

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use super::AuthError;
use crate::identity::{AuthOutcome, IdentityError, IdentityProvider};
use crate::username::{self, NormalizedUsername, MIN_PASSWORD_LEN};

/// Whether the user is creating an account or signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Signup,
    Login,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::Signup => AuthMode::Login,
            AuthMode::Login => AuthMode::Signup,
        }
    }

    /// Generic message for failures that are neither validation nor provider errors.
    pub fn fallback_message(self) -> &'static str {
        match self {
            AuthMode::Signup => "Sign up failed",
            AuthMode::Login => "Sign in failed",
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Signup => write!(f, "signup"),
            AuthMode::Login => write!(f, "login"),
        }
    }
}

/// Raw credentials as typed by the user.
#[derive(Clone, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials that passed local validation.
pub struct ValidatedCredentials {
    pub username: NormalizedUsername,
    /// Synthesized identity-provider login
    pub handle: String,
    password: String,
}

/// Check username then password, in that order.
pub fn validate(raw_username: &str, password: &str) -> Result<ValidatedCredentials, AuthError> {
    if !username::is_valid(raw_username) {
        return Err(AuthError::InvalidUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }

    let normalized = username::normalize(raw_username);
    let handle = username::synthesize_handle(&normalized);
    Ok(ValidatedCredentials {
        username: normalized,
        handle,
        password: password.to_string(),
    })
}

/// Sign up or sign in with already-validated credentials.
pub async fn authenticate_validated(
    provider: &dyn IdentityProvider,
    mode: AuthMode,
    credentials: &ValidatedCredentials,
) -> Result<AuthOutcome, AuthError> {
    let result = match mode {
        AuthMode::Signup => {
            provider
                .sign_up(
                    &credentials.handle,
                    &credentials.password,
                    &credentials.username,
                )
                .await
        }
        AuthMode::Login => {
            provider
                .sign_in(&credentials.handle, &credentials.password)
                .await
        }
    };

    match result {
        Ok(outcome) => {
            info!(
                %mode,
                username = %credentials.username,
                provider = provider.name(),
                "Authentication succeeded"
            );
            Ok(outcome)
        }
        Err(IdentityError::Rejected(msg)) => {
            info!(%mode, username = %credentials.username, reason = %msg, "Authentication rejected");
            Err(AuthError::Provider(msg))
        }
        Err(e) => {
            error!(%mode, provider = provider.name(), error = %e, "Authentication failed unexpectedly");
            Err(AuthError::Unexpected(mode.fallback_message().to_string()))
        }
    }
}

/// Validate raw input, then sign up or sign in.
pub async fn authenticate(
    provider: &dyn IdentityProvider,
    mode: AuthMode,
    raw_username: &str,
    password: &str,
) -> Result<AuthOutcome, AuthError> {
    let credentials = validate(raw_username, password)?;
    authenticate_validated(provider, mode, &credentials).await
}

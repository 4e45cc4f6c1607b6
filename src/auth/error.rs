// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant is terminal at the UI boundary: it is shown inline in the
//! auth form (or returned as JSON by the HTTP endpoints) and never retried.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username fails normalization/validation (checked locally)
    InvalidUsername,
    /// Password shorter than the minimum (checked locally)
    PasswordTooShort,
    /// Identity provider refused the request; message is shown verbatim
    Provider(String),
    /// Anything else; carries the generic message shown to the user
    Unexpected(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidUsername => "invalid_username",
            AuthError::PasswordTooShort => "password_too_short",
            AuthError::Provider(_) => "provider_rejected",
            AuthError::Unexpected(_) => "unexpected_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidUsername | AuthError::PasswordTooShort => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthError::Provider(_) => StatusCode::UNAUTHORIZED,
            AuthError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was raised before contacting the provider.
    pub fn is_validation(&self) -> bool {
        matches!(self, AuthError::InvalidUsername | AuthError::PasswordTooShort)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidUsername => {
                write!(f, "Username must be 3-24 chars: letters, numbers, _ or -")
            }
            AuthError::PasswordTooShort => write!(f, "Password must be at least 6 characters"),
            AuthError::Provider(msg) => write!(f, "{msg}"),
            AuthError::Unexpected(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

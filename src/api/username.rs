// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::username::{self, NormalizedUsername};

#[derive(Debug, Deserialize, IntoParams)]
pub struct UsernameQuery {
    /// Raw username as typed
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsernameCheck {
    pub input: String,
    pub normalized: NormalizedUsername,
    pub valid: bool,
    /// Login handle the username maps to, when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// Normalize and validate a username without creating anything.
#[utoipa::path(
    get,
    path = "/v1/username/check",
    tag = "Auth",
    params(UsernameQuery),
    responses(
        (status = 200, description = "Normalization result", body = UsernameCheck)
    )
)]
pub async fn check_username(Query(query): Query<UsernameQuery>) -> Json<UsernameCheck> {
    let normalized = username::normalize(&query.username);
    let valid = username::is_valid(&query.username);
    let handle = valid.then(|| username::synthesize_handle(&normalized));

    Json(UsernameCheck {
        input: query.username,
        normalized,
        valid,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(raw: &str) -> UsernameCheck {
        let Json(body) = check_username(Query(UsernameQuery {
            username: raw.to_string(),
        }))
        .await;
        body
    }

    #[tokio::test]
    async fn valid_username_gets_handle() {
        let body = check("  Ember Light!! ").await;
        assert_eq!(body.normalized.as_str(), "ember-light");
        assert!(body.valid);
        assert_eq!(body.handle.as_deref(), Some("ember-light@local.invalid"));
    }

    #[tokio::test]
    async fn invalid_username_has_no_handle() {
        let body = check("!!").await;
        assert_eq!(body.normalized.as_str(), "");
        assert!(!body.valid);
        assert!(body.handle.is_none());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-up, sign-in and sign-out endpoints.
//!
//! Each response mirrors the authentication result into the `lb_auth`
//! boundary marker cookie, which is all the route guard looks at.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::{authenticate, AuthError, AuthMode, BearerToken, Credentials};
use crate::identity::{AuthOutcome, IdentityUser, Session};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: IdentityUser,
    /// Absent when the provider requires confirmation before first login
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

fn respond(state: &AppState, jar: CookieJar, outcome: AuthOutcome) -> (CookieJar, Json<AuthResponse>) {
    // Marker only when a session was issued.
    let jar = match &outcome.session {
        Some(session) => jar.add(state.marker.issue(Some(session))),
        None => jar,
    };

    (
        jar,
        Json(AuthResponse {
            user: outcome.user,
            session: outcome.session,
        }),
    )
}

async fn run(
    state: AppState,
    jar: CookieJar,
    mode: AuthMode,
    credentials: Credentials,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let outcome = authenticate(
        state.identity.as_ref(),
        mode,
        &credentials.username,
        &credentials.password,
    )
    .await?;
    Ok(respond(&state, jar, outcome))
}

/// Create an account.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    tag = "Auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Account created; sets lb_auth when a session was issued", body = AuthResponse),
        (status = 401, description = "Rejected by the identity provider"),
        (status = 422, description = "Invalid username or password"),
        (status = 500, description = "Sign up failed")
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    run(state, jar, AuthMode::Signup, credentials).await
}

/// Sign in to an existing account.
#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    tag = "Auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in; sets lb_auth", body = AuthResponse),
        (status = 401, description = "Rejected by the identity provider"),
        (status = 422, description = "Invalid username or password"),
        (status = 500, description = "Sign in failed")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    run(state, jar, AuthMode::Login, credentials).await
}

/// Sign out and clear the boundary marker.
///
/// A bearer access token, when sent, is revoked at the identity provider.
/// The marker is cleared even if revocation fails.
#[utoipa::path(
    post,
    path = "/v1/auth/signout",
    tag = "Auth",
    responses(
        (status = 204, description = "Signed out; lb_auth cleared"),
        (status = 400, description = "Malformed Authorization header")
    )
)]
pub async fn sign_out(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    if let Some(token) = token {
        match state.identity.sign_out(&token).await {
            Ok(()) => info!(provider = state.identity.name(), "Session revoked"),
            Err(e) => warn!(error = %e, "Failed to revoke session at identity provider"),
        }
    }

    (jar.add(state.marker.clear()), StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::response::IntoResponse;
    use axum::http::header::SET_COOKIE;

    use crate::auth::ProtectedPaths;
    use crate::identity::{IdentityError, IdentityProvider, MemoryIdentity};
    use crate::session::BoundaryMarker;
    use crate::username::NormalizedUsername;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// Provider that accepts sign-ups but never issues a session.
    struct ConfirmFirst;

    #[async_trait]
    impl IdentityProvider for ConfirmFirst {
        fn name(&self) -> &'static str {
            "confirm-first"
        }

        async fn sign_up(
            &self,
            handle: &str,
            _password: &str,
            username: &NormalizedUsername,
        ) -> Result<AuthOutcome, IdentityError> {
            Ok(AuthOutcome {
                user: IdentityUser {
                    id: "pending".to_string(),
                    email: Some(handle.to_string()),
                    username: Some(username.to_string()),
                    created_at: None,
                },
                session: None,
            })
        }

        async fn sign_in(&self, _handle: &str, _password: &str) -> Result<AuthOutcome, IdentityError> {
            Err(IdentityError::Rejected("Email not confirmed".to_string()))
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<Session, IdentityError> {
            Err(IdentityError::Rejected("Email not confirmed".to_string()))
        }
    }

    #[tokio::test]
    async fn sign_up_sets_marker() {
        let state = AppState::default();
        let result = sign_up(State(state), CookieJar::new(), Json(creds("Ember", "hunter22"))).await;
        let response = result.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("lb_auth=1"));
        assert!(cookies[0].contains("Path=/"));
    }

    #[tokio::test]
    async fn validation_failure_sets_no_marker() {
        let state = AppState::default();
        let response = sign_in(State(state), CookieJar::new(), Json(creds("ab", "hunter22")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let state = AppState::default();
        let response = sign_in(State(state), CookieJar::new(), Json(creds("ghost", "hunter22")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn sign_up_without_session_sets_no_marker() {
        let state = AppState::new(
            Arc::new(ConfirmFirst),
            BoundaryMarker::plain(),
            ProtectedPaths::default(),
        );
        let response = sign_up(State(state), CookieJar::new(), Json(creds("ember", "hunter22")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn sign_out_revokes_and_clears_marker() {
        let provider = Arc::new(MemoryIdentity::new());
        let state = AppState::new(provider.clone(), BoundaryMarker::plain(), ProtectedPaths::default());

        let (_, Json(body)) = sign_up(
            State(state.clone()),
            CookieJar::new(),
            Json(creds("ember", "hunter22")),
        )
        .await
        .unwrap();
        let token = body.session.unwrap().access_token;
        assert_eq!(provider.active_sessions().await, 1);

        let response = sign_out(State(state), BearerToken(Some(token)), CookieJar::new())
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(provider.active_sessions().await, 0);
        let cookies = set_cookies(&response);
        assert!(cookies[0].starts_with("lb_auth=;"));
        assert!(cookies[0].contains("Max-Age=0"));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{route_guard, AuthMode, Credentials},
    error::ErrorBody,
    identity::{IdentityUser, Session},
    state::AppState,
    username::NormalizedUsername,
};

pub mod auth;
pub mod health;
pub mod pages;
pub mod username;

/// Full application router.
///
/// The route guard wraps every route, the fallback included, so any path
/// under a protected prefix is gated even if nothing serves it.
pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/username/check", get(username::check_username))
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signout", post(auth::sign_out));

    Router::new()
        .route("/", get(pages::landing))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/{*rest}", get(pages::dashboard))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(pages::not_found)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.guard.clone(), route_guard))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        pages::landing,
        pages::dashboard,
        username::check_username,
        auth::sign_up,
        auth::sign_in,
        auth::sign_out,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            AuthMode,
            Credentials,
            IdentityUser,
            Session,
            NormalizedUsername,
            ErrorBody,
            auth::AuthResponse,
            username::UsernameCheck,
            pages::LandingPage,
            pages::DashboardPage,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Pages", description = "Entry page and guarded pages"),
        (name = "Auth", description = "Username/password authentication"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Landing and protected placeholder pages.
//!
//! Rendering is handled elsewhere; these return the state a page needs.

use axum::{extract::RawQuery, http::Uri, Json};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

use crate::auth::guard::REDIRECT_PARAM;
use crate::auth::MarkerStatus;
use crate::error::ApiError;

/// Documented landing parameters. Parsed leniently by [`redirect_source`].
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LandingQuery {
    /// Protected path the visitor was sent away from
    pub redirected_from: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LandingPage {
    pub session_active: bool,
    /// "Session active" or "No session"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardPage {
    pub path: String,
}

/// Public entry page. Never guarded.
#[utoipa::path(
    get,
    path = "/",
    tag = "Pages",
    params(LandingQuery),
    responses(
        (status = 200, description = "Landing state", body = LandingPage)
    )
)]
pub async fn landing(marker: MarkerStatus, RawQuery(query): RawQuery) -> Json<LandingPage> {
    Json(LandingPage {
        session_active: marker.active,
        status: if marker.active { "Session active" } else { "No session" }.to_string(),
        redirected_from: query.as_deref().and_then(redirect_source),
    })
}

/// First non-empty `redirectedFrom` value. Anything else in the query is ignored.
fn redirect_source(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == REDIRECT_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Protected dashboard placeholder.
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Pages",
    responses(
        (status = 200, description = "Dashboard page", body = DashboardPage),
        (status = 307, description = "No valid lb_auth marker; redirected to the entry page")
    )
)]
pub async fn dashboard(uri: Uri) -> Json<DashboardPage> {
    Json(DashboardPage {
        path: uri.path().to_string(),
    })
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for request-level auth inputs.
//!
//! ```rust,ignore
//! async fn landing(marker: MarkerStatus) -> impl IntoResponse {
//!     // marker.active is true when a valid `lb_auth` cookie was sent
//! }
//!
//! async fn sign_out(BearerToken(token): BearerToken) -> impl IntoResponse {
//!     // token is Some(access_token) when `Authorization: Bearer ...` was sent
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;
use crate::state::AppState;

/// Whether the request carries a boundary marker that verifies.
///
/// Never rejects: a missing or invalid marker reads as inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStatus {
    pub active: bool,
}

impl FromRequestParts<AppState> for MarkerStatus {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MarkerStatus {
            active: state.marker.is_present(&parts.headers),
        })
    }
}

/// Optional bearer access token from the `Authorization` header.
///
/// A missing header yields `None`; a header that is not a bearer token is
/// rejected with 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub Option<String>);

fn parse_bearer(parts: &Parts) -> Result<Option<String>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid Authorization header"))?;

    Ok(Some(token.to_string()))
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_bearer(parts).map(BearerToken)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route guard middleware for Axum.
//!
//! Intercepts every request under a protected path prefix before it reaches
//! a handler. The only input is the `lb_auth` boundary marker carried in the
//! request's cookies: the guard cannot see the client's in-memory session.
//!
//! Requests outside the protected surface pass through untouched. Inside it,
//! requests without a valid marker are redirected to the entry page with the
//! original path recorded in `redirectedFrom`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let guard = Arc::new(RouteGuard::new(
//!     ProtectedPaths::from_patterns(["/dashboard/:path*"]),
//!     BoundaryMarker::plain(),
//! ));
//!
//! let app = Router::new()
//!     .route("/dashboard", get(dashboard))
//!     .layer(axum::middleware::from_fn_with_state(guard, route_guard));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::session::BoundaryMarker;

/// Public entry page unauthenticated visitors are sent to.
pub const ENTRY_PATH: &str = "/";

/// Query parameter carrying the originally requested path.
pub const REDIRECT_PARAM: &str = "redirectedFrom";

/// Protected surface used when none is configured.
pub const DEFAULT_PROTECTED_PATTERN: &str = "/dashboard/:path*";

/// Path prefixes the guard applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPaths {
    prefixes: Vec<String>,
}

/// Reduce a matcher pattern to its literal prefix.
///
/// `/dashboard/:path*`, `/dashboard/*` and `/dashboard/` all become
/// `/dashboard`.
fn pattern_prefix(pattern: &str) -> Option<String> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return None;
    }

    let literal = trimmed
        .split('/')
        .take_while(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
        .collect::<Vec<_>>()
        .join("/");
    let literal = literal.trim_end_matches('/');

    if literal.is_empty() {
        Some("/".to_string())
    } else if literal.starts_with('/') {
        Some(literal.to_string())
    } else {
        Some(format!("/{literal}"))
    }
}

impl ProtectedPaths {
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = patterns
            .into_iter()
            .filter_map(|pattern| pattern_prefix(pattern.as_ref()))
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Whether `path` equals a prefix or lies beneath it on a segment boundary.
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            prefix == "/"
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self::from_patterns([DEFAULT_PROTECTED_PATTERN])
    }
}

/// Outcome of guarding one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Stateless protected-path policy.
#[derive(Clone)]
pub struct RouteGuard {
    paths: ProtectedPaths,
    marker: BoundaryMarker,
}

impl RouteGuard {
    pub fn new(paths: ProtectedPaths, marker: BoundaryMarker) -> Self {
        Self { paths, marker }
    }

    pub fn paths(&self) -> &ProtectedPaths {
        &self.paths
    }

    /// Decide whether a request may proceed.
    pub fn evaluate(&self, path: &str, query: Option<&str>, headers: &HeaderMap) -> GuardDecision {
        // The entry page is never guarded, so a redirect cannot loop.
        if path == ENTRY_PATH || !self.paths.matches(path) {
            return GuardDecision::Allow;
        }

        if self.marker.is_present(headers) {
            return GuardDecision::Allow;
        }

        GuardDecision::Redirect(redirect_target(path, query))
    }
}

/// Entry-page URL recording `requested_path`.
///
/// Parameters already on the original request are kept; an existing
/// `redirectedFrom` is replaced.
pub fn redirect_target(requested_path: &str, query: Option<&str>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key != REDIRECT_PARAM {
                serializer.append_pair(&key, &value);
            }
        }
    }
    serializer.append_pair(REDIRECT_PARAM, requested_path);

    format!("{ENTRY_PATH}?{}", serializer.finish())
}

/// Route guard middleware function.
pub async fn route_guard(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = guard.evaluate(
        request.uri().path(),
        request.uri().query(),
        request.headers(),
    );

    match decision {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(target) => {
            info!(
                path = %request.uri().path(),
                signed_marker = guard.marker.is_signed(),
                "Unauthenticated request to protected path, redirecting"
            );
            debug!(%target, "Guard redirect target");
            Redirect::temporary(&target).into_response()
        }
    }
}

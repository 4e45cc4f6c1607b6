// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{ProtectedPaths, RouteGuard};
use crate::identity::{IdentityProvider, MemoryIdentity};
use crate::session::BoundaryMarker;

#[derive(Clone)]
pub struct AppState {
    /// Identity collaborator used by the auth endpoints
    pub identity: Arc<dyn IdentityProvider>,
    /// Route guard applied to the whole router
    pub guard: Arc<RouteGuard>,
    /// Marker issued by the auth endpoints, same policy the guard verifies
    pub marker: BoundaryMarker,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        marker: BoundaryMarker,
        paths: ProtectedPaths,
    ) -> Self {
        Self {
            identity,
            guard: Arc::new(RouteGuard::new(paths, marker.clone())),
            marker,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Arc::new(MemoryIdentity::new()),
            BoundaryMarker::plain(),
            ProtectedPaths::default(),
        )
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Gate
//!
//! Client-runtime authentication state and its mirror at the HTTP boundary.
//!
//! ## Flow
//!
//! 1. The identity collaborator emits an auth change (sign-in, sign-out,
//!    refresh)
//! 2. [`SessionSync`] hands it to the [`SessionGate`]
//! 3. The gate updates `user`/`session` together and writes the `lb_auth`
//!    marker through its [`MarkerStore`]
//! 4. The route guard later reads only that marker

pub mod gate;
pub mod marker;
pub mod sync;

pub use gate::{AuthSnapshot, SessionGate};
pub use marker::{BoundaryMarker, MarkerSigner, MarkerStore, MemoryMarkerStore, MARKER_COOKIE};
pub use sync::SessionSync;

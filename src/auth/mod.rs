// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Username/password authentication and the edge route guard for Lorebook.
//!
//! ## Auth Flow
//!
//! 1. The user enters a username and password in the auth modal
//! 2. Credentials are validated locally (username first, then password)
//! 3. The username is normalized and turned into a synthetic handle
//!    (`<username>@local.invalid`) that the identity provider sees as a login
//! 4. On success the session gate records the user and writes the `lb_auth`
//!    boundary marker
//! 5. The route guard reads only that marker when a protected page is requested
//!
//! ## Security
//!
//! - The marker is a navigation gate, not a credential
//! - Plain markers (`lb_auth=1`) can be forged by the client
//! - Signed markers carry an expiry and an HMAC-SHA256 tag
//! - Protected operations must re-verify with the identity provider

pub mod error;
pub mod extractor;
pub mod flow;
pub mod form;
pub mod guard;

pub use error::AuthError;
pub use extractor::{BearerToken, MarkerStatus};
pub use flow::{authenticate, validate, AuthMode, Credentials};
pub use form::{AuthForm, AuthModal};
pub use guard::{route_guard, GuardDecision, ProtectedPaths, RouteGuard};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lorebook Gate - Authentication Edge for Lorebook
//!
//! Authenticated users each contribute one sentence to a shared narrative.
//! This crate is the gate in front of that product: username normalization,
//! the client-side session state, and the edge route guard keyed on the
//! `lb_auth` cookie.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Credential flow, auth modal state and the route guard
//! - `identity` - Identity provider interface, Supabase and in-memory providers
//! - `session` - Session gate, boundary marker and change synchronization
//! - `username` - Username normalization and validation

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod state;
pub mod username;

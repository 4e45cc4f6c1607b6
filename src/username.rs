// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Username Normalization
//!
//! Free-text usernames are mapped onto a constrained identifier space:
//! lowercase ASCII letters, digits, `_` and `-`, with no leading, trailing or
//! repeated hyphens. The normalized form doubles as the local part of the
//! placeholder address handed to the identity provider, so the mapping must be
//! deterministic and idempotent.

use serde::Serialize;
use utoipa::ToSchema;

/// Minimum accepted length of a normalized username.
pub const MIN_LEN: usize = 3;

/// Maximum accepted length of a normalized username.
pub const MAX_LEN: usize = 24;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Reserved domain used for synthesized identity-provider handles.
///
/// `.invalid` is reserved by RFC 2606 and can never receive mail.
pub const RESERVED_DOMAIN: &str = "local.invalid";

/// A username after [`normalize`] has been applied.
///
/// Only [`normalize`] constructs this type. The value may be empty when the
/// input contained no acceptable characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct NormalizedUsername(String);

impl NormalizedUsername {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for NormalizedUsername {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedUsername {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<NormalizedUsername> for String {
    fn from(value: NormalizedUsername) -> Self {
        value.0
    }
}

fn is_allowed(ch: char) -> bool {
    matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-')
}

/// Canonicalize free-text input into a [`NormalizedUsername`].
///
/// Trims and lowercases the input, replaces every run of disallowed characters
/// with a single `-`, collapses repeated hyphens and strips hyphens from both
/// ends. Total: never fails.
pub fn normalize(input: &str) -> NormalizedUsername {
    let lowered = input.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());

    for ch in lowered.chars() {
        let ch = if is_allowed(ch) { ch } else { '-' };
        // A disallowed run and any neighbouring hyphens collapse together.
        if ch == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(ch);
    }

    NormalizedUsername(slug.trim_matches('-').to_string())
}

/// Check whether `input` normalizes to an acceptable username.
///
/// The character set is re-verified on the normalized value instead of being
/// assumed from [`normalize`].
pub fn is_valid(input: &str) -> bool {
    let slug = normalize(input);
    let length = slug.as_str().chars().count();

    (MIN_LEN..=MAX_LEN).contains(&length) && slug.as_str().chars().all(is_allowed)
}

/// Build the placeholder address used as the identity-provider login.
pub fn synthesize_handle(username: &NormalizedUsername) -> String {
    format!("{}@{RESERVED_DOMAIN}", username.as_str())
}

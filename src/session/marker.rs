// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Boundary marker cookie.
//!
//! The route guard runs where the identity provider cannot be queried, so
//! authentication state is mirrored into a single cookie, `lb_auth`.
//!
//! ## Security
//!
//! - **Plain** markers carry the literal value `1`. Anyone can set that
//!   cookie; it is a navigation convenience, not a security boundary.
//! - **Signed** markers carry `1.<expires_unix>.<base64url HMAC-SHA256>`
//!   and are only valid if issued by a holder of the secret and unexpired.
//!
//! In both modes every protected operation must still verify the user's
//! session with the identity provider.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::identity::Session;

/// Cookie name of the boundary marker.
pub const MARKER_COOKIE: &str = "lb_auth";

/// Truthy marker value (and the prefix of signed values).
pub const MARKER_VALUE: &str = "1";

type HmacSha256 = Hmac<Sha256>;

/// HMAC key and lifetime for signed markers.
#[derive(Clone)]
pub struct MarkerSigner {
    mac: HmacSha256,
    ttl: Duration,
}

impl MarkerSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expiry for a marker issued at `now`: the earlier of the session expiry
    /// and the signer's TTL, but always at least one second ahead.
    ///
    /// A session that already looks expired (provider clock skew) still gets
    /// a live marker while the gate holds it.
    fn expiry(&self, now: i64, session_expiry: Option<i64>) -> i64 {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let ttl_expiry = now.saturating_add(ttl);
        session_expiry
            .map_or(ttl_expiry, |session_expiry| session_expiry.min(ttl_expiry))
            .max(now.saturating_add(1))
    }

    fn signature(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
    }

    /// Produce a marker value valid until `expires_at` (Unix seconds).
    pub fn sign(&self, expires_at: i64) -> String {
        let payload = format!("{MARKER_VALUE}.{expires_at}");
        let signature = self.signature(&payload);
        format!("{payload}.{signature}")
    }

    /// Check signature and expiry of a marker value.
    pub fn verify(&self, value: &str, now: i64) -> bool {
        let mut parts = value.splitn(3, '.');
        let (Some(flag), Some(expiry), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if flag != MARKER_VALUE {
            return false;
        }
        let Ok(expires_at) = expiry.parse::<i64>() else {
            return false;
        };
        if expires_at <= now {
            return false;
        }
        let Ok(signature) = Base64UrlUnpadded::decode_vec(signature) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(flag.as_bytes());
        mac.update(b".");
        mac.update(expiry.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

#[derive(Clone)]
enum MarkerMode {
    Plain,
    Signed(MarkerSigner),
}

/// Issues, clears and verifies `lb_auth` cookies.
#[derive(Clone)]
pub struct BoundaryMarker {
    mode: MarkerMode,
    secure: bool,
}

impl BoundaryMarker {
    /// Unsigned `lb_auth=1` markers.
    pub fn plain() -> Self {
        Self {
            mode: MarkerMode::Plain,
            secure: false,
        }
    }

    /// HMAC-signed, expiring markers.
    pub fn signed(signer: MarkerSigner) -> Self {
        Self {
            mode: MarkerMode::Signed(signer),
            secure: false,
        }
    }

    /// Set the `Secure` attribute on issued cookies.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.mode, MarkerMode::Signed(_))
    }

    /// Marker cookie for the given authentication state.
    ///
    /// A session yields a truthy marker scoped to `/`; no session yields a
    /// removal cookie.
    pub fn issue(&self, session: Option<&Session>) -> Cookie<'static> {
        let Some(session) = session else {
            return self.clear();
        };

        match &self.mode {
            MarkerMode::Plain => self.base(MARKER_VALUE.to_string()),
            MarkerMode::Signed(signer) => {
                let now = Utc::now().timestamp();
                let expires_at = signer.expiry(now, session.expires_at);
                let mut cookie = self.base(signer.sign(expires_at));
                cookie.set_max_age(time::Duration::seconds(expires_at.saturating_sub(now)));
                cookie
            }
        }
    }

    /// Removal cookie: empty value, immediate expiry.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.base(String::new());
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }

    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((MARKER_COOKIE, value))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    /// Whether a marker value grants access.
    pub fn verify(&self, value: &str) -> bool {
        match &self.mode {
            MarkerMode::Plain => value == MARKER_VALUE,
            MarkerMode::Signed(signer) => signer.verify(value, Utc::now().timestamp()),
        }
    }

    /// Read the raw marker value from request headers.
    pub fn read(headers: &HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(MARKER_COOKIE)
            .map(|cookie| cookie.value().to_string())
    }

    /// Whether the request carries a marker that verifies.
    pub fn is_present(&self, headers: &HeaderMap) -> bool {
        Self::read(headers).is_some_and(|value| self.verify(&value))
    }
}

/// Transport-visible location the session gate writes the marker to.
pub trait MarkerStore: Send + Sync {
    fn write(&self, cookie: Cookie<'static>);

    /// The live marker, or `None` if absent or cleared.
    fn current(&self) -> Option<Cookie<'static>>;
}

/// Single-slot cookie store for a client runtime.
#[derive(Default)]
pub struct MemoryMarkerStore {
    slot: Mutex<Option<Cookie<'static>>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Cookie` header value to attach to outbound requests.
    pub fn cookie_header(&self) -> Option<String> {
        self.current()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
    }
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() || cookie.max_age() == Some(time::Duration::ZERO)
}

impl MarkerStore for MemoryMarkerStore {
    fn write(&self, cookie: Cookie<'static>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = if is_removal(&cookie) { None } else { Some(cookie) };
    }

    fn current(&self) -> Option<Cookie<'static>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityUser;
    use axum::http::header::COOKIE;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            user: IdentityUser {
                id: "u1".to_string(),
                email: None,
                username: Some("ember".to_string()),
                created_at: None,
            },
        }
    }

    fn signer() -> MarkerSigner {
        MarkerSigner::new(b"test-secret", Duration::from_secs(3600)).unwrap()
    }

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().unwrap());
        headers
    }

    #[test]
    fn plain_marker_wire_format() {
        let cookie = BoundaryMarker::plain().issue(Some(&session(None)));
        assert_eq!(cookie.name(), "lb_auth");
        assert_eq!(cookie.value(), "1");
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.max_age().is_none());
    }

    #[test]
    fn no_session_issues_removal_cookie() {
        let cookie = BoundaryMarker::plain().issue(None);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn secure_flag_is_applied() {
        let cookie = BoundaryMarker::plain()
            .with_secure(true)
            .issue(Some(&session(None)));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn plain_verification_accepts_only_one() {
        let marker = BoundaryMarker::plain();
        assert!(marker.verify("1"));
        assert!(!marker.verify("true"));
        assert!(!marker.verify(""));
    }

    #[test]
    fn reads_marker_among_other_cookies() {
        let headers = headers_with("theme=dark; lb_auth=1; other=x");
        assert_eq!(BoundaryMarker::read(&headers).as_deref(), Some("1"));
        assert!(BoundaryMarker::plain().is_present(&headers));
        assert!(!BoundaryMarker::plain().is_present(&headers_with("theme=dark")));
    }

    #[test]
    fn signed_marker_round_trips() {
        let marker = BoundaryMarker::signed(signer());
        let cookie = marker.issue(Some(&session(None)));
        assert!(cookie.value().starts_with("1."));
        assert!(marker.verify(cookie.value()));
        assert!(cookie.max_age().is_some());
    }

    #[test]
    fn signed_marker_rejects_plain_value() {
        assert!(!BoundaryMarker::signed(signer()).verify("1"));
    }

    #[test]
    fn tampered_expiry_fails_verification() {
        let signer = signer();
        let value = signer.sign(2_000_000_000);
        let tampered = value.replacen("2000000000", "2000000001", 1);
        assert!(signer.verify(&value, 1_000));
        assert!(!signer.verify(&tampered, 1_000));
    }

    #[test]
    fn expired_marker_fails_verification() {
        let signer = signer();
        let value = signer.sign(1_000);
        assert!(!signer.verify(&value, 1_000));
        assert!(signer.verify(&value, 999));
    }

    #[test]
    fn other_secret_fails_verification() {
        let value = signer().sign(2_000_000_000);
        let other = MarkerSigner::new(b"other-secret", Duration::from_secs(3600)).unwrap();
        assert!(!other.verify(&value, 1_000));
    }

    #[test]
    fn signed_expiry_is_capped_by_session() {
        let now = Utc::now().timestamp();
        let marker = BoundaryMarker::signed(signer());
        let cookie = marker.issue(Some(&session(Some(now + 60))));
        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!(max_age <= 60);
    }

    #[test]
    fn expiry_is_bounded_on_both_sides() {
        let signer = signer();
        assert_eq!(signer.expiry(1_000, None), 4_600);
        assert_eq!(signer.expiry(1_000, Some(2_000)), 2_000);
        assert_eq!(signer.expiry(1_000, Some(9_000)), 4_600);
        // Session already past its expiry on our clock.
        assert_eq!(signer.expiry(1_000, Some(500)), 1_001);
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        for secs in [i64::MAX as u64, u64::MAX] {
            let signer = MarkerSigner::new(b"test-secret", Duration::from_secs(secs)).unwrap();
            assert_eq!(signer.expiry(1_000, None), i64::MAX);

            let marker = BoundaryMarker::signed(signer);
            let cookie = marker.issue(Some(&session(None)));
            assert!(marker.verify(cookie.value()), "ttl {secs}");
            assert!(cookie.max_age().unwrap() > time::Duration::ZERO);
        }
    }

    #[test]
    fn skewed_session_still_gets_live_marker() {
        let now = Utc::now().timestamp();
        let store = MemoryMarkerStore::new();
        let cookie = BoundaryMarker::signed(signer()).issue(Some(&session(Some(now - 30))));

        assert!(!cookie.value().is_empty());
        assert!(cookie.max_age().unwrap() >= time::Duration::seconds(1));
        store.write(cookie);
        assert!(store.current().is_some());
    }

    #[test]
    fn memory_store_treats_removal_as_cleared() {
        let store = MemoryMarkerStore::new();
        let marker = BoundaryMarker::plain();
        assert!(store.current().is_none());

        store.write(marker.issue(Some(&session(None))));
        assert_eq!(store.cookie_header().as_deref(), Some("lb_auth=1"));

        store.write(marker.clear());
        assert!(store.current().is_none());
        assert!(store.cookie_header().is_none());
    }
}

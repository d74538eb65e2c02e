//! Visitor identity derived from a signed `sid` cookie.
//!
//! The cookie carries a signed token embedding only a random session id. The
//! stable, pseudonymous subject id used for analytics is a keyed hash of that
//! session id and is recomputed on every request; it is never stored on the
//! client and cannot be reversed to the session id without the server secret.

use std::time::{SystemTime, UNIX_EPOCH};

use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Session token validity window (365 days).
pub const SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const SESSION_ID_BYTES: usize = 16;

/// Claims embedded in the session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sid: String,
    pub iat: u64,
    pub exp: u64,
}

/// Outcome of resolving a request's identity.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub subject_id: String,
    /// A freshly minted session cookie, present only when the request had no
    /// valid one. Callers must attach it to the response.
    pub new_cookie: Option<Cookie<'static>>,
}

impl ResolvedIdentity {
    pub fn is_new_session(&self) -> bool {
        self.new_cookie.is_some()
    }
}

/// Signs and verifies session tokens and derives subject ids.
#[derive(Clone)]
pub struct IdentityResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    subject_mac: HmacSha256,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Creates a resolver keyed by `secret`, used both to sign session tokens
    /// and to derive subject ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SigningKey`] when `secret` is empty or rejected by the
    /// HMAC implementation.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::SigningKey("secret is empty".to_string()));
        }

        let subject_mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::SigningKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            subject_mac,
        })
    }

    /// Resolves the subject for a request carrying `token` (the raw `sid`
    /// cookie value, if any).
    ///
    /// A valid token is reused as is and no cookie is issued. A missing,
    /// malformed, expired or foreign-signed token is treated as absent and a
    /// new session is minted.
    pub fn resolve(&self, token: Option<&str>) -> Result<ResolvedIdentity> {
        if let Some(session_id) = token.and_then(|t| self.verify(t)) {
            return Ok(ResolvedIdentity {
                subject_id: self.subject_id(&session_id),
                new_cookie: None,
            });
        }

        let session_id = new_session_id();
        let token = self.sign(&session_id, unix_now())?;
        tracing::debug!("issued new session");

        Ok(ResolvedIdentity {
            subject_id: self.subject_id(&session_id),
            new_cookie: Some(session_cookie(token)),
        })
    }

    /// Keyed one-way hash of a session id, lowercase hex.
    pub fn subject_id(&self, session_id: &str) -> String {
        let mut mac = self.subject_mac.clone();
        mac.update(session_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Signs a token for `session_id` issued at `issued_at` (unix seconds).
    pub fn sign(&self, session_id: &str, issued_at: u64) -> Result<String> {
        let claims = SessionClaims {
            sid: session_id.to_string(),
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECS,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Returns the embedded session id when the token verifies and is unexpired.
    pub fn verify(&self, token: &str) -> Option<String> {
        match decode::<SessionClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) if !data.claims.sid.is_empty() => Some(data.claims.sid),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

/// Finds the `sid` value among the request's `Cookie` headers.
pub fn session_token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(cookie::time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            IdentityResolver::new(b""),
            Err(Error::SigningKey(_))
        ));
        assert!(IdentityResolver::new(SECRET).is_ok());
    }

    #[test]
    fn valid_token_is_reused_without_cookie() {
        let resolver = IdentityResolver::new(SECRET).unwrap();
        let token = resolver.sign("abc123", unix_now()).unwrap();

        let first = resolver.resolve(Some(&token)).unwrap();
        let second = resolver.resolve(Some(&token)).unwrap();

        assert!(!first.is_new_session());
        assert_eq!(first.subject_id, second.subject_id);
        assert_eq!(first.subject_id, resolver.subject_id("abc123"));
    }

    #[test]
    fn subject_id_is_hmac_sha256_hex() {
        let resolver = IdentityResolver::new(SECRET).unwrap();
        let mut mac = HmacSha256::new_from_slice(SECRET).unwrap();
        mac.update(b"abc123");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(resolver.subject_id("abc123"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn rotating_secret_changes_subject() {
        let a = IdentityResolver::new(b"one").unwrap();
        let b = IdentityResolver::new(b"two").unwrap();
        assert_ne!(a.subject_id("abc123"), b.subject_id("abc123"));
    }

    #[test]
    fn cold_requests_get_distinct_sessions() {
        let resolver = IdentityResolver::new(SECRET).unwrap();

        let a = resolver.resolve(None).unwrap();
        let b = resolver.resolve(None).unwrap();

        assert!(a.is_new_session());
        assert!(b.is_new_session());
        assert_ne!(a.subject_id, b.subject_id);
    }

    #[test]
    fn minted_cookie_round_trips() {
        let resolver = IdentityResolver::new(SECRET).unwrap();
        let minted = resolver.resolve(None).unwrap();
        let cookie = minted.new_cookie.clone().unwrap();

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(
            cookie.max_age(),
            Some(cookie::time::Duration::days(365))
        );

        let session_id = resolver.verify(cookie.value()).unwrap();
        assert_eq!(session_id.len(), 32);
        assert!(session_id.chars().all(|c| c.is_ascii_hexdigit()));

        let again = resolver.resolve(Some(cookie.value())).unwrap();
        assert!(!again.is_new_session());
        assert_eq!(again.subject_id, minted.subject_id);
    }

    #[test]
    fn tampered_token_is_treated_as_missing() {
        let resolver = IdentityResolver::new(SECRET).unwrap();
        let token = resolver.sign("abc123", unix_now()).unwrap();
        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{unsigned}.{flipped}{}", &signature[1..]);

        let resolved = resolver.resolve(Some(&tampered)).unwrap();
        assert!(resolved.is_new_session());
        assert_ne!(resolved.subject_id, resolver.subject_id("abc123"));

        let resolved = resolver.resolve(Some("not-a-token")).unwrap();
        assert!(resolved.is_new_session());
    }

    #[test]
    fn foreign_signature_is_treated_as_missing() {
        let other = IdentityResolver::new(b"someone-else").unwrap();
        let token = other.sign("abc123", unix_now()).unwrap();

        let resolver = IdentityResolver::new(SECRET).unwrap();
        assert!(resolver.verify(&token).is_none());
        assert!(resolver.resolve(Some(&token)).unwrap().is_new_session());
    }

    #[test]
    fn expired_token_is_treated_as_missing() {
        let resolver = IdentityResolver::new(SECRET).unwrap();
        let issued = unix_now() - SESSION_TTL_SECS - 3_600;
        let token = resolver.sign("abc123", issued).unwrap();

        assert!(resolver.verify(&token).is_none());
        assert!(resolver.resolve(Some(&token)).unwrap().is_new_session());
    }

    #[test]
    fn reads_sid_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; sid=tok.en.value"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("tok.en.value"));

        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("sid=second"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("second"));

        assert!(session_token_from_headers(&HeaderMap::new()).is_none());
    }
}

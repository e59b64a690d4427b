//! Bearer token verification (Section 4.1).
//!
//! Parses a signed token out of a raw `Cookie` header and verifies it with
//! a shared HMAC secret. Never panics across the boundary: every failure
//! mode collapses to [`TokenError`], which the caller maps onto
//! `CoreError::Unauthenticated`.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use relay_types::user::UserStatus;
use serde::{Deserialize, Serialize};

/// Default cookie name carrying the signed token.
pub const DEFAULT_COOKIE_NAME: &str = "x-access-token";

/// Why token verification failed. All variants collapse to `Unauthenticated`
/// at the caller; kept distinct here for logging.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("cookie header missing the `{0}` cookie")]
    CookieMissing(String),

    #[error("token signature invalid or malformed")]
    Malformed,

    #[error("token expired")]
    Expired,
}

/// The claims embedded in a verified token (Section 4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub hex: String,
    pub name: String,
    pub avatar: Option<String>,
    pub verified: bool,
    pub status: UserStatus,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Standard JWT expiry, seconds since epoch.
    pub exp: i64,
    /// Standard JWT issued-at, seconds since epoch.
    pub iat: i64,
}

impl From<&Claims> for relay_types::Principal {
    fn from(c: &Claims) -> Self {
        relay_types::Principal {
            hex: c.hex.clone(),
            name: c.name.clone(),
            avatar: c.avatar.clone(),
            verified: c.verified,
            status: c.status,
            public_key: c.public_key.clone(),
        }
    }
}

/// Verifies signed tokens against a shared secret (HMAC family).
pub struct TokenVerifier {
    secret: Vec<u8>,
    cookie_name: String,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        TokenVerifier {
            secret: secret.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            validation: Validation::new(jsonwebtoken::Algorithm::HS256),
        }
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Extracts the named cookie's value from a raw `Cookie` header, e.g.
    /// `"a=1; x-access-token=eyJ...; b=2"`.
    fn extract_cookie<'a>(&self, header: &'a str) -> Option<&'a str> {
        header.split(';').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let name = parts.next()?.trim();
            let value = parts.next()?.trim();
            (name == self.cookie_name).then_some(value)
        })
    }

    /// Authenticates a connection from its raw `Cookie` header, returning
    /// the embedded principal on success.
    pub fn authenticate(&self, cookie_header: Option<&str>) -> Result<relay_types::Principal, TokenError> {
        let header = cookie_header.ok_or_else(|| TokenError::CookieMissing(self.cookie_name.clone()))?;
        let token = self
            .extract_cookie(header)
            .ok_or_else(|| TokenError::CookieMissing(self.cookie_name.clone()))?;

        let key = DecodingKey::from_secret(&self.secret);
        let data = decode::<Claims>(token, &key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        Ok(relay_types::Principal::from(&data.claims))
    }

    /// Signs a cookie value for `principal`, valid for `ttl_secs` seconds
    /// from `now_secs` (Section 4.1). The caller (the HTTP surface, on
    /// `PUT /user/add`) is responsible for wrapping the result in a
    /// `Set-Cookie` header.
    pub fn issue(&self, principal: &relay_types::Principal, ttl_secs: i64, now_secs: i64) -> Result<String, TokenError> {
        let claims = Claims {
            hex: principal.hex.clone(),
            name: principal.name.clone(),
            avatar: principal.avatar.clone(),
            verified: principal.verified,
            status: principal.status,
            public_key: principal.public_key.clone(),
            exp: now_secs + ttl_secs,
            iat: now_secs,
        };
        let key = EncodingKey::from_secret(&self.secret);
        encode(&Header::new(jsonwebtoken::Algorithm::HS256), &claims, &key).map_err(|_| TokenError::Malformed)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], exp_offset: i64) -> String {
        let now = 1_700_000_000i64;
        let claims = Claims {
            hex: "u0hab65abc3".to_string(),
            name: "Alice".to_string(),
            avatar: None,
            verified: true,
            status: UserStatus::Active,
            public_key: "cHVi".to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::new(jsonwebtoken::Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .expect("sign")
    }

    #[test]
    fn authenticates_a_valid_cookie() {
        let secret = b"top-secret";
        let token = sign(secret, 3600);
        let verifier = TokenVerifier::new(secret.to_vec());
        let header = format!("other=1; x-access-token={token}; another=2");

        let principal = verifier.authenticate(Some(&header)).expect("authenticate");
        assert_eq!(principal.hex, "u0hab65abc3");
    }

    #[test]
    fn rejects_missing_cookie() {
        let verifier = TokenVerifier::new(b"top-secret".to_vec());
        let err = verifier.authenticate(Some("unrelated=1")).unwrap_err();
        assert!(matches!(err, TokenError::CookieMissing(_)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign(b"top-secret", 3600);
        let verifier = TokenVerifier::new(b"wrong-secret".to_vec());
        let header = format!("x-access-token={token}");
        let err = verifier.authenticate(Some(&header)).unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn rejects_expired_token() {
        let secret = b"top-secret";
        let token = sign(secret, -3600);
        let verifier = TokenVerifier::new(secret.to_vec());
        let header = format!("x-access-token={token}");
        let err = verifier.authenticate(Some(&header)).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn issue_then_authenticate_round_trips() {
        let secret = b"top-secret";
        let verifier = TokenVerifier::new(secret.to_vec());
        let principal = relay_types::Principal {
            hex: "u1".to_string(),
            name: "Alice".to_string(),
            avatar: None,
            verified: false,
            status: UserStatus::Active,
            public_key: "cHVi".to_string(),
        };

        let token = verifier.issue(&principal, 900, 1_700_000_000).expect("issue");
        let header = format!("x-access-token={token}");
        let got = verifier.authenticate(Some(&header)).expect("authenticate");
        assert_eq!(got.hex, "u1");
        assert_eq!(got.name, "Alice");
    }
}

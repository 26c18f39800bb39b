//! # Signed Tokens
//!
//! Issues and verifies compact HMAC-SHA256 signed tokens:
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(HMAC-SHA256(header.claims))
//! ```
//!
//! Claims are `{sub, role, typ, iat, exp, jti}`. The validator checks encoding,
//! signature and expiry only; whether the token is of the right `typ` is left
//! to the caller so the same issuer serves access and refresh tokens.

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shop_core::Role;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Minimum signing key length in bytes for HS256
pub const MIN_KEY_LEN: usize = 32;

const ALGORITHM: &str = "HS256";

/// Kind of token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, authorizes resource requests
    Access,
    /// Long-lived, only obtains new token pairs
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub role: Role,
    /// Token kind as written by the issuer
    pub typ: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration time (seconds since epoch)
    pub exp: i64,
    /// Unique token ID, so two tokens minted in the same second differ
    pub jti: Uuid,
}

impl Claims {
    /// Fail with `WrongType` unless this token is of `kind`
    pub fn require(&self, kind: TokenKind) -> AuthResult<()> {
        if self.typ == kind.as_str() {
            Ok(())
        } else {
            Err(AuthError::WrongType {
                expected: kind.as_str(),
                actual: self.typ.clone(),
            })
        }
    }
}

/// A freshly issued token with its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    /// Lifetime at issuance; the registry entry gets the same TTL
    pub ttl: Duration,
}

/// Derive the HMAC key from the configured secret.
///
/// The secret is base64-decoded when it is valid base64, otherwise its UTF-8
/// bytes are used. Keys shorter than [`MIN_KEY_LEN`] are stretched with
/// SHA-256, so a short secret still yields a full-length key.
pub fn derive_key(secret: &str) -> Vec<u8> {
    let bytes = match STANDARD.decode(secret) {
        Ok(decoded) if !decoded.is_empty() => decoded,
        _ => {
            debug!("Token secret is not base64; using raw bytes");
            secret.as_bytes().to_vec()
        }
    };

    if bytes.len() < MIN_KEY_LEN {
        warn!(
            len = bytes.len(),
            "Token secret shorter than {MIN_KEY_LEN} bytes; deriving key with SHA-256"
        );
        return Sha256::digest(&bytes).to_vec();
    }
    bytes
}

/// Token issuer and validator
#[derive(Clone)]
pub struct TokenIssuer {
    mac: HmacSha256,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer from configuration
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let key = derive_key(&config.secret);
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AuthError::Configuration(format!("invalid signing key: {e}")))?;
        Ok(Self {
            mac,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    /// Configured lifetime for a token kind
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Issue a token valid from now
    pub fn issue(&self, user_id: Uuid, role: Role, kind: TokenKind) -> AuthResult<IssuedToken> {
        self.issue_at(user_id, role, kind, Utc::now())
    }

    /// Issue a token as of `issued_at`
    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let ttl = self.ttl(kind);
        let iat = issued_at.timestamp();
        let claims = Claims {
            sub: user_id,
            role,
            typ: kind.as_str().to_string(),
            iat,
            exp: iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            jti: Uuid::new_v4(),
        };

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let header = URL_SAFE_NO_PAD.encode(to_json(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(to_json(&claims)?);
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&signing_input));

        debug!(user_id = %user_id, typ = %kind, exp = claims.exp, "Issued token");
        Ok(IssuedToken {
            token: format!("{signing_input}.{signature}"),
            claims,
            ttl,
        })
    }

    /// Validate encoding, signature and expiry as of now
    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        self.validate_at(token, Utc::now())
    }

    /// Validate encoding, signature and expiry as of `now`
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let mut parts = token.split('.');
        let (Some(header_seg), Some(payload_seg), Some(signature_seg), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed("expected three segments".into()));
        };

        let header: Header = from_segment(header_seg)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::Malformed(format!("unsupported alg {}", header.alg)));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_seg)
            .map_err(|e| AuthError::Malformed(format!("signature encoding: {e}")))?;

        // Constant-time comparison
        let mut mac = self.mac.clone();
        mac.update(header_seg.as_bytes());
        mac.update(b".");
        mac.update(payload_seg.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::SignatureInvalid)?;

        let claims: Claims = from_segment(payload_seg)?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, signing_input: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn to_json<T: Serialize>(value: &T) -> AuthResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| AuthError::Malformed(e.to_string()))
}

fn from_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::Malformed(format!("segment encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(format!("segment json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::new(
            secret,
            Duration::from_secs(900),
            Duration::from_secs(7 * 86_400),
        ))
        .unwrap()
    }

    #[test]
    fn test_issue_then_validate() {
        let issuer = issuer("a-reasonably-long-secret-for-testing-only");
        let user = Uuid::new_v4();

        let issued = issuer.issue(user, Role::Admin, TokenKind::Access).unwrap();
        let claims = issuer.validate(&issued.token).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.typ, "access");
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(issued.ttl, Duration::from_secs(900));
    }

    #[test]
    fn test_kinds_use_their_own_ttl() {
        let issuer = issuer("secret");
        let refresh = issuer
            .issue(Uuid::new_v4(), Role::User, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.claims.exp - refresh.claims.iat, 7 * 86_400);
        assert!(refresh.claims.require(TokenKind::Access).is_err());
        assert!(refresh.claims.require(TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_tokens_are_unique_within_a_second() {
        let issuer = issuer("secret");
        let user = Uuid::new_v4();
        let now = Utc::now();
        let a = issuer.issue_at(user, Role::User, TokenKind::Access, now).unwrap();
        let b = issuer.issue_at(user, Role::User, TokenKind::Access, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer("secret");
        let issued_at = Utc::now() - ChronoDuration::seconds(1000);
        let issued = issuer
            .issue_at(Uuid::new_v4(), Role::User, TokenKind::Access, issued_at)
            .unwrap();

        assert!(matches!(issuer.validate(&issued.token), Err(AuthError::Expired)));
        assert!(issuer
            .validate_at(&issued.token, issued_at + ChronoDuration::seconds(899))
            .is_ok());
        assert!(matches!(
            issuer.validate_at(&issued.token, issued_at + ChronoDuration::seconds(900)),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let issuer = issuer("secret");
        let issued = issuer
            .issue(Uuid::new_v4(), Role::User, TokenKind::Access)
            .unwrap();

        let mut forged = issued.claims.clone();
        forged.role = Role::Admin;
        let parts: Vec<&str> = issued.token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);

        assert!(matches!(
            issuer.validate(&tampered),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_other_key_fails_signature() {
        let issued = issuer("first-secret")
            .issue(Uuid::new_v4(), Role::User, TokenKind::Access)
            .unwrap();
        assert!(matches!(
            issuer("second-secret").validate(&issued.token),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer("secret");
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(issuer.validate(token), Err(AuthError::Malformed(_))),
                "{token:?}"
            );
        }
    }

    #[test]
    fn test_short_secret_is_stretched_deterministically() {
        let key = derive_key("short");
        assert_eq!(key.len(), MIN_KEY_LEN);
        assert_eq!(key, derive_key("short"));
        assert_ne!(key, derive_key("shorter"));

        // Tokens from two issuers with the same short secret interoperate
        let issued = issuer("short")
            .issue(Uuid::new_v4(), Role::User, TokenKind::Access)
            .unwrap();
        assert!(issuer("short").validate(&issued.token).is_ok());
    }

    #[test]
    fn test_base64_secret_is_decoded() {
        let raw = [7u8; 48];
        let encoded = STANDARD.encode(raw);
        assert_eq!(derive_key(&encoded), raw.to_vec());
    }
}

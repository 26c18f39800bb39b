//! # shop-auth
//!
//! Bearer-token authentication for the storefront.
//!
//! Tokens are HMAC-SHA256 signed, but a valid signature is not enough: every
//! issued token is recorded in a [`TokenRegistry`] and is accepted only while
//! its entry exists. Logout and refresh rotation revoke by deleting entries.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_auth::{AuthConfig, Authenticator, KvTokenRegistry, TokenIssuer};
//!
//! let issuer = TokenIssuer::new(&AuthConfig::from_env()?)?;
//! let registry = Arc::new(KvTokenRegistry::new(kv));
//! let auth = Authenticator::new(issuer, registry, Duration::from_secs(2));
//!
//! let principal = auth.authenticate(token).await?;
//! ```

pub mod authenticator;
pub mod config;
pub mod error;
pub mod password;
pub mod registry;
pub mod session;
pub mod token;

pub use authenticator::{bearer_token, Authenticator};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use password::{
    hash_password, reject_unknown_account, validate_email, validate_password, verify_password,
};
pub use registry::{registry_key, KvTokenRegistry, SharedRegistry, TokenRegistry};
pub use session::{SessionService, TokenPair};
pub use token::{derive_key, Claims, IssuedToken, TokenIssuer, TokenKind};

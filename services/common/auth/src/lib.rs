pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod jwks;
pub mod keys;
pub mod roles;
pub mod verifier;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;

pub use cache::{CachedKeySet, KeySetProvider, StaticKeySet};
pub use claims::VerifiedClaims;
pub use config::{JwtConfig, DEFAULT_JWKS_HTTP_TIMEOUT, DEFAULT_JWKS_TTL};
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, MaybeAuth};
pub use identity::Identity;
pub use jwks::{parse_jwks, JwksFetcher};
pub use keys::{KeySet, VerificationKey};
pub use roles::{DEFAULT_ROLES, ROLE_USER};
pub use verifier::{bearer_token, verify_token, JwtVerifier, JwtVerifierBuilder};

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;
use tracing::debug;

use crate::cache::{CachedKeySet, KeySetProvider, StaticKeySet};
use crate::claims::VerifiedClaims;
use crate::config::{JwtConfig, DEFAULT_JWKS_HTTP_TIMEOUT, DEFAULT_JWKS_TTL};
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::jwks::JwksFetcher;
use crate::keys::KeySet;

const BEARER_PREFIX: &str = "Bearer ";

/// Token carried by an `Authorization` header, if the header is eligible at all.
///
/// Only values starting with the exact prefix `"Bearer "` engage the
/// authenticator; anything else means "not attempting to authenticate".
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix(BEARER_PREFIX).map(str::trim)
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Verify `token` against `keys` and derive the caller identity.
///
/// Pure with respect to I/O: key resolution happens before this is called.
pub fn verify_token(token: &str, keys: &KeySet, config: &JwtConfig) -> AuthResult<Identity> {
    let header = decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
    if !is_asymmetric(header.alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
    let entry = keys
        .get(&kid)
        .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;
    if let Some(pinned) = entry.algorithm {
        if pinned != header.alg {
            return Err(AuthError::AlgorithmMismatch {
                kid,
                token: format!("{:?}", header.alg),
                key: format!("{pinned:?}"),
            });
        }
    }

    let mut validation = Validation::new(header.alg);
    validation.leeway = config.leeway_seconds.into();
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp"]);
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<Value>(token, &entry.key, &validation)?;
    let claims = VerifiedClaims::try_from(token_data.claims)?;
    let identity = Identity::from_claims(&claims);
    debug!(kid, subject = %identity.subject, "verified JWT successfully");
    Ok(identity)
}

/// Request-scoped authenticator: resolves keys through the injected provider,
/// then defers to [`verify_token`].
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    keys: Arc<dyn KeySetProvider>,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig, keys: Arc<dyn KeySetProvider>) -> Self {
        Self { config, keys }
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub async fn verify(&self, token: &str) -> AuthResult<Identity> {
        let keys = self.keys.key_set().await?;
        verify_token(token, &keys, &self.config)
    }

    /// `Ok(None)` when the header does not engage bearer authentication.
    pub async fn authenticate(&self, header: Option<&str>) -> AuthResult<Option<Identity>> {
        match bearer_token(header) {
            Some(token) => self.verify(token).await.map(Some),
            None => Ok(None),
        }
    }

    /// Load the key set ahead of the first request.
    pub async fn prewarm(&self) -> AuthResult<usize> {
        let keys = self.keys.key_set().await?;
        Ok(keys.len())
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    pinned: KeySet,
    jwks: Option<JwksFetcher>,
    jwks_url: Option<String>,
    ttl: Duration,
    http_timeout: Duration,
    provider: Option<Arc<dyn KeySetProvider>>,
}

impl JwtVerifierBuilder {
    fn new(config: JwtConfig) -> Self {
        Self {
            config,
            pinned: KeySet::new(),
            jwks: None,
            jwks_url: None,
            ttl: DEFAULT_JWKS_TTL,
            http_timeout: DEFAULT_JWKS_HTTP_TIMEOUT,
            provider: None,
        }
    }

    pub fn with_rsa_pem(mut self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.pinned.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn with_jwks_fetcher(mut self, fetcher: JwksFetcher) -> Self {
        self.jwks = Some(fetcher);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_key_set_provider(mut self, provider: Arc<dyn KeySetProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> AuthResult<JwtVerifier> {
        if let Some(provider) = self.provider {
            return Ok(JwtVerifier::new(self.config, provider));
        }

        let fetcher = match (self.jwks, self.jwks_url) {
            (Some(fetcher), _) => Some(fetcher),
            (None, Some(url)) => Some(JwksFetcher::with_timeout(url, self.http_timeout)?),
            (None, None) => None,
        };

        let provider: Arc<dyn KeySetProvider> = match fetcher {
            Some(fetcher) => Arc::new(
                CachedKeySet::new(fetcher)
                    .with_ttl(self.ttl)
                    .with_pinned(self.pinned),
            ),
            None if !self.pinned.is_empty() => Arc::new(StaticKeySet::new(self.pinned)),
            None => {
                return Err(AuthError::Configuration(
                    "no JWKS URL or static key configured".into(),
                ))
            }
        };

        Ok(JwtVerifier::new(self.config, provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::ROLE_USER;
    use crate::test_support::{primary_key, secondary_key, Claims};
    use httpmock::prelude::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const KID: &str = "test-key";

    fn key_set() -> KeySet {
        let mut keys = KeySet::new();
        keys.insert_rsa_pem(KID, primary_key().public_pem.as_bytes())
            .expect("pem");
        keys
    }

    fn config() -> JwtConfig {
        JwtConfig::new()
    }

    #[test]
    fn bearer_prefix_is_required_verbatim() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(Some("Bearer ")), Some(""));
        assert_eq!(bearer_token(Some("bearer abc")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(Some("Bearerabc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn accepts_valid_token_and_derives_identity() {
        let token = primary_key().sign(KID, &Claims::valid("u1").username("alice"));
        let identity = verify_token(&token, &key_set(), &config()).expect("valid");

        assert_eq!(identity.principal, "alice");
        assert_eq!(identity.subject, "u1");
        assert_eq!(identity.roles, vec![ROLE_USER.to_string()]);
    }

    #[test]
    fn rejects_token_signed_by_unrecognized_key() {
        let token = secondary_key().sign(KID, &Claims::valid("u1"));
        let err = verify_token(&token, &key_set(), &config()).expect_err("bad signature");
        assert!(matches!(err, AuthError::Verification(_)), "{err:?}");
    }

    #[test]
    fn rejects_unknown_and_missing_kid() {
        let token = primary_key().sign("rotated-away", &Claims::valid("u1"));
        let err = verify_token(&token, &key_set(), &config()).expect_err("unknown kid");
        assert!(matches!(err, AuthError::UnknownKeyId(kid) if kid == "rotated-away"));

        let header = Header::new(Algorithm::RS256);
        let token = encode(&header, &Claims::valid("u1"), &primary_key().encoding).expect("sign");
        let err = verify_token(&token, &key_set(), &config()).expect_err("missing kid");
        assert!(matches!(err, AuthError::MissingKeyId));
    }

    #[test]
    fn rejects_expired_token() {
        let token = primary_key().sign(KID, &Claims::valid("u1").expires_in(-3600));
        let err = verify_token(&token, &key_set(), &config()).expect_err("expired");
        assert!(matches!(err, AuthError::Expired), "{err:?}");
    }

    #[test]
    fn rejects_token_not_yet_valid() {
        let token = primary_key().sign(KID, &Claims::valid("u1").not_before_in(3600));
        let err = verify_token(&token, &key_set(), &config()).expect_err("nbf");
        assert!(matches!(err, AuthError::NotYetValid), "{err:?}");
    }

    #[test]
    fn rejects_token_without_subject() {
        let token = primary_key().sign(KID, &Claims::valid("").username("alice"));
        let err = verify_token(&token, &key_set(), &config()).expect_err("no sub");
        assert!(matches!(err, AuthError::MissingClaim("sub")), "{err:?}");
    }

    #[test]
    fn rejects_token_without_expiry() {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        let token = encode(&header, &json!({ "sub": "u1" }), &primary_key().encoding)
            .expect("sign");
        let err = verify_token(&token, &key_set(), &config()).expect_err("no exp");
        assert!(matches!(err, AuthError::MissingClaim("exp")), "{err:?}");
    }

    #[test]
    fn rejects_symmetric_algorithms() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.to_string());
        let token = encode(
            &header,
            &Claims::valid("u1"),
            &EncodingKey::from_secret(b"shared"),
        )
        .expect("sign");
        let err = verify_token(&token, &key_set(), &config()).expect_err("hs256");
        assert!(matches!(err, AuthError::UnsupportedAlgorithm(_)), "{err:?}");
    }

    #[test]
    fn rejects_garbage() {
        let err = verify_token("not-a-jwt", &key_set(), &config()).expect_err("garbage");
        assert!(matches!(err, AuthError::InvalidHeader(_)));
    }

    #[test]
    fn enforces_configured_issuer_and_audience() {
        let claims = Claims::valid("u1").issuer("https://idp.example").audience("authenticated");
        let token = primary_key().sign(KID, &claims);

        let ok = config()
            .with_issuer("https://idp.example")
            .with_audience("authenticated");
        assert!(verify_token(&token, &key_set(), &ok).is_ok());

        let wrong_iss = config().with_issuer("https://other.example");
        assert!(verify_token(&token, &key_set(), &wrong_iss).is_err());

        let wrong_aud = config().with_audience("service_role");
        assert!(verify_token(&token, &key_set(), &wrong_aud).is_err());
    }

    #[test]
    fn key_pinned_algorithm_must_match_token() {
        let mut keys = KeySet::new();
        let pem = primary_key().public_pem.as_bytes();
        keys.insert(
            KID,
            jsonwebtoken::DecodingKey::from_rsa_pem(pem).expect("pem"),
            Some(Algorithm::RS512),
        );
        let token = primary_key().sign(KID, &Claims::valid("u1"));
        let err = verify_token(&token, &keys, &config()).expect_err("alg mismatch");
        assert!(matches!(err, AuthError::AlgorithmMismatch { .. }));
    }

    #[tokio::test]
    async fn authenticate_passes_through_ineligible_headers() {
        let verifier = JwtVerifier::builder(config())
            .with_rsa_pem(KID, primary_key().public_pem.as_bytes())
            .expect("pem")
            .build()
            .expect("build");

        assert_eq!(verifier.authenticate(None).await.expect("none"), None);
        assert_eq!(
            verifier.authenticate(Some("Basic abc")).await.expect("basic"),
            None
        );
        assert!(verifier.authenticate(Some("Bearer ")).await.is_err());
    }

    #[tokio::test]
    async fn builder_uses_jwks_url() {
        let server = MockServer::start_async().await;
        let body = primary_key().jwks(KID).to_string();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/.well-known/jwks.json");
                then.status(200).body(body);
            })
            .await;

        let verifier = JwtVerifier::builder(config())
            .with_jwks_url(server.url("/.well-known/jwks.json"))
            .build()
            .expect("build");

        assert_eq!(verifier.prewarm().await.expect("prewarm"), 1);
        let token = primary_key().sign(KID, &Claims::valid("u1"));
        let header = format!("Bearer {token}");
        let identity = verifier
            .authenticate(Some(&header))
            .await
            .expect("verified")
            .expect("identity");
        assert_eq!(identity.principal, "u1");
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn unreachable_jwks_is_an_authentication_failure() {
        let verifier = JwtVerifier::builder(config())
            .with_jwks_url("http://127.0.0.1:9/jwks")
            .with_http_timeout(Duration::from_millis(500))
            .build()
            .expect("build");

        let token = primary_key().sign(KID, &Claims::valid("u1"));
        let err = verifier.verify(&token).await.expect_err("no jwks");
        assert!(err.is_upstream());
    }

    #[test]
    fn builder_without_key_source_is_misconfigured() {
        let err = JwtVerifier::builder(config()).build().err().expect("error");
        assert!(matches!(err, AuthError::Configuration(_)));
    }
}

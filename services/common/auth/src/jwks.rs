use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::keys::KeySet;

/// Downloads and parses the identity provider's published key set.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Fetcher whose requests give up after `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::Configuration(err.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<KeySet> {
        debug!(jwks_url = %self.url, "fetching JWKS");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;
        parse_jwks(&body)
    }
}

/// Turn a JWKS document into a [`KeySet`].
///
/// Individual keys that cannot be used for signature verification are
/// skipped; a document with no usable key at all is an error.
pub fn parse_jwks(body: &[u8]) -> AuthResult<KeySet> {
    let document: JwksResponse =
        serde_json::from_slice(body).map_err(|err| AuthError::JwksDecode(err.to_string()))?;

    let mut keys = KeySet::new();
    for entry in document.keys.into_iter() {
        if entry.key_use.as_deref() == Some("enc") {
            continue;
        }
        let Some(kid) = entry.kid.clone() else {
            warn!(kty = %entry.kty, "skipping JWK without kid");
            continue;
        };
        match entry.decoding_key() {
            Ok((key, algorithm)) => {
                debug!(kid = %kid, kty = %entry.kty, "loaded JWK");
                keys.insert(kid, key, algorithm);
            }
            Err(err) => {
                warn!(kid = %kid, kty = %entry.kty, error = %err, "skipping unusable JWK");
            }
        }
    }

    if keys.is_empty() {
        return Err(AuthError::JwksEmpty);
    }
    Ok(keys)
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kty: String,
    kid: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    // RSA
    n: Option<String>,
    e: Option<String>,
    // EC / OKP
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

impl JwkEntry {
    fn decoding_key(&self) -> Result<(DecodingKey, Option<Algorithm>), String> {
        let algorithm = match self.alg.as_deref() {
            Some(alg) => Some(
                Algorithm::from_str(alg).map_err(|_| format!("unsupported alg '{alg}'"))?,
            ),
            None => None,
        };

        let key = match self.kty.as_str() {
            "RSA" => {
                let (n, e) = self
                    .n
                    .as_deref()
                    .zip(self.e.as_deref())
                    .ok_or("missing RSA components")?;
                DecodingKey::from_rsa_components(n, e).map_err(|err| err.to_string())?
            }
            "EC" => {
                match self.crv.as_deref() {
                    Some("P-256") | Some("P-384") => {}
                    other => return Err(format!("unsupported curve {other:?}")),
                }
                let (x, y) = self
                    .x
                    .as_deref()
                    .zip(self.y.as_deref())
                    .ok_or("missing EC coordinates")?;
                DecodingKey::from_ec_components(x, y).map_err(|err| err.to_string())?
            }
            "OKP" => {
                if self.crv.as_deref() != Some("Ed25519") {
                    return Err(format!("unsupported curve {:?}", self.crv));
                }
                let x = self.x.as_deref().ok_or("missing OKP public key")?;
                DecodingKey::from_ed_components(x).map_err(|err| err.to_string())?
            }
            other => return Err(format!("unsupported key type '{other}'")),
        };

        Ok((key, algorithm))
    }
}

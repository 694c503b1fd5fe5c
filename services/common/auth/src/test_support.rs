//! Key material and token builders for tests in this crate and its dependents.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::Serialize;
use serde_json::{json, Value};

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub public_pem: String,
    pub modulus: String,
    pub exponent: String,
}

impl KeyMaterial {
    fn generate() -> Self {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

        KeyMaterial {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            public_pem,
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    /// RS256 token with `kid` in the header.
    pub fn sign<T: Serialize>(&self, kid: &str, claims: &T) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &self.encoding).expect("sign token")
    }

    /// Single-key JWKS document publishing this key under `kid`.
    pub fn jwks(&self, kid: &str) -> Value {
        json!({
            "keys": [
                {
                    "kid": kid,
                    "kty": "RSA",
                    "alg": "RS256",
                    "use": "sig",
                    "n": self.modulus,
                    "e": self.exponent
                }
            ]
        })
    }
}

static PRIMARY: Lazy<KeyMaterial> = Lazy::new(KeyMaterial::generate);
static SECONDARY: Lazy<KeyMaterial> = Lazy::new(KeyMaterial::generate);

/// The key the identity provider publishes.
pub fn primary_key() -> &'static KeyMaterial {
    &PRIMARY
}

/// A key nobody published; tokens signed with it must be refused.
pub fn secondary_key() -> &'static KeyMaterial {
    &SECONDARY
}

/// Claim set shaped like a Supabase access token.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    user_metadata: Value,
}

impl Claims {
    /// Expires ten minutes from now.
    pub fn valid(sub: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            exp: now + 600,
            iat: now,
            nbf: None,
            iss: None,
            aud: None,
            email: None,
            user_metadata: json!({}),
        }
    }

    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = chrono::Utc::now().timestamp() + seconds;
        self
    }

    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some(chrono::Utc::now().timestamp() + seconds);
        self
    }

    pub fn issuer(mut self, iss: &str) -> Self {
        self.iss = Some(iss.to_string());
        self
    }

    pub fn audience(mut self, aud: &str) -> Self {
        self.aud = Some(aud.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.user_metadata["username"] = json!(username);
        self
    }

    pub fn full_name(mut self, full_name: &str) -> Self {
        self.user_metadata["full_name"] = json!(full_name);
        self
    }
}

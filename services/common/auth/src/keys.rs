use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::error::{AuthError, AuthResult};

/// Public key material for one `kid`.
#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    /// Algorithm pinned by the JWK (`alg`), if it declared one.
    pub algorithm: Option<Algorithm>,
}

/// Immutable snapshot of the issuer's signing keys, indexed by key id.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        kid: impl Into<String>,
        key: DecodingKey,
        algorithm: Option<Algorithm>,
    ) {
        self.keys
            .insert(kid.into(), VerificationKey { key, algorithm });
    }

    pub fn insert_rsa_pem(&mut self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.insert(kid, key, None);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Copy every entry of `other` into this set; `other` wins on kid collisions.
    pub fn merge(&mut self, other: &KeySet) {
        for (kid, key) in other.keys.iter() {
            self.keys.insert(kid.clone(), key.clone());
        }
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.kids().collect();
        kids.sort_unstable();
        f.debug_struct("KeySet").field("kids", &kids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_merge() {
        let mut set = KeySet::new();
        assert!(set.is_empty());
        set.insert("a", DecodingKey::from_secret(b"one"), None);
        assert!(set.contains("a"));

        let mut other = KeySet::new();
        other.insert("b", DecodingKey::from_secret(b"two"), Some(Algorithm::RS256));
        set.merge(&other);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("b").and_then(|k| k.algorithm), Some(Algorithm::RS256));
        assert_eq!(format!("{set:?}"), r#"KeySet { kids: ["a", "b"] }"#);
    }

    #[test]
    fn rejects_garbage_pem() {
        let mut set = KeySet::new();
        let err = set
            .insert_rsa_pem("dev", b"not a pem")
            .expect_err("garbage must not parse");
        assert!(matches!(err, AuthError::KeyParse(kid, _) if kid == "dev"));
    }
}

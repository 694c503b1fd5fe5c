use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use common_auth::{JwtConfig, DEFAULT_JWKS_HTTP_TIMEOUT, DEFAULT_JWKS_TTL};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LEEWAY_SECONDS: u32 = 30;
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:8000",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub store: StoreConfig,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub jwks_http_timeout: Duration,
    pub jwt: JwtConfig,
    pub cors_allowed_origins: Vec<String>,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| env::var(key).ok())
}

impl ServiceConfig {
    /// Build from any key/value source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Failed to parse HOST '{host}'"))?;
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        let store = match get("MAP_STORE").as_deref() {
            Some("memory") => StoreConfig::Memory,
            None | Some("postgres") => StoreConfig::Postgres {
                database_url: get("DATABASE_URL")
                    .context("DATABASE_URL must be set unless MAP_STORE=memory")?,
            },
            Some(other) => return Err(anyhow!("Unknown MAP_STORE '{other}' (expected postgres or memory)")),
        };

        let jwks_url = get("JWKS_URL").context("JWKS_URL must be set")?;
        let jwks_cache_ttl = parse_or(
            "JWKS_CACHE_TTL_SECONDS",
            get("JWKS_CACHE_TTL_SECONDS"),
            DEFAULT_JWKS_TTL.as_secs(),
        )
        .map(Duration::from_secs)?;
        let jwks_http_timeout = parse_or(
            "JWKS_HTTP_TIMEOUT_SECONDS",
            get("JWKS_HTTP_TIMEOUT_SECONDS"),
            DEFAULT_JWKS_HTTP_TIMEOUT.as_secs(),
        )
        .map(Duration::from_secs)?;

        let mut jwt = JwtConfig::new().with_leeway(parse_or(
            "JWT_LEEWAY_SECONDS",
            get("JWT_LEEWAY_SECONDS"),
            DEFAULT_LEEWAY_SECONDS,
        )?);
        if let Some(issuer) = get("JWT_ISSUER") {
            jwt = jwt.with_issuer(issuer);
        }
        if let Some(audience) = get("JWT_AUDIENCE") {
            jwt = jwt.with_audience(audience);
        }

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());

        Ok(ServiceConfig {
            addr: SocketAddr::from((ip, port)),
            store,
            jwks_url,
            jwks_cache_ttl,
            jwks_http_timeout,
            jwt,
            cors_allowed_origins,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Failed to parse {key} '{raw}'")),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/maps"),
            ("JWKS_URL", "https://idp.example.com/.well-known/jwks.json"),
        ])
        .expect("config");

        assert_eq!(cfg.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(
            cfg.store,
            StoreConfig::Postgres { database_url: "postgres://localhost/maps".into() }
        );
        assert_eq!(cfg.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(cfg.jwks_http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.jwt.leeway_seconds, 30);
        assert!(cfg.jwt.issuer.is_none() && cfg.jwt.audience.is_none());
        assert_eq!(cfg.cors_allowed_origins.len(), DEFAULT_CORS_ORIGINS.len());
    }

    #[test]
    fn memory_store_needs_no_database() {
        let cfg = config(&[
            ("MAP_STORE", "memory"),
            ("JWKS_URL", "http://localhost/jwks"),
            ("PORT", "9000"),
            ("JWT_ISSUER", "https://idp"),
            ("JWT_AUDIENCE", " authenticated "),
            ("CORS_ALLOWED_ORIGINS", "https://maps.example.com, ,http://localhost:3000"),
        ])
        .expect("config");

        assert_eq!(cfg.store, StoreConfig::Memory);
        assert_eq!(cfg.addr.port(), 9000);
        assert_eq!(cfg.jwt.issuer.as_deref(), Some("https://idp"));
        assert_eq!(cfg.jwt.audience.as_deref(), Some("authenticated"));
        assert_eq!(
            cfg.cors_allowed_origins,
            ["https://maps.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn missing_or_malformed_values_are_errors() {
        let err = config(&[("DATABASE_URL", "postgres://x")]).expect_err("jwks required");
        assert!(err.to_string().contains("JWKS_URL"));

        let err = config(&[("JWKS_URL", "http://x")]).expect_err("db required");
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = config(&[("MAP_STORE", "memory"), ("JWKS_URL", "http://x"), ("PORT", "eighty")])
            .expect_err("bad port");
        assert!(err.to_string().contains("PORT"));

        let err = config(&[("MAP_STORE", "redis"), ("JWKS_URL", "http://x")])
            .expect_err("bad store");
        assert!(err.to_string().contains("MAP_STORE"));
    }
}

//! API configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use warden_core::auth::jwt::{default_secret_path, persisted_secret, secret_from_env};
use warden_core::auth::{
    AuthSettings, DEFAULT_GEO_TIMEOUT, DEFAULT_MAX_TOKENS_PER_USER, DEFAULT_TOKEN_ISSUER,
    DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Every process sharing a ledger must sign with the same secret, so
    /// production never falls back to a per-host generated one.
    #[error("JWT_SECRET (or AUTH_SECRET) must be set when APP_ENV=production")]
    MissingSecret,

    #[error("signing secret file: {0}")]
    SecretFile(#[from] std::io::Error),
}

/// Deployment mode. Production hides server-error detail from responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(AppEnv::Production),
            "development" | "dev" | "" => Ok(AppEnv::Development),
            other => Err(format!("unknown APP_ENV: {other}")),
        }
    }
}

/// Configuration for the API layer.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub app_env: AppEnv,
    /// Token and ledger settings handed to `warden_core`.
    pub auth: AuthSettings,
    /// AMap web-service key. Geolocation is skipped without one.
    pub amap_key: Option<String>,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only safe behind a reverse proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable              | Default                              |
    /// |-----------------------|--------------------------------------|
    /// | `JWT_SECRET` / `AUTH_SECRET` | required in production; else generated & persisted to file |
    /// | `TOKEN_TTL_SECS`      | `604800` (7 days), at most 1 year    |
    /// | `TOKEN_ISSUER`        | `warden.auth`                        |
    /// | `MAX_TOKENS_PER_USER` | `5` (minimum 1)                      |
    /// | `APP_ENV`             | `development`                        |
    /// | `AMAP_KEY`            | unset                                |
    /// | `GEO_TIMEOUT_MS`      | `1500`                               |
    /// | `TRUST_PROXY_HEADERS` | `false`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = std::env::var("APP_ENV")
            .ok()
            .and_then(|v| {
                v.parse()
                    .inspect_err(|e| tracing::warn!("{e}, using development"))
                    .ok()
            })
            .unwrap_or_default();

        let auth = AuthSettings {
            jwt_secret: signing_secret(app_env, secret_from_env(), &default_secret_path())?,
            token_ttl: token_ttl(env_parse("TOKEN_TTL_SECS")),
            issuer: std::env::var("TOKEN_ISSUER")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_ISSUER.into()),
            max_tokens_per_user: env_parse::<usize>("MAX_TOKENS_PER_USER")
                .unwrap_or(DEFAULT_MAX_TOKENS_PER_USER)
                .max(1),
            geo_timeout: env_parse("GEO_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GEO_TIMEOUT),
        };

        Ok(Self {
            app_env,
            auth,
            amap_key: std::env::var("AMAP_KEY").ok().filter(|v| !v.is_empty()),
            trust_proxy_headers: env_parse("TRUST_PROXY_HEADERS").unwrap_or(false),
        })
    }

    /// Development config with the given secret and default auth settings.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            app_env: AppEnv::Development,
            auth: AuthSettings::with_secret(jwt_secret),
            amap_key: None,
            trust_proxy_headers: false,
        }
    }
}

fn signing_secret(
    app_env: AppEnv,
    from_env: Option<String>,
    secret_path: &Path,
) -> Result<String, ConfigError> {
    match from_env {
        Some(secret) => Ok(secret),
        None if app_env.is_production() => Err(ConfigError::MissingSecret),
        None => Ok(persisted_secret(secret_path)?),
    }
}

fn token_ttl(secs: Option<u64>) -> Duration {
    match secs {
        None => DEFAULT_TOKEN_TTL,
        Some(secs) if (1..=MAX_TOKEN_TTL.as_secs()).contains(&secs) => Duration::from_secs(secs),
        Some(secs) => {
            tracing::warn!(
                secs,
                max = MAX_TOKEN_TTL.as_secs(),
                "TOKEN_TTL_SECS out of range, using default"
            );
            DEFAULT_TOKEN_TTL
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

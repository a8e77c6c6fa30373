use std::{fmt, str::FromStr};

use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;
use time::Duration;

use crate::{auth::TokenService, db::DEFAULT_BCRYPT_COST};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://lobbychat.db";
pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 15000;

/// Lifetimes above this get a warning at startup.
const LONG_TOKEN_LIFETIME: Duration = Duration::hours(24 * 30);

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub token_lifetime: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() {
            bail!("JWT_SECRET must be set");
        }

        let jwt_algorithm = match lookup("JWT_ALGORITHM") {
            Some(name) => Algorithm::from_str(&name).with_context(|| format!("JWT_ALGORITHM={name}"))?,
            None => Algorithm::HS512,
        };
        if !matches!(jwt_algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            bail!("JWT_ALGORITHM must be one of HS256, HS384, HS512");
        }

        let hours: i64 = parse_or(&lookup, "TOKEN_LIFETIME_HOURS", DEFAULT_TOKEN_LIFETIME_HOURS)?;
        if hours <= 0 {
            bail!("TOKEN_LIFETIME_HOURS must be positive");
        }

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            jwt_secret,
            jwt_algorithm,
            token_lifetime: Duration::hours(hours),
            bcrypt_cost,
        })
    }

    pub fn token_service(&self) -> anyhow::Result<TokenService> {
        if self.token_lifetime > LONG_TOKEN_LIFETIME {
            tracing::warn!(
                hours = self.token_lifetime.whole_hours(),
                "session tokens are long lived and cannot be revoked before expiry"
            );
        }
        TokenService::new(&self.jwt_secret, self.jwt_algorithm, self.token_lifetime)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value.trim().parse().with_context(|| format!("{key}={value}")),
        None => Ok(default),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("token_lifetime", &self.token_lifetime)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

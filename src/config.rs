//! Process configuration, read once from the environment at startup.
//!
//! Components never read environment variables themselves; they receive the
//! pieces of [`Config`] they need through their constructors.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONTACT_RECIPIENT: &str = "contact@rahulsingh.ai";
const DEFAULT_MAIL_FROM: &str = "Portfolio <noreply@rahulsingh.ai>";
const DEFAULT_ALLOWED_ORIGINS: &str = "https://rahulsingh.ai,https://www.rahulsingh.ai";
const DEFAULT_PREVIEW_SUFFIX: &str = ".vercel.app";
const DEFAULT_TRUSTED_IP_HEADER: &str = "x-vercel-forwarded-for";
const DEFAULT_GEO_BASE_URL: &str = "http://ip-api.com";
const DEFAULT_GEO_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the backend needs to run.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: SecretString,
    /// Email provider credential. Without one, mail is logged instead of sent.
    pub resend_api_key: Option<SecretString>,
    pub contact_recipient: String,
    pub mail_from: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub preview_origin_suffix: String,
    pub trusted_ip_header: String,
    pub geo_api_base_url: String,
    pub geo_timeout: Duration,
    pub db_max_connections: u32,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let secret_key = get("SECRET_KEY")
            .map(SecretString::new)
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            database_url,
            secret_key,
            resend_api_key: get("RESEND_API_KEY").map(SecretString::new),
            contact_recipient: get("CONTACT_RECIPIENT")
                .unwrap_or_else(|| DEFAULT_CONTACT_RECIPIENT.to_string()),
            mail_from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            allowed_origins,
            preview_origin_suffix: get("PREVIEW_ORIGIN_SUFFIX")
                .unwrap_or_else(|| DEFAULT_PREVIEW_SUFFIX.to_string()),
            trusted_ip_header: get("TRUSTED_IP_HEADER")
                .unwrap_or_else(|| DEFAULT_TRUSTED_IP_HEADER.to_string())
                .to_ascii_lowercase(),
            geo_api_base_url: get("GEO_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEO_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            geo_timeout: Duration::from_millis(parse_or(
                "GEO_TIMEOUT_MS",
                get("GEO_TIMEOUT_MS"),
                DEFAULT_GEO_TIMEOUT_MS,
            )?),
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                get("DB_MAX_CONNECTIONS"),
                DEFAULT_DB_MAX_CONNECTIONS,
            )?,
        })
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret_key.expose_secret().as_bytes()
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

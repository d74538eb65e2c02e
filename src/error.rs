//! Crate-wide error type.

use crate::config::ConfigError;
use crate::mailer::MailError;

/// Errors surfaced by the backend's fallible operations.
///
/// Enrichment steps (user-agent parsing, geo lookup, token verification) never
/// produce one of these; they degrade to `"Unknown"` values or a fresh session
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("invalid signing key: {0}")]
    SigningKey(String),

    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! # Portfolio backend
//!
//! Anonymized page-view analytics and a contact-form relay for a personal
//! portfolio site, built on axum and Sea-ORM.
//!
//! ## Endpoints
//!
//! | Method | Path           | Purpose                                        |
//! |--------|----------------|------------------------------------------------|
//! | GET    | `/`            | Health probe, answers `ok`                     |
//! | POST   | `/api/views`   | Record one page view, issuing a `sid` cookie   |
//! | GET    | `/api/views`   | Total recorded views                           |
//! | POST   | `/api/contact` | Relay a contact form submission by email       |
//!
//! ## Identity
//!
//! Visitors are identified by a signed `sid` cookie holding only a random
//! session id. Stored rows carry a keyed hash of that id, so the same visitor
//! groups together without any personal data being kept. Rotating the secret
//! orphans every previously issued identifier.
//!
//! ## Wiring
//!
//! ```no_run
//! use portfolio_backend::config::Config;
//! use portfolio_backend::cors::OriginPolicy;
//! use portfolio_backend::routes::{router, AppState};
//! use sea_orm::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let conn = Database::connect(config.database_url.as_str()).await?;
//!
//! let state = AppState::from_config(&config, conn)?;
//! let origins = OriginPolicy::new(config.allowed_origins.clone(), ".vercel.app");
//! let app = router(state, origins);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod contact;
pub mod cors;
pub mod entity;
pub mod error;
pub mod geo;
pub mod identity;
pub mod mailer;
#[cfg(feature = "migration")]
pub mod migration;
pub mod recorder;
pub mod routes;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};

//! Database entity models.
//!
//! The backend owns a single table, `portfolio_views`, described by the
//! [`portfolio_view`] entity.

/// Page view entity model for Sea-ORM database interaction.
pub mod portfolio_view;

//! Page view entity model for Sea-ORM database interaction.
//!
//! One row per recorded view in the `portfolio_views` table. Rows are
//! append-only: the backend inserts them and never updates or deletes them.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing a single recorded page view.
///
/// # Database Schema
///
/// | Column          | Type               | Description                                   |
/// |-----------------|--------------------|-----------------------------------------------|
/// | view_id         | UUID (Primary Key) | Random per-event identifier                   |
/// | subject_id      | TEXT               | Keyed hash of the visitor's session id        |
/// | os_family       | TEXT               | Parsed from the user agent                    |
/// | browser_name    | TEXT               | Parsed from the user agent                    |
/// | timezone        | TEXT               | Client-supplied, free text                    |
/// | ip_country      | TEXT               | Geo enrichment                                |
/// | ip_region       | TEXT               | Geo enrichment                                |
/// | ip_city         | TEXT               | Geo enrichment                                |
/// | ip_isp          | TEXT               | Geo enrichment                                |
/// | ip_network_type | TEXT               | Broadband, Mobile, Hosting/Data Center, ...   |
/// | created_at      | TIMESTAMPTZ        | Insert time                                   |
///
/// Enrichment columns are never null; a failed lookup stores `"Unknown"`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "portfolio_views")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub view_id: Uuid,

    /// Opaque grouping key. Not a foreign key.
    #[sea_orm(column_type = "Text", indexed)]
    pub subject_id: String,

    #[sea_orm(column_type = "Text")]
    pub os_family: String,

    #[sea_orm(column_type = "Text")]
    pub browser_name: String,

    #[sea_orm(column_type = "Text")]
    pub timezone: String,

    #[sea_orm(column_type = "Text")]
    pub ip_country: String,

    #[sea_orm(column_type = "Text")]
    pub ip_region: String,

    #[sea_orm(column_type = "Text")]
    pub ip_city: String,

    #[sea_orm(column_type = "Text")]
    pub ip_isp: String,

    #[sea_orm(column_type = "Text")]
    pub ip_network_type: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

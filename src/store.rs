use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

use crate::entity::portfolio_view::{ActiveModel as ViewActiveModel, Entity as ViewEntity};
use crate::error::Result;

/// A fully enriched page view, ready to be persisted.
///
/// Every field is populated; enrichment that found nothing carries the
/// literal `"Unknown"`. The insert time is added by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewView {
    /// Fresh random identifier, unique per event.
    pub view_id: Uuid,
    /// Keyed hash of the visitor's session id.
    pub subject_id: String,
    pub os_family: String,
    pub browser_name: String,
    /// Client-reported timezone, free text.
    pub timezone: String,
    pub ip_country: String,
    pub ip_region: String,
    pub ip_city: String,
    pub ip_isp: String,
    /// Display form of [`crate::geo::NetworkType`].
    pub ip_network_type: String,
}

/// Append-only storage for view records.
#[async_trait]
pub trait ViewStore: Debug + Send + Sync {
    /// Persists one record with a single insert statement.
    async fn insert(&self, view: NewView) -> Result<()>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64>;
}

/// A [`ViewStore`] on top of a Sea-ORM connection pool.
///
/// # Error Handling
///
/// Sea-ORM errors are returned as [`crate::Error::Database`]. Nothing is
/// retried here; a failed insert leaves no row behind.
#[derive(Debug, Clone)]
pub struct SeaOrmViewStore {
    /// The Sea-ORM database connection used for database operations.
    conn: DatabaseConnection,
}

impl SeaOrmViewStore {
    /// Creates a store over an already connected (and migrated) pool.
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ViewStore for SeaOrmViewStore {
    /// Inserts the record stamped with the current UTC time.
    ///
    /// Uses a plain `INSERT` without `RETURNING` or a follow-up select, so the
    /// row either lands whole or not at all.
    async fn insert(&self, view: NewView) -> Result<()> {
        let created_at: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = ViewActiveModel {
            view_id: Set(view.view_id),
            subject_id: Set(view.subject_id),
            os_family: Set(view.os_family),
            browser_name: Set(view.browser_name),
            timezone: Set(view.timezone),
            ip_country: Set(view.ip_country),
            ip_region: Set(view.ip_region),
            ip_city: Set(view.ip_city),
            ip_isp: Set(view.ip_isp),
            ip_network_type: Set(view.ip_network_type),
            created_at: Set(created_at),
        };

        ViewEntity::insert(model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(ViewEntity::find().count(&self.conn).await?)
    }
}

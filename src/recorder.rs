//! Page view recording: identity, client metadata and geo enrichment
//! followed by a single insert.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use cookie::Cookie;
use uuid::Uuid;

use crate::client::{ClientExtractor, UNKNOWN};
use crate::error::Result;
use crate::geo::GeoLookup;
use crate::identity::{session_token_from_headers, IdentityResolver};
use crate::store::{NewView, ViewStore};

/// What the recorder needs from an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub headers: &'a HeaderMap,
    pub peer: Option<SocketAddr>,
    /// Client-reported timezone. Absent or blank becomes `"Unknown"`.
    pub timezone: Option<&'a str>,
}

/// Result of a record attempt.
///
/// The session cookie is reported separately from the insert outcome so a
/// freshly minted session reaches the client even when persistence fails.
#[derive(Debug)]
pub struct RecordOutcome {
    /// Set when the request carried no valid session; must become a
    /// `Set-Cookie` header whatever `result` holds.
    pub new_cookie: Option<Cookie<'static>>,
    pub result: Result<RecordedView>,
}

/// A view that was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedView {
    pub view_id: Uuid,
    pub subject_id: String,
}

/// Turns inbound requests into stored view records.
///
/// Only identity resolution and the insert itself can fail. Client metadata
/// and geo enrichment fall back to `"Unknown"` values.
#[derive(Clone)]
pub struct ViewRecorder {
    identity: IdentityResolver,
    client: ClientExtractor,
    geo: Arc<dyn GeoLookup>,
    store: Arc<dyn ViewStore>,
}

impl std::fmt::Debug for ViewRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRecorder")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ViewRecorder {
    pub fn new(
        identity: IdentityResolver,
        client: ClientExtractor,
        geo: Arc<dyn GeoLookup>,
        store: Arc<dyn ViewStore>,
    ) -> Self {
        Self {
            identity,
            client,
            geo,
            store,
        }
    }

    /// Resolves the visitor, enriches the request and inserts one record.
    ///
    /// Never retries. A failed insert is reported in
    /// [`RecordOutcome::result`] while any newly minted session cookie is
    /// still returned.
    pub async fn record(&self, ctx: ViewContext<'_>) -> RecordOutcome {
        let token = session_token_from_headers(ctx.headers);
        let identity = match self.identity.resolve(token.as_deref()) {
            Ok(identity) => identity,
            Err(e) => {
                return RecordOutcome {
                    new_cookie: None,
                    result: Err(e),
                }
            }
        };

        let client = self.client.extract(ctx.headers, ctx.peer);
        let geo = self.geo.lookup(Some(&client.ip)).await;

        let view = NewView {
            view_id: Uuid::new_v4(),
            subject_id: identity.subject_id.clone(),
            os_family: client.metadata.os_family,
            browser_name: client.metadata.browser_name,
            timezone: normalize_timezone(ctx.timezone),
            ip_country: geo.country,
            ip_region: geo.region,
            ip_city: geo.city,
            ip_isp: geo.isp,
            ip_network_type: geo.network.to_string(),
        };
        let view_id = view.view_id;

        tracing::debug!(%view_id, subject_id = %view.subject_id, "inserting view");

        let result = self.store.insert(view).await.map(|()| RecordedView {
            view_id,
            subject_id: identity.subject_id,
        });

        RecordOutcome {
            new_cookie: identity.new_cookie,
            result,
        }
    }

    /// Total views stored so far.
    pub async fn count(&self) -> Result<u64> {
        self.store.count().await
    }
}

fn normalize_timezone(timezone: Option<&str>) -> String {
    timezone
        .map(str::trim)
        .filter(|tz| !tz.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

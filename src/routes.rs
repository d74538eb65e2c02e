//! HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::client::{ClientExtractor, IpResolver};
use crate::config::Config;
use crate::contact::{ContactError, ContactForm, ContactRelay};
use crate::cors::{reject_disallowed_origin, OriginPolicy};
use crate::error::Result;
use crate::geo::IpApiClient;
use crate::identity::IdentityResolver;
use crate::mailer::{LogMailer, Mailer, ResendMailer};
use crate::recorder::{ViewContext, ViewRecorder};
use crate::store::SeaOrmViewStore;

const CONTACT_SUCCESS: &str = "Your message has been sent successfully.";
const CONTACT_FAILURE: &str =
    "Failed to send message. Please try again later or reach out via LinkedIn.";

/// Shared, read-only handles for every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backs `POST /api/views` and `GET /api/views`.
    pub recorder: Arc<ViewRecorder>,
    /// Backs `POST /api/contact`.
    pub contact: Arc<ContactRelay>,
}

impl AppState {
    /// Wires the production components from `config` and a database pool.
    pub fn from_config(config: &Config, conn: DatabaseConnection) -> Result<Self> {
        let identity = IdentityResolver::new(config.secret_bytes())?;
        let client = ClientExtractor::new(IpResolver::new(&config.trusted_ip_header));
        let geo = IpApiClient::new(&config.geo_api_base_url, config.geo_timeout)?;
        let store = SeaOrmViewStore::new(conn);

        let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
            Some(key) => Arc::new(ResendMailer::new(key.clone())?),
            None => {
                tracing::warn!("RESEND_API_KEY not set; contact emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self {
            recorder: Arc::new(ViewRecorder::new(
                identity,
                client,
                Arc::new(geo),
                Arc::new(store),
            )),
            contact: Arc::new(ContactRelay::new(
                mailer,
                &config.contact_recipient,
                &config.mail_from,
            )?),
        })
    }
}

/// Builds the application router.
///
/// The origin check runs before any handler: a disallowed `Origin` gets a
/// 403 and never reaches the recorder or the relay. Preflights are answered
/// by the CORS layer.
pub fn router(state: AppState, origins: OriginPolicy) -> Router {
    let origins = Arc::new(origins);

    Router::new()
        .route("/", get(health))
        .route("/api/views", post(record_view).get(count_views))
        .route("/api/contact", post(submit_contact))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&origins),
            reject_disallowed_origin,
        ))
        .layer(origins.layer())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

/// Request headers plus the peer address, when the server exposes it.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            headers: parts.headers.clone(),
            peer: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViewBody {
    timezone: Option<String>,
}

#[derive(Debug, Serialize)]
struct ViewsResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    view_count: Option<u64>,
}

impl ViewsResponse {
    fn ok() -> Self {
        Self {
            success: true,
            view_count: None,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            view_count: None,
        }
    }
}

/// Records one page view. The JSON body `{ "timezone": ... }` is optional.
async fn record_view(State(state): State<AppState>, meta: RequestMeta, body: Bytes) -> Response {
    // Analytics beacons may arrive without a JSON content type or body.
    let body: ViewBody = serde_json::from_slice(&body).unwrap_or_default();

    let outcome = state
        .recorder
        .record(ViewContext {
            headers: &meta.headers,
            peer: meta.peer,
            timezone: body.timezone.as_deref(),
        })
        .await;

    let mut response = match outcome.result {
        Ok(view) => {
            tracing::debug!(view_id = %view.view_id, "view recorded");
            (StatusCode::OK, Json(ViewsResponse::ok())).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, operation = "record_view", "view tracking failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ViewsResponse::failed())).into_response()
        }
    };

    if let Some(cookie) = outcome.new_cookie {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
        }
    }

    response
}

async fn count_views(State(state): State<AppState>) -> Response {
    match state.recorder.count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(ViewsResponse {
                success: true,
                view_count: Some(count),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, operation = "count_views", "view count failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ViewsResponse::failed())).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct ContactResponse {
    status: &'static str,
    message: String,
}

impl ContactResponse {
    fn new(status: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Relays a contact submission: 400 for missing fields, 500 when the owner
/// notification cannot be delivered.
async fn submit_contact(State(state): State<AppState>, body: Bytes) -> Response {
    // A body that is not a JSON object counts as an empty submission.
    let form: ContactForm = serde_json::from_slice(&body).unwrap_or_default();

    match state.contact.submit(&form).await {
        Ok(_acknowledgment) => (
            StatusCode::OK,
            Json(ContactResponse::new("success", CONTACT_SUCCESS)),
        )
            .into_response(),
        Err(ContactError::MissingFields) => (
            StatusCode::BAD_REQUEST,
            Json(ContactResponse::new(
                "error",
                ContactError::MissingFields.to_string(),
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, operation = "submit_contact", "contact relay failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ContactResponse::new("error", CONTACT_FAILURE)),
            )
                .into_response()
        }
    }
}

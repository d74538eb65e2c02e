//! Cross-origin policy.
//!
//! Requests without an `Origin` header pass. Otherwise the origin must be on
//! the allow-list or be served from a host under the preview suffix.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;

/// Which browser origins may call the API with credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    /// Exact `scheme://host[:port]` values, compared verbatim.
    allowed_origins: Vec<String>,
    /// Lowercased hostname suffix for preview deployments, e.g. `.vercel.app`.
    /// Empty disables the rule.
    preview_suffix: String,
}

impl OriginPolicy {
    /// Creates a policy from an allow-list and a preview hostname suffix.
    pub fn new(allowed_origins: Vec<String>, preview_suffix: impl Into<String>) -> Self {
        Self {
            allowed_origins,
            preview_suffix: preview_suffix.into().to_ascii_lowercase(),
        }
    }

    /// Decides whether a request carrying `origin` may proceed.
    ///
    /// `None` (no `Origin` header) is always allowed. The preview rule looks
    /// only at the parsed hostname, so paths, queries and fragments in the
    /// header cannot satisfy it.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };

        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            return true;
        }

        !self.preview_suffix.is_empty()
            && origin_host(origin).is_some_and(|host| host.ends_with(&self.preview_suffix))
    }

    /// Credentialed CORS layer answering preflights for allowed origins.
    pub fn layer(self: &Arc<Self>) -> CorsLayer {
        let policy = Arc::clone(self);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
                origin.to_str().is_ok_and(|o| policy.is_allowed(Some(o)))
            }))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

/// Lowercased host of an `Origin` value such as `https://app.example.com:8443`.
fn origin_host(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Rejects requests from origins outside the policy before they reach a handler.
pub async fn reject_disallowed_origin(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or_default());

    if policy.is_allowed(origin) {
        return next.run(request).await;
    }

    tracing::warn!(origin = ?origin, "blocked cross-origin request");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "success": false, "message": "Not allowed by CORS" })),
    )
        .into_response()
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use portfolio_backend::client::{ClientExtractor, IpResolver};
use portfolio_backend::contact::ContactRelay;
use portfolio_backend::cors::OriginPolicy;
use portfolio_backend::error::Result;
use portfolio_backend::geo::{GeoClassification, GeoLookup, NetworkType};
use portfolio_backend::identity::IdentityResolver;
use portfolio_backend::mailer::{Email, MailError, Mailer};
use portfolio_backend::migration::{Migrator, MigratorTrait};
use portfolio_backend::recorder::ViewRecorder;
use portfolio_backend::routes::{router, AppState};
use portfolio_backend::store::{NewView, SeaOrmViewStore, ViewStore};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-secret";
pub const OWNER: &str = "owner@example.dev";

pub async fn memory_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

/// Geo lookup returning a fixed classification and counting calls.
#[derive(Debug, Default)]
pub struct FixedGeo {
    pub calls: AtomicUsize,
    pub last_ip: Mutex<Option<String>>,
}

#[async_trait]
impl GeoLookup for FixedGeo {
    async fn lookup(&self, ip: Option<&str>) -> GeoClassification {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_ip.lock().unwrap() = ip.map(str::to_string);
        GeoClassification {
            country: "Germany".into(),
            region: "Berlin".into(),
            city: "Berlin".into(),
            isp: "Example ISP".into(),
            network: NetworkType::Broadband,
        }
    }
}

/// Store whose every call fails.
#[derive(Debug, Default)]
pub struct BrokenStore;

#[async_trait]
impl ViewStore for BrokenStore {
    async fn insert(&self, _view: NewView) -> Result<()> {
        Err(sea_orm::DbErr::Custom("insert refused".into()).into())
    }

    async fn count(&self) -> Result<u64> {
        Err(sea_orm::DbErr::Custom("count refused".into()).into())
    }
}

/// Mailer that records attempts and can be told to fail by recipient.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub attempts: AtomicUsize,
    pub fail_owner: AtomicBool,
    pub fail_sender: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> std::result::Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fail = if email.to == OWNER {
            self.fail_owner.load(Ordering::SeqCst)
        } else {
            self.fail_sender.load(Ordering::SeqCst)
        };
        if fail {
            return Err(MailError::Rejected { status: 503 });
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub recorder: Arc<ViewRecorder>,
    pub contact: Arc<ContactRelay>,
    pub geo: Arc<FixedGeo>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> (Self, DatabaseConnection) {
        let db = memory_db().await;
        let app = Self::with_store(Arc::new(SeaOrmViewStore::new(db.clone())));
        (app, db)
    }

    pub fn with_store(store: Arc<dyn ViewStore>) -> Self {
        let geo = Arc::new(FixedGeo::default());
        let mailer = Arc::new(RecordingMailer::default());

        let recorder = Arc::new(ViewRecorder::new(
            IdentityResolver::new(SECRET).expect("valid secret"),
            ClientExtractor::new(IpResolver::new("x-edge-client-ip")),
            geo.clone(),
            store,
        ));
        let contact = Arc::new(ContactRelay::new(
            mailer.clone(),
            OWNER,
            "Portfolio <noreply@example.dev>",
        )
        .expect("built-in templates parse"));

        let state = AppState {
            recorder: recorder.clone(),
            contact: contact.clone(),
        };
        let origins = OriginPolicy::new(vec!["https://site.example.dev".into()], ".vercel.app");

        Self {
            router: router(state, origins),
            recorder,
            contact,
            geo,
            mailer,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// The `name=value` pair of the response's `sid` cookie, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sid="))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

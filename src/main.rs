use std::net::SocketAddr;
use std::time::Duration;

use portfolio_backend::config::Config;
use portfolio_backend::cors::OriginPolicy;
use portfolio_backend::routes::{self, AppState};
use portfolio_backend::telemetry;
use sea_orm::{ConnectOptions, Database};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();
    info!("bootstrap started");

    let config = Config::from_env()?;

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(config.db_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(10 * 60))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    info!("connected to database");

    #[cfg(feature = "migration")]
    {
        use portfolio_backend::migration::{Migrator, MigratorTrait};
        Migrator::up(&db, None).await?;
        info!("migrations applied");
    }

    let state = AppState::from_config(&config, db)?;
    let origins = OriginPolicy::new(
        config.allowed_origins.clone(),
        config.preview_origin_suffix.clone(),
    );
    let app = routes::router(state, origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

mod auth;
mod config;
mod db;
mod hub;
mod notify;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use hub::registry::ConnectionRegistry;
use hub::worker::spawn_dispatch_workers;
use notify::email::LogMailer;
use notify::service::NotificationService;
use notify::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "clinic_hub=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "clinic_hub=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("clinic-hub v{} starting", env!("CARGO_PKG_VERSION"));

    // Durable notification store
    let db = db::init_db(&config.data_dir)?;

    // JWT verification key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Connection registry + dispatch worker pool
    let registry = Arc::new(ConnectionRegistry::new());
    let notification_hub = spawn_dispatch_workers(registry.clone(), config.dispatch_workers);
    tracing::info!(workers = config.dispatch_workers, "dispatch worker pool started");

    // Notification lifecycle service: SQLite store, logging mailer
    let notifications = Arc::new(NotificationService::new(
        Arc::new(SqliteStore::new(db)),
        Arc::new(LogMailer),
        notification_hub.clone(),
        config.reminder_window_mins,
    ));

    let app_state = state::AppState {
        jwt_secret,
        registry,
        hub: notification_hub,
        notifications,
    };

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

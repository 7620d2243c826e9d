use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use chirpy::auth::{AuthService, RefreshTokenStore};
use chirpy::clock::{Clock, SystemClock};
use chirpy::configuration::get_configuration;
use chirpy::startup::run;
use chirpy::storage::{InMemoryRefreshTokenStore, InMemoryUserStore, PgRefreshTokenStore, PgUserStore};
use chirpy::telemetry::init_telemetry;
use chirpy::users::UserStore;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let (users, refresh_tokens): (Arc<dyn UserStore>, Arc<dyn RefreshTokenStore>) =
        if configuration.application.use_in_memory_store {
            tracing::warn!("Using in-memory stores; nothing survives a restart");
            (
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryRefreshTokenStore::new()),
            )
        } else {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;
            tracing::info!("Database connection pool created successfully");

            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgRefreshTokenStore::new(pool)),
            )
        };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let auth = AuthService::from_settings(&configuration, users.clone(), refresh_tokens, clock.clone())
        .map_err(|e| {
            tracing::error!("Invalid authentication settings: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!(
        address = %address,
        environment = ?configuration.application.environment,
        "Server listening"
    );

    let server = run(listener, auth, users, clock, configuration.webhook.clone())?;
    server.await
}

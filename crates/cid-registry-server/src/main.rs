//! CID Registry Server
//!
//! Main entry point for the CID Registry HTTP server.
//! This binary opens the configured record store, wires event publishing and
//! the optional content store, and serves the HTTP API with graceful shutdown.

mod config;
mod telemetry;

use anyhow::{Context, Result};
use cid_registry_api::{build_api_server_with_config, CorsConfig, MiddlewareConfig};
use cid_registry_db::{
    close_pool, create_pool, BroadcastEventPublisher, CompositeEventPublisher, EventPublisher,
    LogRecordRepository, MemoryRecordRepository, NatsEventPublisher, NatsPublisherConfig,
    PoolConfig, RecordRepository, SqlitePool, SqliteRecordRepository,
};
use cid_registry_service::{
    ContentStoreConfig, MemoryContentStore, ServiceRegistry, ValidationConfig,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, StorageBackend};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Server host
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Storage backend (memory, log, sqlite)
    #[arg(long, value_parser = parse_backend)]
    storage: Option<StorageBackend>,

    /// Database URL for the sqlite backend
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

fn parse_backend(value: &str) -> Result<StorageBackend, String> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "log" => Ok(StorageBackend::Log),
        "sqlite" => Ok(StorageBackend::Sqlite),
        other => Err(format!("unknown storage backend '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config_dir, &args.environment)
        .context("Failed to load configuration")?;

    // Command-line arguments win over files and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = backend;
    }
    if let Some(database_url) = args.database_url {
        config.storage.database_url = database_url;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    telemetry::init_with_config(&telemetry::TelemetryConfig::from(&config.logging))
        .context("Failed to initialize logging")?;

    info!("Starting CID Registry Server");
    info!("Environment: {}", args.environment);
    info!("Server: {}", config.bind_address());
    info!("Storage backend: {}", config.storage.backend);

    let (repository, pool) = setup_repository(&config).await?;
    let (publisher, broadcast) = setup_publisher(&config).await?;

    let validation = ValidationConfig {
        strict_cid_format: config.registry.strict_cid_format,
        max_cid_length: config.registry.max_cid_length,
    };
    let mut services =
        ServiceRegistry::new(repository, publisher, validation).with_event_feed(broadcast);

    if config.content_store.enabled {
        let store = MemoryContentStore::new(ContentStoreConfig {
            max_blob_bytes: config.content_store.max_blob_bytes,
        });
        services = services.with_content_store(
            Arc::new(store),
            Duration::from_millis(config.content_store.upload_timeout_ms),
        );
        info!(
            "Uploads enabled (max {} bytes per blob)",
            config.content_store.max_blob_bytes
        );
    } else {
        info!("Uploads disabled");
    }

    let middleware = MiddlewareConfig::new()
        .with_cors(CorsConfig {
            allowed_origins: config.cors.allowed_origins.clone(),
            allow_credentials: config.cors.allow_credentials,
            max_age_seconds: Some(config.cors.max_age_seconds),
        })
        .with_max_body_bytes(config.server.max_body_bytes);

    let app = build_api_server_with_config(services, middleware);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid HTTP bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind HTTP server")?;

    info!("HTTP Server listening on http://{}", addr);

    if config.server.graceful_shutdown {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP Server error")?;
    } else {
        axum::serve(listener, app.into_make_service())
            .await
            .context("HTTP Server error")?;
    }

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Open the configured record repository
///
/// Returns the pool alongside the repository for the sqlite backend so it
/// can be closed on shutdown.
async fn setup_repository(
    config: &ServerConfig,
) -> Result<(Arc<dyn RecordRepository>, Option<SqlitePool>)> {
    let storage = &config.storage;

    match storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; registrations are lost on restart");
            Ok((Arc::new(MemoryRecordRepository::new()), None))
        }
        StorageBackend::Log => {
            info!("Opening registration log at {}", storage.log_path.display());
            let repository = LogRecordRepository::open(&storage.log_path)
                .await
                .context("Failed to open registration log")?
                .sync_on_commit(storage.sync_on_commit);
            Ok((Arc::new(repository), None))
        }
        StorageBackend::Sqlite => {
            let pool_config = PoolConfig::new(&storage.database_url)
                .min_connections(storage.min_connections)
                .max_connections(storage.max_connections)
                .connect_timeout(Duration::from_secs(storage.connect_timeout_seconds))
                .run_migrations(storage.run_migrations)
                .enable_logging(config.logging.level != "error");

            if !pool_config.is_in_memory() {
                ensure_database_dir(&storage.database_url)?;
            }

            info!("Connecting to database");
            let pool = create_pool(&pool_config)
                .await
                .context("Failed to create database connection pool")?;
            info!("Database connection established");

            Ok((Arc::new(SqliteRecordRepository::new(pool.clone())), Some(pool)))
        }
    }
}

/// Build the event publisher: in-process broadcast, plus NATS when configured
///
/// The broadcast half is returned separately so it can back `/v1/events`.
async fn setup_publisher(
    config: &ServerConfig,
) -> Result<(Arc<dyn EventPublisher>, BroadcastEventPublisher)> {
    let broadcast = BroadcastEventPublisher::new(config.events.broadcast_capacity);

    let Some(nats_url) = &config.events.nats_url else {
        return Ok((Arc::new(broadcast.clone()), broadcast));
    };

    info!("Connecting to NATS at {}", nats_url);
    let nats = NatsEventPublisher::connect(NatsPublisherConfig::new(nats_url))
        .await
        .context("Failed to connect to NATS")?;

    let composite = CompositeEventPublisher::new()
        .with(Arc::new(broadcast.clone()))
        .with(Arc::new(nats));
    Ok((Arc::new(composite), broadcast))
}

/// sqlx creates the database file but not its directory
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Resolves on SIGTERM or SIGINT (Ctrl+C); in-flight requests are allowed to
/// finish before the server stops.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

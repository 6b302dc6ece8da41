//! AutoMigrator API
//!
//! Serves migration planning and generation over HTTP. With DATABASE_URL set
//! the current state comes from the live catalog and batch numbers from the
//! history table; otherwise from a JSON snapshot and the output directory.

use automigrator::config::{DatabaseConfig, Settings};
use automigrator::migrator::AutoMigrator;
use automigrator::providers::{
    BatchNumberProvider, CurrentStateReader, Dialect, DirectoryBatchHistory, PostgresBatchHistory,
    PostgresCatalog, SnapshotFile,
};
use automigrator::render::{MigrationRenderer, PostgresRenderer};
use automigrator::routes::create_router;
use automigrator::state::AppState;
use automigrator::writer::MigrationWriter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting AutoMigrator...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let migrator_config = &settings.migrator;
    let renderer: Arc<dyn MigrationRenderer> = match migrator_config.dialect {
        Dialect::Postgres => Arc::new(PostgresRenderer),
    };

    let (state_reader, batches): (Arc<dyn CurrentStateReader>, Arc<dyn BatchNumberProvider>) =
        match &settings.database {
            Some(database) => {
                let pool = init_database_pool(database).await?;
                info!("✅ Database pool created successfully");
                (
                    Arc::new(PostgresCatalog::new(
                        pool.clone(),
                        migrator_config.schema.clone(),
                        migrator_config.history_table.clone(),
                    )),
                    Arc::new(PostgresBatchHistory::new(
                        pool,
                        migrator_config.schema.clone(),
                        migrator_config.history_table.clone(),
                    )),
                )
            }
            None => {
                info!(
                    "No DATABASE_URL, using snapshot {}",
                    migrator_config.state_file.display()
                );
                if !migrator_config.state_file.exists() {
                    warn!(
                        "⚠️  {} does not exist yet; create it containing {{}} to start from an empty database",
                        migrator_config.state_file.display()
                    );
                }
                (
                    Arc::new(SnapshotFile::new(migrator_config.state_file.clone())),
                    Arc::new(DirectoryBatchHistory::new(migrator_config.output_dir.clone())),
                )
            }
        };

    let migrator = AutoMigrator::new(state_reader, batches, renderer, migrator_config.dialect)
        .with_options(migrator_config.diff_options());
    let writer = MigrationWriter::new(migrator_config.output_dir.clone());
    let state = Arc::new(AppState::new(migrator, writer));

    let app = create_router(state, &settings);
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   GET  /health                   - Health check");
    info!("   POST /api/migrations/plan      - Preview the next batch");
    info!("   POST /api/migrations/generate  - Write the next batch");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,automigrator=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Build the connection pool and check it can reach the database
async fn init_database_pool(database: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod, Runtime};

    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.dbname = Some(database.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(database.max_pool_size));

    let pool = if database.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;
    client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", database.use_tls);
    Ok(pool)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}

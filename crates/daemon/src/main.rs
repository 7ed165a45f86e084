//! Havoc Chaos Orchestration Daemon - Main Entry Point

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use havoc_core::application::{shutdown_channel, ChaosContext, SchedulerConfig};
use havoc_core::port::id_provider::UuidProvider;
use havoc_core::port::time_provider::SystemTimeProvider;
use havoc_infra_docker::BollardRuntime;
use havoc_infra_sqlite::{create_pool, run_migrations, SqliteEntityStore, SqliteJobStore};
use havoc_infra_ssh::Ssh2Shell;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.havoc/chaos.db";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON for production, pretty for development)
    let log_format = std::env::var("HAVOC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Havoc chaos engine v{} starting...", VERSION);

    // 1.1. Initialize OpenTelemetry (optional)
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let db_path = std::env::var("HAVOC_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Wire the orchestration context (explicit DI, no globals)
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteEntityStore::new(pool.clone(), time_provider.clone()));
    let job_store = Arc::new(SqliteJobStore::new(pool.clone()));

    let context = Arc::new(ChaosContext::new(
        store,
        job_store,
        Arc::new(Ssh2Shell::new()),
        Arc::new(BollardRuntime::new()),
        time_provider,
        Arc::new(UuidProvider),
        SchedulerConfig::default(),
    ));

    // 5. Restore persisted jobs so pending experiments survive the restart
    let restored = context.scheduler().restore_jobs().await?;
    info!(restored, "Job restoration complete");

    // 6. Start the scheduler loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler = Arc::clone(context.scheduler());
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    info!("Scheduler running. Press Ctrl+C to shut down");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: no future firings; in-flight firings finish
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), scheduler_handle).await;

    info!("Shutdown complete.");

    Ok(())
}

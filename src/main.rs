use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mailflow::config::MonitorConfig;
use mailflow::deploy::UserLocks;
use mailflow::engine::{EngineClient, EngineConfig, HttpEngineClient};
use mailflow::monitor::{spawn_sweep_ticker, MonitorDeps, RecoveryMonitor};
use mailflow::notify::{LogNotifier, Notifier, SmtpConfig, SmtpNotifier};
use mailflow::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📬 Mailflow v{}", env!("CARGO_PKG_VERSION"));

    // ── Engine client ────────────────────────────────────────────────
    let engine_config = EngineConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ENGINE_BASE_URL=https://engine.example.com/api/v1");
        eprintln!("  export ENGINE_API_KEY=...");
        std::process::exit(1);
    });
    eprintln!("   Engine: {}", engine_config.base_url);
    let engine: Arc<dyn EngineClient> = Arc::new(HttpEngineClient::new(engine_config)?);

    // ── Database ─────────────────────────────────────────────────────
    let db_path =
        std::env::var("MAILFLOW_DB_PATH").unwrap_or_else(|_| "./data/mailflow.db".to_string());
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {db_path}: {e}");
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {db_path}");

    // ── Notifications ────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match SmtpConfig::from_env() {
        Some(smtp) => {
            eprintln!("   Notifications: SMTP via {}", smtp.host);
            Arc::new(SmtpNotifier::new(smtp))
        }
        None => {
            eprintln!("   Notifications: log only (SMTP_HOST not set)");
            Arc::new(LogNotifier)
        }
    };

    // The deploy orchestrator is driven programmatically by the onboarding
    // route layer; this daemon's job is supervision.
    let locks = Arc::new(UserLocks::new());

    // ── Recovery monitor ─────────────────────────────────────────────
    let monitor_config = MonitorConfig::from_env();
    eprintln!(
        "   Sweep: every {}s (max {} concurrent)\n",
        monitor_config.sweep_interval.as_secs(),
        monitor_config.sweep_concurrency
    );
    let monitor = Arc::new(RecoveryMonitor::new(
        monitor_config,
        MonitorDeps {
            engine,
            db,
            notifier,
            locks,
        },
    ));

    let shutdown = Arc::new(AtomicBool::new(false));
    let ticker = spawn_sweep_ticker(Arc::clone(&monitor), Arc::clone(&shutdown));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.store(true, Ordering::Relaxed);
    ticker.abort();

    Ok(())
}

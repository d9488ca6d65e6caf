use clap::Parser;
use dotenv::dotenv;
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pagepulse_server::alerting::evaluation_service::EvaluationService;
use pagepulse_server::collector::scheduler::CollectionScheduler;
use pagepulse_server::config::ServerConfig;
use pagepulse_server::notifications::{encryption::EncryptionService, service::NotificationService};
use pagepulse_server::web;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false) // No ANSI colors in file
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Combine layers and filter based on RUST_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    dotenv().ok();

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!(
        metrics_url = %server_config.metrics_url,
        interval_seconds = server_config.collect_interval_seconds,
        "Starting PagePulse telemetry server."
    );

    // --- Database Pool Setup ---
    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    // --- Core Services ---
    let encryption = Arc::new(EncryptionService::from_hex_key(
        &server_config.channel_encryption_key,
    )?);
    let client = Client::builder()
        .timeout(Duration::from_secs(server_config.http_timeout_seconds))
        .build()?;

    let notification_service = Arc::new(NotificationService::new(
        pool.clone(),
        encryption,
        client.clone(),
    ));
    let evaluation_service = Arc::new(EvaluationService::new(
        pool.clone(),
        notification_service.clone(),
    ));

    // --- Background Collection ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(CollectionScheduler::new(
        pool.clone(),
        server_config.clone(),
        client,
        evaluation_service,
        shutdown_rx,
    ));
    let scheduler_handle = tokio::spawn(scheduler.clone().run());

    // --- HTTP Server ---
    let app = web::create_axum_router(pool, notification_service, scheduler);
    let listener = tokio::net::TcpListener::bind(&server_config.listen_addr).await?;
    info!(listen_addr = %server_config.listen_addr, "HTTP server listening.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal.");
            }
        })
        .await?;

    info!("Shutdown signal received; stopping background collection.");
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    info!("Server stopped.");
    Ok(())
}

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use plant_identifier::config::{AppConfig, PLACEHOLDER_FILE};
use plant_identifier::infrastructure::bootstrap;
use plant_identifier::services::analysis::GeminiAnalyzer;
use plant_identifier::services::sweeper::RetentionSweeper;
use plant_identifier::{AppState, create_app};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about = "Identify plants from uploaded photos")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Static asset root (overrides PUBLIC_DIR)
    #[arg(long)]
    public_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plant_identifier=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Plant Identifier...");

    let mut config = AppConfig::from_env().context("loading configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(public_dir) = cli.public_dir {
        config.public_dir = public_dir;
    }

    info!(
        "🌿 Config: Model={}, Max Upload={}MB, Timeout={}s, Retention={}s",
        config.model,
        config.max_upload_bytes / 1024 / 1024,
        config.analysis_timeout.as_secs(),
        config.retention.as_secs()
    );

    let report = bootstrap::prepare_public_dirs(&config).await;
    if !report.is_ok() {
        warn!("⚠️  Some directories could not be created: {:?}", report.failed);
    }

    let analyzer = Arc::new(GeminiAnalyzer::new(&config)?);

    // Background sweeper is owned here and stopped after the server drains
    let sweeper = RetentionSweeper::new(
        config.uploads_dir(),
        PLACEHOLDER_FILE,
        config.retention,
        config.sweep_interval,
    )
    .spawn();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_app(AppState::new(config, analyzer));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}

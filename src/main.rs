use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acompanhamento::config::Config;
use acompanhamento::web::{self, AppState};

#[derive(Parser)]
#[command(version, about = "Servidor do formulário de acompanhamento da controladoria")]
struct Cli {
    /// Path to secrets.toml (users, history spreadsheet)
    #[arg(long)]
    secrets: Option<PathBuf>,

    /// Path to setores_usuarios.json (user -> sectors)
    #[arg(long)]
    sectors: Option<PathBuf>,

    /// Bind address override, e.g. 0.0.0.0:3000
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let config = Config::load(cli.secrets.as_deref(), cli.sectors.as_deref())
        .context("failed to load configuration")?;
    let bind = cli.bind.unwrap_or_else(|| config.secrets.bind.clone());

    info!(
        users = config.secrets.users.len(),
        sectors = config.sectors.len(),
        history = %config.secrets.spreadsheet_path.display(),
        worksheet = %config.secrets.worksheet,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(config)?);
    let app = web::router(state);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

//! regolith-api - backend API for the spectroscopy analysis platform

use anyhow::{Context, Result};
use clap::Parser;
use regolith_api::config::ApiConfig;
use regolith_api::services::{
    ActivityLogger, Auth0Provider, HttpTopicBus, IdentityProvider, JobBus, RecordingBus,
    StaticIdentityProvider,
};
use regolith_api::store::ContentStore;
use regolith_api::{build_router, AppState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "regolith-api", version, about = "Spectroscopy analysis platform API")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "REGOLITH_CONFIG", default_value = "regolith.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting regolith-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = ApiConfig::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    let users = ContentStore::local(&config.users_root).context("opening user content store")?;
    let jobs = ContentStore::local(&config.jobs_root).context("opening jobs store")?;
    let datasets = ContentStore::local(&config.datasets_root).context("opening datasets store")?;

    let db_options = SqliteConnectOptions::new()
        .filename(&config.database_path)
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .connect_with(db_options)
        .await
        .context("opening database")?;
    regolith_api::db::init_schema(&db).await?;
    info!("Database ready: {}", config.database_path.display());

    let bus: Arc<dyn JobBus> = if config.job_topic_url.is_empty() {
        info!("No job topic configured; job-start messages will only be recorded");
        Arc::new(RecordingBus::default())
    } else {
        Arc::new(HttpTopicBus::new(config.job_topic_url.clone()))
    };

    let identity: Arc<dyn IdentityProvider> = if config.identity.domain.is_empty() {
        info!("No identity provider configured; using static identity");
        Arc::new(StaticIdentityProvider::default())
    } else {
        Arc::new(Auth0Provider::new(config.identity.clone()))
    };

    let activity = ActivityLogger::new(db.clone());
    let listen_address = config.listen_address.clone();

    let state = AppState {
        users,
        jobs,
        datasets,
        db,
        bus,
        identity,
        activity,
        config: Arc::new(config),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("binding {}", listen_address))?;
    info!("regolith-api listening on http://{}", listen_address);

    axum::serve(listener, app).await?;
    Ok(())
}

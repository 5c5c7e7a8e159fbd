mod api;
mod authority;
mod db;
mod keygen;
mod metrics;
mod reconciler;
mod state;
mod store;

use crate::authority::CloudflareOriginClient;
use crate::db::init_db;
use crate::keygen::EcdsaP256Generator;
use crate::reconciler::Reconciler;
use crate::state::AppState;
use crate::store::{CertificateStore, DatabaseCertificateStore, MemoryCertificateStore};
use anyhow::{Context, Result};
use cfcert_common::config::{AppConfig, ExplicitSettings};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Provisions Cloudflare origin certificates and keeps them in a certificate store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store region, embedded in certificate handles
    #[arg(long)]
    region: Option<String>,

    /// Cloudflare API token (Bearer auth)
    #[arg(long)]
    api_token: Option<String>,

    /// Cloudflare Origin CA service key, used when no API token is given
    #[arg(long)]
    service_key: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = AppConfig::from_env(ExplicitSettings {
        region: cli.region,
        api_token: cli.api_token,
        service_key: cli.service_key,
    })?;

    let store: Arc<dyn CertificateStore> = match config.database_url.as_deref() {
        Some(url) => {
            let db = init_db(url).await?;
            info!("using database certificate store");
            Arc::new(DatabaseCertificateStore::new(
                db,
                config.region.clone(),
                config.list_page_size,
            ))
        }
        None => {
            warn!("DATABASE_URL not set, certificates will only be kept in memory");
            Arc::new(MemoryCertificateStore::new(
                config.region.clone(),
                usize::try_from(config.list_page_size).unwrap_or(usize::MAX),
            ))
        }
    };

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;
    let authority = CloudflareOriginClient::new(
        http,
        config.authority_url.clone(),
        config.credential.clone(),
    );
    let reconciler = Reconciler::new(store, Arc::new(authority), Arc::new(EcdsaP256Generator));

    let state = AppState {
        reconciler: Arc::new(reconciler),
    };

    let listener = tokio::net::TcpListener::bind(&config.control_plane_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.control_plane_addr))?;
    info!(region = %config.region, "control plane listening on {}", config.control_plane_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {}", err);
            }
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}

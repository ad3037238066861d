//! OpenSASE catalog reconciliation - one-shot CLI and admin trigger server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use opensase_catalog_reconcile::{
    api::{self, AppState},
    config::AppConfig,
    domain::events,
    store::PgDocumentStore,
    telemetry, Action, Reconciler,
};

#[derive(Debug, Parser)]
#[command(name = "opensase-catalog-reconcile", version, about = "Reconcile legacy category keys into canonical slugs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Survey legacy and canonical categories without writing anything
    Check,
    /// Sync canonical category documents and relocate legacy products
    Migrate,
    /// Delete legacy category documents left without products
    Delete,
    /// Report per-category counts and remaining legacy keys
    Verify,
    /// check, migrate, delete and verify in one run
    All,
    /// Serve the admin trigger over HTTP
    Serve,
}

impl Command {
    fn action(&self) -> Option<Action> {
        match self {
            Self::Check => Some(Action::Check),
            Self::Migrate => Some(Action::Migrate),
            Self::Delete => Some(Action::Delete),
            Self::Verify => Some(Action::Verify),
            Self::All => Some(Action::All),
            Self::Serve => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("info")?;
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let mapping = Arc::new(config.load_mapping()?);
    let database_url = config.database_url.as_deref().context("DATABASE_URL must be set")?;
    let store = PgDocumentStore::connect(database_url, config.batch_limit).await?;
    store.migrate().await?;
    let reconciler = Arc::new(Reconciler::new(Arc::new(store), mapping, config.reconcile_options()));

    let nats = match config.nats_url.as_deref() {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; reconcile events will not be published");
                None
            }
        },
        None => None,
    };

    let Some(action) = cli.command.action() else {
        let state = AppState::new(reconciler, config.admin_token.clone(), nats);
        let app = api::router(state);
        tracing::info!("🚀 OpenSASE catalog reconcile listening on 0.0.0.0:{}", config.port);
        axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
        return Ok(());
    };

    match reconciler.run(action).await {
        Ok(report) => {
            events::publish(nats.as_ref(), &report.events).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.needs_attention() {
                tracing::warn!("run finished with items needing manual follow-up");
            }
            Ok(())
        }
        Err(aborted) => {
            events::publish(nats.as_ref(), &aborted.partial.events).await;
            println!("{}", serde_json::to_string_pretty(&aborted.partial)?);
            Err(aborted.into())
        }
    }
}

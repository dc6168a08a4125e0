//! # Roving Lily Binary
//!
//! Assembles the configured ledger backend, the aggregation pipeline, and
//! the HTTP router, then serves until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rl_api::{build_router, AppState};
use rl_configs::{LedgerBackend, LedgerSettings, LogFormat, LogSettings, Settings};
use rl_core::LedgerQuery;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(feature = "ledger-rpc")]
use rl_ledger_rpc::{RpcLedger, RpcLedgerConfig};

#[cfg(feature = "ledger-memory")]
use rl_ledger_memory::MemoryLedger;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.log);
    settings.log_summary();

    if let Err(err) = run(settings).await {
        tracing::error!("{:#}", err);
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let bind_address = settings.bind_address();
    let Settings {
        server,
        ledger,
        pipeline,
        ..
    } = settings;

    let ledger = connect_ledger(ledger).await?;
    let state = AppState::new(
        ledger,
        pipeline.fan_out,
        Duration::from_secs(server.request_timeout_secs),
    );
    let app = build_router(state, &server.static_dir);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("cannot bind {}", bind_address))?;
    info!("🌸 Roving Lily listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down cleanly");
    Ok(())
}

fn init_tracing(settings: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Opens the single ledger connection shared by every request.
async fn connect_ledger(settings: LedgerSettings) -> Result<Arc<dyn LedgerQuery>> {
    match settings.backend {
        LedgerBackend::Rpc => connect_rpc(settings).await,
        LedgerBackend::Memory => open_memory(settings).await,
    }
}

#[cfg(feature = "ledger-rpc")]
async fn connect_rpc(settings: LedgerSettings) -> Result<Arc<dyn LedgerQuery>> {
    let url = settings.rpc_url;
    let ledger = RpcLedger::connect(RpcLedgerConfig {
        url: url.clone(),
        token: settings.rpc_token,
        timeout: Duration::from_secs(settings.rpc_timeout_secs),
    })
    .await
    .with_context(|| format!("cannot reach ledger at {}", url))?;
    Ok(Arc::new(ledger))
}

#[cfg(not(feature = "ledger-rpc"))]
async fn connect_rpc(_settings: LedgerSettings) -> Result<Arc<dyn LedgerQuery>> {
    anyhow::bail!("ledger.backend = \"rpc\" but this build lacks the `ledger-rpc` feature")
}

#[cfg(feature = "ledger-memory")]
async fn open_memory(settings: LedgerSettings) -> Result<Arc<dyn LedgerQuery>> {
    let ledger = match &settings.fixture_path {
        Some(path) => MemoryLedger::from_fixture(path)
            .await
            .with_context(|| format!("cannot load fixture {}", path.display()))?,
        None => {
            tracing::warn!("Memory ledger without a fixture starts empty");
            MemoryLedger::new()
        }
    };
    Ok(Arc::new(ledger))
}

#[cfg(not(feature = "ledger-memory"))]
async fn open_memory(_settings: LedgerSettings) -> Result<Arc<dyn LedgerQuery>> {
    anyhow::bail!("ledger.backend = \"memory\" but this build lacks the `ledger-memory` feature")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

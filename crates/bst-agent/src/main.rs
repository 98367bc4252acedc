//! BST agent
//!
//! Switch-resident daemon that:
//! - Serves the BST and system JSON-RPC methods over REST
//! - Tracks buffer occupancy of a simulated ASIC
//! - Pushes periodic and trigger reports to the configured collector

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use rand::RngExt as _;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bst_agent::collector::{self, Collector};
use bst_agent::config::{AgentConfig, DEFAULT_CONFIG_PATH};
use bst_agent::engine::{AgentInfo, BstApp};
use bst_agent::silicon::{Silicon, SimulatedAsic};
use bst_agent::{api, state};
use bst_common::asic::AsicCapabilities;

/// BST agent daemon.
#[derive(Parser, Debug)]
#[command(name = "bst-agent", about = "Buffer statistics tracking agent")]
struct Cli {
    /// Agent configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// REST listen address. Defaults to 0.0.0.0 on the configured local port.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Seed for simulated traffic. Random when omitted.
    #[arg(long)]
    simulate_seed: Option<u64>,

    /// Simulated ASIC generates no traffic of its own.
    #[arg(long, default_value_t = false)]
    quiescent: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging ─────────────────────────────────────────────────
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────
    let config = AgentConfig::load(&cli.config);
    let addr = cli
        .listen
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.local_port)));

    // ── BST application ─────────────────────────────────────────
    let caps = AsicCapabilities::trident2();
    let mut rng = rand::rng();
    let asic = if cli.quiescent {
        SimulatedAsic::quiescent(caps)
    } else {
        let seed = cli.simulate_seed.unwrap_or_else(|| rng.random());
        tracing::info!(seed, "simulated traffic enabled");
        SimulatedAsic::new(caps, seed)
    };
    let silicon: Vec<Box<dyn Silicon>> = vec![Box::new(asic)];
    let info = AgentInfo {
        network_os: "simulated".into(),
        uid: format!("{:016x}", rng.random::<u64>()),
    };
    let app = BstApp::new(silicon, info)?;
    let units = app.unit_count();
    let collector = Collector::new(config.collector_url())?;
    let state = state::AppState::new(app);

    // ── Report collectors ───────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut collectors = Vec::new();
    for unit in 0..units {
        collectors.push(tokio::spawn(collector::run(
            state.clone(),
            collector.clone(),
            unit,
            shutdown_rx.clone(),
        )));
    }

    // ── Router ──────────────────────────────────────────────────
    let router = api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("bst-agent listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── Shutdown ────────────────────────────────────────────────
    let _ = shutdown_tx.send(true);
    for handle in collectors {
        if let Err(e) = handle.await {
            tracing::error!("collector task failed: {e}");
        }
    }
    tracing::info!("bst-agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

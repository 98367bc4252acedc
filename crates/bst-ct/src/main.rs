//! BST conformance runner
//!
//! Sets up the platform named in `serverDetails.ini`, starts the agent when
//! the platform is virtual, runs the API checks in their fixed order and
//! exits non-zero if any check fails.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bst_ct::client::BstClient;
use bst_ct::config::DEFAULT_SECTION;
use bst_ct::fixture::BstTest;
use bst_ct::suite::{CheckId, Suite};

/// BST REST API conformance harness.
#[derive(Parser, Debug)]
#[command(name = "bst-ct", about = "BST REST API conformance tests")]
struct Cli {
    /// Harness configuration file.
    #[arg(long, default_value = "serverDetails.ini")]
    config: PathBuf,

    /// INI section holding the server details.
    #[arg(long, default_value = DEFAULT_SECTION)]
    section: String,

    /// Run only these checks (repeatable), e.g. `--check get_bst_feature`.
    #[arg(long = "check")]
    checks: Vec<CheckId>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut test = BstTest::from_file(&cli.config, &cli.section)?;
    let timeout = test.config().request_timeout()?;
    tracing::info!(platform = ?test.platform(), config = %cli.config.display(), "bst-ct starting");

    // ── Class setup ─────────────────────────────────────────────
    test.setup_net()?;
    let (ip, port) = test.get_switch_ip()?;
    test.start_agent().await?;

    // ── Checks ──────────────────────────────────────────────────
    let client = BstClient::new(&ip, port, timeout)?;
    tracing::info!(endpoint = client.base_url(), "running checks");
    let summary = Suite::new(&client).only(&cli.checks).run_all().await;

    // ── Class teardown ──────────────────────────────────────────
    test.teardown();

    if !summary.all_passed() {
        for (id, failure) in summary.failures() {
            eprintln!("FAILED {id}: {failure}");
        }
        anyhow::bail!(
            "{} of {} checks failed",
            summary.results.len() - summary.passed(),
            summary.results.len()
        );
    }
    println!("all {} checks passed", summary.results.len());
    Ok(())
}

//! watchdogd — the watchdog daemon.
//!
//! Loads the configuration, runs the check cycle on a fixed interval,
//! notifies configured webhooks about appeared and resolved issues, and
//! serves the status page.
//!
//! # Usage
//!
//! ```text
//! watchdogd --config /etc/watchdog.toml
//! watchdogd --config watchdog.toml --once
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use watchdog_core::{EXAMPLE_CONFIG, WatchdogConfig};
use watchdog_dashboard::{DashboardState, dashboard_router};
use watchdog_monitor::CheckScheduler;

#[derive(Parser)]
#[command(name = "watchdogd", about = "Infrastructure watchdog daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "watchdog.toml")]
    config: PathBuf,

    /// Address for the status page; overrides `bind_addr`.
    #[arg(long)]
    bind: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run one check cycle, print the issues, and exit non-zero if any
    /// were found.
    #[arg(long)]
    once: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let Some(mut config) = load_config(&cli.config)? else {
        return Ok(ExitCode::FAILURE);
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    if cli.once {
        run_once(&config, cancel).await
    } else {
        run_daemon(config, cancel).await?;
        Ok(ExitCode::SUCCESS)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,watchdogd=debug,watchdog=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// `None` when the file does not exist; an example has been printed.
fn load_config(path: &Path) -> anyhow::Result<Option<WatchdogConfig>> {
    if !path.exists() {
        println!("Could not find config file: {}", path.display());
        println!("It should look something like");
        println!();
        println!("{EXAMPLE_CONFIG}");
        return Ok(None);
    }
    let config = WatchdogConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(
        path = %path.display(),
        targets = config.target_count(),
        "configuration loaded"
    );
    Ok(Some(config))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
    cancel.cancel();
}

async fn run_once(config: &WatchdogConfig, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let scheduler = CheckScheduler::from_config(config)?;
    let Some(issues) = scheduler.run_cycle(&cancel).await else {
        anyhow::bail!("check cycle cancelled");
    };

    for issue in &issues {
        println!("{issue}");
    }
    Ok(if issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_daemon(config: WatchdogConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    info!("watchdog daemon starting");

    let scheduler = CheckScheduler::from_config(&config)?;
    let router = dashboard_router(DashboardState {
        status: scheduler.reader(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "status page listening");

    let scheduler_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let shutdown = cancel.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    cancel.cancel();
    join_scheduler(scheduler_handle).await;
    served?;

    info!("watchdog daemon stopped");
    Ok(())
}

/// Wait for the scheduler task; `false` if it panicked or was aborted.
async fn join_scheduler(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "check scheduler task failed");
            false
        }
    }
}

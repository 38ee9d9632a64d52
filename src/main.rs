#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # tunnelbot
//!
//! Telegram bot that lets a short list of operators start and stop a single
//! tunneling agent (ngrok or compatible) on this host, instead of shelling in.
//!
//! ## Chat surface
//!
//! | Input                 | Effect                                           |
//! |-----------------------|--------------------------------------------------|
//! | `/start`              | greeting and the Launch / Shutdown keyboard      |
//! | `/launch`             | pick a configured profile (or cancel)            |
//! | profile button        | replace any running agent, report public URLs    |
//! | `/shutdown`           | stop the running agent                           |
//!
//! ## Architecture
//!
//! ```text
//! main.rs              — entry point, clap CLI, startup checks, signal handling
//! config.rs            — TOML + env-var configuration
//! auth.rs              — operator allow-list
//! router.rs            — command / button dispatch
//! agent/
//!   controller.rs      — single-instance agent lifecycle (launch, shutdown)
//!   status.rs          — agent status API client, endpoint report
//! chat/
//!   mod.rs             — Transport trait, inbound events, keyboards
//!   telegram.rs        — Bot API client
//!   poll.rs            — getUpdates loop feeding the router
//! ```
//!
//! The host process exits on SIGINT/SIGTERM without stopping the agent; only
//! `/shutdown` (or a replacing launch) kills it.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use tunnelbot::chat::poll::Poller;
use tunnelbot::chat::telegram::TelegramClient;
use tunnelbot::{AllowList, Config, ProcessController, Router};

/// Control a tunneling agent from Telegram.
#[derive(Parser)]
#[command(name = "tunnelbot", version)]
struct Cli {
    /// Path to TOML config file (default `tunnelbot.toml`).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tunnelbot: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let default_level = if config.logging.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_filter = std::env::var("RUST_LOG").unwrap_or(default_level);
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("tunnelbot v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Agent: {} ({} profile(s), settle {}s)",
        config.agent.bin_path,
        config.profiles.len(),
        config.agent.settle_delay_secs
    );

    let client = match TelegramClient::new(&config.telegram.api_token) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build Telegram client: {e}");
            std::process::exit(1);
        }
    };

    match client.get_me().await {
        Ok(me) => info!(
            "Launching bot: @{} ({})",
            me.username.as_deref().unwrap_or("?"),
            me.first_name
        ),
        Err(e) => {
            error!("Failed to get info of the bot: {e}");
            std::process::exit(1);
        }
    }

    // getUpdates is refused while a webhook is registered
    if let Err(e) = client.delete_webhook().await {
        error!("Failed to delete webhook: {e}");
        std::process::exit(1);
    }

    let allow = AllowList::new(config.telegram.allowed_ids.iter().cloned());
    if allow.is_empty() {
        warn!("telegram.allowed_ids is empty, every sender will be rejected");
    }

    let router = Arc::new(Router::new(
        client.clone(),
        allow,
        config.profiles.clone(),
        ProcessController::from_config(&config),
    ));
    let poller = Poller::new(client, config.poll_interval());

    info!(
        "Polling for updates every {}s",
        config.telegram.poll_interval_secs
    );

    tokio::select! {
        () = poller.run(router) => {}
        () = shutdown_signal() => {}
    }

    // The agent keeps running; it is independent of this process.
    std::process::exit(1);
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                error!("Failed to register SIGTERM: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}

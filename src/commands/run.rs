use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use ticketwatch::bot::{BotPoller, CommandHandler};
use ticketwatch::config::Config;
use ticketwatch::metrics;
use ticketwatch::notifications::TelegramClient;
use ticketwatch::server::AdminServer;
use ticketwatch::utils::join_until;

use super::build_monitor;

/// Run the monitor, the bot poller and the admin API until SIGINT/SIGTERM
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let monitor = build_monitor(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tracing::info!(
        targets = config.targets.len(),
        interval_secs = config.monitor.check_interval_secs,
        "Starting monitor"
    );

    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let shutdown = shutdown_rx.clone();
        async move { monitor.run(shutdown).await }
    });

    let bot_task = if config.bot.enable_commands {
        let client = TelegramClient::from_config(&config.bot)
            .context("Failed to create Telegram client")?;
        let poller = BotPoller::new(
            client,
            CommandHandler::new(Arc::clone(&monitor)),
            std::time::Duration::from_secs(config.bot.poll_timeout_secs),
            config.notify_timeout(),
        )
        .with_shutdown_grace(config.shutdown_grace());
        Some(tokio::spawn(poller.run(shutdown_rx.clone())))
    } else {
        None
    };

    let server_task = config.server.bind_address.map(|addr| {
        let server = AdminServer::new(addr, Arc::clone(&monitor));
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(e) = server.start_with_shutdown(signal).await {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        })
    });

    wait_for_signal().await;
    tracing::info!("Shutdown signal received");
    shutdown_tx.send(true).ok();

    // The monitor bounds its own in-flight cycle; the bot and the admin API
    // may be running an on-demand cycle and get the same grace period here.
    let deadline = Instant::now() + config.shutdown_grace();

    monitor_task.await.context("Monitor task panicked")?;
    if let Some(task) = bot_task {
        if join_until(task, deadline).await.context("Bot task panicked")?.is_none() {
            tracing::warn!("Bot poller did not stop within grace period, aborted");
        }
    }
    if let Some(task) = server_task {
        if join_until(task, deadline)
            .await
            .context("Admin API task panicked")?
            .is_none()
        {
            tracing::warn!("Admin API did not stop within grace period, aborted");
        }
    }

    tracing::info!("ticketwatch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to wait for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

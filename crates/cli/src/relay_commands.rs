use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    teloxide::{Bot, types::ChatId},
    tokio::{
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use quietrelay_metrics::{counter, media as media_metrics};

use {
    quietrelay_config::RelayConfig,
    quietrelay_media::ScratchDir,
    quietrelay_metrics::Monitor,
    quietrelay_telegram::{Relay, build_bot, check_health},
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const HEALTH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Relay until a shutdown signal arrives or polling stops on its own.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let scratch = ScratchDir::create(&config.temp_dir)
        .await
        .with_context(|| format!("failed to prepare {}", config.temp_dir.display()))?;
    let monitor = Arc::new(Monitor::load(&config.stats_file));
    let bot = build_bot(&config)?;
    let relay = Relay::from_config(bot.clone(), &config, scratch.clone(), Arc::clone(&monitor));

    relay.connect().await.context("failed to connect to telegram")?;
    info!(
        source = config.source_channel_id,
        target = config.target_channel_id,
        clean_metadata = config.clean_metadata,
        max_file_size_mib = config.max_file_size_mib(),
        proxy = ?config.proxy.as_ref().map(|p| p.display_url()),
        "relay configured"
    );

    let cancel = CancellationToken::new();
    let metrics_server = start_metrics(&config, cancel.clone()).await?;
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                signal = shutdown_signal() => {
                    info!(signal, "shutdown requested");
                    cancel.cancel();
                },
                () = cancel.cancelled() => {},
            }
        }
    });

    let sweeper = tokio::spawn(sweep_loop(scratch, config.temp_max_age(), cancel.clone()));
    let health = tokio::spawn(health_loop(
        bot,
        ChatId(config.source_channel_id),
        ChatId(config.target_channel_id),
        Arc::clone(&monitor),
        cancel.clone(),
    ));

    relay.poll(cancel.clone()).await;

    cancel.cancel();
    let (sweep_result, health_result) = tokio::join!(sweeper, health);
    for result in [sweep_result, health_result] {
        if let Err(e) = result {
            warn!(error = %e, "housekeeping task ended abnormally");
        }
    }
    if let Some(server) = metrics_server
        && let Err(e) = server.await
    {
        warn!(error = %e, "metrics endpoint ended abnormally");
    }

    monitor
        .flush()
        .with_context(|| format!("failed to write {}", monitor.path().display()))?;
    info!("quietrelay stopped");
    Ok(())
}

/// Install the recorder and serve `/metrics` when `METRICS_ADDR` is set.
#[cfg(feature = "prometheus")]
async fn start_metrics(
    config: &RelayConfig,
    cancel: CancellationToken,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    let Some(addr) = config.metrics_addr else {
        quietrelay_metrics::init_metrics(false)?;
        return Ok(None);
    };
    let handle = quietrelay_metrics::init_metrics(true).context("failed to install metrics recorder")?;
    let (_, task) = crate::metrics_server::start(addr, handle, cancel).await?;
    Ok(Some(task))
}

#[cfg(not(feature = "prometheus"))]
async fn start_metrics(
    config: &RelayConfig,
    _cancel: CancellationToken,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    if config.metrics_addr.is_some() {
        warn!("METRICS_ADDR is set but this build has no prometheus support");
    }
    Ok(None)
}

/// Remove stale scratch files once at startup and then every hour.
async fn sweep_loop(scratch: ScratchDir, max_age: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {},
        }
        match scratch.sweep(max_age).await {
            Ok(0) => debug!(root = %scratch.root().display(), "scratch sweep found nothing stale"),
            Ok(removed) => {
                info!(removed, root = %scratch.root().display(), "removed stale scratch files");
                #[cfg(feature = "metrics")]
                counter!(media_metrics::SCRATCH_FILES_SWEPT_TOTAL).increment(removed as u64);
            },
            Err(e) => warn!(error = %e, "scratch sweep failed"),
        }
    }
}

/// Check connectivity every five minutes. The first check runs one
/// interval after startup; `connect` already verified the token.
async fn health_loop(
    bot: Bot,
    source: ChatId,
    target: ChatId,
    monitor: Arc<Monitor>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + HEALTH_INTERVAL, HEALTH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {},
        }
        let report = check_health(&bot, source, target, &monitor).await;
        debug!(
            healthy = report.status.is_healthy(),
            processed = report.messages_processed,
            errors = report.errors_count,
            "periodic health check"
        );
    }
}

/// Wait for Ctrl+C or SIGTERM and return a label for logging.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "ctrl-c",
                _ = sigterm.recv() => "SIGTERM",
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, falling back to Ctrl+C only");
            ctrl_c().await
        },
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "ctrl-c",
        Err(e) => {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<&'static str>().await
        },
    }
}

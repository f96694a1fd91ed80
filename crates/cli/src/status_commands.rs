use {
    anyhow::Context,
    quietrelay_config::RelayConfig,
    quietrelay_metrics::{HealthReport, Monitor},
    quietrelay_telegram::{build_bot, check_health},
    teloxide::types::ChatId,
};

/// Print the effective configuration with the token redacted.
pub fn check_config(config: &RelayConfig) -> anyhow::Result<()> {
    println!("{}", render_config(config)?);
    println!("Configuration is valid.");
    Ok(())
}

fn render_config(config: &RelayConfig) -> anyhow::Result<String> {
    serde_json::to_string_pretty(config).context("failed to render configuration")
}

pub async fn health(config: &RelayConfig) -> anyhow::Result<()> {
    let bot = build_bot(config)?;
    let monitor = Monitor::load(&config.stats_file);
    let report = check_health(
        &bot,
        ChatId(config.source_channel_id),
        ChatId(config.target_channel_id),
        &monitor,
    )
    .await;
    println!("{report}");
    if !report.status.is_healthy() {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

pub fn stats(config: &RelayConfig) -> anyhow::Result<()> {
    println!("{}", stats_report(config));
    Ok(())
}

fn stats_report(config: &RelayConfig) -> HealthReport {
    HealthReport::offline(&Monitor::load(&config.stats_file))
}

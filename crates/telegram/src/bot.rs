use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, Update},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use quietrelay_metrics::{counter, telegram as tg_metrics};

use {
    quietrelay_config::{POLL_TIMEOUT_SECS, RelayConfig},
    quietrelay_media::ScratchDir,
    quietrelay_metrics::{HealthReport, Monitor},
};

use crate::{
    error::Result,
    fetch::TelegramFetcher,
    ingress::IngressRouter,
    outbound::TelegramOutbound,
    pipeline::{RelayOutcome, RelayPipeline},
};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP client outlives the long-poll timeout and routes
/// through the configured proxy.
pub fn build_bot(config: &RelayConfig) -> Result<Bot> {
    let mut builder = teloxide::net::default_reqwest_settings().timeout(config.request_timeout());
    if let Some(proxy) = &config.proxy {
        let url = proxy.resolved_url()?;
        info!(proxy = %proxy.display_url(), "routing bot api traffic through proxy");
        builder = builder.proxy(reqwest::Proxy::all(url.as_str())?);
    }
    let client = builder.build()?;
    Ok(Bot::with_client(config.token.expose_secret(), client))
}

/// Bot username and the titles of both channels, as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    pub bot_username: String,
    pub source_title: String,
    pub target_title: String,
}

/// Verify the token and that the bot can see both channels.
pub async fn probe(bot: &Bot, source: ChatId, target: ChatId) -> Result<Connectivity> {
    let me = bot.get_me().await?;
    let source_chat = bot.get_chat(source).await?;
    let target_chat = bot.get_chat(target).await?;
    Ok(Connectivity {
        bot_username: me.username.clone().unwrap_or_default(),
        source_title: source_chat.title().unwrap_or_default().to_string(),
        target_title: target_chat.title().unwrap_or_default().to_string(),
    })
}

/// Run one connectivity check. A failure is recorded as an error.
pub async fn check_health(
    bot: &Bot,
    source: ChatId,
    target: ChatId,
    monitor: &Monitor,
) -> HealthReport {
    match probe(bot, source, target).await {
        Ok(c) => {
            debug!(bot = %c.bot_username, "health check passed");
            HealthReport::healthy(monitor, c.bot_username, c.source_title, c.target_title)
        },
        Err(e) => {
            warn!(error = %e, "health check failed");
            monitor.record_error(&format!("health check failed: {e}"));
            HealthReport::unhealthy(monitor, e.to_string())
        },
    }
}

/// The relay's polling side: routes updates into the pipeline and records
/// outcomes.
pub struct Relay {
    bot: Bot,
    router: IngressRouter,
    pipeline: RelayPipeline,
    monitor: Arc<Monitor>,
}

impl Relay {
    #[must_use]
    pub fn new(
        bot: Bot,
        router: IngressRouter,
        pipeline: RelayPipeline,
        monitor: Arc<Monitor>,
    ) -> Self {
        Self {
            bot,
            router,
            pipeline,
            monitor,
        }
    }

    /// Wire the Telegram-backed fetcher and outbound for `config`.
    pub fn from_config(
        bot: Bot,
        config: &RelayConfig,
        scratch: ScratchDir,
        monitor: Arc<Monitor>,
    ) -> Self {
        let fetcher = TelegramFetcher::new(bot.clone(), scratch, config.max_file_size);
        let outbound = TelegramOutbound::new(bot.clone(), ChatId(config.target_channel_id));
        let pipeline = RelayPipeline::new(
            Arc::new(fetcher),
            Arc::new(outbound),
            config.clean_metadata,
        );
        Self::new(
            bot,
            IngressRouter::new(ChatId(config.source_channel_id)),
            pipeline,
            monitor,
        )
    }

    #[must_use]
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Route and relay one update, then record the outcome.
    pub async fn process_update(&self, update: &Update) -> Option<RelayOutcome> {
        #[cfg(feature = "metrics")]
        counter!(tg_metrics::UPDATES_RECEIVED_TOTAL).increment(1);

        let outcome = self.pipeline.dispatch(self.router.route(update)).await?;
        match outcome {
            RelayOutcome::Published => self.monitor.record_message_processed(),
            RelayOutcome::Failed(reason) => self
                .monitor
                .record_error(&format!("update {} not relayed: {reason}", update.id.0)),
            RelayOutcome::SkippedWrongOrigin => {},
        }
        Some(outcome)
    }

    /// Check credentials and clear any webhook so long polling works.
    pub async fn connect(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        self.bot.delete_webhook().await?;
        let username = me.username.clone().unwrap_or_default();
        info!(username = %username, source = self.router.source().0, "telegram bot connected (webhook cleared)");
        Ok(username)
    }

    /// Long-poll for channel posts until `cancel` fires.
    ///
    /// Cancellation interrupts a pending `getUpdates`, never an update being
    /// relayed. Another instance polling with the same token stops the loop
    /// and cancels `cancel` so the rest of the process shuts down too.
    pub async fn poll(&self, cancel: CancellationToken) {
        info!("starting telegram manual polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS as u32)
                .allowed_updates(vec![AllowedUpdate::ChannelPost]);

            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        self.process_update(&update).await;
                        offset = update.id.as_offset();
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!("telegram polling disabled: another instance is already running with this token");
                    self.monitor
                        .record_error("getUpdates conflict with another bot instance");
                    cancel.cancel();
                    break;
                },
                Err(e) => {
                    #[cfg(feature = "metrics")]
                    counter!(tg_metrics::POLLING_ERRORS_TOTAL).increment(1);
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                    }
                },
            }
        }

        info!("telegram polling stopped");
    }
}

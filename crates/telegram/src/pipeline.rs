//! Per-post relay: fetch, strip, publish, clean up.

use std::{fmt, sync::Arc};

use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use quietrelay_metrics::{counter, histogram, labels, telegram as tg_metrics};

use quietrelay_media::{ScratchGuard, strip};

use crate::{
    fetch::{AttachmentFetcher, FetchError},
    ingress::Routed,
    outbound::RelayOutbound,
    post::{Attachment, InboundPost},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    TooLarge,
    DownloadError,
    PublishError,
    Unsupported,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::DownloadError => "download_error",
            Self::PublishError => "publish_error",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FetchError> for FailureReason {
    fn from(e: &FetchError) -> Self {
        match e {
            FetchError::TooLarge { .. } => Self::TooLarge,
            FetchError::Download(_) => Self::DownloadError,
        }
    }
}

/// What happened to one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Published,
    SkippedWrongOrigin,
    Failed(FailureReason),
}

/// Relays one post at a time. Holds no state between posts.
pub struct RelayPipeline {
    fetcher: Arc<dyn AttachmentFetcher>,
    outbound: Arc<dyn RelayOutbound>,
    clean_metadata: bool,
}

impl RelayPipeline {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn AttachmentFetcher>,
        outbound: Arc<dyn RelayOutbound>,
        clean_metadata: bool,
    ) -> Self {
        Self {
            fetcher,
            outbound,
            clean_metadata,
        }
    }

    /// Turn a routed update into an outcome. `Ignored` updates yield `None`.
    pub async fn dispatch(&self, routed: Routed) -> Option<RelayOutcome> {
        match routed {
            Routed::Ignored => None,
            Routed::WrongOrigin(_) => {
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::POSTS_SKIPPED_TOTAL).increment(1);
                Some(RelayOutcome::SkippedWrongOrigin)
            },
            Routed::Unsupported { message_id, media } => {
                warn!(message_id = message_id.0, media, "post carries unsupported media, not relayed");
                Some(self.failed(FailureReason::Unsupported))
            },
            Routed::Post(post) => Some(self.handle(&post).await),
        }
    }

    /// Relay one post from the source channel. Never returns an error; every
    /// failure is logged here and reported as [`RelayOutcome::Failed`].
    pub async fn handle(&self, post: &InboundPost) -> RelayOutcome {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let outcome = match &post.attachment {
            None => self.relay_text(post).await,
            Some(attachment) => self.relay_attachment(post, attachment).await,
        };

        #[cfg(feature = "metrics")]
        histogram!(tg_metrics::RELAY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        outcome
    }

    async fn relay_text(&self, post: &InboundPost) -> RelayOutcome {
        match self.outbound.send_text(&post.text, &post.formatting).await {
            Ok(_) => {
                info!(message_id = post.message_id.0, "text post relayed");
                self.published("text")
            },
            Err(e) => {
                warn!(message_id = post.message_id.0, error = %e, "failed to publish text post");
                self.failed(FailureReason::PublishError)
            },
        }
    }

    async fn relay_attachment(&self, post: &InboundPost, attachment: &Attachment) -> RelayOutcome {
        let message_id = post.message_id.0;
        let file_unique_id = attachment.file_unique_id.as_str();
        let kind = attachment.kind.as_str();

        // Removes every scratch file below on all return paths.
        let mut guard = ScratchGuard::new();

        let fetched = match self.fetcher.fetch(attachment).await {
            Ok(file) => file,
            Err(e) => {
                warn!(message_id, file_unique_id, kind, error = %e, "failed to fetch attachment, post dropped");
                return self.failed(FailureReason::from(&e));
            },
        };
        guard.track(&fetched);

        let upload = if self.clean_metadata {
            let cleaned = strip(&fetched).await;
            guard.track(&cleaned);
            cleaned
        } else {
            debug!(message_id, file_unique_id, "metadata cleaning disabled");
            fetched
        };

        let caption = if attachment.kind.accepts_caption() {
            post.text.as_str()
        } else {
            ""
        };
        let result = self
            .outbound
            .send_attachment(attachment, &upload, caption, &post.formatting)
            .await;
        guard.cleanup();

        match result {
            Ok(_) => {
                info!(message_id, file_unique_id, kind, "attachment post relayed");
                self.published(kind)
            },
            Err(e) => {
                warn!(message_id, file_unique_id, kind, error = %e, "failed to publish attachment");
                self.failed(FailureReason::PublishError)
            },
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn published(&self, kind: &'static str) -> RelayOutcome {
        #[cfg(feature = "metrics")]
        counter!(tg_metrics::POSTS_RELAYED_TOTAL, labels::KIND => kind).increment(1);
        RelayOutcome::Published
    }

    fn failed(&self, reason: FailureReason) -> RelayOutcome {
        #[cfg(feature = "metrics")]
        counter!(tg_metrics::RELAY_FAILURES_TOTAL, labels::REASON => reason.as_str()).increment(1);
        RelayOutcome::Failed(reason)
    }
}

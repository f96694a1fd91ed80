//! Telegram side of quietrelay.
//!
//! Updates come in through manual `getUpdates` long polling ([`bot::Relay`]),
//! are narrowed to source-channel posts by [`IngressRouter`], and are then
//! relayed one at a time by [`RelayPipeline`]: fetch the attachment, strip
//! its metadata, publish it to the destination channel, and remove the
//! scratch files.

pub mod bot;
pub mod error;
pub mod fetch;
pub mod ingress;
pub mod outbound;
pub mod pipeline;
pub mod post;

#[cfg(test)]
mod test_support;

pub use {
    bot::{Connectivity, Relay, build_bot, check_health, probe},
    error::{Error, Result},
    fetch::{AttachmentFetcher, FetchError, TelegramFetcher},
    ingress::{IngressRouter, Routed},
    outbound::{RelayOutbound, TelegramOutbound},
    pipeline::{FailureReason, RelayOutcome, RelayPipeline},
    post::{Attachment, AttachmentKind, Formatting, InboundPost, UnsupportedMedia},
};

use {
    teloxide::types::{ChatId, MessageId, Update, UpdateKind},
    tracing::debug,
};

use crate::post::InboundPost;

/// Result of filtering one platform update.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Not a channel post at all.
    Ignored,
    /// Channel post from a chat other than the source.
    WrongOrigin(ChatId),
    /// Channel post from the source whose payload cannot be relayed.
    Unsupported {
        message_id: MessageId,
        media: &'static str,
    },
    Post(InboundPost),
}

/// Narrows the update stream to channel posts from the source channel.
#[derive(Debug, Clone, Copy)]
pub struct IngressRouter {
    source: ChatId,
}

impl IngressRouter {
    #[must_use]
    pub fn new(source: ChatId) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> ChatId {
        self.source
    }

    pub fn route(&self, update: &Update) -> Routed {
        let UpdateKind::ChannelPost(msg) = &update.kind else {
            debug!(update_id = update.id.0, "ignoring non-channel-post update");
            return Routed::Ignored;
        };

        if msg.chat.id != self.source {
            debug!(
                chat_id = msg.chat.id.0,
                message_id = msg.id.0,
                "ignoring channel post from unexpected chat"
            );
            return Routed::WrongOrigin(msg.chat.id);
        }

        match InboundPost::from_message(msg) {
            Ok(post) => Routed::Post(post),
            Err(unsupported) => Routed::Unsupported {
                message_id: msg.id,
                media: unsupported.0,
            },
        }
    }
}

use {
    async_trait::async_trait,
    teloxide::{
        prelude::*,
        types::{InputFile, MessageId, ParseMode},
    },
    tracing::debug,
};

use quietrelay_media::ScratchFile;

use crate::{
    error::Result,
    post::{Attachment, AttachmentKind, Formatting},
};

/// Publishes relayed posts to the destination channel.
#[async_trait]
pub trait RelayOutbound: Send + Sync {
    async fn send_text(&self, text: &str, formatting: &Formatting) -> Result<MessageId>;

    /// Publish one attachment. `caption` is ignored for kinds that cannot
    /// carry one.
    async fn send_attachment(
        &self,
        attachment: &Attachment,
        file: &ScratchFile,
        caption: &str,
        formatting: &Formatting,
    ) -> Result<MessageId>;
}

/// Outbound sender bound to the destination chat.
pub struct TelegramOutbound {
    bot: Bot,
    target: ChatId,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot, target: ChatId) -> Self {
        Self { bot, target }
    }

    fn input_file(attachment: &Attachment, file: &ScratchFile) -> InputFile {
        let input = InputFile::file(&file.path);
        match &attachment.file_name {
            Some(name) => input.file_name(name.clone()),
            None => input,
        }
    }
}

/// Attach a non-empty caption with the post's formatting, then send.
macro_rules! send_captioned {
    ($req:expr, $caption:expr, $formatting:expr) => {{
        let mut req = $req;
        if !$caption.is_empty() {
            req = req.caption($caption);
            req = match $formatting {
                Formatting::Entities(entities) => req.caption_entities(entities.clone()),
                Formatting::Html => req.parse_mode(ParseMode::Html),
            };
        }
        req.await?
    }};
}

#[async_trait]
impl RelayOutbound for TelegramOutbound {
    async fn send_text(&self, text: &str, formatting: &Formatting) -> Result<MessageId> {
        let req = self.bot.send_message(self.target, text);
        let message = match formatting {
            Formatting::Entities(entities) => req.entities(entities.clone()).await?,
            Formatting::Html => req.parse_mode(ParseMode::Html).await?,
        };
        debug!(
            chat_id = self.target.0,
            message_id = message.id.0,
            text_len = text.len(),
            "text post published"
        );
        Ok(message.id)
    }

    async fn send_attachment(
        &self,
        attachment: &Attachment,
        file: &ScratchFile,
        caption: &str,
        formatting: &Formatting,
    ) -> Result<MessageId> {
        let bot = &self.bot;
        let chat_id = self.target;
        let input = Self::input_file(attachment, file);

        let message = match attachment.kind {
            AttachmentKind::Photo => send_captioned!(bot.send_photo(chat_id, input), caption, formatting),
            AttachmentKind::Video => send_captioned!(bot.send_video(chat_id, input), caption, formatting),
            AttachmentKind::Document => {
                send_captioned!(bot.send_document(chat_id, input), caption, formatting)
            },
            AttachmentKind::Animation => {
                send_captioned!(bot.send_animation(chat_id, input), caption, formatting)
            },
            AttachmentKind::Audio => send_captioned!(bot.send_audio(chat_id, input), caption, formatting),
            AttachmentKind::Voice => send_captioned!(bot.send_voice(chat_id, input), caption, formatting),
            AttachmentKind::VideoNote => bot.send_video_note(chat_id, input).await?,
        };

        debug!(
            chat_id = chat_id.0,
            message_id = message.id.0,
            kind = %attachment.kind,
            size = file.size,
            caption_len = caption.len(),
            "attachment post published"
        );
        Ok(message.id)
    }
}

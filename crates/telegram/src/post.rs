//! Adapter from teloxide messages to the relay's own post model.

use std::fmt;

use teloxide::types::{
    ChatId, FileMeta, MediaKind, Message, MessageEntity, MessageId, MessageKind,
};

/// What the relay can re-publish. Produced once per post by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Photo,
    Video,
    Document,
    Animation,
    VideoNote,
    Voice,
    Audio,
}

impl AttachmentKind {
    /// Stable lowercase label used in scratch names, logs, and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
            Self::Animation => "animation",
            Self::VideoNote => "video_note",
            Self::Voice => "voice",
            Self::Audio => "audio",
        }
    }

    /// Whether the destination post can carry a caption.
    #[must_use]
    pub fn accepts_caption(self) -> bool {
        !matches!(self, Self::VideoNote)
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote file reference for a post's single attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Opaque reference passed to `getFile`.
    pub file_id: String,
    /// Stable content id; only used in logs.
    pub file_unique_id: String,
    /// Size reported by the platform, when it reported one.
    pub reported_size: Option<u64>,
    /// Original file name for kinds that carry one.
    pub file_name: Option<String>,
}

impl Attachment {
    fn new(kind: AttachmentKind, file: &FileMeta, file_name: Option<&String>) -> Self {
        Self {
            kind,
            file_id: file.id.clone(),
            file_unique_id: file.unique_id.clone(),
            reported_size: (file.size > 0).then_some(u64::from(file.size)),
            file_name: file_name.cloned(),
        }
    }
}

/// How the destination post renders its text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Formatting {
    /// Entities copied from the source message, reproduced exactly.
    Entities(Vec<MessageEntity>),
    /// No source entities; text is sent with HTML parse mode.
    #[default]
    Html,
}

impl Formatting {
    fn from_entities(entities: &[MessageEntity]) -> Self {
        if entities.is_empty() {
            Self::Html
        } else {
            Self::Entities(entities.to_vec())
        }
    }
}

/// One channel post from the source channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPost {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Message text, else caption, else empty.
    pub text: String,
    pub formatting: Formatting,
    pub attachment: Option<Attachment>,
}

/// A channel post whose payload the relay cannot re-publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedMedia(pub &'static str);

impl fmt::Display for UnsupportedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl InboundPost {
    /// Classify a message. Stickers, polls, locations, service messages and
    /// other payloads outside the seven attachment kinds are unsupported.
    pub fn from_message(msg: &Message) -> Result<Self, UnsupportedMedia> {
        let MessageKind::Common(common) = &msg.kind else {
            return Err(UnsupportedMedia("service message"));
        };

        let (text, entities, attachment) = match &common.media_kind {
            MediaKind::Text(t) => (Some(&t.text), t.entities.as_slice(), None),
            MediaKind::Photo(p) => {
                // Largest size is last.
                let largest = p.photo.last().ok_or(UnsupportedMedia("empty photo"))?;
                let attachment = Attachment::new(AttachmentKind::Photo, &largest.file, None);
                (p.caption.as_ref(), p.caption_entities.as_slice(), Some(attachment))
            },
            MediaKind::Video(v) => (
                v.caption.as_ref(),
                v.caption_entities.as_slice(),
                Some(Attachment::new(
                    AttachmentKind::Video,
                    &v.video.file,
                    v.video.file_name.as_ref(),
                )),
            ),
            MediaKind::Document(d) => (
                d.caption.as_ref(),
                d.caption_entities.as_slice(),
                Some(Attachment::new(
                    AttachmentKind::Document,
                    &d.document.file,
                    d.document.file_name.as_ref(),
                )),
            ),
            MediaKind::Animation(a) => (
                a.caption.as_ref(),
                a.caption_entities.as_slice(),
                Some(Attachment::new(
                    AttachmentKind::Animation,
                    &a.animation.file,
                    a.animation.file_name.as_ref(),
                )),
            ),
            MediaKind::Audio(a) => (
                a.caption.as_ref(),
                a.caption_entities.as_slice(),
                Some(Attachment::new(
                    AttachmentKind::Audio,
                    &a.audio.file,
                    a.audio.file_name.as_ref(),
                )),
            ),
            MediaKind::Voice(v) => (
                v.caption.as_ref(),
                v.caption_entities.as_slice(),
                Some(Attachment::new(AttachmentKind::Voice, &v.voice.file, None)),
            ),
            MediaKind::VideoNote(vn) => (
                None,
                &[][..],
                Some(Attachment::new(
                    AttachmentKind::VideoNote,
                    &vn.video_note.file,
                    None,
                )),
            ),
            other => return Err(UnsupportedMedia(describe_media_kind(other))),
        };

        Ok(Self {
            chat_id: msg.chat.id,
            message_id: msg.id,
            text: text.cloned().unwrap_or_default(),
            formatting: Formatting::from_entities(entities),
            attachment,
        })
    }
}

/// Describe a media kind for logging purposes.
fn describe_media_kind(kind: &MediaKind) -> &'static str {
    match kind {
        MediaKind::Contact(_) => "contact",
        MediaKind::Game(_) => "game",
        MediaKind::Location(_) => "location",
        MediaKind::Poll(_) => "poll",
        MediaKind::Sticker(_) => "sticker",
        MediaKind::Venue(_) => "venue",
        _ => "unknown media",
    }
}

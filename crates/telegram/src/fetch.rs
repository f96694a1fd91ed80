use std::path::Path;

use {
    async_trait::async_trait,
    futures::StreamExt,
    teloxide::{net::Download, prelude::*},
    thiserror::Error,
    tokio::io::AsyncWriteExt,
    tracing::debug,
};

#[cfg(feature = "metrics")]
use quietrelay_metrics::{counter, media as media_metrics};

use quietrelay_media::{ScratchDir, ScratchFile, ScratchOrigin, scratch};

use crate::post::Attachment;

/// Errors that end an attachment fetch. The partial file is already gone
/// when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("attachment too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("download failed: {0}")]
    Download(String),
}

/// Retrieves a remote attachment into the scratch area.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, attachment: &Attachment) -> Result<ScratchFile, FetchError>;
}

/// Fetches attachments through the Bot API file endpoint.
pub struct TelegramFetcher {
    bot: Bot,
    scratch: ScratchDir,
    max_size: u64,
}

impl TelegramFetcher {
    #[must_use]
    pub fn new(bot: Bot, scratch: ScratchDir, max_size: u64) -> Self {
        Self {
            bot,
            scratch,
            max_size,
        }
    }

    fn check_size(&self, size: u64) -> Result<(), FetchError> {
        if size > self.max_size {
            return Err(FetchError::TooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Stream `remote` into `dst`, stopping as soon as the limit is crossed.
    async fn download_to(&self, remote: &str, dst: &Path) -> Result<u64, FetchError> {
        let io_err = |e: std::io::Error| FetchError::Download(format!("write failed: {e}"));

        let mut out = tokio::fs::File::create(dst).await.map_err(io_err)?;
        let mut stream = std::pin::pin!(self.bot.download_file_stream(remote));
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Download(format!("stream read failed: {e}")))?;
            written += chunk.len() as u64;
            self.check_size(written)?;
            out.write_all(&chunk).await.map_err(io_err)?;
        }
        out.flush().await.map_err(io_err)?;
        drop(out);

        let on_disk = tokio::fs::metadata(dst).await.map_err(io_err)?.len();
        self.check_size(on_disk)?;
        Ok(on_disk)
    }
}

#[async_trait]
impl AttachmentFetcher for TelegramFetcher {
    async fn fetch(&self, attachment: &Attachment) -> Result<ScratchFile, FetchError> {
        if let Some(size) = attachment.reported_size {
            self.check_size(size)?;
        }

        let file = self
            .bot
            .get_file(&attachment.file_id)
            .await
            .map_err(|e| FetchError::Download(format!("getFile failed: {e}")))?;
        self.check_size(u64::from(file.size))?;

        let path = self.scratch.fresh_path(attachment.kind.as_str());
        match self.download_to(&file.path, &path).await {
            Ok(size) => {
                debug!(
                    file_unique_id = %attachment.file_unique_id,
                    path = %path.display(),
                    size,
                    "attachment fetched"
                );
                #[cfg(feature = "metrics")]
                counter!(media_metrics::ATTACHMENT_BYTES_FETCHED_TOTAL).increment(size);
                Ok(ScratchFile {
                    path,
                    size,
                    origin: ScratchOrigin::Fetched,
                })
            },
            Err(e) => {
                scratch::remove_files([path.as_path()]);
                Err(e)
            },
        }
    }
}

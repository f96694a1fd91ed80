//! Metric name and label definitions.
//!
//! Centralizing these keeps names consistent between the crates that record
//! them.

/// Telegram polling and relay metrics
pub mod telegram {
    /// Updates received from `getUpdates`
    pub const UPDATES_RECEIVED_TOTAL: &str = "quietrelay_telegram_updates_received_total";
    /// Posts published to the destination channel, labelled by `kind`
    pub const POSTS_RELAYED_TOTAL: &str = "quietrelay_telegram_posts_relayed_total";
    /// Posts dropped, labelled by `reason`
    pub const RELAY_FAILURES_TOTAL: &str = "quietrelay_telegram_relay_failures_total";
    /// Channel posts from a chat other than the source
    pub const POSTS_SKIPPED_TOTAL: &str = "quietrelay_telegram_posts_skipped_total";
    /// Time spent handling one post, fetch through publish
    pub const RELAY_DURATION_SECONDS: &str = "quietrelay_telegram_relay_duration_seconds";
    /// `getUpdates` failures
    pub const POLLING_ERRORS_TOTAL: &str = "quietrelay_telegram_polling_errors_total";
}

/// Attachment handling metrics
pub mod media {
    /// Bytes downloaded into the scratch area
    pub const ATTACHMENT_BYTES_FETCHED_TOTAL: &str = "quietrelay_media_attachment_bytes_fetched_total";
    /// Metadata bytes removed by re-encoding
    pub const METADATA_BYTES_STRIPPED_TOTAL: &str = "quietrelay_media_metadata_bytes_stripped_total";
    /// Stale scratch files removed by the periodic sweep
    pub const SCRATCH_FILES_SWEPT_TOTAL: &str = "quietrelay_media_scratch_files_swept_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const REASON: &str = "reason";
}

/// Histogram bucket boundaries
pub mod buckets {
    /// Relay duration buckets (in seconds). A post includes the attachment
    /// download and upload, so the tail reaches the request timeout.
    pub const RELAY_DURATION: &[f64] = &[
        0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
    ];
}

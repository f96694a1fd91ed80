use std::{net::SocketAddr, path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    url::Url,
};

use crate::error::{Error, Result};

pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_TEMP_DIR: &str = "./temp";
pub const DEFAULT_STATS_FILE: &str = "bot_stats.json";
/// Attachment size limit in MiB.
pub const DEFAULT_MAX_FILE_SIZE_MIB: u64 = 50;
pub const DEFAULT_TEMP_MAX_AGE_HOURS: u64 = 24;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Long-polling timeout passed to `getUpdates`. The HTTP client timeout must
/// stay above it or every idle poll aborts client-side.
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Validated runtime configuration for the relay.
#[derive(Clone, Serialize)]
pub struct RelayConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_redacted")]
    pub token: Secret<String>,

    /// Private channel whose posts are relayed.
    pub source_channel_id: i64,

    /// Public channel that receives the relayed posts.
    pub target_channel_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    /// Strip image metadata before publishing (default: true).
    pub clean_metadata: bool,

    pub log_level: String,

    /// Scratch directory for downloaded attachments.
    pub temp_dir: PathBuf,

    /// Maximum attachment size in bytes.
    pub max_file_size: u64,

    pub stats_file: PathBuf,

    /// Scratch files older than this are removed by the periodic sweep.
    pub temp_max_age_hours: u64,

    pub request_timeout_secs: u64,

    /// Listen address for the Prometheus `/metrics` endpoint. Unset disables
    /// metric export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<SocketAddr>,
}

impl RelayConfig {
    #[must_use]
    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_hours * 3600)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Maximum attachment size in whole MiB, for log output.
    #[must_use]
    pub fn max_file_size_mib(&self) -> u64 {
        self.max_file_size / (1024 * 1024)
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("token", &"[REDACTED]")
            .field("source_channel_id", &self.source_channel_id)
            .field("target_channel_id", &self.target_channel_id)
            .field("proxy", &self.proxy)
            .field("clean_metadata", &self.clean_metadata)
            .field("temp_dir", &self.temp_dir)
            .field("max_file_size", &self.max_file_size)
            .field("metrics_addr", &self.metrics_addr)
            .finish_non_exhaustive()
    }
}

/// Outbound proxy for all Bot API traffic.
#[derive(Clone, Serialize)]
pub struct ProxyConfig {
    /// `http://`, `https://`, `socks5://` or `socks5h://` URL.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        serialize_with = "serialize_redacted_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
}

impl ProxyConfig {
    /// The proxy URL with credentials embedded as userinfo.
    ///
    /// Credentials are only applied when both username and password are set;
    /// SOCKS proxies read them from the URL rather than from headers.
    pub fn resolved_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| Error::invalid("PROXY_URL", e))?;
        match url.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {},
            other => {
                return Err(Error::invalid(
                    "PROXY_URL",
                    format!("unsupported proxy scheme '{other}'"),
                ));
            },
        }
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            url.set_username(user)
                .map_err(|()| Error::invalid("PROXY_USERNAME", "cannot be set on this URL"))?;
            url.set_password(Some(pass.expose_secret()))
                .map_err(|()| Error::invalid("PROXY_PASSWORD", "cannot be set on this URL"))?;
        }
        Ok(url)
    }

    /// `scheme://host:port` with any credentials removed, safe for logs.
    #[must_use]
    pub fn display_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or_default();
                match url.port() {
                    Some(port) => format!("{}://{host}:{port}", url.scheme()),
                    None => format!("{}://{host}", url.scheme()),
                }
            },
            Err(_) => self
                .url
                .rsplit('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.display_url())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn serialize_redacted<S: serde::Serializer>(
    _secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str("[REDACTED]")
}

fn serialize_redacted_opt<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

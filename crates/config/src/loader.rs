use std::{net::SocketAddr, path::PathBuf};

use {secrecy::Secret, tracing::warn};

use crate::{
    error::{Error, Result},
    schema::{
        DEFAULT_LOG_LEVEL, DEFAULT_MAX_FILE_SIZE_MIB, DEFAULT_REQUEST_TIMEOUT_SECS,
        DEFAULT_STATS_FILE, DEFAULT_TEMP_DIR, DEFAULT_TEMP_MAX_AGE_HOURS, POLL_TIMEOUT_SECS,
        ProxyConfig, RelayConfig,
    },
};

const REQUIRED_VARS: &[&str] = &["BOT_TOKEN", "SOURCE_CHANNEL_ID", "TARGET_CHANNEL_ID"];

/// Build the relay config from the process environment.
pub fn from_env() -> Result<RelayConfig> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Build the relay config using a custom variable lookup.
///
/// This is the implementation used by [`from_env`]; the separate signature
/// makes it testable without mutating the process environment.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<RelayConfig> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let missing: Vec<String> = REQUIRED_VARS
        .iter()
        .filter(|&&name| get(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::Missing(missing));
    }

    let token = get("BOT_TOKEN").unwrap_or_default();
    let source_channel_id = parse_channel_id("SOURCE_CHANNEL_ID", get("SOURCE_CHANNEL_ID"))?;
    let target_channel_id = parse_channel_id("TARGET_CHANNEL_ID", get("TARGET_CHANNEL_ID"))?;
    if source_channel_id == target_channel_id {
        return Err(Error::invalid(
            "TARGET_CHANNEL_ID",
            "must differ from SOURCE_CHANNEL_ID",
        ));
    }

    let proxy = get("PROXY_URL").map(|url| ProxyConfig {
        url,
        username: get("PROXY_USERNAME"),
        password: get("PROXY_PASSWORD").map(Secret::new),
    });
    if let Some(ref proxy) = proxy {
        // Surface malformed proxy URLs at startup instead of on first request.
        proxy.resolved_url()?;
    }

    let clean_metadata = get("ENABLE_METADATA_CLEANING")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    let max_file_size_mib = parse_u64("MAX_FILE_SIZE", get("MAX_FILE_SIZE"))?
        .unwrap_or(DEFAULT_MAX_FILE_SIZE_MIB);
    if max_file_size_mib == 0 {
        return Err(Error::invalid("MAX_FILE_SIZE", "must be at least 1 MiB"));
    }

    let request_timeout_secs = parse_u64("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"))?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if request_timeout_secs <= POLL_TIMEOUT_SECS {
        return Err(Error::invalid(
            "REQUEST_TIMEOUT_SECS",
            format!("must exceed the {POLL_TIMEOUT_SECS}s long-poll timeout"),
        ));
    }

    let temp_max_age_hours = parse_u64("TEMP_MAX_AGE_HOURS", get("TEMP_MAX_AGE_HOURS"))?
        .unwrap_or(DEFAULT_TEMP_MAX_AGE_HOURS);

    let metrics_addr = get("METRICS_ADDR")
        .map(|raw| {
            raw.trim()
                .parse::<SocketAddr>()
                .map_err(|e| Error::invalid("METRICS_ADDR", format!("'{raw}': {e}")))
        })
        .transpose()?;

    Ok(RelayConfig {
        token: Secret::new(token),
        source_channel_id,
        target_channel_id,
        proxy,
        clean_metadata,
        log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        temp_dir: PathBuf::from(get("TEMP_DIR").unwrap_or_else(|| DEFAULT_TEMP_DIR.to_string())),
        max_file_size: max_file_size_mib * 1024 * 1024,
        stats_file: PathBuf::from(
            get("STATS_FILE").unwrap_or_else(|| DEFAULT_STATS_FILE.to_string()),
        ),
        temp_max_age_hours,
        request_timeout_secs,
        metrics_addr,
    })
}

fn parse_channel_id(var: &str, raw: Option<String>) -> Result<i64> {
    let raw = raw.unwrap_or_default();
    let raw = raw.trim();
    let id = raw
        .parse::<i64>()
        .map_err(|e| Error::invalid(var, format!("'{raw}' is not a chat id: {e}")))?;
    if !raw.starts_with("-100") {
        warn!(var, id, "channel ids normally start with -100");
    }
    Ok(id)
}

fn parse_u64(var: &str, raw: Option<String>) -> Result<Option<u64>> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .map_err(|e| Error::invalid(var, format!("'{v}': {e}")))
    })
    .transpose()
}

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    chrono::{DateTime, Days, Local, TimeDelta},
    serde::{Deserialize, Serialize},
    tracing::{debug, error, warn},
};

use crate::error::Result;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Persisted relay counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub messages_processed: u64,
    pub errors_count: u64,
    pub last_message_time: Option<DateTime<Local>>,
    /// Start of the current process.
    pub uptime_start: DateTime<Local>,
    /// Processed messages keyed by local date (`YYYY-MM-DD`).
    #[serde(default)]
    pub daily_stats: BTreeMap<String, u64>,
}

impl Stats {
    fn fresh(now: DateTime<Local>) -> Self {
        Self {
            messages_processed: 0,
            errors_count: 0,
            last_message_time: None,
            uptime_start: now,
            daily_stats: BTreeMap::new(),
        }
    }
}

/// Message count for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub messages: u64,
}

/// Relay statistics backed by a JSON file.
///
/// The file is rewritten after every recorded message or error, so counters
/// survive restarts. Persistence failures are logged and never propagate to
/// the relay.
pub struct Monitor {
    path: PathBuf,
    /// std::sync::Mutex: no lock is ever held across an `.await` point.
    stats: Mutex<Stats>,
    /// Held from mutation through the file write, so snapshots reach disk in
    /// the order they were taken and only one writer uses the temp file.
    persist: Mutex<()>,
}

impl Monitor {
    /// Load stats from `path`, starting fresh when the file is absent or
    /// unreadable. The uptime clock always restarts.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_at(path.into(), Local::now())
    }

    fn load_at(path: PathBuf, now: DateTime<Local>) -> Self {
        let stats = match read_stats(&path) {
            Ok(Some(mut stats)) => {
                debug!(path = %path.display(), processed = stats.messages_processed, "loaded relay stats");
                stats.uptime_start = now;
                stats
            },
            Ok(None) => Stats::fresh(now),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load relay stats, starting fresh");
                Stats::fresh(now)
            },
        };
        Self {
            path,
            stats: Mutex::new(stats),
            persist: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one successfully relayed message.
    pub fn record_message_processed(&self) {
        self.record_message_processed_at(Local::now());
    }

    fn record_message_processed_at(&self, now: DateTime<Local>) {
        self.update(|stats| {
            stats.messages_processed += 1;
            stats.last_message_time = Some(now);
            *stats
                .daily_stats
                .entry(now.format(DAY_FORMAT).to_string())
                .or_insert(0) += 1;
        });
    }

    /// Record one failure. The message is logged, only the count is stored.
    pub fn record_error(&self, message: &str) {
        error!(error = message, "relay error recorded");
        self.update(|stats| stats.errors_count += 1);
    }

    #[must_use]
    pub fn snapshot(&self) -> Stats {
        self.lock().clone()
    }

    #[must_use]
    pub fn uptime(&self) -> TimeDelta {
        Local::now() - self.lock().uptime_start
    }

    /// Counts for the last `days` days, most recent first. Days without
    /// messages report zero.
    #[must_use]
    pub fn daily_stats(&self, days: u64) -> Vec<DailyCount> {
        self.daily_stats_at(days, Local::now())
    }

    fn daily_stats_at(&self, days: u64, now: DateTime<Local>) -> Vec<DailyCount> {
        let stats = self.lock();
        (0..days)
            .filter_map(|offset| now.checked_sub_days(Days::new(offset)))
            .map(|day| {
                let date = day.format(DAY_FORMAT).to_string();
                let messages = stats.daily_stats.get(&date).copied().unwrap_or(0);
                DailyCount { date, messages }
            })
            .collect()
    }

    /// Write the current stats to disk.
    pub fn flush(&self) -> Result<()> {
        let _writer = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        let stats = self.snapshot();
        write_stats(&self.path, &stats)
    }

    fn update(&self, f: impl FnOnce(&mut Stats)) {
        let _writer = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        let stats = {
            let mut guard = self.lock();
            f(&mut guard);
            guard.clone()
        };
        if let Err(e) = write_stats(&self.path, &stats) {
            warn!(path = %self.path.display(), error = %e, "failed to save relay stats");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_stats(path: &Path) -> Result<Option<Stats>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a sibling temp file and rename so a crash never leaves a torn
/// stats file behind.
fn write_stats(path: &Path, stats: &Stats) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(stats)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

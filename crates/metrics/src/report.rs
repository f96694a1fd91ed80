use std::fmt;

use {chrono::TimeDelta, serde::Serialize};

use crate::stats::{DailyCount, Monitor};

/// Days covered by the breakdown in a [`HealthReport`].
pub const REPORT_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy { error: String },
    /// Counters only; no connectivity check was made.
    Unchecked,
}

impl HealthStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Point-in-time summary of connectivity and relay counters.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub bot_username: Option<String>,
    pub source_title: Option<String>,
    pub target_title: Option<String>,
    /// Uptime of the running relay. `None` when the report is built outside
    /// the relay process, where the uptime clock was never started.
    #[serde(serialize_with = "serialize_uptime", skip_serializing_if = "Option::is_none")]
    pub uptime: Option<TimeDelta>,
    pub messages_processed: u64,
    pub errors_count: u64,
    pub daily: Vec<DailyCount>,
}

impl HealthReport {
    /// Report for a successful connectivity check.
    #[must_use]
    pub fn healthy(
        monitor: &Monitor,
        bot_username: impl Into<String>,
        source_title: impl Into<String>,
        target_title: impl Into<String>,
    ) -> Self {
        let mut report = Self::base(monitor, HealthStatus::Healthy);
        report.bot_username = Some(bot_username.into());
        report.source_title = Some(source_title.into());
        report.target_title = Some(target_title.into());
        report
    }

    /// Report for a failed connectivity check.
    #[must_use]
    pub fn unhealthy(monitor: &Monitor, error: impl Into<String>) -> Self {
        Self::base(monitor, HealthStatus::Unhealthy {
            error: error.into(),
        })
    }

    /// Counters only, without a connectivity check.
    #[must_use]
    pub fn offline(monitor: &Monitor) -> Self {
        let mut report = Self::base(monitor, HealthStatus::Unchecked);
        report.uptime = None;
        report
    }

    fn base(monitor: &Monitor, status: HealthStatus) -> Self {
        let stats = monitor.snapshot();
        Self {
            status,
            bot_username: None,
            source_title: None,
            target_title: None,
            uptime: Some(monitor.uptime()),
            messages_processed: stats.messages_processed,
            errors_count: stats.errors_count,
            daily: monitor.daily_stats(REPORT_DAYS),
        }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Relay health report")?;
        writeln!(f)?;
        match &self.status {
            HealthStatus::Healthy => writeln!(f, "Status: healthy")?,
            HealthStatus::Unhealthy { error } => writeln!(f, "Status: unhealthy ({error})")?,
            HealthStatus::Unchecked => writeln!(f, "Status: not checked")?,
        }
        if let Some(username) = &self.bot_username {
            writeln!(f, "Bot: @{username}")?;
        }
        if let Some(uptime) = self.uptime {
            writeln!(f, "Uptime: {}", format_uptime(uptime))?;
        }
        writeln!(f, "Messages processed: {}", self.messages_processed)?;
        writeln!(f, "Errors: {}", self.errors_count)?;

        if let (Some(source), Some(target)) = (&self.source_title, &self.target_title) {
            writeln!(f)?;
            writeln!(f, "Source channel: {source}")?;
            writeln!(f, "Target channel: {target}")?;
        }

        if !self.daily.is_empty() {
            writeln!(f)?;
            writeln!(f, "Last {} days:", self.daily.len())?;
            for day in &self.daily {
                writeln!(f, "  {}: {} messages", day.date, day.messages)?;
            }
        }
        Ok(())
    }
}

/// `3d 4h 05m 10s`, dropping leading zero units.
fn format_uptime(uptime: TimeDelta) -> String {
    let total = uptime.num_seconds().max(0);
    let (days, hours) = (total / 86_400, (total % 86_400) / 3600);
    let (minutes, seconds) = ((total % 3600) / 60, total % 60);
    match (days, hours) {
        (0, 0) => format!("{minutes}m {seconds:02}s"),
        (0, _) => format!("{hours}h {minutes:02}m {seconds:02}s"),
        _ => format!("{days}d {hours}h {minutes:02}m {seconds:02}s"),
    }
}

fn serialize_uptime<S: serde::Serializer>(
    uptime: &Option<TimeDelta>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match uptime {
        Some(uptime) => s.serialize_i64(uptime.num_seconds()),
        None => s.serialize_none(),
    }
}

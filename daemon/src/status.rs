use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::sink::{Indicator, IndicatorSink};

/// Runtime status written by the daemon to %APPDATA%\Connmon\status.toml.
/// A tray front end reads this file (read-only) to pick its icon.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Aggregate connection indicator from the latest tick.
    pub indicator: Indicator,
    /// Number of disconnect alerts raised since the daemon started.
    pub alerts_fired: u32,
    /// RFC 3339 timestamp of the most recent disconnect alert, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert_timestamp: Option<String>,
}

impl MonitorStatus {
    /// Constructs the initial dormant status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            indicator: Indicator::Dormant,
            alerts_fired: 0,
            last_alert_timestamp: None,
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than panicking. A status write failure must
/// never crash the daemon.
pub fn write_status(path: &Path, status: &MonitorStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                error!("Failed to write status file: {e}");
            }
        }
        Err(e) => error!("Failed to serialize status: {e}"),
    }
}

/// [`IndicatorSink`] that logs every change and mirrors it into the status file.
pub struct StatusFileSink {
    path: PathBuf,
    status: MonitorStatus,
}

impl StatusFileSink {
    /// Creates the sink and writes the initial dormant status.
    pub fn new(path: PathBuf) -> Self {
        let sink = Self { path, status: MonitorStatus::new() };
        write_status(&sink.path, &sink.status);
        sink
    }

    #[cfg(test)]
    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }
}

impl IndicatorSink for StatusFileSink {
    fn set_indicator(&mut self, indicator: Indicator) {
        if indicator != self.status.indicator {
            info!(from = %self.status.indicator, to = %indicator, "Indicator changed");
        }
        self.status.indicator = indicator;
        write_status(&self.path, &self.status);
    }

    fn disconnect_detected(&mut self) {
        warn!("Path of Exile seems to have disconnected");
        self.status.alerts_fired += 1;
        self.status.last_alert_timestamp = Some(chrono::Local::now().to_rfc3339());
        write_status(&self.path, &self.status);
    }
}

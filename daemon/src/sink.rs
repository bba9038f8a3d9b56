use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate status of all tracked client processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// No client process is running.
    Dormant,
    /// At least one client is on the login screen (disconnected).
    Offline,
    /// Every running client is connected.
    Online,
}

impl Indicator {
    pub fn from_tick(matched: usize, any_disconnected: bool) -> Self {
        if matched == 0 {
            Indicator::Dormant
        } else if any_disconnected {
            Indicator::Offline
        } else {
            Indicator::Online
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Indicator::Dormant => "dormant",
            Indicator::Offline => "offline",
            Indicator::Online => "online",
        })
    }
}

/// Receives the monitor's output. Presentation (tray icon, toast, status
/// file) is up to the implementation; errors never flow back to the monitor.
pub trait IndicatorSink {
    /// Called once per tick with the current aggregate, changed or not.
    fn set_indicator(&mut self, indicator: Indicator);

    /// Called when a client has been disconnected past the debounce window.
    fn disconnect_detected(&mut self);
}

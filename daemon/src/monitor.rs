use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::endpoints::EndpointSampler;
use crate::phase::{self, TARGET_EXECUTABLE};
use crate::process_monitor::ProcessLocator;
use crate::sink::{Indicator, IndicatorSink};
use crate::state::{ConnectionState, DISCONNECT_DEBOUNCE};

/// What one tick observed, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub indicator: Indicator,
    pub matched: usize,
    pub alerts: usize,
    pub culled: usize,
}

/// Owns the tracked-process map and the OS services it polls.
///
/// A single task drives [`Monitor::tick`]; nothing else reads or writes the
/// map, so it needs no locking.
pub struct Monitor<L, S> {
    locator: L,
    sampler: S,
    executable: String,
    debounce: Duration,
    tracked: BTreeMap<u32, ConnectionState>,
}

impl<L: ProcessLocator, S: EndpointSampler> Monitor<L, S> {
    /// Monitor for the game client with the standard debounce window.
    pub fn new(locator: L, sampler: S) -> Self {
        Self::with_target(locator, sampler, TARGET_EXECUTABLE, DISCONNECT_DEBOUNCE)
    }

    pub fn with_target(locator: L, sampler: S, executable: &str, debounce: Duration) -> Self {
        Self {
            locator,
            sampler,
            executable: executable.to_string(),
            debounce,
            tracked: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn tracked(&self) -> &BTreeMap<u32, ConnectionState> {
        &self.tracked
    }

    /// Runs one polling cycle. Never fails: OS errors have already been
    /// folded into empty results by the locator and sampler.
    pub fn tick(&mut self, now: Instant, sink: &mut impl IndicatorSink) -> TickSummary {
        let matches = self.locator.locate(&self.executable);
        let mut any_disconnected = false;
        let mut alerts = 0;

        for &pid in &matches {
            let state = self.tracked.entry(pid).or_insert_with(|| {
                info!(pid, "Tracking new client process");
                ConnectionState::new(now)
            });

            let ports = self.sampler.remote_ports(pid);
            let detected = phase::classify(&ports);
            if let Some(t) = state.observe(detected, now) {
                info!(pid, from = %t.from, to = %t.to, "Phase changed");
            }

            if state.poll_alert(now, self.debounce) {
                debug!(pid, "Client disconnected for longer than {:?}", self.debounce);
                sink.disconnect_detected();
                alerts += 1;
            }

            any_disconnected |= state.is_disconnected();
        }

        let indicator = Indicator::from_tick(matches.len(), any_disconnected);
        sink.set_indicator(indicator);

        // Two-phase cull: collect first, erase after the scan.
        let stale: Vec<u32> = self
            .tracked
            .keys()
            .filter(|pid| !matches.contains(*pid))
            .copied()
            .collect();
        for pid in &stale {
            self.tracked.remove(pid);
            info!(pid = *pid, "Client process exited");
        }

        let summary = TickSummary {
            indicator,
            matched: matches.len(),
            alerts,
            culled: stale.len(),
        };
        debug!(?summary, "Tick complete");
        summary
    }
}

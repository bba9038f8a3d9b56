use std::time::{Duration, Instant};

use crate::phase::Phase;

/// Minimum length of a disconnection episode before an alert fires.
pub const DISCONNECT_DEBOUNCE: Duration = Duration::from_secs(9);

/// A phase change reported by [`ConnectionState::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

/// Per-process connection bookkeeping.
///
/// `disconnect_since` is set for exactly as long as `phase` is [`Phase::Login`].
/// `notified_since` is only ever set while `disconnect_since` is set, which
/// limits alerts to one per disconnection episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    phase: Phase,
    disconnect_since: Option<Instant>,
    notified_since: Option<Instant>,
}

impl ConnectionState {
    /// A freshly observed process starts on the login screen, so its first
    /// disconnection episode begins at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            phase: Phase::Login,
            disconnect_since: Some(now),
            notified_since: None,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn disconnect_since(&self) -> Option<Instant> {
        self.disconnect_since
    }

    #[cfg(test)]
    pub fn notified_since(&self) -> Option<Instant> {
        self.notified_since
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnect_since.is_some()
    }

    /// Applies a new classification. Returns the transition if the phase changed.
    pub fn observe(&mut self, phase: Phase, now: Instant) -> Option<Transition> {
        if phase == self.phase {
            return None;
        }
        let transition = Transition { from: self.phase, to: phase };
        self.phase = phase;
        self.disconnect_since = if phase == Phase::Login { Some(now) } else { None };
        // Any phase change, even Gateway <-> Ingame, resets the alert bookkeeping.
        self.notified_since = None;
        Some(transition)
    }

    /// Returns `true` exactly once per episode, on the first call where the
    /// episode has lasted strictly longer than `threshold`.
    pub fn poll_alert(&mut self, now: Instant, threshold: Duration) -> bool {
        let Some(since) = self.disconnect_since else {
            return false;
        };
        if self.notified_since.is_some() || now.saturating_duration_since(since) <= threshold {
            return false;
        }
        self.notified_since = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    // ── new ───────────────────────────────────────────────────────────────────

    #[test]
    fn new_state_is_disconnected_login() {
        let t0 = Instant::now();
        let s = ConnectionState::new(t0);
        assert_eq!(s.phase(), Phase::Login);
        assert_eq!(s.disconnect_since(), Some(t0));
        assert!(s.notified_since().is_none());
    }

    // ── observe ───────────────────────────────────────────────────────────────

    #[test]
    fn same_phase_is_a_no_op() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        assert!(s.observe(Phase::Login, t0 + secs(5)).is_none());
        assert_eq!(s.disconnect_since(), Some(t0));

        s.observe(Phase::Ingame, t0 + secs(6));
        let before = s.clone();
        assert!(s.observe(Phase::Ingame, t0 + secs(7)).is_none());
        assert_eq!(s, before);
    }

    #[test]
    fn leaving_login_clears_disconnect() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        let t = s.observe(Phase::Gateway, t0 + secs(1));
        assert_eq!(t, Some(Transition { from: Phase::Login, to: Phase::Gateway }));
        assert!(!s.is_disconnected());
    }

    #[test]
    fn entering_login_starts_new_episode() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        s.observe(Phase::Ingame, t0 + secs(1));
        s.observe(Phase::Login, t0 + secs(20));
        assert_eq!(s.disconnect_since(), Some(t0 + secs(20)));
    }

    #[test]
    fn non_login_transition_clears_notification() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        assert!(s.poll_alert(t0 + secs(10), DISCONNECT_DEBOUNCE));
        s.observe(Phase::Gateway, t0 + secs(11));
        assert!(s.notified_since().is_none());
        s.observe(Phase::Ingame, t0 + secs(12));
        assert!(s.notified_since().is_none());
        assert!(!s.is_disconnected());
    }

    // ── poll_alert ────────────────────────────────────────────────────────────

    #[test]
    fn no_alert_before_threshold() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        assert!(!s.poll_alert(t0 + secs(5), DISCONNECT_DEBOUNCE));
        assert!(!s.poll_alert(t0 + secs(9), DISCONNECT_DEBOUNCE));
    }

    #[test]
    fn alert_fires_once_after_threshold() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        assert!(s.poll_alert(t0 + secs(10), DISCONNECT_DEBOUNCE));
        assert_eq!(s.notified_since(), Some(t0 + secs(10)));
        assert!(!s.poll_alert(t0 + secs(15), DISCONNECT_DEBOUNCE));
        assert!(!s.poll_alert(t0 + secs(600), DISCONNECT_DEBOUNCE));
    }

    #[test]
    fn short_disconnect_never_alerts() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        s.observe(Phase::Gateway, t0);
        s.observe(Phase::Login, t0 + secs(1));
        assert!(!s.poll_alert(t0 + secs(6), DISCONNECT_DEBOUNCE));
        s.observe(Phase::Gateway, t0 + secs(9));
        assert!(!s.poll_alert(t0 + secs(30), DISCONNECT_DEBOUNCE));
    }

    #[test]
    fn reconnect_rearms_alert() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        assert!(s.poll_alert(t0 + secs(10), DISCONNECT_DEBOUNCE));

        s.observe(Phase::Ingame, t0 + secs(15));
        s.observe(Phase::Login, t0 + secs(20));
        assert!(!s.poll_alert(t0 + secs(25), DISCONNECT_DEBOUNCE));
        assert!(s.poll_alert(t0 + secs(30), DISCONNECT_DEBOUNCE));
    }

    #[test]
    fn connected_state_never_alerts() {
        let t0 = Instant::now();
        let mut s = ConnectionState::new(t0);
        s.observe(Phase::Ingame, t0);
        assert!(!s.poll_alert(t0 + secs(3600), DISCONNECT_DEBOUNCE));
    }
}

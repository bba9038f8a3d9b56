use std::collections::BTreeSet;
use std::fmt;

/// Executable filename of the monitored game client.
pub const TARGET_EXECUTABLE: &str = "PathOfExile.exe";

/// Remote ports held open while the client sits on character select.
pub const GATEWAY_PORTS: [u16; 2] = [20481, 20471];

/// Remote ports held open while the client is connected to a game instance.
pub const INGAME_PORTS: [u16; 2] = [6112, 6103];

/// Connectivity stage of a client process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No recognised game connection: login screen, or disconnected.
    Login,
    /// Connected to the gateway (character select).
    Gateway,
    /// Connected to a game instance.
    Ingame,
}

impl Phase {
    /// Human-readable label for log output.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Login => "Login screen",
            Phase::Gateway => "Character select",
            Phase::Ingame => "In-game",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps the remote ports observed for a process to its phase.
///
/// In-game ports win over gateway ports when both are present.
pub fn classify(ports: &BTreeSet<u16>) -> Phase {
    let mut phase = Phase::Login;
    if GATEWAY_PORTS.iter().any(|p| ports.contains(p)) {
        phase = Phase::Gateway;
    }
    if INGAME_PORTS.iter().any(|p| ports.contains(p)) {
        phase = Phase::Ingame;
    }
    phase
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(list: &[u16]) -> BTreeSet<u16> {
        list.iter().copied().collect()
    }

    // ── classify ──────────────────────────────────────────────────────────────

    #[test]
    fn empty_set_is_login() {
        assert_eq!(classify(&BTreeSet::new()), Phase::Login);
    }

    #[test]
    fn unrecognised_ports_are_login() {
        assert_eq!(classify(&ports(&[80, 443, 8080, 20480, 6111])), Phase::Login);
    }

    #[test]
    fn each_gateway_port_is_gateway() {
        for port in GATEWAY_PORTS {
            assert_eq!(classify(&ports(&[443, port])), Phase::Gateway, "port {port}");
        }
    }

    #[test]
    fn each_ingame_port_is_ingame() {
        for port in INGAME_PORTS {
            assert_eq!(classify(&ports(&[port])), Phase::Ingame, "port {port}");
        }
    }

    #[test]
    fn ingame_wins_over_gateway() {
        assert_eq!(classify(&ports(&[20481, 6112])), Phase::Ingame);
        assert_eq!(classify(&ports(&[20471, 20481, 6103, 443])), Phase::Ingame);
    }

    // ── labels ────────────────────────────────────────────────────────────────

    #[test]
    fn display_uses_label() {
        assert_eq!(Phase::Login.to_string(), "Login screen");
        assert_eq!(Phase::Gateway.to_string(), "Character select");
        assert_eq!(Phase::Ingame.to_string(), "In-game");
    }
}

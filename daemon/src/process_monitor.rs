use std::collections::BTreeSet;
use std::ffi::OsStr;
use sysinfo::{ProcessesToUpdate, System};

/// Finds running processes by executable name.
pub trait ProcessLocator {
    /// Returns the ids of every running process whose executable name equals
    /// `executable_name`. Enumeration failures yield an empty set.
    fn locate(&mut self, executable_name: &str) -> BTreeSet<u32>;
}

/// [`ProcessLocator`] backed by the `sysinfo` process list.
///
/// The [`System`] is kept across calls so each refresh only updates the
/// process table instead of rebuilding everything.
pub struct SystemProcessLocator {
    sys: System,
}

impl SystemProcessLocator {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl ProcessLocator for SystemProcessLocator {
    fn locate(&mut self, executable_name: &str) -> BTreeSet<u32> {
        // Dead processes must be dropped here, otherwise an exited client
        // would keep matching and never be culled.
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        matching_pids(
            self.sys
                .processes()
                .iter()
                .map(|(pid, p)| (pid.as_u32(), p.name())),
            executable_name,
        )
    }
}

/// Exact (case-sensitive) name match, like the OS's own short-filename comparison.
fn matching_pids<'a>(
    processes: impl Iterator<Item = (u32, &'a OsStr)>,
    executable_name: &str,
) -> BTreeSet<u32> {
    let target = OsStr::new(executable_name);
    processes
        .filter(|(_, name)| *name == target)
        .map(|(pid, _)| pid)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<(u32, &'static OsStr)> {
        vec![
            (4, OsStr::new("System")),
            (1200, OsStr::new("PathOfExile.exe")),
            (1300, OsStr::new("explorer.exe")),
            (1400, OsStr::new("PathOfExile.exe")),
            (1500, OsStr::new("pathofexile.exe")),
            (1600, OsStr::new("PathOfExile.exe.bak")),
        ]
    }

    #[test]
    fn matches_every_process_with_exact_name() {
        let pids = matching_pids(table().into_iter(), "PathOfExile.exe");
        assert_eq!(pids, BTreeSet::from([1200, 1400]));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let pids = matching_pids(table().into_iter(), "pathofexile.exe");
        assert_eq!(pids, BTreeSet::from([1500]));
    }

    #[test]
    fn no_match_is_empty_not_error() {
        assert!(matching_pids(table().into_iter(), "Game.exe").is_empty());
        assert!(matching_pids(std::iter::empty(), "PathOfExile.exe").is_empty());
    }

    #[test]
    fn live_locator_does_not_panic_on_unknown_name() {
        let mut locator = SystemProcessLocator::new();
        assert!(locator.locate("connmon-test-no-such-process.exe").is_empty());
    }
}

//! System conflict probing.
//!
//! Answers "is this combination already claimed outside this process?".
//! The answer is racy against other processes by nature; callers re-probe
//! on demand instead of caching.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::{BackendError, SystemHotkeyBackend};
use super::types::{Hotkey, Shortcut};

/// Capability consumed by the registry's conflict classifier.
pub trait SystemConflictProbe: Send + Sync {
    fn has_system_conflict(&self, hotkey: &Hotkey) -> bool;
}

/// Probe by claiming the hotkey through the OS backend and releasing it again.
///
/// Never leaves the combination claimed: a successful probe registration is
/// released before returning.
pub struct BackendProbe {
    backend: Arc<dyn SystemHotkeyBackend>,
}

impl BackendProbe {
    pub fn new(backend: Arc<dyn SystemHotkeyBackend>) -> Self {
        Self { backend }
    }
}

impl SystemConflictProbe for BackendProbe {
    fn has_system_conflict(&self, hotkey: &Hotkey) -> bool {
        if !hotkey.is_valid() {
            return false;
        }

        match self.backend.register(hotkey.to_shortcut()) {
            Ok(id) => {
                if let Err(e) = self.backend.unregister(id) {
                    warn!(hotkey = %hotkey, id, error = %e, "Failed to release probe registration");
                }
                false
            }
            Err(BackendError::AlreadyRegistered(_)) => {
                debug!(hotkey = %hotkey, "Probe: hotkey is claimed by the system");
                true
            }
            Err(e) => {
                debug!(hotkey = %hotkey, error = %e, "Probe inconclusive, treating as free");
                false
            }
        }
    }
}

/// Static list of well-known OS-reserved combinations.
///
/// Used when no OS backend can be started (headless sessions, CI).
pub struct ReservedShortcutsProbe {
    reserved: HashSet<Shortcut>,
}

impl ReservedShortcutsProbe {
    pub fn new(reserved: impl IntoIterator<Item = Shortcut>) -> Self {
        Self {
            reserved: reserved.into_iter().collect(),
        }
    }

    /// Reserved combinations for the current platform.
    pub fn for_current_platform() -> Self {
        let names: &[&str] = {
            #[cfg(target_os = "windows")]
            {
                &[
                    "win+d", // Show desktop
                    "win+e", // File Explorer
                    "win+l", // Lock
                    "win+r", // Run
                    "win+tab",
                    "alt+tab",
                    "alt+f4",
                    "ctrl+alt+delete",
                    "ctrl+shift+escape", // Task Manager
                ]
            }
            #[cfg(target_os = "macos")]
            {
                &[
                    "win+tab", // App switcher
                    "win+shift+tab",
                    "win+space", // Spotlight
                    "win+ctrl+q",
                    "win+shift+3",
                    "win+shift+4",
                    "win+shift+5",
                ]
            }
            #[cfg(not(any(target_os = "windows", target_os = "macos")))]
            {
                &["alt+tab", "win+tab", "ctrl+alt+t", "ctrl+alt+delete"]
            }
        };

        Self::new(names.iter().filter_map(|name| Shortcut::parse(name).ok()))
    }
}

impl SystemConflictProbe for ReservedShortcutsProbe {
    fn has_system_conflict(&self, hotkey: &Hotkey) -> bool {
        hotkey.is_valid() && self.reserved.contains(&hotkey.to_shortcut())
    }
}

/// Probe that never reports a system conflict.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSystemConflicts;

impl SystemConflictProbe for NoSystemConflicts {
    fn has_system_conflict(&self, _hotkey: &Hotkey) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::testing::MockBackend;
    use crate::hotkeys::types::{MOD_ALT, MOD_CONTROL};

    fn ctrl_alt(key: u8) -> Hotkey {
        Hotkey::new(false, true, false, true, key)
    }

    #[test]
    fn free_hotkey_is_claimed_then_released() {
        let backend = Arc::new(MockBackend::new());
        let probe = BackendProbe::new(backend.clone());

        assert!(!probe.has_system_conflict(&ctrl_alt(0x54)));
        assert_eq!(backend.register_calls(), 1);
        assert!(backend.active_registrations().is_empty());
    }

    #[test]
    fn taken_hotkey_reports_conflict_without_claiming() {
        let backend = Arc::new(MockBackend::new());
        backend.reserve(Shortcut::new(MOD_CONTROL | MOD_ALT, 0x54));
        let probe = BackendProbe::new(backend.clone());

        assert!(probe.has_system_conflict(&ctrl_alt(0x54)));
        assert!(backend.active_registrations().is_empty());
    }

    #[test]
    fn invalid_hotkey_is_never_probed() {
        let backend = Arc::new(MockBackend::new());
        let probe = BackendProbe::new(backend.clone());

        assert!(!probe.has_system_conflict(&Hotkey::new(false, false, false, false, 0x54)));
        assert!(!probe.has_system_conflict(&Hotkey::new(false, true, false, false, 0)));
        assert_eq!(backend.register_calls(), 0);
    }

    #[test]
    fn other_backend_failures_are_not_conflicts() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_with(Shortcut::new(MOD_CONTROL | MOD_ALT, 0x54), "no display");
        let probe = BackendProbe::new(backend);

        assert!(!probe.has_system_conflict(&ctrl_alt(0x54)));
    }

    #[test]
    fn reserved_list_probe_matches_exact_combination() {
        let probe = ReservedShortcutsProbe::new([Shortcut::parse("ctrl+alt+t").unwrap()]);
        assert!(probe.has_system_conflict(&ctrl_alt(0x54)));
        assert!(!probe.has_system_conflict(&Hotkey::new(false, true, true, true, 0x54)));
    }

    #[test]
    fn platform_reserved_list_is_populated() {
        let probe = ReservedShortcutsProbe::for_current_platform();
        assert!(!probe.reserved.is_empty());
        assert!(probe.reserved.iter().all(|s| s.to_hotkey().is_valid()));
    }
}

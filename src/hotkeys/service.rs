//! Module-facing hotkey API.
//!
//! Feature modules only see register / unregister / unregister-all; the
//! service keeps the registry and the OS registrations in step.

use std::sync::Arc;

use tracing::info;

use super::action::{HotkeyAction, Mechanism};
use super::backend::SystemHotkeyBackend;
use super::conflict::ConflictKind;
use super::dispatch::DispatchFrontEnd;
use super::registry::HotkeyRegistry;
use super::types::Hotkey;

pub struct HotkeyService {
    front_end: Arc<DispatchFrontEnd>,
}

impl HotkeyService {
    pub fn new(registry: Arc<HotkeyRegistry>, backend: Arc<dyn SystemHotkeyBackend>) -> Self {
        Self::from_front_end(Arc::new(DispatchFrontEnd::new(registry, backend)))
    }

    pub fn from_front_end(front_end: Arc<DispatchFrontEnd>) -> Self {
        Self { front_end }
    }

    pub fn registry(&self) -> &Arc<HotkeyRegistry> {
        self.front_end.registry()
    }

    pub fn front_end(&self) -> &Arc<DispatchFrontEnd> {
        &self.front_end
    }

    /// Claim `hotkey` for `(module_name, hotkey_name)`.
    ///
    /// Shortcut actions are registered with the OS right away when the
    /// combination has no other in-process owner.
    pub fn register(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
        action: HotkeyAction,
    ) -> bool {
        let hotkey = hotkey.into();
        let mechanism = action.mechanism();
        if !self
            .registry()
            .add_record(hotkey, module_name, hotkey_name, action)
        {
            return false;
        }
        if mechanism == Mechanism::Shortcut {
            self.front_end.register_handle(hotkey.handle());
        }
        true
    }

    /// Release everything `module_name` holds on `hotkey`.
    pub fn unregister(&self, hotkey: impl Into<Hotkey>, module_name: &str) -> usize {
        let hotkey = hotkey.into();
        let handle = hotkey.handle();
        self.front_end.release_handle(handle, module_name);
        let removed = self.registry().remove_record(hotkey, module_name);
        if removed > 0 {
            self.front_end.register_handle(handle);
        }
        removed
    }

    /// Release every hotkey of `module_name` (module disabled or unloaded).
    pub fn unregister_all(&self, module_name: &str) -> usize {
        let shortcuts = self.front_end.unregister_module(module_name);
        let hooks = self
            .registry()
            .remove_record_by_module(module_name, Mechanism::Hook)
            .len();
        info!(
            event_type = "module_unregistered",
            module = module_name,
            shortcuts,
            hooks,
            "Module hotkeys released"
        );
        shortcuts + hooks
    }

    pub fn has_conflict(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
    ) -> ConflictKind {
        self.registry().has_conflict(hotkey, module_name, hotkey_name)
    }
}

impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.front_end.unregister_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::probe::NoSystemConflicts;
    use crate::hotkeys::registry::RegistryOptions;
    use crate::hotkeys::testing::MockBackend;

    fn ctrl_alt(key: u8) -> Hotkey {
        Hotkey::new(false, true, false, true, key)
    }

    fn noop_shortcut() -> HotkeyAction {
        HotkeyAction::parameterized(|_, _| {})
    }

    fn service() -> (HotkeyService, Arc<MockBackend>) {
        let registry = Arc::new(HotkeyRegistry::new(
            Arc::new(NoSystemConflicts),
            RegistryOptions::default(),
        ));
        let backend = Arc::new(MockBackend::new());
        (HotkeyService::new(registry, backend.clone()), backend)
    }

    #[test]
    fn register_shortcut_claims_os_hotkey() {
        let (service, backend) = service();
        assert!(service.register(
            ctrl_alt(0x54),
            "Launcher",
            "Open",
            HotkeyAction::parameterized(|_, _| {})
        ));
        assert_eq!(backend.active_registrations().len(), 1);
        assert_eq!(
            service.has_conflict(ctrl_alt(0x54), "Launcher", "Open"),
            ConflictKind::NoConflict
        );
    }

    #[test]
    fn register_hook_does_not_touch_os() {
        let (service, backend) = service();
        assert!(service.register(ctrl_alt(0x54), "Peek", "Toggle", HotkeyAction::simple(|| true)));
        assert_eq!(backend.register_calls(), 0);
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let (service, _backend) = service();
        let action = HotkeyAction::parameterized(|_, _| {});
        assert!(service.register(ctrl_alt(0x54), "Launcher", "Open", action.clone()));
        assert!(!service.register(ctrl_alt(0x54), "Launcher", "Open", action));
    }

    #[test]
    fn unregister_releases_os_claim() {
        let (service, backend) = service();
        service.register(
            ctrl_alt(0x54),
            "Launcher",
            "Open",
            HotkeyAction::parameterized(|_, _| {}),
        );

        assert_eq!(service.unregister(ctrl_alt(0x54), "Launcher"), 1);
        assert!(backend.active_registrations().is_empty());
        assert!(service.registry().is_empty());
    }

    #[test]
    fn unregister_all_removes_both_mechanisms_for_one_module() {
        let (service, backend) = service();
        service.register(ctrl_alt(0x54), "Launcher", "Open", noop_shortcut());
        service.register(ctrl_alt(0x55), "Launcher", "Peek", HotkeyAction::simple(|| true));
        service.register(ctrl_alt(0x56), "Other", "Keep", noop_shortcut());

        assert_eq!(service.unregister_all("Launcher"), 2);
        assert_eq!(service.registry().len(), 1);
        assert_eq!(backend.active_registrations(), vec![ctrl_alt(0x56).to_shortcut()]);
    }

    #[test]
    fn drop_releases_os_registrations() {
        let (service, backend) = service();
        service.register(ctrl_alt(0x54), "Launcher", "Open", noop_shortcut());
        drop(service);
        assert!(backend.active_registrations().is_empty());
    }
}

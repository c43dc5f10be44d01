//! Dispatch front-end
//!
//! Two delivery paths reach registry actions:
//! - OS-registered shortcuts: the OS reports "registration id N fired";
//!   the id is mapped back to the entry captured at registration time.
//! - Hook-based hotkeys: every key-down is matched against the live modifier
//!   state, consumed when it hits a hook entry, and followed by a dummy
//!   key-up so the OS does not act on the lone modifier (e.g. the Start menu).
//!
//! Actions run through `HotkeyAction::invoke`, so a panicking action is
//! logged and never unwinds into the hook or the OS message loop.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use global_hotkey::{GlobalHotKeyEvent, HotKeyState};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{HotkeyError, ResultExt};

use super::action::{HotkeyAction, Mechanism};
use super::backend::{BackendError, SystemHotkeyBackend};
use super::registry::{HotkeyRegistry, RegistryEntry};
use super::types::{Hotkey, HotkeyHandle};

/// Virtual-key code used for the suppression key-up (unassigned on Windows).
pub const DUMMY_KEY: u8 = 0xFF;

/// Live state of the four modifier keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub win: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl ModifierState {
    pub fn with_key(self, key: u8) -> Hotkey {
        Hotkey::new(self.win, self.ctrl, self.shift, self.alt, key)
    }
}

/// Source of the current modifier state (the hook reads it at event time).
pub trait ModifierStateSource: Send + Sync {
    fn current(&self) -> ModifierState;
}

/// Modifier source that always reports nothing held.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModifiers;

impl ModifierStateSource for NoModifiers {
    fn current(&self) -> ModifierState {
        ModifierState::default()
    }
}

/// Injects synthetic key events.
pub trait KeySynthesizer: Send + Sync {
    fn send_key_up(&self, vk_code: u8);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSynthesizer;

impl KeySynthesizer for NoopSynthesizer {
    fn send_key_up(&self, _vk_code: u8) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    SysKeyDown,
    KeyUp,
    SysKeyUp,
}

impl KeyEventKind {
    pub fn is_down(self) -> bool {
        matches!(self, Self::KeyDown | Self::SysKeyDown)
    }
}

/// Raw event delivered by the keyboard hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk_code: u16,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    pub fn down(vk_code: u16) -> Self {
        Self {
            vk_code,
            kind: KeyEventKind::KeyDown,
        }
    }

    pub fn up(vk_code: u16) -> Self {
        Self {
            vk_code,
            kind: KeyEventKind::KeyUp,
        }
    }
}

/// Outcome counts of one OS registration pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistrationPass {
    pub registered: usize,
    /// Refused because another process or the OS holds the combination.
    pub taken: usize,
    pub failed: usize,
}

#[derive(Clone, Debug)]
struct Registration {
    hotkey: Hotkey,
    module_name: String,
    hotkey_name: String,
    action: HotkeyAction,
}

pub struct DispatchFrontEnd {
    registry: Arc<HotkeyRegistry>,
    backend: Arc<dyn SystemHotkeyBackend>,
    modifiers: Arc<dyn ModifierStateSource>,
    synthesizer: Arc<dyn KeySynthesizer>,
    registrations: Mutex<HashMap<u32, Registration>>,
    /// Hotkey matched by the last consumed key-down, awaiting dispatch.
    pending: Mutex<Option<Hotkey>>,
    /// Serializes registration passes from snapshot to last OS call.
    pass_lock: Mutex<()>,
}

impl DispatchFrontEnd {
    pub fn new(registry: Arc<HotkeyRegistry>, backend: Arc<dyn SystemHotkeyBackend>) -> Self {
        Self {
            registry,
            backend,
            modifiers: Arc::new(NoModifiers),
            synthesizer: Arc::new(NoopSynthesizer),
            registrations: Mutex::new(HashMap::new()),
            pending: Mutex::new(None),
            pass_lock: Mutex::new(()),
        }
    }

    pub fn with_modifier_source(mut self, modifiers: Arc<dyn ModifierStateSource>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn KeySynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn registry(&self) -> &Arc<HotkeyRegistry> {
        &self.registry
    }

    /// Ids of every live OS registration.
    pub fn registration_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.registrations.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ------------------------------------------------------------------
    // OS registration pass
    // ------------------------------------------------------------------

    /// Register with the OS every handle held by exactly one, not yet
    /// registered, shortcut entry.
    pub fn register_all(&self) -> RegistrationPass {
        self.register_where(|_| true)
    }

    /// Registration pass limited to one handle.
    pub fn register_handle(&self, handle: HotkeyHandle) -> RegistrationPass {
        self.register_where(|h| h == handle)
    }

    fn register_where(&self, include: impl Fn(HotkeyHandle) -> bool) -> RegistrationPass {
        let _pass = self.pass_lock.lock();
        let held: HashSet<HotkeyHandle> = self
            .registrations
            .lock()
            .values()
            .map(|r| r.hotkey.handle())
            .collect();
        let candidates: Vec<RegistryEntry> = self
            .registry
            .hotkey_entries()
            .into_iter()
            .filter(|(handle, _)| include(*handle) && !held.contains(handle))
            .filter_map(|(_, list)| match list.as_slice() {
                [only] if only.mechanism == Mechanism::Shortcut && !only.registered => {
                    Some(only.clone())
                }
                _ => None,
            })
            .collect();

        let mut pass = RegistrationPass::default();
        for entry in candidates {
            self.register_entry(entry, &mut pass);
        }

        if pass != RegistrationPass::default() {
            info!(
                event_type = "registration_pass",
                registered = pass.registered,
                taken = pass.taken,
                failed = pass.failed,
                "OS hotkey registration pass complete"
            );
        }
        pass
    }

    fn register_entry(&self, entry: RegistryEntry, pass: &mut RegistrationPass) {
        let handle = entry.handle();
        match self.backend.register(entry.shortcut()) {
            Ok(id) => {
                if !self
                    .registry
                    .set_registered(handle, &entry.module_name, &entry.hotkey_name, true)
                {
                    // Removed while the OS call was in flight.
                    if let Err(e) = self.backend.unregister(id) {
                        warn!(id, error = %e, "Failed to release stale registration");
                    }
                    return;
                }
                debug!(
                    event_type = "hotkey_registered",
                    hotkey = %entry.hotkey,
                    id,
                    module = %entry.module_name,
                    name = %entry.hotkey_name,
                    "Registered with OS"
                );
                self.registrations.lock().insert(
                    id,
                    Registration {
                        hotkey: entry.hotkey,
                        module_name: entry.module_name,
                        hotkey_name: entry.hotkey_name,
                        action: entry.action,
                    },
                );
                pass.registered += 1;
            }
            Err(BackendError::AlreadyRegistered(_)) => {
                self.registry
                    .set_registered(handle, &entry.module_name, &entry.hotkey_name, false);
                self.registry
                    .record_system_conflict(entry.hotkey, &entry.module_name, &entry.hotkey_name);
                pass.taken += 1;
            }
            Err(e) => {
                self.registry
                    .set_registered(handle, &entry.module_name, &entry.hotkey_name, false);
                warn!(
                    event_type = "hotkey_register_failed",
                    hotkey = %entry.hotkey,
                    module = %entry.module_name,
                    name = %entry.hotkey_name,
                    error = %e,
                    "OS registration failed"
                );
                pass.failed += 1;
            }
        }
    }

    /// Release every OS registration and clear the entries' registered flags.
    pub fn unregister_all(&self) -> usize {
        let drained: Vec<(u32, Registration)> = self.registrations.lock().drain().collect();
        self.release(drained)
    }

    /// Release the OS registrations `module_name` holds on `handle`.
    pub fn release_handle(&self, handle: HotkeyHandle, module_name: &str) -> usize {
        self.release_matching(|r| r.hotkey.handle() == handle && r.module_name == module_name)
    }

    /// Drop a module's shortcut entries, release their OS registrations and
    /// re-run the pass on the freed handles so remaining contenders can take
    /// over.
    ///
    /// Returns the number of entries removed.
    pub fn unregister_module(&self, module_name: &str) -> usize {
        self.release_matching(|r| r.module_name == module_name);
        let removed = self
            .registry
            .remove_record_by_module(module_name, Mechanism::Shortcut);
        let freed: BTreeSet<HotkeyHandle> = removed.iter().map(RegistryEntry::handle).collect();
        for handle in freed {
            self.register_handle(handle);
        }
        removed.len()
    }

    fn release_matching(&self, matches: impl Fn(&Registration) -> bool) -> usize {
        let selected: Vec<(u32, Registration)> = {
            let mut registrations = self.registrations.lock();
            let ids: Vec<u32> = registrations
                .iter()
                .filter(|(_, r)| matches(r))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| registrations.remove(&id).map(|r| (id, r)))
                .collect()
        };
        self.release(selected)
    }

    fn release(&self, registrations: Vec<(u32, Registration)>) -> usize {
        let count = registrations.len();
        for (id, registration) in registrations {
            if let Err(e) = self.backend.unregister(id) {
                warn!(id, hotkey = %registration.hotkey, error = %e, "Failed to unregister hotkey");
            }
            self.registry.set_registered(
                registration.hotkey.handle(),
                &registration.module_name,
                &registration.hotkey_name,
                false,
            );
        }
        count
    }

    // ------------------------------------------------------------------
    // OS-delivered events
    // ------------------------------------------------------------------

    /// Run the action registered under OS id `id`.
    ///
    /// Returns false for ids this front-end did not register.
    pub fn on_system_hotkey(&self, id: u32) -> bool {
        let Some(registration) = self.registrations.lock().get(&id).cloned() else {
            debug!(id, "Ignoring event for unknown registration id");
            return false;
        };

        registration
            .action
            .invoke(registration.hotkey.to_shortcut())
            .map_err(|message| action_failed(&registration.hotkey_name, message))
            .log_err();
        true
    }

    /// Forward pressed events from `GlobalHotKeyEvent::receiver()` on a
    /// background thread. The thread exits once the front-end is dropped.
    pub fn spawn_event_listener(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let front_end: Weak<Self> = Arc::downgrade(self);
        std::thread::Builder::new()
            .name("hotkey-events".to_string())
            .spawn(move || {
                let receiver = GlobalHotKeyEvent::receiver();
                while let Ok(event) = receiver.recv() {
                    if !Self::forward_event(&front_end, event) {
                        break;
                    }
                }
                debug!("Hotkey event listener stopped");
            })
    }

    /// Route one listener event. Returns false once the front-end is gone.
    fn forward_event(front_end: &Weak<Self>, event: GlobalHotKeyEvent) -> bool {
        let Some(front_end) = front_end.upgrade() else {
            return false;
        };
        if event.state == HotKeyState::Pressed {
            front_end.on_system_hotkey(event.id);
        }
        true
    }

    // ------------------------------------------------------------------
    // Keyboard hook path
    // ------------------------------------------------------------------

    /// Hook filter: true when this key-down matches a hook entry and must be
    /// consumed. The match is remembered for `on_key_event`.
    pub fn filter_key_event(&self, event: &KeyEvent) -> bool {
        if !event.kind.is_down() {
            return false;
        }
        let Ok(key) = u8::try_from(event.vk_code) else {
            return false;
        };
        let hotkey = self.modifiers.current().with_key(key);
        if !hotkey.is_valid() || self.registry.hook_entry(hotkey.handle()).is_none() {
            return false;
        }
        *self.pending.lock() = Some(hotkey);
        true
    }

    /// Hook handler for an event the filter consumed: invoke the matched
    /// action once, then synthesize the dummy key-up.
    pub fn on_key_event(&self, _event: &KeyEvent) -> bool {
        let Some(hotkey) = self.pending.lock().take() else {
            return false;
        };
        let Some(entry) = self.registry.hook_entry(hotkey.handle()) else {
            // Entry removed between filter and dispatch.
            return false;
        };

        let handled = entry
            .action
            .invoke(hotkey.to_shortcut())
            .map_err(|message| action_failed(&entry.hotkey_name, message))
            .log_err();
        if let Some(handled) = handled {
            debug!(
                hotkey = %hotkey,
                module = %entry.module_name,
                handled,
                "Hook hotkey dispatched"
            );
        }
        self.synthesizer.send_key_up(DUMMY_KEY);
        true
    }

    /// Filter then dispatch. Returns whether the event was consumed.
    pub fn handle_key_event(&self, event: &KeyEvent) -> bool {
        if !self.filter_key_event(event) {
            return false;
        }
        self.on_key_event(event);
        true
    }

    /// Hotkeys are global: the hook is never scoped to a window.
    pub fn is_active(&self) -> bool {
        true
    }
}

fn action_failed(hotkey_name: &str, message: String) -> HotkeyError {
    HotkeyError::ActionFailed {
        hotkey_name: hotkey_name.to_string(),
        message,
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

//! Test doubles shared by the hotkey test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::backend::{BackendError, SystemHotkeyBackend};
use super::dispatch::{KeySynthesizer, ModifierState, ModifierStateSource};
use super::probe::SystemConflictProbe;
use super::types::{Hotkey, Shortcut};

/// In-memory OS backend: combinations in `reserved` are "taken elsewhere".
pub struct MockBackend {
    reserved: Mutex<HashSet<Shortcut>>,
    failures: Mutex<HashMap<Shortcut, String>>,
    active: Mutex<HashMap<u32, Shortcut>>,
    next_id: AtomicU32,
    register_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            reserved: Mutex::new(HashSet::new()),
            failures: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            register_calls: AtomicUsize::new(0),
        }
    }

    pub fn reserve(&self, shortcut: Shortcut) {
        self.reserved.lock().insert(shortcut);
    }

    pub fn fail_with(&self, shortcut: Shortcut, message: &str) {
        self.failures.lock().insert(shortcut, message.to_string());
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn active_registrations(&self) -> Vec<Shortcut> {
        let mut active: Vec<Shortcut> = self.active.lock().values().copied().collect();
        active.sort();
        active
    }
}

impl SystemHotkeyBackend for MockBackend {
    fn register(&self, shortcut: Shortcut) -> Result<u32, BackendError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.lock().get(&shortcut) {
            return Err(BackendError::Failed(message.clone()));
        }
        let mut active = self.active.lock();
        if self.reserved.lock().contains(&shortcut) || active.values().any(|s| *s == shortcut) {
            return Err(BackendError::AlreadyRegistered(shortcut.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        active.insert(id, shortcut);
        Ok(id)
    }

    fn unregister(&self, id: u32) -> Result<(), BackendError> {
        self.active
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(BackendError::UnknownId(id))
    }
}

/// Probe with a fixed set of taken hotkeys; counts calls.
pub struct FixedProbe {
    taken: HashSet<Hotkey>,
    calls: AtomicUsize,
}

impl FixedProbe {
    pub fn new(taken: impl IntoIterator<Item = Hotkey>) -> Self {
        Self {
            taken: taken.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SystemConflictProbe for FixedProbe {
    fn has_system_conflict(&self, hotkey: &Hotkey) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        hotkey.is_valid() && self.taken.contains(hotkey)
    }
}

/// Live modifier state controlled by the test.
#[derive(Default)]
pub struct MockModifiers {
    state: Mutex<ModifierState>,
}

impl MockModifiers {
    pub fn set(&self, state: ModifierState) {
        *self.state.lock() = state;
    }
}

impl ModifierStateSource for MockModifiers {
    fn current(&self) -> ModifierState {
        *self.state.lock()
    }
}

/// Records synthesized key-up events.
#[derive(Default)]
pub struct RecordingSynthesizer {
    sent: Mutex<Vec<u8>>,
}

impl RecordingSynthesizer {
    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().clone()
    }
}

impl KeySynthesizer for RecordingSynthesizer {
    fn send_key_up(&self, vk_code: u8) {
        self.sent.lock().push(vk_code);
    }
}

//! Hotkey registry
//!
//! Process-wide map from hotkey handle to every module entry claiming it.
//! Entries on one handle are kept as a list so that when a contender is
//! removed the remaining claimants are still known.
//!
//! Locking rules:
//! - every read-modify-write of the map happens under one `parking_lot::Mutex`
//! - the system probe and the conflict file write always run with the lock released

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::HotkeyError;

use super::action::{HotkeyAction, Mechanism};
use super::conflict::{
    classify, ConflictKind, ConflictRecord, ConflictSets, Verdict, SYSTEM_MODULE_NAME,
};
use super::persistence::{ConflictExporter, PersistenceError};
use super::probe::SystemConflictProbe;
use super::types::{Hotkey, HotkeyHandle, Shortcut};

/// One module's claim on a hotkey.
#[derive(Clone, Debug)]
pub struct RegistryEntry {
    pub hotkey: Hotkey,
    pub module_name: String,
    pub hotkey_name: String,
    pub action: HotkeyAction,
    pub mechanism: Mechanism,
    /// Whether OS-level registration succeeded for this entry.
    pub registered: bool,
}

impl RegistryEntry {
    pub fn new(
        hotkey: Hotkey,
        module_name: impl Into<String>,
        hotkey_name: impl Into<String>,
        action: HotkeyAction,
    ) -> Self {
        let mechanism = action.mechanism();
        Self {
            hotkey,
            module_name: module_name.into(),
            hotkey_name: hotkey_name.into(),
            action,
            mechanism,
            registered: false,
        }
    }

    /// Placeholder owner returned when nothing in-process claims a hotkey.
    pub fn system_placeholder(hotkey: Hotkey) -> Self {
        Self::new(hotkey, SYSTEM_MODULE_NAME, "", HotkeyAction::noop())
    }

    pub fn is_owned_by(&self, module_name: &str, hotkey_name: &str) -> bool {
        self.module_name == module_name && self.hotkey_name == hotkey_name
    }

    pub fn is_system_placeholder(&self) -> bool {
        self.module_name == SYSTEM_MODULE_NAME && self.hotkey_name.is_empty()
    }

    pub fn handle(&self) -> HotkeyHandle {
        self.hotkey.handle()
    }

    pub fn shortcut(&self) -> Shortcut {
        self.hotkey.to_shortcut()
    }
}

/// Behavior switches for a registry instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Keep every contender on a handle. When false, a second owner is
    /// rejected and only recorded as an in-app conflict.
    pub multi_owner: bool,
    /// Where to export the conflict document after mutations. `None`
    /// disables persistence.
    pub conflicts_path: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            multi_owner: true,
            conflicts_path: None,
        }
    }
}

impl RegistryOptions {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            multi_owner: config.multi_owner,
            conflicts_path: config.persist_conflicts.then(|| config.conflicts_path()),
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<HotkeyHandle, Vec<RegistryEntry>>,
    conflicts: ConflictSets,
}

pub struct HotkeyRegistry {
    inner: Mutex<Inner>,
    probe: Arc<dyn SystemConflictProbe>,
    multi_owner: bool,
    exporter: Option<ConflictExporter>,
    /// Serializes snapshot + write so exports land in mutation order.
    export_lock: Mutex<()>,
}

impl HotkeyRegistry {
    /// With a conflicts path, the (empty) document is written immediately so
    /// a file left by an earlier run never outlives this registry's state.
    pub fn new(probe: Arc<dyn SystemConflictProbe>, options: RegistryOptions) -> Self {
        let registry = Self {
            inner: Mutex::new(Inner::default()),
            probe,
            multi_owner: options.multi_owner,
            exporter: options.conflicts_path.map(ConflictExporter::new),
            export_lock: Mutex::new(()),
        };
        if registry.exporter.is_some() {
            registry.persist();
        }
        registry
    }

    pub fn exporter(&self) -> Option<&ConflictExporter> {
        self.exporter.as_ref()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Classify `hotkey` from the point of view of `(module_name, hotkey_name)`.
    ///
    /// Invalid hotkeys are never a conflict target.
    pub fn has_conflict(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
    ) -> ConflictKind {
        let hotkey = hotkey.into();
        if !hotkey.is_valid() {
            return ConflictKind::NoConflict;
        }

        let verdict = {
            let inner = self.inner.lock();
            let entries = inner
                .entries
                .get(&hotkey.handle())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            classify(entries, module_name, hotkey_name)
        };

        match verdict {
            Verdict::Decided(kind) => kind,
            Verdict::AskSystem if self.probe.has_system_conflict(&hotkey) => {
                ConflictKind::SystemConflict
            }
            Verdict::AskSystem => ConflictKind::NoConflict,
        }
    }

    /// `has_conflict` as an error naming who holds the hotkey.
    pub fn check_conflict(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
    ) -> crate::error::Result<()> {
        let hotkey = hotkey.into();
        match self.has_conflict(hotkey, module_name, hotkey_name) {
            kind if !kind.is_conflict() => Ok(()),
            ConflictKind::SystemConflict => Err(HotkeyError::SystemConflict { hotkey }),
            _ => {
                let holder = self
                    .get_conflicts(hotkey, module_name, hotkey_name)
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.get_conflict(hotkey));
                Err(HotkeyError::InAppConflict {
                    hotkey,
                    module_name: holder.module_name,
                    hotkey_name: holder.hotkey_name,
                })
            }
        }
    }

    /// The first entry holding `hotkey`, or the "System" placeholder when
    /// nothing in-process owns it.
    pub fn get_conflict(&self, hotkey: impl Into<Hotkey>) -> RegistryEntry {
        let hotkey = hotkey.into();
        self.inner
            .lock()
            .entries
            .get(&hotkey.handle())
            .and_then(|list| list.first().cloned())
            .unwrap_or_else(|| RegistryEntry::system_placeholder(hotkey))
    }

    /// Every entry on the hotkey's handle other than the caller's own pair.
    pub fn get_conflicts(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
    ) -> Vec<RegistryEntry> {
        let hotkey = hotkey.into();
        self.inner
            .lock()
            .entries
            .get(&hotkey.handle())
            .map(|list| {
                list.iter()
                    .filter(|e| !e.is_owned_by(module_name, hotkey_name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries currently stored under one hotkey.
    pub fn entries_for(&self, hotkey: impl Into<Hotkey>) -> Vec<RegistryEntry> {
        let hotkey = hotkey.into();
        self.inner
            .lock()
            .entries
            .get(&hotkey.handle())
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the whole map, ordered by handle.
    pub fn hotkey_entries(&self) -> BTreeMap<HotkeyHandle, Vec<RegistryEntry>> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(handle, list)| (*handle, list.clone()))
            .collect()
    }

    /// First hook-mechanism entry on `handle`, used by the keyboard hook path.
    pub fn hook_entry(&self, handle: HotkeyHandle) -> Option<RegistryEntry> {
        self.inner
            .lock()
            .entries
            .get(&handle)?
            .iter()
            .find(|e| e.mechanism == Mechanism::Hook)
            .cloned()
    }

    pub fn contains(&self, handle: HotkeyHandle) -> bool {
        self.inner.lock().entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn conflict_sets(&self) -> ConflictSets {
        self.inner.lock().conflicts.clone()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Register a hook-based hotkey.
    pub fn add_hook_record<F>(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
        action: F,
    ) -> bool
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.add_record(hotkey, module_name, hotkey_name, HotkeyAction::simple(action))
    }

    /// Register an OS-level shortcut.
    pub fn add_shortcut_record<F>(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
        action: F,
    ) -> bool
    where
        F: Fn(u16, u16) + Send + Sync + 'static,
    {
        self.add_record(
            hotkey,
            module_name,
            hotkey_name,
            HotkeyAction::parameterized(action),
        )
    }

    /// Append a new entry for `(module_name, hotkey_name)`.
    ///
    /// Returns false without mutating the map if the hotkey is invalid, the
    /// same pair already holds this handle, or (single-owner mode) another
    /// pair owns it.
    pub fn add_record(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
        action: HotkeyAction,
    ) -> bool {
        let hotkey = hotkey.into();
        if !hotkey.is_valid() {
            debug!(
                event_type = "hotkey_rejected",
                hotkey = %hotkey,
                module = module_name,
                "Rejected invalid hotkey"
            );
            return false;
        }

        let handle = hotkey.handle();
        let entry = RegistryEntry::new(hotkey, module_name, hotkey_name, action);

        let (added, conflicts_changed) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            match inner.entries.get(&handle) {
                Some(list) if list.iter().any(|e| e.is_owned_by(module_name, hotkey_name)) => {
                    debug!(
                        handle = %handle,
                        module = module_name,
                        name = hotkey_name,
                        "Duplicate registration ignored"
                    );
                    return false;
                }
                Some(list) if !self.multi_owner && !list.is_empty() => {
                    let mut changed = false;
                    for existing in list {
                        changed |= inner.conflicts.insert_in_app(existing.into());
                    }
                    changed |= inner.conflicts.insert_in_app((&entry).into());
                    (false, changed)
                }
                _ => {
                    let list = inner.entries.entry(handle).or_default();
                    list.push(entry);
                    let mut changed = false;
                    if list.len() > 1 {
                        for contender in list.iter() {
                            changed |= inner.conflicts.insert_in_app(contender.into());
                        }
                    }
                    (true, changed)
                }
            }
        };

        if added {
            info!(
                event_type = "hotkey_added",
                hotkey = %hotkey,
                handle = %handle,
                module = module_name,
                name = hotkey_name,
                "Hotkey record added"
            );
        } else {
            warn!(
                event_type = "hotkey_conflict",
                hotkey = %hotkey,
                module = module_name,
                name = hotkey_name,
                "Hotkey already owned by another module"
            );
        }

        if conflicts_changed {
            self.persist();
        }
        added
    }

    /// Remove every entry of `module_name` on the hotkey's handle.
    ///
    /// Returns the number of entries removed.
    pub fn remove_record(&self, hotkey: impl Into<Hotkey>, module_name: &str) -> usize {
        let handle = hotkey.into().handle();

        let (removed, conflicts_changed) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            let Some(list) = inner.entries.get_mut(&handle) else {
                return 0;
            };
            let before = list.len();
            list.retain(|e| e.module_name != module_name);
            let removed = before - list.len();
            let remaining = list.len();
            if remaining == 0 {
                inner.entries.remove(&handle);
            }

            let mut changed = inner.conflicts.remove_module(Some(handle), module_name);
            if remaining <= 1 {
                changed |= inner.conflicts.clear_in_app(handle);
            }
            (removed, changed)
        };

        if removed > 0 {
            info!(
                event_type = "hotkey_removed",
                handle = %handle,
                module = module_name,
                removed,
                "Hotkey records removed"
            );
        }
        if conflicts_changed {
            self.persist();
        }
        removed
    }

    /// Remove all of a module's entries registered through `mechanism`,
    /// across every handle. Other modules and the other mechanism are kept.
    ///
    /// Returns the removed entries.
    pub fn remove_record_by_module(
        &self,
        module_name: &str,
        mechanism: Mechanism,
    ) -> Vec<RegistryEntry> {
        let (removed, conflicts_changed) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            let mut removed = Vec::new();
            let mut changed = false;
            inner.entries.retain(|handle, list| {
                let (gone, kept): (Vec<_>, Vec<_>) = list
                    .drain(..)
                    .partition(|e| e.module_name == module_name && e.mechanism == mechanism);
                *list = kept;

                if !gone.is_empty() {
                    for entry in &gone {
                        changed |=
                            inner
                                .conflicts
                                .remove_owner(*handle, &entry.module_name, &entry.hotkey_name);
                    }
                    if list.len() <= 1 {
                        changed |= inner.conflicts.clear_in_app(*handle);
                    }
                    removed.extend(gone);
                }
                !list.is_empty()
            });
            (removed, changed)
        };

        if !removed.is_empty() {
            info!(
                event_type = "module_hotkeys_removed",
                module = module_name,
                mechanism = %mechanism,
                removed = removed.len(),
                "Module hotkey records removed"
            );
        }
        if conflicts_changed {
            self.persist();
        }
        removed
    }

    /// Update the OS registration flag of one entry.
    ///
    /// Returns false if the entry no longer exists.
    pub fn set_registered(
        &self,
        handle: HotkeyHandle,
        module_name: &str,
        hotkey_name: &str,
        registered: bool,
    ) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner
            .entries
            .get_mut(&handle)
            .and_then(|list| list.iter_mut().find(|e| e.is_owned_by(module_name, hotkey_name)))
        else {
            return false;
        };
        entry.registered = registered;
        true
    }

    /// Record that the OS refused `hotkey` for this owner.
    pub fn record_system_conflict(
        &self,
        hotkey: impl Into<Hotkey>,
        module_name: &str,
        hotkey_name: &str,
    ) -> bool {
        let hotkey = hotkey.into();
        if !hotkey.is_valid() {
            return false;
        }
        let inserted = self
            .inner
            .lock()
            .conflicts
            .insert_system(ConflictRecord::new(hotkey, module_name, hotkey_name));
        if inserted {
            warn!(
                event_type = "system_conflict",
                hotkey = %hotkey,
                module = module_name,
                name = hotkey_name,
                "Hotkey is claimed outside this process"
            );
            self.persist();
        }
        inserted
    }

    /// Drop all recorded conflicts (the entry map is untouched).
    pub fn clear_conflicts(&self) {
        let was_empty = {
            let mut inner = self.inner.lock();
            let was_empty = inner.conflicts.is_empty();
            inner.conflicts = ConflictSets::new();
            was_empty
        };
        if !was_empty {
            self.persist();
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the current conflict sets to the configured document.
    ///
    /// A no-op when persistence is disabled.
    pub fn export_conflicts(&self) -> Result<(), PersistenceError> {
        let Some(exporter) = &self.exporter else {
            return Ok(());
        };
        let _serial = self.export_lock.lock();
        let snapshot = self.conflict_sets();
        exporter.export(&snapshot)
    }

    fn persist(&self) {
        if let Err(e) = self.export_conflicts() {
            warn!(
                event_type = "conflict_export_failed",
                error = %e,
                "Failed to export hotkey conflicts"
            );
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

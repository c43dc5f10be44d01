//! Conflict classification and the conflict sets exported for the UI.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::registry::RegistryEntry;
use super::types::{Hotkey, HotkeyHandle};

/// Module name used for the synthetic owner of system-claimed hotkeys.
pub const SYSTEM_MODULE_NAME: &str = "System";

/// Outcome of a conflict query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    NoConflict,
    /// Claimed outside this process (another application or the OS itself).
    SystemConflict,
    /// Claimed by another module of this process.
    InAppConflict,
}

impl ConflictKind {
    pub fn is_conflict(&self) -> bool {
        !matches!(self, Self::NoConflict)
    }
}

/// Result of classifying a handle's entry list.
///
/// `AskSystem` is returned instead of probing directly so the caller can run
/// the probe after releasing the registry lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Decided(ConflictKind),
    AskSystem,
}

/// Classify a query by `(module_name, hotkey_name)` against the entries
/// currently stored under one handle.
pub fn classify(entries: &[RegistryEntry], module_name: &str, hotkey_name: &str) -> Verdict {
    match entries {
        [] => Verdict::AskSystem,
        [only] if only.is_owned_by(module_name, hotkey_name) => {
            if only.registered {
                Verdict::Decided(ConflictKind::NoConflict)
            } else {
                // Sole claimant is the caller itself and it still failed to
                // register: the blocker is outside the process.
                Verdict::Decided(ConflictKind::SystemConflict)
            }
        }
        _ => Verdict::Decided(ConflictKind::InAppConflict),
    }
}

/// One side of a detected clash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub hotkey: Hotkey,
    pub module_name: String,
    pub hotkey_name: String,
}

impl ConflictRecord {
    pub fn new(
        hotkey: Hotkey,
        module_name: impl Into<String>,
        hotkey_name: impl Into<String>,
    ) -> Self {
        Self {
            hotkey,
            module_name: module_name.into(),
            hotkey_name: hotkey_name.into(),
        }
    }
}

impl From<&RegistryEntry> for ConflictRecord {
    fn from(entry: &RegistryEntry) -> Self {
        Self::new(entry.hotkey, entry.module_name.clone(), entry.hotkey_name.clone())
    }
}

type RecordMap = BTreeMap<HotkeyHandle, BTreeSet<ConflictRecord>>;

/// System and in-app conflict records keyed by handle.
///
/// Re-adding an identical record is a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictSets {
    in_app: RecordMap,
    system: RecordMap,
}

impl ConflictSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the record was not already present.
    pub fn insert_in_app(&mut self, record: ConflictRecord) -> bool {
        self.in_app
            .entry(record.hotkey.handle())
            .or_default()
            .insert(record)
    }

    /// Returns true if the record was not already present.
    pub fn insert_system(&mut self, record: ConflictRecord) -> bool {
        self.system
            .entry(record.hotkey.handle())
            .or_default()
            .insert(record)
    }

    /// Drop every record of `module_name`; limited to one handle if given.
    /// Returns true if anything was removed.
    pub fn remove_module(&mut self, handle: Option<HotkeyHandle>, module_name: &str) -> bool {
        let a = remove_from(&mut self.in_app, handle, |r| r.module_name == module_name);
        let b = remove_from(&mut self.system, handle, |r| r.module_name == module_name);
        a || b
    }

    /// Drop records for one exact (module, name) pair on a handle.
    pub fn remove_owner(
        &mut self,
        handle: HotkeyHandle,
        module_name: &str,
        hotkey_name: &str,
    ) -> bool {
        let matches =
            |r: &ConflictRecord| r.module_name == module_name && r.hotkey_name == hotkey_name;
        let a = remove_from(&mut self.in_app, Some(handle), matches);
        let b = remove_from(&mut self.system, Some(handle), matches);
        a || b
    }

    pub fn clear_in_app(&mut self, handle: HotkeyHandle) -> bool {
        self.in_app.remove(&handle).is_some()
    }

    pub fn in_app_records(&self) -> Vec<ConflictRecord> {
        self.in_app.values().flatten().cloned().collect()
    }

    pub fn system_records(&self) -> Vec<ConflictRecord> {
        self.system.values().flatten().cloned().collect()
    }

    pub fn in_app_for(&self, handle: HotkeyHandle) -> Vec<ConflictRecord> {
        self.in_app
            .get(&handle)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.in_app.is_empty() && self.system.is_empty()
    }

    pub fn len(&self) -> usize {
        self.in_app.values().map(BTreeSet::len).sum::<usize>()
            + self.system.values().map(BTreeSet::len).sum::<usize>()
    }
}

fn remove_from(
    map: &mut RecordMap,
    handle: Option<HotkeyHandle>,
    matches: impl Fn(&ConflictRecord) -> bool,
) -> bool {
    let mut removed = false;
    map.retain(|h, records| {
        if handle.map_or(true, |target| target == *h) {
            let before = records.len();
            records.retain(|r| !matches(r));
            removed |= records.len() != before;
        }
        !records.is_empty()
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::action::HotkeyAction;

    fn hotkey() -> Hotkey {
        Hotkey::new(true, false, true, false, 0x43)
    }

    fn entry(module: &str, name: &str, registered: bool) -> RegistryEntry {
        let mut e = RegistryEntry::new(hotkey(), module, name, HotkeyAction::simple(|| true));
        e.registered = registered;
        e
    }

    #[test]
    fn empty_list_defers_to_system_probe() {
        assert_eq!(classify(&[], "ModA", "Name1"), Verdict::AskSystem);
    }

    #[test]
    fn self_match_registered_is_no_conflict() {
        let entries = [entry("ModA", "Name1", true)];
        assert_eq!(
            classify(&entries, "ModA", "Name1"),
            Verdict::Decided(ConflictKind::NoConflict)
        );
    }

    #[test]
    fn self_match_unregistered_is_system_conflict() {
        let entries = [entry("ModA", "Name1", false)];
        assert_eq!(
            classify(&entries, "ModA", "Name1"),
            Verdict::Decided(ConflictKind::SystemConflict)
        );
    }

    #[test]
    fn different_owner_is_in_app_conflict() {
        let entries = [entry("ModA", "Name1", true)];
        assert_eq!(
            classify(&entries, "ModB", "Name1"),
            Verdict::Decided(ConflictKind::InAppConflict)
        );
        assert_eq!(
            classify(&entries, "ModA", "Name2"),
            Verdict::Decided(ConflictKind::InAppConflict)
        );
    }

    #[test]
    fn multiple_entries_conflict_regardless_of_caller() {
        let entries = [entry("ModA", "Name1", true), entry("ModB", "Name2", false)];
        assert_eq!(
            classify(&entries, "ModA", "Name1"),
            Verdict::Decided(ConflictKind::InAppConflict)
        );
    }

    #[test]
    fn identical_records_are_deduplicated() {
        let mut sets = ConflictSets::new();
        assert!(sets.insert_in_app(ConflictRecord::new(hotkey(), "ModA", "Name1")));
        assert!(!sets.insert_in_app(ConflictRecord::new(hotkey(), "ModA", "Name1")));
        assert!(sets.insert_in_app(ConflictRecord::new(hotkey(), "ModB", "Name1")));
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn remove_module_prunes_empty_handles() {
        let mut sets = ConflictSets::new();
        sets.insert_in_app(ConflictRecord::new(hotkey(), "ModA", "Name1"));
        sets.insert_system(ConflictRecord::new(hotkey(), "ModA", "Name2"));
        sets.insert_system(ConflictRecord::new(hotkey(), "ModB", "Name1"));

        assert!(sets.remove_module(None, "ModA"));
        assert!(sets.in_app_records().is_empty());
        assert_eq!(sets.system_records().len(), 1);
        assert!(!sets.remove_module(None, "ModA"));
    }

    #[test]
    fn remove_module_can_target_one_handle() {
        let other = Hotkey::new(false, true, false, false, 0x44);
        let mut sets = ConflictSets::new();
        sets.insert_in_app(ConflictRecord::new(hotkey(), "ModA", "Name1"));
        sets.insert_in_app(ConflictRecord::new(other, "ModA", "Name2"));

        assert!(sets.remove_module(Some(other.handle()), "ModA"));
        assert_eq!(sets.in_app_for(hotkey().handle()).len(), 1);
        assert!(sets.in_app_for(other.handle()).is_empty());
    }
}

//! Conflict document export.
//!
//! The registry writes its conflict sets to a small JSON document that the
//! settings UI reads. Format:
//!
//! ```json
//! {
//!   "inAppConflicts": [{ "hotkey": {"win":false,"ctrl":true,"shift":false,"alt":true,"key":84},
//!                        "moduleName": "Launcher", "hotkeyName": "Open" }],
//!   "sysConflicts": []
//! }
//! ```
//!
//! The document is one-way: it is never loaded back into a registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::conflict::{ConflictRecord, ConflictSets};
use super::types::Hotkey;

/// Default file name of the conflict document.
pub const DEFAULT_CONFLICTS_FILE: &str = "hotkey_conflicts.json";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk shape of the exported conflicts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDocument {
    #[serde(default)]
    pub in_app_conflicts: Vec<ConflictRecord>,
    #[serde(default)]
    pub sys_conflicts: Vec<ConflictRecord>,
}

/// Owners clashing on one hotkey, as shown in the settings UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictGroup {
    pub hotkey: Hotkey,
    pub is_system_conflict: bool,
    pub owners: Vec<ConflictRecord>,
}

impl ConflictDocument {
    pub fn from_sets(sets: &ConflictSets) -> Self {
        Self {
            in_app_conflicts: sets.in_app_records(),
            sys_conflicts: sets.system_records(),
        }
    }

    /// Load a previously exported document.
    ///
    /// Returns an empty document if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn is_empty(&self) -> bool {
        self.in_app_conflicts.is_empty() && self.sys_conflicts.is_empty()
    }

    /// Group records by hotkey: in-app groups first, then system groups,
    /// each ordered by hotkey.
    pub fn groups(&self) -> Vec<ConflictGroup> {
        let mut groups = group_by_hotkey(&self.in_app_conflicts, false);
        groups.extend(group_by_hotkey(&self.sys_conflicts, true));
        groups
    }
}

fn group_by_hotkey(records: &[ConflictRecord], is_system_conflict: bool) -> Vec<ConflictGroup> {
    let mut by_hotkey: BTreeMap<Hotkey, Vec<ConflictRecord>> = BTreeMap::new();
    for record in records {
        by_hotkey.entry(record.hotkey).or_default().push(record.clone());
    }
    by_hotkey
        .into_iter()
        .map(|(hotkey, owners)| ConflictGroup {
            hotkey,
            is_system_conflict,
            owners,
        })
        .collect()
}

/// Writes conflict sets to a fixed path.
#[derive(Clone, Debug)]
pub struct ConflictExporter {
    path: PathBuf,
}

impl ConflictExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `sets` and replace the document atomically (temp file + rename).
    ///
    /// On failure the previous document is left as it was.
    pub fn export(&self, sets: &ConflictSets) -> Result<(), PersistenceError> {
        let document = ConflictDocument::from_sets(sets);
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&temp_path, json) {
            let _ = fs::remove_file(&temp_path);
            return Err(PersistenceError::io(&temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(PersistenceError::io(&self.path, e));
        }

        debug!(
            event_type = "conflicts_exported",
            path = %self.path.display(),
            in_app = document.in_app_conflicts.len(),
            system = document.sys_conflicts.len(),
            "Exported hotkey conflicts"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctrl_alt(key: u8) -> Hotkey {
        Hotkey::new(false, true, false, true, key)
    }

    fn sample_sets() -> ConflictSets {
        let mut sets = ConflictSets::new();
        sets.insert_in_app(ConflictRecord::new(ctrl_alt(0x54), "Launcher", "Open"));
        sets.insert_in_app(ConflictRecord::new(ctrl_alt(0x54), "Peek", "Toggle"));
        sets.insert_system(ConflictRecord::new(ctrl_alt(0x2E), "ColorPicker", "Pick"));
        sets
    }

    #[test]
    fn export_writes_expected_json_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFLICTS_FILE);
        ConflictExporter::new(path.clone())
            .export(&sample_sets())
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let in_app = value["inAppConflicts"].as_array().unwrap();
        assert_eq!(in_app.len(), 2);
        assert_eq!(in_app[0]["moduleName"], "Launcher");
        assert_eq!(in_app[0]["hotkeyName"], "Open");
        assert_eq!(in_app[0]["hotkey"]["ctrl"], true);
        assert_eq!(in_app[0]["hotkey"]["win"], false);
        assert_eq!(in_app[0]["hotkey"]["key"], 0x54);
        assert_eq!(value["sysConflicts"].as_array().unwrap().len(), 1);
        assert!(!dir.path().join("hotkey_conflicts.json.tmp").exists());
    }

    #[test]
    fn export_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings").join("conflicts.json");
        ConflictExporter::new(path.clone())
            .export(&ConflictSets::new())
            .unwrap();

        let doc = ConflictDocument::load(&path).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn failed_export_leaves_previous_document_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conflicts.json");
        let exporter = ConflictExporter::new(path.clone());
        exporter.export(&sample_sets()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(exporter.export(&ConflictSets::new()).is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let doc = ConflictDocument::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(doc, ConflictDocument::default());
    }

    #[test]
    fn load_rejects_corrupt_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conflicts.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ConflictDocument::load(&path),
            Err(PersistenceError::Json(_))
        ));
    }

    #[test]
    fn load_reads_back_exported_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conflicts.json");
        let sets = sample_sets();
        ConflictExporter::new(path.clone()).export(&sets).unwrap();

        let doc = ConflictDocument::load(&path).unwrap();
        assert_eq!(doc, ConflictDocument::from_sets(&sets));
    }

    #[test]
    fn groups_split_in_app_and_system() {
        let doc = ConflictDocument::from_sets(&sample_sets());
        let groups = doc.groups();

        assert_eq!(groups.len(), 2);
        assert!(!groups[0].is_system_conflict);
        assert_eq!(groups[0].hotkey, ctrl_alt(0x54));
        assert_eq!(groups[0].owners.len(), 2);
        assert!(groups[1].is_system_conflict);
        assert_eq!(groups[1].owners[0].module_name, "ColorPicker");
    }
}

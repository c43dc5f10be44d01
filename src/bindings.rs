//! Declared module bindings.
//!
//! A bindings file lists the hotkeys each module wants, e.g.
//!
//! ```json
//! [
//!   { "moduleName": "Launcher", "hotkeyName": "Open", "shortcut": "alt+space",
//!     "mechanism": "shortcut" },
//!   { "moduleName": "Peek", "hotkeyName": "Toggle", "shortcut": "ctrl+space" }
//! ]
//! ```
//!
//! `mechanism` defaults to `shortcut`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HotkeyError, Result};
use crate::hotkeys::{HotkeyAction, HotkeyRegistry, Mechanism, Shortcut};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDecl {
    pub module_name: String,
    pub hotkey_name: String,
    pub shortcut: String,
    #[serde(default = "default_mechanism")]
    pub mechanism: Mechanism,
}

fn default_mechanism() -> Mechanism {
    Mechanism::Shortcut
}

impl BindingDecl {
    pub fn parse_shortcut(&self) -> Result<Shortcut> {
        let shortcut = Shortcut::parse(&self.shortcut)?;
        if !shortcut.to_hotkey().is_valid() {
            return Err(HotkeyError::InvalidHotkey(self.shortcut.clone()));
        }
        Ok(shortcut)
    }

    /// Action that only logs the trigger; used when no real handler exists.
    pub fn logging_action(&self) -> HotkeyAction {
        let module = self.module_name.clone();
        let name = self.hotkey_name.clone();
        match self.mechanism {
            Mechanism::Hook => HotkeyAction::simple(move || {
                info!(event_type = "hotkey_fired", module = %module, name = %name, "Hotkey fired");
                true
            }),
            Mechanism::Shortcut => HotkeyAction::parameterized(move |mods, key| {
                info!(
                    event_type = "hotkey_fired",
                    module = %module,
                    name = %name,
                    mods,
                    key,
                    "Hotkey fired"
                );
            }),
        }
    }
}

/// Outcome of adding a list of bindings to a registry.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub added: usize,
    pub rejected: Vec<BindingDecl>,
    pub invalid: Vec<(BindingDecl, HotkeyError)>,
}

pub fn load_bindings(path: &Path) -> Result<Vec<BindingDecl>> {
    let content = fs::read_to_string(path).map_err(|e| {
        HotkeyError::Config(format!("cannot read bindings {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        HotkeyError::Config(format!("invalid bindings {}: {}", path.display(), e))
    })
}

/// Add every binding to `registry` with a logging action.
pub fn apply_bindings(registry: &HotkeyRegistry, bindings: &[BindingDecl]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for binding in bindings {
        let shortcut = match binding.parse_shortcut() {
            Ok(shortcut) => shortcut,
            Err(e) => {
                warn!(
                    module = %binding.module_name,
                    name = %binding.hotkey_name,
                    shortcut = %binding.shortcut,
                    error = %e,
                    "Skipping invalid binding"
                );
                report.invalid.push((binding.clone(), e));
                continue;
            }
        };
        if registry.add_record(
            shortcut,
            &binding.module_name,
            &binding.hotkey_name,
            binding.logging_action(),
        ) {
            report.added += 1;
        } else {
            report.rejected.push(binding.clone());
        }
    }
    report
}

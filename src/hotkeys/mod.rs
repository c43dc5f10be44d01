//! Global hotkey arbitration.
//!
//! This module provides:
//! - Canonical hotkey encoding (`Hotkey` / `Shortcut` -> `HotkeyHandle`)
//! - A shared registry of module claims with conflict classification
//! - System conflict probing through the OS registration backend
//! - Conflict export for the settings UI
//! - Dispatch of OS-registered and hook-matched hotkeys
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hotkey_registry::hotkeys::{
//!     BackendProbe, GlobalHotkeyBackend, HotkeyAction, HotkeyRegistry, HotkeyService,
//!     RegistryOptions, Shortcut,
//! };
//!
//! let backend = Arc::new(GlobalHotkeyBackend::spawn()?);
//! let registry = Arc::new(HotkeyRegistry::new(
//!     Arc::new(BackendProbe::new(backend.clone())),
//!     RegistryOptions::default(),
//! ));
//! let service = HotkeyService::new(registry, backend);
//! service.register(
//!     Shortcut::parse("win+shift+c")?,
//!     "ColorPicker",
//!     "Activate",
//!     HotkeyAction::parameterized(|_, _| println!("pick")),
//! );
//! ```

mod action;
mod backend;
mod conflict;
mod dispatch;
mod persistence;
mod probe;
mod registry;
mod service;
mod types;

#[cfg(test)]
mod testing;

pub use action::{HotkeyAction, Mechanism, ParameterizedCallback, SimpleCallback};
pub use backend::{code_for_vk, BackendError, GlobalHotkeyBackend, SystemHotkeyBackend};
pub use conflict::{classify, ConflictKind, ConflictRecord, ConflictSets, Verdict};
pub use dispatch::{
    DispatchFrontEnd, KeyEvent, KeyEventKind, KeySynthesizer, ModifierState,
    ModifierStateSource, NoModifiers, NoopSynthesizer, RegistrationPass, DUMMY_KEY,
};
pub use persistence::{
    ConflictDocument, ConflictExporter, ConflictGroup, PersistenceError, DEFAULT_CONFLICTS_FILE,
};
pub use probe::{BackendProbe, NoSystemConflicts, ReservedShortcutsProbe, SystemConflictProbe};
pub use registry::{HotkeyRegistry, RegistryEntry, RegistryOptions};
pub use service::HotkeyService;
pub use types::{
    key_name, vk_from_name, Hotkey, HotkeyHandle, Shortcut, ShortcutParseError, MOD_ALT,
    MOD_CONTROL, MOD_SHIFT, MOD_WIN,
};

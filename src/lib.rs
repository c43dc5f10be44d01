//! hotkey-registry - global hotkey arbitration
//!
//! Lets independent feature modules claim global keyboard shortcuts, detects
//! clashes between them and with shortcuts the OS or other applications
//! already hold, and exports the conflicts for a settings UI.

pub mod bindings;
pub mod config;
pub mod error;
pub mod hotkeys;
pub mod logging;

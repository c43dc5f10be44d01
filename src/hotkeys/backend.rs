//! OS global-hotkey registration backend.
//!
//! The registry only needs two capabilities from the host: "claim this
//! combination and tell me if it is taken" and "release this claim".
//! `SystemHotkeyBackend` is that seam; `GlobalHotkeyBackend` implements it on
//! top of the `global-hotkey` crate.

use std::collections::HashMap;

use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    Error as GlobalHotkeyError, GlobalHotKeyManager,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{Shortcut, MOD_ALT, MOD_CONTROL, MOD_SHIFT, MOD_WIN};

/// Errors reported by an OS registration backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The combination is already claimed by another process or OS feature.
    #[error("hotkey '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("virtual-key code {0:#x} has no OS mapping")]
    UnsupportedKey(u16),
    #[error("registration failed: {0}")]
    Failed(String),
    #[error("hotkey backend unavailable: {0}")]
    Unavailable(String),
    #[error("unknown registration id {0}")]
    UnknownId(u32),
}

/// Trait for OS registration backends (allows mocking in tests).
pub trait SystemHotkeyBackend: Send + Sync {
    /// Claim `shortcut` globally. Returns the id the OS will report when it fires.
    fn register(&self, shortcut: Shortcut) -> Result<u32, BackendError>;
    fn unregister(&self, id: u32) -> Result<(), BackendError>;
}

enum Command {
    Register(Shortcut, async_channel::Sender<Result<u32, BackendError>>),
    Unregister(u32, async_channel::Sender<Result<(), BackendError>>),
}

/// Backend over `global_hotkey::GlobalHotKeyManager`.
///
/// The manager is owned by a dedicated thread; calls are forwarded over a
/// channel and answered synchronously. Events for registered ids arrive on
/// `GlobalHotKeyEvent::receiver()`.
pub struct GlobalHotkeyBackend {
    commands: async_channel::Sender<Command>,
}

impl GlobalHotkeyBackend {
    pub fn spawn() -> Result<Self, BackendError> {
        let (commands, requests) = async_channel::unbounded::<Command>();
        let (ready_tx, ready_rx) = async_channel::bounded::<Result<(), BackendError>>(1);

        std::thread::Builder::new()
            .name("hotkey-backend".to_string())
            .spawn(move || {
                let manager = match GlobalHotKeyManager::new() {
                    Ok(m) => m,
                    Err(e) => {
                        let unavailable = BackendError::Unavailable(e.to_string());
                        let _ = ready_tx.send_blocking(Err(unavailable));
                        return;
                    }
                };
                let _ = ready_tx.send_blocking(Ok(()));
                run_backend_loop(manager, requests);
            })
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        ready_rx
            .recv_blocking()
            .map_err(|_| BackendError::Unavailable("backend thread exited".to_string()))??;

        info!(event_type = "backend", "Global hotkey backend started");
        Ok(Self { commands })
    }

    fn request<T>(
        &self,
        build: impl FnOnce(async_channel::Sender<Result<T, BackendError>>) -> Command,
    ) -> Result<T, BackendError> {
        let (reply_tx, reply_rx) = async_channel::bounded(1);
        self.commands
            .send_blocking(build(reply_tx))
            .map_err(|_| BackendError::Unavailable("backend thread stopped".to_string()))?;
        reply_rx
            .recv_blocking()
            .map_err(|_| BackendError::Unavailable("backend thread stopped".to_string()))?
    }
}

impl SystemHotkeyBackend for GlobalHotkeyBackend {
    fn register(&self, shortcut: Shortcut) -> Result<u32, BackendError> {
        self.request(|reply| Command::Register(shortcut, reply))
    }

    fn unregister(&self, id: u32) -> Result<(), BackendError> {
        self.request(|reply| Command::Unregister(id, reply))
    }
}

fn run_backend_loop(manager: GlobalHotKeyManager, requests: async_channel::Receiver<Command>) {
    let mut registered: HashMap<u32, HotKey> = HashMap::new();

    while let Ok(command) = requests.recv_blocking() {
        match command {
            Command::Register(shortcut, reply) => {
                let result = to_global_hotkey(shortcut).and_then(|hotkey| {
                    let id = hotkey.id();
                    manager
                        .register(hotkey)
                        .map_err(|e| map_global_hotkey_error(e, shortcut))?;
                    registered.insert(id, hotkey);
                    debug!(shortcut = %shortcut, id, "OS hotkey registered");
                    Ok(id)
                });
                let _ = reply.send_blocking(result);
            }
            Command::Unregister(id, reply) => {
                let result = match registered.remove(&id) {
                    Some(hotkey) => manager
                        .unregister(hotkey)
                        .map_err(|e| BackendError::Failed(e.to_string())),
                    None => Err(BackendError::UnknownId(id)),
                };
                let _ = reply.send_blocking(result);
            }
        }
    }

    for (id, hotkey) in registered.drain() {
        if let Err(e) = manager.unregister(hotkey) {
            warn!(id, error = %e, "Failed to release OS hotkey on shutdown");
        }
    }
}

fn map_global_hotkey_error(error: GlobalHotkeyError, shortcut: Shortcut) -> BackendError {
    match error {
        GlobalHotkeyError::AlreadyRegistered(_) => {
            BackendError::AlreadyRegistered(shortcut.to_string())
        }
        GlobalHotkeyError::FailedToRegister(msg) => BackendError::Failed(msg),
        other => BackendError::Failed(other.to_string()),
    }
}

fn to_global_hotkey(shortcut: Shortcut) -> Result<HotKey, BackendError> {
    let code = code_for_vk(shortcut.vk_code).ok_or(BackendError::UnsupportedKey(shortcut.vk_code))?;

    let mut modifiers = Modifiers::empty();
    if shortcut.modifiers_mask & MOD_WIN != 0 {
        modifiers |= Modifiers::SUPER;
    }
    if shortcut.modifiers_mask & MOD_CONTROL != 0 {
        modifiers |= Modifiers::CONTROL;
    }
    if shortcut.modifiers_mask & MOD_SHIFT != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if shortcut.modifiers_mask & MOD_ALT != 0 {
        modifiers |= Modifiers::ALT;
    }

    Ok(HotKey::new(Some(modifiers), code))
}

/// Map a virtual-key code to the physical key code `global-hotkey` expects.
pub fn code_for_vk(vk_code: u16) -> Option<Code> {
    let code = match vk_code {
        0x08 => Code::Backspace,
        0x09 => Code::Tab,
        0x0D => Code::Enter,
        0x13 => Code::Pause,
        0x14 => Code::CapsLock,
        0x1B => Code::Escape,
        0x20 => Code::Space,
        0x21 => Code::PageUp,
        0x22 => Code::PageDown,
        0x23 => Code::End,
        0x24 => Code::Home,
        0x25 => Code::ArrowLeft,
        0x26 => Code::ArrowUp,
        0x27 => Code::ArrowRight,
        0x28 => Code::ArrowDown,
        0x2C => Code::PrintScreen,
        0x2D => Code::Insert,
        0x2E => Code::Delete,
        0x30 => Code::Digit0,
        0x31 => Code::Digit1,
        0x32 => Code::Digit2,
        0x33 => Code::Digit3,
        0x34 => Code::Digit4,
        0x35 => Code::Digit5,
        0x36 => Code::Digit6,
        0x37 => Code::Digit7,
        0x38 => Code::Digit8,
        0x39 => Code::Digit9,
        0x41 => Code::KeyA,
        0x42 => Code::KeyB,
        0x43 => Code::KeyC,
        0x44 => Code::KeyD,
        0x45 => Code::KeyE,
        0x46 => Code::KeyF,
        0x47 => Code::KeyG,
        0x48 => Code::KeyH,
        0x49 => Code::KeyI,
        0x4A => Code::KeyJ,
        0x4B => Code::KeyK,
        0x4C => Code::KeyL,
        0x4D => Code::KeyM,
        0x4E => Code::KeyN,
        0x4F => Code::KeyO,
        0x50 => Code::KeyP,
        0x51 => Code::KeyQ,
        0x52 => Code::KeyR,
        0x53 => Code::KeyS,
        0x54 => Code::KeyT,
        0x55 => Code::KeyU,
        0x56 => Code::KeyV,
        0x57 => Code::KeyW,
        0x58 => Code::KeyX,
        0x59 => Code::KeyY,
        0x5A => Code::KeyZ,
        0x60 => Code::Numpad0,
        0x61 => Code::Numpad1,
        0x62 => Code::Numpad2,
        0x63 => Code::Numpad3,
        0x64 => Code::Numpad4,
        0x65 => Code::Numpad5,
        0x66 => Code::Numpad6,
        0x67 => Code::Numpad7,
        0x68 => Code::Numpad8,
        0x69 => Code::Numpad9,
        0x6A => Code::NumpadMultiply,
        0x6B => Code::NumpadAdd,
        0x6D => Code::NumpadSubtract,
        0x6E => Code::NumpadDecimal,
        0x6F => Code::NumpadDivide,
        0x70 => Code::F1,
        0x71 => Code::F2,
        0x72 => Code::F3,
        0x73 => Code::F4,
        0x74 => Code::F5,
        0x75 => Code::F6,
        0x76 => Code::F7,
        0x77 => Code::F8,
        0x78 => Code::F9,
        0x79 => Code::F10,
        0x7A => Code::F11,
        0x7B => Code::F12,
        0x7C => Code::F13,
        0x7D => Code::F14,
        0x7E => Code::F15,
        0x7F => Code::F16,
        0x80 => Code::F17,
        0x81 => Code::F18,
        0x82 => Code::F19,
        0x83 => Code::F20,
        0x84 => Code::F21,
        0x85 => Code::F22,
        0x86 => Code::F23,
        0x87 => Code::F24,
        0xBA => Code::Semicolon,
        0xBB => Code::Equal,
        0xBC => Code::Comma,
        0xBD => Code::Minus,
        0xBE => Code::Period,
        0xBF => Code::Slash,
        0xC0 => Code::Backquote,
        0xDB => Code::BracketLeft,
        0xDC => Code::Backslash,
        0xDD => Code::BracketRight,
        0xDE => Code::Quote,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_digits_and_function_keys_map() {
        assert_eq!(code_for_vk(0x41), Some(Code::KeyA));
        assert_eq!(code_for_vk(0x5A), Some(Code::KeyZ));
        assert_eq!(code_for_vk(0x35), Some(Code::Digit5));
        assert_eq!(code_for_vk(0x87), Some(Code::F24));
        assert_eq!(code_for_vk(0xBA), Some(Code::Semicolon));
    }

    #[test]
    fn unmapped_codes_are_rejected() {
        assert_eq!(code_for_vk(0xFF), None);
        assert_eq!(code_for_vk(0x1FF), None);

        let err = to_global_hotkey(Shortcut::new(MOD_CONTROL, 0xFF)).unwrap_err();
        assert_eq!(err, BackendError::UnsupportedKey(0xFF));
    }

    #[test]
    fn conversion_keeps_identity_per_combination() {
        let a = to_global_hotkey(Shortcut::new(MOD_CONTROL | MOD_ALT, 0x54)).unwrap();
        let b = to_global_hotkey(Shortcut::new(MOD_CONTROL | MOD_ALT, 0x54)).unwrap();
        let c = to_global_hotkey(Shortcut::new(MOD_CONTROL | MOD_SHIFT, 0x54)).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn already_registered_maps_to_distinguished_error() {
        let hotkey = to_global_hotkey(Shortcut::new(MOD_WIN, 0x44)).unwrap();
        let err = map_global_hotkey_error(
            GlobalHotkeyError::AlreadyRegistered(hotkey),
            Shortcut::new(MOD_WIN, 0x44),
        );
        assert_eq!(err, BackendError::AlreadyRegistered("win+d".to_string()));
    }
}

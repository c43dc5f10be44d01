//! Core hotkey value types.
//!
//! This module provides:
//! - `Hotkey` - four modifier flags plus a virtual-key code
//! - `Shortcut` - the same combination as a Win32-style modifier mask
//! - `HotkeyHandle` - the canonical 16-bit map key derived from a hotkey
//! - `ShortcutParseError` - detailed parse errors for user feedback

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Modifier mask bits used by `Shortcut` (same values as `RegisterHotKey`).
pub const MOD_ALT: u16 = 0x0001;
pub const MOD_CONTROL: u16 = 0x0002;
pub const MOD_SHIFT: u16 = 0x0004;
pub const MOD_WIN: u16 = 0x0008;

/// Errors that can occur when parsing a shortcut string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortcutParseError {
    #[error("shortcut string is empty")]
    Empty,
    #[error("shortcut has no key, only modifiers")]
    MissingKey,
    #[error("shortcut has no modifier")]
    MissingModifier,
    #[error("unknown token '{0}' in shortcut")]
    UnknownToken(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// A modifier-keys + key-code combination.
///
/// Equality is structural. A hotkey with no modifier or a zero key code is
/// never valid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Hotkey {
    #[serde(default)]
    pub win: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub key: u8,
}

impl Hotkey {
    pub fn new(win: bool, ctrl: bool, shift: bool, alt: bool, key: u8) -> Self {
        Self {
            win,
            ctrl,
            shift,
            alt,
            key,
        }
    }

    pub fn has_modifier(&self) -> bool {
        self.win || self.ctrl || self.shift || self.alt
    }

    pub fn is_valid(&self) -> bool {
        self.has_modifier() && self.key != 0
    }

    pub fn handle(&self) -> HotkeyHandle {
        HotkeyHandle::encode(self)
    }

    pub fn to_shortcut(&self) -> Shortcut {
        Shortcut::from(*self)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_shortcut())
    }
}

/// Canonical 16-bit encoding of a `Hotkey`.
///
/// Bits 0-7 hold the key code, bit 8 Win, bit 9 Ctrl, bit 10 Shift, bit 11 Alt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyHandle(pub u16);

impl HotkeyHandle {
    const WIN_BIT: u16 = 1 << 8;
    const CTRL_BIT: u16 = 1 << 9;
    const SHIFT_BIT: u16 = 1 << 10;
    const ALT_BIT: u16 = 1 << 11;

    pub fn encode(hotkey: &Hotkey) -> Self {
        let mut handle = hotkey.key as u16;
        if hotkey.win {
            handle |= Self::WIN_BIT;
        }
        if hotkey.ctrl {
            handle |= Self::CTRL_BIT;
        }
        if hotkey.shift {
            handle |= Self::SHIFT_BIT;
        }
        if hotkey.alt {
            handle |= Self::ALT_BIT;
        }
        Self(handle)
    }

    pub fn decode(self) -> Hotkey {
        Hotkey {
            win: self.0 & Self::WIN_BIT != 0,
            ctrl: self.0 & Self::CTRL_BIT != 0,
            shift: self.0 & Self::SHIFT_BIT != 0,
            alt: self.0 & Self::ALT_BIT != 0,
            key: (self.0 & 0x00FF) as u8,
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<Hotkey> for HotkeyHandle {
    fn from(hotkey: Hotkey) -> Self {
        Self::encode(&hotkey)
    }
}

impl fmt::Display for HotkeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// A hotkey expressed as a modifier mask plus a virtual-key code.
///
/// This is the form handed to the OS registration primitive and to
/// `Parameterized` actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shortcut {
    pub modifiers_mask: u16,
    pub vk_code: u16,
}

impl Shortcut {
    pub fn new(modifiers_mask: u16, vk_code: u16) -> Self {
        Self {
            modifiers_mask,
            vk_code,
        }
    }

    pub fn to_hotkey(&self) -> Hotkey {
        Hotkey::from(*self)
    }

    pub fn handle(&self) -> HotkeyHandle {
        self.to_hotkey().handle()
    }

    /// Parse strings such as `"win+ctrl+shift+k"` or `"Ctrl+Alt+F4"`.
    pub fn parse(s: &str) -> Result<Self, ShortcutParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ShortcutParseError::Empty);
        }

        let mut modifiers_mask = 0u16;
        let mut key_part: Option<&str> = None;

        for part in s.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_lowercase().as_str() {
                "win" | "super" | "meta" | "cmd" | "command" => modifiers_mask |= MOD_WIN,
                "ctrl" | "control" | "ctl" => modifiers_mask |= MOD_CONTROL,
                "shift" | "shft" => modifiers_mask |= MOD_SHIFT,
                "alt" | "opt" | "option" | "menu" => modifiers_mask |= MOD_ALT,
                _ => {
                    if key_part.is_some() {
                        return Err(ShortcutParseError::UnknownToken(part.to_string()));
                    }
                    key_part = Some(part);
                }
            }
        }

        let key = key_part.ok_or(ShortcutParseError::MissingKey)?;
        let vk_code =
            vk_from_name(key).ok_or_else(|| ShortcutParseError::UnknownKey(key.to_string()))?;
        if modifiers_mask == 0 {
            return Err(ShortcutParseError::MissingModifier);
        }

        Ok(Self {
            modifiers_mask,
            vk_code: vk_code as u16,
        })
    }
}

impl From<Hotkey> for Shortcut {
    fn from(hotkey: Hotkey) -> Self {
        let mut modifiers_mask = 0;
        if hotkey.win {
            modifiers_mask |= MOD_WIN;
        }
        if hotkey.ctrl {
            modifiers_mask |= MOD_CONTROL;
        }
        if hotkey.shift {
            modifiers_mask |= MOD_SHIFT;
        }
        if hotkey.alt {
            modifiers_mask |= MOD_ALT;
        }
        Self {
            modifiers_mask,
            vk_code: hotkey.key as u16,
        }
    }
}

impl From<Shortcut> for Hotkey {
    fn from(shortcut: Shortcut) -> Self {
        Self {
            win: shortcut.modifiers_mask & MOD_WIN != 0,
            ctrl: shortcut.modifiers_mask & MOD_CONTROL != 0,
            shift: shortcut.modifiers_mask & MOD_SHIFT != 0,
            alt: shortcut.modifiers_mask & MOD_ALT != 0,
            // Codes outside the byte range cannot be encoded and become invalid.
            key: u8::try_from(shortcut.vk_code).unwrap_or(0),
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if self.modifiers_mask & MOD_SHIFT != 0 {
            parts.push("shift".to_string());
        }
        if self.modifiers_mask & MOD_CONTROL != 0 {
            parts.push("ctrl".to_string());
        }
        if self.modifiers_mask & MOD_WIN != 0 {
            parts.push("win".to_string());
        }
        if self.modifiers_mask & MOD_ALT != 0 {
            parts.push("alt".to_string());
        }
        parts.push(key_name(self.vk_code));
        write!(f, "{}", parts.join("+"))
    }
}

/// Virtual-key code table (code, canonical name).
const KEY_NAMES: &[(u8, &str)] = &[
    (0x08, "backspace"),
    (0x09, "tab"),
    (0x0D, "enter"),
    (0x13, "pause"),
    (0x14, "capslock"),
    (0x1B, "escape"),
    (0x20, "space"),
    (0x21, "pageup"),
    (0x22, "pagedown"),
    (0x23, "end"),
    (0x24, "home"),
    (0x25, "left"),
    (0x26, "up"),
    (0x27, "right"),
    (0x28, "down"),
    (0x2C, "printscreen"),
    (0x2D, "insert"),
    (0x2E, "delete"),
    (0x60, "numpad0"),
    (0x61, "numpad1"),
    (0x62, "numpad2"),
    (0x63, "numpad3"),
    (0x64, "numpad4"),
    (0x65, "numpad5"),
    (0x66, "numpad6"),
    (0x67, "numpad7"),
    (0x68, "numpad8"),
    (0x69, "numpad9"),
    (0x6A, "multiply"),
    (0x6B, "add"),
    (0x6D, "subtract"),
    (0x6E, "decimal"),
    (0x6F, "divide"),
    (0xBA, "semicolon"),
    (0xBB, "equal"),
    (0xBC, "comma"),
    (0xBD, "minus"),
    (0xBE, "period"),
    (0xBF, "slash"),
    (0xC0, "backquote"),
    (0xDB, "bracketleft"),
    (0xDC, "backslash"),
    (0xDD, "bracketright"),
    (0xDE, "quote"),
];

/// Resolve a key name (`"k"`, `"F5"`, `"esc"`, `";"`) to a virtual-key code.
pub fn vk_from_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "esc" => "escape",
        "return" => "enter",
        "del" => "delete",
        "ins" => "insert",
        "back" => "backspace",
        "pgup" => "pageup",
        "pgdn" | "pgdown" => "pagedown",
        "arrowleft" => "left",
        "arrowup" => "up",
        "arrowright" => "right",
        "arrowdown" => "down",
        ";" => "semicolon",
        "=" => "equal",
        "," => "comma",
        "-" => "minus",
        "." => "period",
        "/" => "slash",
        "`" | "grave" => "backquote",
        "[" => "bracketleft",
        "\\" => "backslash",
        "]" => "bracketright",
        "'" => "quote",
        other => other,
    };

    let bytes = canonical.as_bytes();
    if bytes.len() == 1 {
        let c = bytes[0];
        if c.is_ascii_lowercase() {
            return Some(c.to_ascii_uppercase());
        }
        if c.is_ascii_digit() {
            return Some(c);
        }
    }

    if let Some(n) = canonical
        .strip_prefix('f')
        .and_then(|rest| rest.parse::<u8>().ok())
    {
        if (1..=24).contains(&n) {
            return Some(0x70 + n - 1);
        }
    }

    KEY_NAMES
        .iter()
        .find(|(_, n)| *n == canonical)
        .map(|(code, _)| *code)
}

/// Human-readable name for a virtual-key code; unknown codes render as hex.
pub fn key_name(vk_code: u16) -> String {
    let Ok(code) = u8::try_from(vk_code) else {
        return format!("{:#x}", vk_code);
    };
    match code {
        b'A'..=b'Z' => (code as char).to_ascii_lowercase().to_string(),
        b'0'..=b'9' => (code as char).to_string(),
        0x70..=0x87 => format!("f{}", code - 0x70 + 1),
        _ => KEY_NAMES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("{:#04x}", code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_bit_layout_matches_documented_encoding() {
        let key_only = Hotkey::new(false, false, false, false, 0x4B);
        assert_eq!(key_only.handle().value(), 0x004B);

        assert_eq!(Hotkey::new(true, false, false, false, 0).handle().value(), 1 << 8);
        assert_eq!(Hotkey::new(false, true, false, false, 0).handle().value(), 1 << 9);
        assert_eq!(Hotkey::new(false, false, true, false, 0).handle().value(), 1 << 10);
        assert_eq!(Hotkey::new(false, false, false, true, 0).handle().value(), 1 << 11);

        let all = Hotkey::new(true, true, true, true, 0xFF);
        assert_eq!(all.handle().value(), 0x0FFF);
    }

    #[test]
    fn handle_is_injective_over_the_used_bits() {
        let mut seen = std::collections::HashSet::new();
        for mods in 0u8..16 {
            for key in 0u8..=255 {
                let hotkey = Hotkey::new(
                    mods & 1 != 0,
                    mods & 2 != 0,
                    mods & 4 != 0,
                    mods & 8 != 0,
                    key,
                );
                assert!(seen.insert(hotkey.handle()), "duplicate handle for {:?}", hotkey);
                assert_eq!(hotkey.handle().decode(), hotkey);
            }
        }
        assert_eq!(seen.len(), 16 * 256);
    }

    #[test]
    fn validity_requires_modifier_and_key() {
        assert!(!Hotkey::new(false, false, false, false, 0x41).is_valid());
        assert!(!Hotkey::new(false, true, false, false, 0).is_valid());
        assert!(Hotkey::new(false, true, false, false, 0x41).is_valid());
    }

    #[test]
    fn shortcut_conversion_preserves_modifiers() {
        let hotkey = Hotkey::new(true, false, true, true, 0x54);
        let shortcut = Shortcut::from(hotkey);
        assert_eq!(shortcut.modifiers_mask, MOD_WIN | MOD_SHIFT | MOD_ALT);
        assert_eq!(shortcut.vk_code, 0x54);
        assert_eq!(Hotkey::from(shortcut), hotkey);
    }

    #[test]
    fn shortcut_with_wide_key_code_becomes_invalid() {
        let shortcut = Shortcut::new(MOD_CONTROL, 0x1FF);
        let hotkey = shortcut.to_hotkey();
        assert_eq!(hotkey.key, 0);
        assert!(!hotkey.is_valid());
    }

    #[test]
    fn parse_accepts_aliases_and_case() {
        let shortcut = Shortcut::parse("Control+Super+K").unwrap();
        assert_eq!(shortcut.modifiers_mask, MOD_CONTROL | MOD_WIN);
        assert_eq!(shortcut.vk_code, 0x4B);

        let shortcut = Shortcut::parse("alt + f4").unwrap();
        assert_eq!(shortcut.modifiers_mask, MOD_ALT);
        assert_eq!(shortcut.vk_code, 0x73);

        let shortcut = Shortcut::parse("ctrl+shift+esc").unwrap();
        assert_eq!(shortcut.vk_code, 0x1B);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Shortcut::parse("  "), Err(ShortcutParseError::Empty));
        assert_eq!(Shortcut::parse("ctrl+shift"), Err(ShortcutParseError::MissingKey));
        assert_eq!(Shortcut::parse("k"), Err(ShortcutParseError::MissingModifier));
        assert_eq!(
            Shortcut::parse("ctrl+k+j"),
            Err(ShortcutParseError::UnknownToken("j".to_string()))
        );
        assert_eq!(
            Shortcut::parse("ctrl+banana"),
            Err(ShortcutParseError::UnknownKey("banana".to_string()))
        );
    }

    #[test]
    fn display_orders_modifiers_shift_ctrl_win_alt() {
        let shortcut = Shortcut::new(MOD_ALT | MOD_WIN | MOD_CONTROL | MOD_SHIFT, 0x4B);
        assert_eq!(shortcut.to_string(), "shift+ctrl+win+alt+k");

        let shortcut = Shortcut::new(MOD_CONTROL, 0x7B);
        assert_eq!(shortcut.to_string(), "ctrl+f12");
    }

    #[test]
    fn key_names_round_trip_through_parse() {
        for name in ["a", "z", "0", "9", "f1", "f24", "space", "semicolon", "pagedown"] {
            let code = vk_from_name(name).unwrap();
            assert_eq!(key_name(code as u16), name);
        }
        assert_eq!(key_name(0xE8), "0xe8");
    }
}

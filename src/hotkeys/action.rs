//! Bound hotkey actions and the registration mechanism they belong to.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::Shortcut;

/// How a hotkey reaches the registry's owner at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    /// Matched by the low-level keyboard hook.
    Hook,
    /// Registered with the OS global-hotkey primitive.
    Shortcut,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Hook => write!(f, "hook"),
            Mechanism::Shortcut => write!(f, "shortcut"),
        }
    }
}

/// Predicate-style callback used by hook-based hotkeys.
pub type SimpleCallback = Arc<dyn Fn() -> bool + Send + Sync>;

/// Callback for OS-registered shortcuts: receives (modifier mask, key code).
pub type ParameterizedCallback = Arc<dyn Fn(u16, u16) + Send + Sync>;

/// The action bound to a registry entry.
#[derive(Clone)]
pub enum HotkeyAction {
    Simple(SimpleCallback),
    Parameterized(ParameterizedCallback),
}

impl HotkeyAction {
    pub fn simple<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::Simple(Arc::new(f))
    }

    pub fn parameterized<F>(f: F) -> Self
    where
        F: Fn(u16, u16) + Send + Sync + 'static,
    {
        Self::Parameterized(Arc::new(f))
    }

    /// Placeholder action carried by the synthetic "System" conflict entry.
    pub fn noop() -> Self {
        Self::simple(|| false)
    }

    /// The mechanism this action shape is registered under.
    pub fn mechanism(&self) -> Mechanism {
        match self {
            Self::Simple(_) => Mechanism::Hook,
            Self::Parameterized(_) => Mechanism::Shortcut,
        }
    }

    /// Invoke the action, catching panics so they never unwind into the
    /// hook callback or the OS message loop.
    ///
    /// Returns `Err(message)` if the action panicked.
    pub fn invoke(&self, shortcut: Shortcut) -> Result<bool, String> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match self {
            Self::Simple(f) => f(),
            Self::Parameterized(f) => {
                f(shortcut.modifiers_mask, shortcut.vk_code);
                true
            }
        }));

        result.map_err(|payload| panic_message(payload.as_ref()))
    }
}

impl fmt::Debug for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => write!(f, "HotkeyAction::Simple"),
            Self::Parameterized(_) => write!(f, "HotkeyAction::Parameterized"),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn mechanism_follows_action_shape() {
        assert_eq!(HotkeyAction::simple(|| true).mechanism(), Mechanism::Hook);
        assert_eq!(
            HotkeyAction::parameterized(|_, _| {}).mechanism(),
            Mechanism::Shortcut
        );
    }

    #[test]
    fn parameterized_receives_mask_and_code() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);
        let action = HotkeyAction::parameterized(move |mods, key| {
            seen_clone.store(((mods as u32) << 16) | key as u32, Ordering::SeqCst);
        });

        let result = action.invoke(Shortcut::new(0x0003, 0x4B));
        assert_eq!(result, Ok(true));
        assert_eq!(seen.load(Ordering::SeqCst), 0x0003_004B);
    }

    #[test]
    fn simple_returns_callback_result() {
        let action = HotkeyAction::simple(|| false);
        assert_eq!(action.invoke(Shortcut::default()), Ok(false));
    }

    #[test]
    fn panics_are_caught_and_reported() {
        let action = HotkeyAction::simple(|| panic!("boom"));
        let result = action.invoke(Shortcut::default());
        assert_eq!(result, Err("boom".to_string()));

        let action = HotkeyAction::parameterized(|_, _| panic!("{}", String::from("owned")));
        assert_eq!(action.invoke(Shortcut::default()), Err("owned".to_string()));
    }
}

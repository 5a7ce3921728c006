//! Key identity resolution
//!
//! Raw key identifiers arrive from the host's input layer in the DOM
//! `KeyboardEvent.code` style (`KeyA`, `ShiftLeft`, `Numpad5`, ...). The rest of
//! the engine only ever sees the readable [`KeyName`] produced here.
//!
//! Identifiers missing from the static table get a derived name: a space is
//! inserted wherever a lowercase letter or digit is followed by an uppercase
//! letter, and the result is lowercased (`IntlBackslash` -> `intl backslash`).
//! Derived names are cached, first-seen-wins.

use std::collections::HashMap;

/// Canonical, human-readable key name (e.g. `"a"`, `"left shift"`, `"numpad: 5"`).
pub type KeyName = String;

/// Sentinel key that is down whenever any other key is down.
pub const ANY: &str = "any";

/// Reported as the current key when nothing is pressed.
pub const NO_KEY: &str = "None";

/// Prefix distinguishing tag names from key names.
pub const TAG_PREFIX: char = '#';

/// Returns true if `name` refers to a tag rather than a key.
pub fn is_tag(name: &str) -> bool {
    name.starts_with(TAG_PREFIX)
}

/// Split a comma-separated key list (`"a, left shift, #digits"`).
///
/// Entries are trimmed; empty entries are dropped.
pub fn parse_key_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Maps raw key identifiers to readable key names.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    /// Names derived for identifiers missing from the static table
    derived: HashMap<String, KeyName>,
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw identifier. Never fails.
    pub fn resolve(&mut self, raw_id: &str) -> KeyName {
        if let Some(name) = known_key_name(raw_id) {
            return name.to_string();
        }

        if let Some(name) = self.derived.get(raw_id) {
            return name.clone();
        }

        let name = derive_key_name(raw_id);
        tracing::debug!("Derived key name '{}' for raw id '{}'", name, raw_id);
        self.derived.insert(raw_id.to_string(), name.clone());
        name
    }

    /// Number of derived names cached so far.
    pub fn cached_len(&self) -> usize {
        self.derived.len()
    }
}

/// Derive a readable name for an identifier missing from the static table.
pub fn derive_key_name(raw_id: &str) -> KeyName {
    let mut name = String::with_capacity(raw_id.len() + 4);
    let mut prev: Option<char> = None;

    for ch in raw_id.chars() {
        if let Some(p) = prev {
            if (p.is_ascii_lowercase() || p.is_ascii_digit()) && ch.is_ascii_uppercase() {
                name.push(' ');
            }
        }
        name.extend(ch.to_lowercase());
        prev = Some(ch);
    }

    name
}

/// Static table of known raw identifiers
fn known_key_name(raw_id: &str) -> Option<&'static str> {
    let name = match raw_id {
        "Space" => "space",
        "ArrowUp" => "up arrow",
        "ArrowDown" => "down arrow",
        "ArrowLeft" => "left arrow",
        "ArrowRight" => "right arrow",
        "Backspace" => "backspace",
        "Enter" => "enter",
        "Any" => ANY,
        "Escape" => "escape",
        "Tab" => "tab",
        "ContextMenu" => "context menu",

        // Modifiers
        "ShiftLeft" => "left shift",
        "ShiftRight" => "right shift",
        "ControlLeft" => "left control",
        "ControlRight" => "right control",
        "AltLeft" => "left alt",
        "AltRight" => "right alt",
        "MetaLeft" => "left meta",
        "MetaRight" => "right meta",

        // Letters
        "KeyA" => "a",
        "KeyB" => "b",
        "KeyC" => "c",
        "KeyD" => "d",
        "KeyE" => "e",
        "KeyF" => "f",
        "KeyG" => "g",
        "KeyH" => "h",
        "KeyI" => "i",
        "KeyJ" => "j",
        "KeyK" => "k",
        "KeyL" => "l",
        "KeyM" => "m",
        "KeyN" => "n",
        "KeyO" => "o",
        "KeyP" => "p",
        "KeyQ" => "q",
        "KeyR" => "r",
        "KeyS" => "s",
        "KeyT" => "t",
        "KeyU" => "u",
        "KeyV" => "v",
        "KeyW" => "w",
        "KeyX" => "x",
        "KeyY" => "y",
        "KeyZ" => "z",

        // Number row
        "Digit0" => "0",
        "Digit1" => "1",
        "Digit2" => "2",
        "Digit3" => "3",
        "Digit4" => "4",
        "Digit5" => "5",
        "Digit6" => "6",
        "Digit7" => "7",
        "Digit8" => "8",
        "Digit9" => "9",

        // Symbols
        "Backquote" => "backquote",
        "Minus" => "minus",
        "Equal" => "equal",
        "BracketLeft" => "left bracket",
        "BracketRight" => "right bracket",
        "Backslash" => "backslash",
        "Semicolon" => "semicolon",
        "Quote" => "quote",
        "Comma" => "comma",
        "Period" => "period",
        "Slash" => "slash",

        // Function keys keep their uppercase spelling
        "F1" => "F1",
        "F2" => "F2",
        "F3" => "F3",
        "F4" => "F4",
        "F5" => "F5",
        "F6" => "F6",
        "F7" => "F7",
        "F8" => "F8",
        "F9" => "F9",
        "F10" => "F10",
        "F11" => "F11",
        "F12" => "F12",

        // Locks
        "CapsLock" => "caps lock",
        "ScrollLock" => "scroll lock",
        "NumLock" => "num lock",

        // Navigation cluster
        "Insert" => "insert",
        "Delete" => "delete",
        "Home" => "home",
        "End" => "end",
        "PageUp" => "page up",
        "PageDown" => "page down",

        // Numpad
        "NumpadDivide" => "numpad: divide",
        "NumpadMultiply" => "numpad: multiply",
        "NumpadSubtract" => "numpad: subtract",
        "NumpadAdd" => "numpad: add",
        "Numpad0" => "numpad: 0",
        "Numpad1" => "numpad: 1",
        "Numpad2" => "numpad: 2",
        "Numpad3" => "numpad: 3",
        "Numpad4" => "numpad: 4",
        "Numpad5" => "numpad: 5",
        "Numpad6" => "numpad: 6",
        "Numpad7" => "numpad: 7",
        "Numpad8" => "numpad: 8",
        "Numpad9" => "numpad: 9",
        "NumpadDecimal" => "numpad: decimal",
        "NumpadEnter" => "numpad: enter",

        _ => return None,
    };

    Some(name)
}

//! evdev keyboards as an engine input layer
//!
//! Kernel key codes are translated to the platform identifiers the engine
//! resolves (`KEY_A` -> `KeyA`, `KEY_LEFTSHIFT` -> `ShiftLeft`). Keys without
//! a fixed identifier get one built from their kernel name, which the engine
//! then turns into a readable name on its own.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evdev::{Device, InputEventKind, Key};
use keysense_engine::InputEvent;

/// Event value constants for key events.
pub mod event_value {
    pub const RELEASE: i32 = 0;
    pub const PRESS: i32 = 1;
    /// Autorepeat; the engine treats it as another key-down
    pub const REPEAT: i32 = 2;
}

/// Check if a device is a keyboard
pub fn is_keyboard(device: &Device) -> bool {
    device
        .supported_events()
        .contains(evdev::EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(Key::KEY_A))
            .unwrap_or(false)
}

/// All `/dev/input/event*` paths, sorted
pub fn event_device_paths() -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in std::fs::read_dir("/dev/input").context("Failed to read /dev/input")? {
        let path = entry?.path();
        let is_event = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);
        if is_event {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Open the given device, or the first keyboard found.
pub fn open_keyboard(path: Option<&Path>) -> Result<(PathBuf, Device)> {
    if let Some(path) = path {
        let device = Device::open(path)
            .with_context(|| format!("Failed to open device {}", path.display()))?;
        return Ok((path.to_path_buf(), device));
    }

    for path in event_device_paths()? {
        match Device::open(&path) {
            Ok(device) if is_keyboard(&device) => return Ok((path, device)),
            Ok(_) => {}
            Err(e) => tracing::debug!("Could not open {}: {}", path.display(), e),
        }
    }

    anyhow::bail!("No readable keyboard found under /dev/input (try --device or check permissions)")
}

/// Platform identifier for a kernel key code
pub fn raw_id(key: Key) -> Option<String> {
    if let Some(id) = known_raw_id(key) {
        return Some(id.to_string());
    }

    // KEY_VOLUMEUP -> Volumeup, KEY_F13 -> F13
    let debug = format!("{:?}", key);
    let name = debug.strip_prefix("KEY_")?;
    let id = name
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<String>();

    (!id.is_empty()).then_some(id)
}

/// Printable value produced by a key, ignoring modifiers
pub fn printable_value(key: Key) -> Option<String> {
    let id = known_raw_id(key)?;
    if let Some(letter) = id.strip_prefix("Key") {
        return Some(letter.to_lowercase());
    }
    if let Some(digit) = id.strip_prefix("Digit") {
        return Some(digit.to_string());
    }
    match id {
        "Space" => Some(" ".to_string()),
        _ => None,
    }
}

/// Translate a kernel event into an engine input event.
///
/// Non-key events and keys without an identifier yield `None`.
pub fn to_input_event(event: &evdev::InputEvent) -> Option<InputEvent> {
    let InputEventKind::Key(key) = event.kind() else {
        return None;
    };
    let raw_id = raw_id(key)?;

    match event.value() {
        event_value::PRESS | event_value::REPEAT => Some(InputEvent::KeyDown {
            raw_id,
            value: printable_value(key),
        }),
        event_value::RELEASE => Some(InputEvent::KeyUp { raw_id }),
        _ => None,
    }
}

fn known_raw_id(key: Key) -> Option<&'static str> {
    let id = match key {
        Key::KEY_SPACE => "Space",
        Key::KEY_UP => "ArrowUp",
        Key::KEY_DOWN => "ArrowDown",
        Key::KEY_LEFT => "ArrowLeft",
        Key::KEY_RIGHT => "ArrowRight",
        Key::KEY_BACKSPACE => "Backspace",
        Key::KEY_ENTER => "Enter",
        Key::KEY_ESC => "Escape",
        Key::KEY_TAB => "Tab",
        Key::KEY_COMPOSE => "ContextMenu",

        // Modifiers
        Key::KEY_LEFTSHIFT => "ShiftLeft",
        Key::KEY_RIGHTSHIFT => "ShiftRight",
        Key::KEY_LEFTCTRL => "ControlLeft",
        Key::KEY_RIGHTCTRL => "ControlRight",
        Key::KEY_LEFTALT => "AltLeft",
        Key::KEY_RIGHTALT => "AltRight",
        Key::KEY_LEFTMETA => "MetaLeft",
        Key::KEY_RIGHTMETA => "MetaRight",

        // Letters
        Key::KEY_A => "KeyA",
        Key::KEY_B => "KeyB",
        Key::KEY_C => "KeyC",
        Key::KEY_D => "KeyD",
        Key::KEY_E => "KeyE",
        Key::KEY_F => "KeyF",
        Key::KEY_G => "KeyG",
        Key::KEY_H => "KeyH",
        Key::KEY_I => "KeyI",
        Key::KEY_J => "KeyJ",
        Key::KEY_K => "KeyK",
        Key::KEY_L => "KeyL",
        Key::KEY_M => "KeyM",
        Key::KEY_N => "KeyN",
        Key::KEY_O => "KeyO",
        Key::KEY_P => "KeyP",
        Key::KEY_Q => "KeyQ",
        Key::KEY_R => "KeyR",
        Key::KEY_S => "KeyS",
        Key::KEY_T => "KeyT",
        Key::KEY_U => "KeyU",
        Key::KEY_V => "KeyV",
        Key::KEY_W => "KeyW",
        Key::KEY_X => "KeyX",
        Key::KEY_Y => "KeyY",
        Key::KEY_Z => "KeyZ",

        // Number row
        Key::KEY_0 => "Digit0",
        Key::KEY_1 => "Digit1",
        Key::KEY_2 => "Digit2",
        Key::KEY_3 => "Digit3",
        Key::KEY_4 => "Digit4",
        Key::KEY_5 => "Digit5",
        Key::KEY_6 => "Digit6",
        Key::KEY_7 => "Digit7",
        Key::KEY_8 => "Digit8",
        Key::KEY_9 => "Digit9",

        // Symbols
        Key::KEY_GRAVE => "Backquote",
        Key::KEY_MINUS => "Minus",
        Key::KEY_EQUAL => "Equal",
        Key::KEY_LEFTBRACE => "BracketLeft",
        Key::KEY_RIGHTBRACE => "BracketRight",
        Key::KEY_BACKSLASH => "Backslash",
        Key::KEY_SEMICOLON => "Semicolon",
        Key::KEY_APOSTROPHE => "Quote",
        Key::KEY_COMMA => "Comma",
        Key::KEY_DOT => "Period",
        Key::KEY_SLASH => "Slash",

        // Function keys
        Key::KEY_F1 => "F1",
        Key::KEY_F2 => "F2",
        Key::KEY_F3 => "F3",
        Key::KEY_F4 => "F4",
        Key::KEY_F5 => "F5",
        Key::KEY_F6 => "F6",
        Key::KEY_F7 => "F7",
        Key::KEY_F8 => "F8",
        Key::KEY_F9 => "F9",
        Key::KEY_F10 => "F10",
        Key::KEY_F11 => "F11",
        Key::KEY_F12 => "F12",

        // Locks
        Key::KEY_CAPSLOCK => "CapsLock",
        Key::KEY_SCROLLLOCK => "ScrollLock",
        Key::KEY_NUMLOCK => "NumLock",

        // Navigation cluster
        Key::KEY_INSERT => "Insert",
        Key::KEY_DELETE => "Delete",
        Key::KEY_HOME => "Home",
        Key::KEY_END => "End",
        Key::KEY_PAGEUP => "PageUp",
        Key::KEY_PAGEDOWN => "PageDown",

        // Numpad
        Key::KEY_KPSLASH => "NumpadDivide",
        Key::KEY_KPASTERISK => "NumpadMultiply",
        Key::KEY_KPMINUS => "NumpadSubtract",
        Key::KEY_KPPLUS => "NumpadAdd",
        Key::KEY_KP0 => "Numpad0",
        Key::KEY_KP1 => "Numpad1",
        Key::KEY_KP2 => "Numpad2",
        Key::KEY_KP3 => "Numpad3",
        Key::KEY_KP4 => "Numpad4",
        Key::KEY_KP5 => "Numpad5",
        Key::KEY_KP6 => "Numpad6",
        Key::KEY_KP7 => "Numpad7",
        Key::KEY_KP8 => "Numpad8",
        Key::KEY_KP9 => "Numpad9",
        Key::KEY_KPDOT => "NumpadDecimal",
        Key::KEY_KPENTER => "NumpadEnter",

        _ => return None,
    };

    Some(id)
}

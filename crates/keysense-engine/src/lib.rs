//! Key-state tracking engine
//!
//! Tracks which keys are down and for how long, derives short "hit" and
//! "released" pulses, matches ordered and unordered key combinations, resolves
//! tags and named keybindings, and lets simulated presses coexist with
//! physical ones.
//!
//! Hosts feed raw input through [`KeyState::handle_input`] (or the shared
//! [`KeySense`] handle when running on tokio) and query the state at will.

mod blocklist;
mod engine;
mod error;
mod keybinds;
mod keys;
mod listeners;
mod matcher;
mod settings;
mod simulator;
mod tags;
mod timing;
mod tracker;

pub use blocklist::Blocklist;
pub use engine::{
    InputEvent, KeyAttribute, KeySense, KeyState, PressedKey, SharedKeyState, Snapshot,
};
pub use error::EngineError;
pub use keybinds::{KeybindRegistry, Keybinding};
pub use keys::{
    derive_key_name, is_tag, parse_key_list, KeyName, KeyResolver, ANY, NO_KEY, TAG_PREFIX,
};
pub use listeners::{
    KeyEvent, KeyEventReceiver, Listener, ListenerKind, Notifier, DEFAULT_CHANNEL_BUFFER,
};
pub use settings::{
    Setting, Settings, Value, DEFAULT_NOT_INITIALIZED_MESSAGE, DEFAULT_NOT_SIMULATED_MESSAGE,
    DEFAULT_SENSITIVITY, FALLBACK_SENSITIVITY,
};
pub use tags::{tag_name, TagTable};
pub use timing::TimeReading;
pub use tracker::{PressRecord, PressSource, PressTracker, RawAttributes, Transition};

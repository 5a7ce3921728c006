//! The engine context
//!
//! [`KeyState`] owns every piece of engine state: press records, tags,
//! keybindings, the blocklist, settings, listeners and simulation timers.
//! All mutations go through `&mut KeyState`, so a press, a release or a timer
//! expiry always runs to completion before the next one starts.
//!
//! [`KeySense`] wraps a `KeyState` in `Arc<Mutex<_>>` for hosts running on a
//! tokio runtime. Simulation timers post their expiry through the same mutex.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::blocklist::Blocklist;
use crate::error::EngineError;
use crate::keybinds::KeybindRegistry;
use crate::keys::{is_tag, KeyName, KeyResolver, NO_KEY};
use crate::listeners::{KeyEvent, KeyEventReceiver, Listener, ListenerKind, Listeners, Notifier};
use crate::settings::{Setting, Settings, Value, FALLBACK_SENSITIVITY};
use crate::simulator::SimulationTimer;
use crate::tags::TagTable;
use crate::tracker::{PressRecord, PressSource, PressTracker, RawAttributes, Transition};

/// Inbound events from the host's input layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Physical key-down with its platform identifier and printable value
    KeyDown {
        raw_id: String,
        value: Option<String>,
    },
    /// Physical key-up
    KeyUp { raw_id: String },
    /// Host window lost focus
    FocusLost,
}

impl InputEvent {
    pub fn key_down(raw_id: impl Into<String>) -> Self {
        InputEvent::KeyDown {
            raw_id: raw_id.into(),
            value: None,
        }
    }

    pub fn key_up(raw_id: impl Into<String>) -> Self {
        InputEvent::KeyUp {
            raw_id: raw_id.into(),
        }
    }
}

/// Attributes of the current key a host can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAttribute {
    Code,
    Value,
    FormattedName,
    TimePressed,
    IsSimulated,
    IsTrulyPressed,
}

impl FromStr for KeyAttribute {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "value" => Ok(Self::Value),
            "formatted name" => Ok(Self::FormattedName),
            "time pressed" => Ok(Self::TimePressed),
            "is simulated?" | "is simulated" => Ok(Self::IsSimulated),
            "is truly pressed?" | "is truly pressed" => Ok(Self::IsTrulyPressed),
            _ => Err(EngineError::UnknownAttribute(s.to_string())),
        }
    }
}

impl fmt::Display for KeyAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAttribute::Code => "code",
            KeyAttribute::Value => "value",
            KeyAttribute::FormattedName => "formatted name",
            KeyAttribute::TimePressed => "time pressed",
            KeyAttribute::IsSimulated => "is simulated?",
            KeyAttribute::IsTrulyPressed => "is truly pressed?",
        };
        write!(f, "{}", name)
    }
}

/// Serializable view of the press state
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub pressed: Vec<PressedKey>,
    pub current_key: String,
    pub any: Option<String>,
    pub last_pressed: Option<String>,
    pub last_released: Option<String>,
    pub active_keybinds: Vec<String>,
    pub blocked: Vec<String>,
    pub simulating: Vec<String>,
}

/// One pressed key in a [`Snapshot`]
#[derive(Debug, Clone, Serialize)]
pub struct PressedKey {
    pub key: KeyName,
    pub held_for: f64,
    pub simulated: bool,
    pub truly_pressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// All engine state
#[derive(Debug)]
pub struct KeyState {
    pub(crate) resolver: KeyResolver,
    pub(crate) tracker: PressTracker,
    pub(crate) tags: TagTable,
    pub(crate) keybinds: KeybindRegistry,
    blocklist: Blocklist,
    pub(crate) settings: Settings,
    listeners: Listeners,
    notifier: Option<Notifier>,
    pub(crate) timers: HashMap<KeyName, SimulationTimer>,
}

impl Default for KeyState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl KeyState {
    /// Create an engine with the built-in tags and no notification channel.
    pub fn new(settings: Settings) -> Self {
        Self {
            resolver: KeyResolver::new(),
            tracker: PressTracker::new(),
            tags: TagTable::with_builtin_tags(),
            keybinds: KeybindRegistry::default(),
            blocklist: Blocklist::new(),
            settings,
            listeners: Listeners::default(),
            notifier: None,
            timers: HashMap::new(),
        }
    }

    /// Create an engine that sends a [`KeyEvent`] for every key going down
    /// or up through a channel with `buffer_size` slots.
    pub fn with_notifications(settings: Settings, buffer_size: usize) -> (Self, KeyEventReceiver) {
        let (notifier, receiver) = Notifier::new(buffer_size);
        let mut state = Self::new(settings);
        state.notifier = Some(notifier);
        (state, receiver)
    }

    // ========================================================================
    // Input path
    // ========================================================================

    /// Apply one event from the host's input layer.
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown { raw_id, value } => {
                let key = self.resolver.resolve(&raw_id);
                self.press(&key, PressSource::Physical, RawAttributes::new(raw_id, value));
            }
            InputEvent::KeyUp { raw_id } => {
                let key = self.resolver.resolve(&raw_id);
                self.release(&key, PressSource::Physical);
            }
            InputEvent::FocusLost => self.focus_lost(),
        }
    }

    /// Press `key` from `source`. Returns true if the key went from up to down.
    pub fn press(&mut self, key: &str, source: PressSource, attributes: RawAttributes) -> bool {
        if self.blocklist.is_blocked(key) {
            tracing::debug!("Ignoring press of blocked key '{}'", key);
            return false;
        }

        match self.tracker.press(key, source, attributes, Instant::now()) {
            Transition::Pressed => {
                tracing::debug!("Key '{}' pressed ({:?})", key, source);
                self.listeners.dispatch(ListenerKind::KeyDown, key);
                if let Some(notifier) = &self.notifier {
                    notifier.notify(KeyEvent::Pressed {
                        key: key.to_string(),
                        source,
                    });
                }
                true
            }
            Transition::SourceAdded => {
                tracing::debug!("Key '{}' now also held by {:?}", key, source);
                false
            }
            Transition::Ignored => {
                tracing::warn!("Key '{}' is managed by the engine and cannot be pressed", key);
                false
            }
            _ => false,
        }
    }

    /// Release `key` from `source`. Returns true if the key went from down to up.
    pub fn release(&mut self, key: &str, source: PressSource) -> bool {
        if self.blocklist.is_blocked(key) {
            tracing::debug!("Ignoring release of blocked key '{}'", key);
            return false;
        }

        match self.tracker.release(key, source, Instant::now()) {
            Transition::Released => {
                tracing::debug!("Key '{}' released ({:?})", key, source);
                self.listeners.dispatch(ListenerKind::KeyUp, key);
                if let Some(notifier) = &self.notifier {
                    notifier.notify(KeyEvent::Released {
                        key: key.to_string(),
                    });
                }
                true
            }
            Transition::SourceRemoved => {
                tracing::debug!("Key '{}' no longer held by {:?}, still down", key, source);
                false
            }
            Transition::Missing => {
                match source {
                    PressSource::Physical => {
                        tracing::warn!("Ignoring release of '{}' which is not pressed", key)
                    }
                    PressSource::Simulated => {
                        tracing::debug!("Simulated release of '{}' found no press", key)
                    }
                }
                false
            }
            Transition::Ignored => {
                tracing::warn!("Key '{}' is managed by the engine and cannot be released", key);
                false
            }
            _ => false,
        }
    }

    /// Host window lost focus: with clear-on-blur, forget every press.
    ///
    /// This bypasses the release path; no listeners run and no release
    /// timestamps are recorded.
    pub fn focus_lost(&mut self) {
        if self.settings.clear_on_blur {
            tracing::debug!("Focus lost, clearing {} pressed key(s)", self.tracker.pressed_count());
            self.tracker.clear();
        }
    }

    /// Register a listener for `"keydown"` or `"keyup"`.
    ///
    /// Unknown kinds are logged and rejected.
    pub fn add_listener(&mut self, kind: &str, listener: Listener) -> Result<(), EngineError> {
        match kind.parse::<ListenerKind>() {
            Ok(kind) => {
                self.listeners.add(kind, listener);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Resolve a query argument: tags resolve to their longest-held pressed
    /// member (or nothing), anything else is taken as a key name.
    pub fn lookup(&self, key_or_tag: &str) -> Option<KeyName> {
        if is_tag(key_or_tag) {
            self.tags.resolve(key_or_tag, &self.tracker)
        } else {
            Some(key_or_tag.to_string())
        }
    }

    /// Press record for a key or tag, if down.
    pub fn record(&self, key_or_tag: &str) -> Option<&PressRecord> {
        let key = self.lookup(key_or_tag)?;
        self.tracker.record(&key)
    }

    pub fn is_pressed(&self, key_or_tag: &str) -> bool {
        self.record(key_or_tag).is_some()
    }

    /// Whether a simulated press currently holds the key.
    pub fn is_simulated(&self, key_or_tag: &str) -> bool {
        self.record(key_or_tag).is_some_and(|r| r.is_simulated)
    }

    /// Whether the physical keyboard currently holds the key.
    pub fn is_truly_pressed(&self, key_or_tag: &str) -> bool {
        self.record(key_or_tag).is_some_and(|r| r.is_truly_pressed)
    }

    pub fn pressed_keys(&self) -> Vec<KeyName> {
        self.tracker.pressed_keys()
    }

    pub fn pressed_count(&self) -> usize {
        self.tracker.pressed_count()
    }

    /// Printable value of each pressed key, falling back to the key name.
    pub fn pressed_values(&self) -> Vec<String> {
        self.tracker
            .pressed_keys()
            .into_iter()
            .map(|key| match self.tracker.value_of(&key) {
                Some(value) => value.to_string(),
                None => key,
            })
            .collect()
    }

    /// Most recently pressed key still down, or `"None"`.
    pub fn current_key(&self) -> &str {
        self.tracker.current_key()
    }

    /// The key `any` currently stands for.
    pub fn any_key(&self) -> Option<&str> {
        self.tracker.any_bound_to()
    }

    pub fn last_pressed(&self) -> Option<&str> {
        self.tracker.last_pressed()
    }

    pub fn last_released(&self) -> Option<&str> {
        self.tracker.last_released()
    }

    /// An attribute of the current key; neutral values when nothing is down.
    pub fn current_key_attribute(&self, attribute: KeyAttribute) -> Value {
        let key = self.tracker.current_key();
        let record = self.tracker.record(key);

        let text = |value: Option<&str>| Value::Text(value.unwrap_or_default().to_string());

        match attribute {
            KeyAttribute::Code => text(record.and_then(|r| r.attributes.code.as_deref())),
            KeyAttribute::Value => text(record.and_then(|r| r.attributes.value.as_deref())),
            KeyAttribute::FormattedName => {
                let has_code = record.is_some_and(|r| r.attributes.code.is_some());
                text(has_code.then_some(key))
            }
            KeyAttribute::TimePressed => Value::Number(if key == NO_KEY {
                0.0
            } else {
                self.time_pressed(key)
            }),
            KeyAttribute::IsSimulated => Value::Bool(record.is_some_and(|r| r.is_simulated)),
            KeyAttribute::IsTrulyPressed => {
                Value::Bool(record.is_some_and(|r| r.is_truly_pressed))
            }
        }
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Define or replace the tag `#id`. Returns false for an empty id.
    pub fn set_tag<I, S>(&mut self, id: &str, keys: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.set(id, keys)
    }

    pub fn tag_members(&self, id: &str) -> &[KeyName] {
        self.tags.members(id)
    }

    pub fn list_tags(&self) -> Vec<&str> {
        self.tags.names()
    }

    /// Resolve `#tag` against the current press state.
    pub fn resolve_tag(&self, tag: &str) -> Option<KeyName> {
        self.tags.resolve(tag, &self.tracker)
    }

    // ========================================================================
    // Blocklist
    // ========================================================================

    pub fn block_key(&mut self, key: &str) {
        if self.blocklist.block(key) {
            tracing::debug!("Blocked key '{}'", key);
        }
    }

    pub fn unblock_key(&mut self, key: &str) {
        if self.blocklist.unblock(key) {
            tracing::debug!("Unblocked key '{}'", key);
        }
    }

    pub fn is_key_blocked(&self, key: &str) -> bool {
        self.blocklist.is_blocked(key)
    }

    pub fn blocked_keys(&self) -> Vec<KeyName> {
        self.blocklist.keys()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Set a setting by its host-facing name.
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        let setting: Setting = name.parse()?;
        self.settings.set(setting, value)
    }

    /// Read a setting by its host-facing name.
    pub fn setting(&self, name: &str) -> Result<Value, EngineError> {
        let setting: Setting = name.parse()?;
        Ok(self.settings.get(setting))
    }

    /// Revert every setting. Sensitivity comes back as
    /// [`FALLBACK_SENSITIVITY`], not the startup default.
    pub fn reset_settings(&mut self) {
        self.settings = Settings {
            sensitivity: FALLBACK_SENSITIVITY,
            ..Settings::default()
        };
    }

    /// Capture the current press state.
    pub fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        let pressed = self
            .tracker
            .records()
            .filter(|(key, _)| key.as_str() != crate::keys::ANY)
            .map(|(key, record)| PressedKey {
                key: key.clone(),
                held_for: now.saturating_duration_since(record.started_at).as_secs_f64(),
                simulated: record.is_simulated,
                truly_pressed: record.is_truly_pressed,
                value: self.tracker.value_of(key).map(str::to_string),
            })
            .collect();

        Snapshot {
            pressed,
            current_key: self.current_key().to_string(),
            any: self.any_key().map(str::to_string),
            last_pressed: self.last_pressed().map(str::to_string),
            last_released: self.last_released().map(str::to_string),
            active_keybinds: self.list_active_keybinds(),
            blocked: self.blocked_keys(),
            simulating: self.simulated_keys(),
        }
    }
}

/// Shared engine state
pub type SharedKeyState = Arc<Mutex<KeyState>>;

/// Cloneable handle to an engine running on a tokio runtime.
///
/// Every clone refers to the same [`KeyState`]; simulation timers hold a
/// clone until they expire.
#[derive(Debug, Clone)]
pub struct KeySense {
    pub(crate) state: SharedKeyState,
}

impl KeySense {
    pub fn new(state: KeyState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Lock the engine for queries or direct mutation.
    pub async fn lock(&self) -> MutexGuard<'_, KeyState> {
        self.state.lock().await
    }

    /// Apply one event from the host's input layer.
    pub async fn handle_input(&self, event: InputEvent) {
        self.state.lock().await.handle_input(event);
    }

    /// Stop all pending simulations, releasing their simulated presses.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let cancelled = state.cancel_all_simulations();
        tracing::debug!("Engine shut down, {} simulation(s) cancelled", cancelled);
    }
}

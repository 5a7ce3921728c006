//! Press-state tracking
//!
//! # Press State Machine
//!
//! Every key moves through the same small state machine. A key can be held by
//! two independent sources: the physical keyboard and a simulated press.
//!
//! ```text
//!                 press(physical)              press(simulated)
//!   ┌──────┐ ─────────────────────► ┌──────────┐ ──────────────► ┌──────────┐
//!   │  UP  │                        │ PHYSICAL │                 │   BOTH   │
//!   └──────┘ ◄───────────────────── └──────────┘ ◄────────────── └──────────┘
//!      ▲  │       release(physical)                release(simulated)  │
//!      │  │                                                            │
//!      │  │ press(simulated)       ┌───────────┐  release(physical)    │
//!      │  └──────────────────────► │ SIMULATED │ ◄─────────────────────┘
//!      └────────────────────────── └───────────┘
//!              release(simulated)
//! ```
//!
//! A [`PressRecord`] exists exactly while at least one source holds the key.
//! Pressing a key that is already down only sets the source flag, so repeated
//! key-down events never reset `started_at`.
//!
//! ## The `any` Record
//!
//! The sentinel key [`ANY`] is inserted together with the first key pressed
//! into an empty keyboard and removed with the last release. Its `bound_to`
//! names that first key, and after every release it is rebound to the most
//! recently pressed key that is still down.
//!
//! Records are kept in insertion order, which is also chronological press
//! order; ordered combination matching depends on it.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::keys::{KeyName, ANY, NO_KEY};

/// Source of a press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressSource {
    /// Physical key event from the host's input layer
    Physical,
    /// Software-simulated press
    Simulated,
}

/// Raw attributes reported with a physical key-down
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawAttributes {
    /// Platform key identifier (e.g. `"KeyA"`)
    pub code: Option<String>,
    /// Printable value produced by the key (e.g. `"A"`)
    pub value: Option<String>,
}

impl RawAttributes {
    pub fn new(code: impl Into<String>, value: Option<String>) -> Self {
        Self {
            code: Some(code.into()),
            value,
        }
    }
}

/// State of one currently-down key
#[derive(Debug, Clone, PartialEq)]
pub struct PressRecord {
    /// When the key went down (first source)
    pub started_at: Instant,
    /// Held by a simulated press
    pub is_simulated: bool,
    /// Held by the physical keyboard
    pub is_truly_pressed: bool,
    /// Raw attributes of the press that created the record
    pub attributes: RawAttributes,
    /// Only set on the `any` record: the key it currently stands for
    pub bound_to: Option<KeyName>,
}

impl PressRecord {
    fn new(started_at: Instant, source: PressSource, attributes: RawAttributes) -> Self {
        let mut record = Self {
            started_at,
            is_simulated: false,
            is_truly_pressed: false,
            attributes,
            bound_to: None,
        };
        record.set_source(source, true);
        record
    }

    fn any(started_at: Instant, bound_to: &str) -> Self {
        Self {
            started_at,
            is_simulated: false,
            is_truly_pressed: false,
            attributes: RawAttributes::default(),
            bound_to: Some(bound_to.to_string()),
        }
    }

    fn set_source(&mut self, source: PressSource, held: bool) {
        match source {
            PressSource::Physical => self.is_truly_pressed = held,
            PressSource::Simulated => self.is_simulated = held,
        }
    }

    /// Whether the given source currently holds the key.
    pub fn is_held_by(&self, source: PressSource) -> bool {
        match source {
            PressSource::Physical => self.is_truly_pressed,
            PressSource::Simulated => self.is_simulated,
        }
    }

    /// Whether any source still holds the key.
    pub fn is_down(&self) -> bool {
        self.is_truly_pressed || self.is_simulated
    }
}

/// Outcome of a press or release applied to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Key went from up to down
    Pressed,
    /// Key was already down; the source flag was set
    SourceAdded,
    /// Key was already held by this source
    Unchanged,
    /// Source flag cleared, another source still holds the key
    SourceRemoved,
    /// Key went from down to up
    Released,
    /// Release for a key with no record
    Missing,
    /// Host tried to press or release the `any` sentinel directly
    Ignored,
}

/// Tracks which keys are down and their press/release history
#[derive(Debug, Clone)]
pub struct PressTracker {
    /// Currently-down keys in press order, including `any`
    records: IndexMap<KeyName, PressRecord>,
    /// Time of each key's most recent full release
    released_at: HashMap<KeyName, Instant>,
    /// Last printable value seen for each key
    values: HashMap<KeyName, String>,
    current: KeyName,
    last_pressed: Option<KeyName>,
    last_released: Option<KeyName>,
}

impl Default for PressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PressTracker {
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
            released_at: HashMap::new(),
            values: HashMap::new(),
            current: NO_KEY.to_string(),
            last_pressed: None,
            last_released: None,
        }
    }

    /// Press `key` from `source` at `now`.
    pub fn press(
        &mut self,
        key: &str,
        source: PressSource,
        attributes: RawAttributes,
        now: Instant,
    ) -> Transition {
        if key == ANY {
            return Transition::Ignored;
        }

        if let Some(record) = self.records.get_mut(key) {
            if record.is_held_by(source) {
                return Transition::Unchanged;
            }
            record.set_source(source, true);
            return Transition::SourceAdded;
        }

        match &attributes.value {
            Some(value) => {
                self.values.insert(key.to_string(), value.clone());
            }
            None => {
                self.values.remove(key);
            }
        }

        if !self.records.contains_key(ANY) {
            self.records.insert(ANY.to_string(), PressRecord::any(now, key));
        }
        self.records
            .insert(key.to_string(), PressRecord::new(now, source, attributes));

        self.current = key.to_string();
        self.last_pressed = Some(key.to_string());

        Transition::Pressed
    }

    /// Release `key` from `source` at `now`.
    ///
    /// The record is only removed once neither source holds the key.
    pub fn release(&mut self, key: &str, source: PressSource, now: Instant) -> Transition {
        if key == ANY {
            return Transition::Ignored;
        }

        let Some(record) = self.records.get_mut(key) else {
            return Transition::Missing;
        };

        record.set_source(source, false);
        if record.is_down() {
            return Transition::SourceRemoved;
        }

        self.released_at.insert(key.to_string(), now);
        self.last_released = Some(key.to_string());
        self.records.shift_remove(key);

        match self.latest_key() {
            None => {
                self.current = NO_KEY.to_string();
                self.records.shift_remove(ANY);
            }
            Some(latest) => {
                self.current = latest.clone();
                if let Some(any) = self.records.get_mut(ANY) {
                    any.bound_to = Some(latest);
                }
            }
        }

        Transition::Released
    }

    /// Forget every pressed key without going through the release path.
    ///
    /// Release timestamps are kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.current = NO_KEY.to_string();
    }

    /// Most recently pressed key still down (excluding `any`)
    fn latest_key(&self) -> Option<KeyName> {
        self.records.keys().rev().find(|k| k.as_str() != ANY).cloned()
    }

    pub fn record(&self, key: &str) -> Option<&PressRecord> {
        self.records.get(key)
    }

    pub fn is_down(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// All records in press order, `any` included.
    pub fn records(&self) -> impl Iterator<Item = (&KeyName, &PressRecord)> {
        self.records.iter()
    }

    /// Pressed keys in press order, `any` included.
    pub fn press_order(&self) -> impl Iterator<Item = &KeyName> {
        self.records.keys()
    }

    /// Pressed keys in press order, `any` excluded.
    pub fn pressed_keys(&self) -> Vec<KeyName> {
        self.records
            .keys()
            .filter(|k| k.as_str() != ANY)
            .cloned()
            .collect()
    }

    /// Number of keys down, `any` excluded.
    pub fn pressed_count(&self) -> usize {
        if self.records.contains_key(ANY) {
            self.records.len() - 1
        } else {
            self.records.len()
        }
    }

    /// The key `any` currently stands for.
    pub fn any_bound_to(&self) -> Option<&str> {
        self.records.get(ANY).and_then(|r| r.bound_to.as_deref())
    }

    /// Most recently pressed key still down, or [`NO_KEY`].
    pub fn current_key(&self) -> &str {
        &self.current
    }

    pub fn last_pressed(&self) -> Option<&str> {
        self.last_pressed.as_deref()
    }

    pub fn last_released(&self) -> Option<&str> {
        self.last_released.as_deref()
    }

    pub fn released_at(&self, key: &str) -> Option<Instant> {
        self.released_at.get(key).copied()
    }

    /// Last printable value seen for `key`.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

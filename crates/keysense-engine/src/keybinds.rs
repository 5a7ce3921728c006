//! Named keybindings
//!
//! A keybinding is a name attached to one key or a combination. Queries go
//! through the combination matcher, a single key being the one-element
//! unordered case.

use indexmap::IndexMap;
use serde::Serialize;

use crate::engine::KeyState;
use crate::keys::KeyName;

/// What a keybinding requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Keybinding {
    /// One key or tag
    Single { key: KeyName },
    /// Several keys or tags, optionally in order
    Multiple { keys: Vec<KeyName>, ordered: bool },
}

impl Keybinding {
    pub fn keys(&self) -> &[KeyName] {
        match self {
            Keybinding::Single { key } => std::slice::from_ref(key),
            Keybinding::Multiple { keys, .. } => keys,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Keybinding::Multiple { ordered: true, .. })
    }
}

/// Keybindings in registration order
#[derive(Debug, Clone, Default)]
pub struct KeybindRegistry {
    bindings: IndexMap<String, Keybinding>,
}

impl KeybindRegistry {
    /// Insert or replace a binding. A replaced binding keeps its position.
    pub fn insert(&mut self, name: &str, binding: Keybinding) {
        tracing::debug!("Keybind '{}' set to {:?}", name, binding);
        self.bindings.insert(name.to_string(), binding);
    }

    pub fn get(&self, name: &str) -> Option<&Keybinding> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Keybinding> {
        self.bindings.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Keybinding)> {
        self.bindings.iter()
    }
}

impl KeyState {
    /// Bind `name` to a combination, replacing any previous binding.
    pub fn bind_keys<I, S>(&mut self, name: &str, keys: I, ordered: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.keybinds
            .insert(name, Keybinding::Multiple { keys, ordered });
    }

    /// Bind `name` to a single key, replacing any previous binding.
    pub fn bind_key(&mut self, name: &str, key: &str) {
        self.keybinds.insert(
            name,
            Keybinding::Single {
                key: key.to_string(),
            },
        );
    }

    /// Remove one binding. Returns false if it did not exist.
    pub fn reset_keybind(&mut self, name: &str) -> bool {
        self.keybinds.remove(name).is_some()
    }

    pub fn reset_all_keybinds(&mut self) {
        self.keybinds.clear();
    }

    pub fn keybind(&self, name: &str) -> Option<&Keybinding> {
        self.keybinds.get(name)
    }

    /// Binding names in registration order.
    pub fn list_keybinds(&self) -> Vec<String> {
        self.keybinds.names().into_iter().map(str::to_string).collect()
    }

    /// Keys of a binding, empty if it does not exist.
    pub fn keys_bound_to(&self, name: &str) -> Vec<KeyName> {
        self.keybinds
            .get(name)
            .map(|binding| binding.keys().to_vec())
            .unwrap_or_default()
    }

    pub fn is_keybind_triggered(&self, name: &str) -> bool {
        match self.keybinds.get(name) {
            Some(binding) => self.matches(binding.keys(), binding.is_ordered()),
            None => false,
        }
    }

    /// How long the binding has been satisfied, 0 if it is not.
    pub fn time_keybind_triggered(&self, name: &str) -> f64 {
        match self.keybinds.get(name) {
            Some(binding) => self.min_time_pressed(binding.keys(), binding.is_ordered()),
            None => 0.0,
        }
    }

    /// Names of all currently triggered bindings, in registration order.
    pub fn list_active_keybinds(&self) -> Vec<String> {
        self.keybinds
            .iter()
            .filter(|(_, binding)| self.matches(binding.keys(), binding.is_ordered()))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::advance;

    use super::*;
    use crate::tracker::{PressSource, RawAttributes};

    fn press(state: &mut KeyState, key: &str) {
        state.press(key, PressSource::Physical, RawAttributes::default());
    }

    #[test]
    fn test_single_and_multiple_bindings() {
        let mut state = KeyState::default();
        state.bind_key("jump", "space");
        state.bind_keys("dash", ["left shift", "d"], true);

        press(&mut state, "space");
        assert!(state.is_keybind_triggered("jump"));
        assert!(!state.is_keybind_triggered("dash"));

        press(&mut state, "left shift");
        press(&mut state, "d");
        assert!(state.is_keybind_triggered("dash"));
        assert_eq!(state.list_active_keybinds(), vec!["jump", "dash"]);
    }

    #[test]
    fn test_ordered_binding_respects_order() {
        let mut state = KeyState::default();
        state.bind_keys("dash", ["left shift", "d"], true);
        press(&mut state, "d");
        press(&mut state, "left shift");
        assert!(!state.is_keybind_triggered("dash"));
    }

    #[test]
    fn test_rebinding_replaces_in_place() {
        let mut state = KeyState::default();
        state.bind_key("a", "x");
        state.bind_key("b", "y");
        state.bind_keys("a", ["x", "z"], false);

        assert_eq!(state.list_keybinds(), vec!["a", "b"]);
        assert_eq!(state.keys_bound_to("a"), vec!["x", "z"]);
        assert_eq!(
            state.keybind("a"),
            Some(&Keybinding::Multiple {
                keys: vec!["x".to_string(), "z".to_string()],
                ordered: false
            })
        );
    }

    #[test]
    fn test_reset_bindings() {
        let mut state = KeyState::default();
        state.bind_key("a", "x");
        state.bind_key("b", "y");

        assert!(state.reset_keybind("a"));
        assert!(!state.reset_keybind("a"));
        assert_eq!(state.list_keybinds(), vec!["b"]);

        state.reset_all_keybinds();
        assert!(state.list_keybinds().is_empty());
        assert!(state.keys_bound_to("b").is_empty());
        assert!(!state.is_keybind_triggered("b"));
    }

    #[test]
    fn test_binding_with_tag() {
        let mut state = KeyState::default();
        state.bind_keys("save", ["#control", "s"], false);
        press(&mut state, "s");
        press(&mut state, "left control");
        assert!(state.is_keybind_triggered("save"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_triggered() {
        let mut state = KeyState::default();
        state.bind_keys("combo", ["a", "b"], false);
        assert_eq!(state.time_keybind_triggered("combo"), 0.0);
        assert_eq!(state.time_keybind_triggered("missing"), 0.0);

        press(&mut state, "a");
        advance(Duration::from_millis(200)).await;
        press(&mut state, "b");
        advance(Duration::from_millis(50)).await;

        assert!((state.time_keybind_triggered("combo") - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_binding_serializes_with_type() {
        let binding = Keybinding::Single {
            key: "space".to_string(),
        };
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["key"], "space");
    }
}

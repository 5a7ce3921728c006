//! Multi-key combination matching
//!
//! A combination is a list of key names and tags. Tags are resolved first;
//! a tag with no pressed member makes the whole combination fail.
//!
//! Ordered matching looks at the relative order in which the listed keys went
//! down. Keys outside the list are ignored, so `a`, `d`, `b` still satisfies
//! `[a, b]` while `b`, `a` does not.

use tokio::time::Instant;

use crate::engine::KeyState;
use crate::keys::KeyName;

impl KeyState {
    /// Resolve every element, or `None` if any tag has no pressed member.
    fn resolve_all<S: AsRef<str>>(&self, keys: &[S]) -> Option<Vec<KeyName>> {
        keys.iter().map(|key| self.lookup(key.as_ref())).collect()
    }

    fn matches_resolved(&self, resolved: &[KeyName], ordered: bool) -> bool {
        if resolved.is_empty() {
            return false;
        }

        if !ordered {
            return resolved.iter().all(|key| self.tracker.is_down(key));
        }

        let pressed: Vec<&KeyName> = self
            .tracker
            .press_order()
            .filter(|key| resolved.contains(key))
            .collect();

        pressed.len() == resolved.len() && pressed.iter().zip(resolved).all(|(a, b)| *a == b)
    }

    /// Whether every key in `keys` is down (in list order if `ordered`).
    pub fn matches<S: AsRef<str>>(&self, keys: &[S], ordered: bool) -> bool {
        match self.resolve_all(keys) {
            Some(resolved) => self.matches_resolved(&resolved, ordered),
            None => false,
        }
    }

    /// How long the combination has been held.
    ///
    /// Ordered: the held time of the last listed key, or 0 if the combination
    /// does not match. Unordered: the shortest held time in the list, so any
    /// key that is up yields 0.
    pub fn min_time_pressed<S: AsRef<str>>(&self, keys: &[S], ordered: bool) -> f64 {
        let now = Instant::now();
        let Some(resolved) = self.resolve_all(keys) else {
            return 0.0;
        };

        if ordered {
            if !self.matches_resolved(&resolved, true) {
                return 0.0;
            }
            return resolved
                .last()
                .map(|key| self.time_pressed_at(key, now))
                .unwrap_or(0.0);
        }

        resolved
            .iter()
            .map(|key| self.time_pressed_at(key, now))
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

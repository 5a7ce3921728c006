//! Timing queries derived from press state
//!
//! Durations are reported in seconds as `f64`. A "hit" is the short window
//! after a key goes down, a "released" pulse the same window after it goes
//! up; both are governed by [`Settings::sensitivity`](crate::Settings).

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use crate::engine::KeyState;
use crate::keys::is_tag;

/// A duration, or the configured sentinel message when there is none
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TimeReading {
    Seconds(f64),
    Unavailable(String),
}

impl TimeReading {
    /// Seconds, if this reading has any.
    pub fn seconds(&self) -> Option<f64> {
        match self {
            TimeReading::Seconds(s) => Some(*s),
            TimeReading::Unavailable(_) => None,
        }
    }

    pub fn seconds_or(&self, default: f64) -> f64 {
        self.seconds().unwrap_or(default)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TimeReading::Seconds(_))
    }
}

impl fmt::Display for TimeReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeReading::Seconds(s) => write!(f, "{}", s),
            TimeReading::Unavailable(message) => write!(f, "{}", message),
        }
    }
}

fn within_window(seconds: f64, window: f64) -> bool {
    seconds != 0.0 && seconds <= window
}

impl KeyState {
    pub(crate) fn time_pressed_at(&self, key_or_tag: &str, now: Instant) -> f64 {
        match self.record(key_or_tag) {
            Some(record) => now.saturating_duration_since(record.started_at).as_secs_f64(),
            None => 0.0,
        }
    }

    /// Seconds the key (or tag) has been held, 0 if it is up.
    pub fn time_pressed(&self, key_or_tag: &str) -> f64 {
        self.time_pressed_at(key_or_tag, Instant::now())
    }

    fn time_since_released_at(&self, key_or_tag: &str, now: Instant) -> TimeReading {
        if self.is_pressed(key_or_tag) {
            return TimeReading::Seconds(0.0);
        }

        let released_at = if is_tag(key_or_tag) {
            self.tags
                .members(key_or_tag)
                .iter()
                .filter_map(|member| self.tracker.released_at(member))
                .max()
        } else {
            self.tracker.released_at(key_or_tag)
        };

        match released_at {
            Some(at) => TimeReading::Seconds(now.saturating_duration_since(at).as_secs_f64()),
            None => TimeReading::Unavailable(self.settings.not_initialized_message.clone()),
        }
    }

    /// Seconds since the key was last fully released.
    ///
    /// 0 while the key is down; the "not yet initialized" message for a key
    /// that has never been released. For a tag with no pressed member this
    /// is the most recent release among its members.
    pub fn time_since_released(&self, key_or_tag: &str) -> TimeReading {
        self.time_since_released_at(key_or_tag, Instant::now())
    }

    /// Whether the key went down within the sensitivity window.
    pub fn is_hit(&self, key_or_tag: &str) -> bool {
        within_window(self.time_pressed(key_or_tag), self.settings.sensitivity)
    }

    /// Whether the key went up within the sensitivity window.
    pub fn is_released(&self, key_or_tag: &str) -> bool {
        let seconds = self.time_since_released(key_or_tag).seconds_or(0.0);
        within_window(seconds, self.settings.sensitivity)
    }

    pub fn any_of_pressed<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|key| self.is_pressed(key.as_ref()))
    }

    pub fn any_of_hit<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|key| self.is_hit(key.as_ref()))
    }

    pub fn any_of_released<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|key| self.is_released(key.as_ref()))
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

    fn release(state: &mut KeyState, key: &str) {
        state.release(key, PressSource::Physical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_pressed_grows_while_held() {
        let mut state = KeyState::default();
        assert_eq!(state.time_pressed("a"), 0.0);

        press(&mut state, "a");
        advance(Duration::from_millis(250)).await;
        assert!((state.time_pressed("a") - 0.25).abs() < 1e-9);

        release(&mut state, "a");
        assert_eq!(state.time_pressed("a"), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_window() {
        let mut state = KeyState::default();
        press(&mut state, "a");

        advance(Duration::from_millis(10)).await;
        assert!(state.is_hit("a"), "10ms after the press is inside the window");

        advance(Duration::from_millis(40)).await;
        assert!(!state.is_hit("a"), "50ms after the press is outside the window");
        assert!(state.is_pressed("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_window() {
        let mut state = KeyState::default();
        press(&mut state, "a");
        advance(Duration::from_millis(100)).await;
        release(&mut state, "a");

        advance(Duration::from_millis(20)).await;
        assert!(state.is_released("a"));

        advance(Duration::from_millis(20)).await;
        assert!(!state.is_released("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_since_released_states() {
        let mut state = KeyState::default();
        assert_eq!(
            state.time_since_released("a"),
            TimeReading::Unavailable("Key is Not Initialized".to_string())
        );

        press(&mut state, "a");
        assert_eq!(state.time_since_released("a"), TimeReading::Seconds(0.0));

        release(&mut state, "a");
        advance(Duration::from_millis(500)).await;
        assert_eq!(state.time_since_released("a"), TimeReading::Seconds(0.5));
        assert!(!state.is_released("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_sentinel_message() {
        let mut state = KeyState::default();
        state
            .set_setting("error message - not yet initialized", "never")
            .unwrap();
        assert_eq!(state.time_since_released("z").to_string(), "never");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_timings() {
        let mut state = KeyState::default();
        press(&mut state, "left shift");
        advance(Duration::from_millis(10)).await;
        assert!(state.is_hit("#shift"));

        release(&mut state, "left shift");
        advance(Duration::from_millis(10)).await;
        assert!(state.is_released("#shift"));
        assert!(state.time_since_released("#shift").is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_any_of_queries() {
        let mut state = KeyState::default();
        press(&mut state, "b");
        advance(Duration::from_millis(5)).await;

        assert!(state.any_of_pressed(&["a", "b"]));
        assert!(!state.any_of_pressed(&["a", "c"]));
        assert!(state.any_of_hit(&["b"]));
        assert!(!state.any_of_released(&["a", "b"]));
        assert!(!state.any_of_pressed::<&str>(&[]));
    }
}

//! Simulated key presses with extendable duration
//!
//! [`KeySense::simulate`] presses a key with the simulated source and spawns
//! a task that releases it when its timer expires. Simulating a key that is
//! already being simulated moves the expiry forward (never back), so repeated
//! calls keep one press alive instead of stacking presses.
//!
//! ```text
//! simulate(k, 1.0) at t=0     simulate(k, 1.0) at t=0.5
//!        |                            |
//!        v                            v
//!   [press k] -------- expiry 1.0 --> expiry 1.5 -------> [release k]
//!                          |                                  ^
//!                          +-- task wakes, sees 1.5, sleeps --+
//! ```
//!
//! Expiry tasks take the engine lock like any other mutation, so an expiry
//! never interleaves with a press or release.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::{KeySense, KeyState, SharedKeyState};
use crate::keys::KeyName;
use crate::timing::TimeReading;
use crate::tracker::{PressSource, RawAttributes};

/// Pending release of a simulated press
#[derive(Debug)]
pub(crate) struct SimulationTimer {
    pub(crate) expiry: Instant,
    task: JoinHandle<()>,
}

impl SimulationTimer {
    fn cancel(self) {
        self.task.abort();
    }
}

/// Longest hold a simulation can request, about 30 years
const MAX_HOLD: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Convert host-supplied seconds; negative or non-finite values mean no hold.
fn hold_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds)
        .unwrap_or(Duration::ZERO)
        .min(MAX_HOLD)
}

/// When a hold of `seconds` starting at `now` ends. Never overflows.
fn hold_deadline(now: Instant, seconds: f64) -> Instant {
    now.checked_add(hold_duration(seconds)).unwrap_or(now)
}

impl KeyState {
    /// Seconds until the simulated press of `key` ends, or the "not
    /// simulated" message if there is no active simulation.
    pub fn time_until_sim_ends(&self, key_or_tag: &str) -> TimeReading {
        let timer = self
            .lookup(key_or_tag)
            .and_then(|key| self.timers.get(&key));

        match timer {
            Some(timer) => TimeReading::Seconds(
                timer
                    .expiry
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64(),
            ),
            None => TimeReading::Unavailable(self.settings.not_simulated_message.clone()),
        }
    }

    /// Keys with a pending simulated release.
    pub fn simulated_keys(&self) -> Vec<KeyName> {
        let mut keys: Vec<KeyName> = self.timers.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop the simulation of `key` now and release its simulated press.
    pub(crate) fn cancel_simulation(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(timer) => {
                timer.cancel();
                self.release(key, PressSource::Simulated);
                tracing::debug!("Simulation of '{}' cancelled", key);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending simulation. Returns how many were cancelled.
    pub(crate) fn cancel_all_simulations(&mut self) -> usize {
        let mut cancelled = 0;
        for key in self.simulated_keys() {
            if self.cancel_simulation(&key) {
                cancelled += 1;
            }
        }
        cancelled
    }
}

impl KeySense {
    /// Simulate a press of `key` for `seconds`.
    ///
    /// # Arguments
    ///
    /// * `key` - Key name or platform identifier (`"KeyA"` presses `"a"`)
    /// * `seconds` - Hold duration; extends an active simulation of the same
    ///   key if that ends sooner
    /// * `wait` - Suspend until `seconds` have passed from this call,
    ///   regardless of any later extension
    ///
    /// A blocked key is not pressed and no timer is started, but `wait` is
    /// still honoured.
    pub async fn simulate(&self, key: &str, seconds: f64, wait: bool) {
        let deadline = hold_deadline(Instant::now(), seconds);

        {
            let mut state = self.state.lock().await;
            let key = state.resolver.resolve(key);

            if state.is_key_blocked(&key) {
                tracing::debug!("Not simulating blocked key '{}'", key);
            } else {
                state.press(&key, PressSource::Simulated, RawAttributes::default());

                match state.timers.get_mut(&key) {
                    Some(timer) => {
                        if deadline > timer.expiry {
                            tracing::debug!("Simulation of '{}' extended by {}s", key, seconds);
                            timer.expiry = deadline;
                        }
                    }
                    None => {
                        tracing::debug!("Simulating '{}' for {}s", key, seconds);
                        let task = tokio::spawn(expire(self.state.clone(), key.clone(), deadline));
                        state.timers.insert(
                            key,
                            SimulationTimer {
                                expiry: deadline,
                                task,
                            },
                        );
                    }
                }
            }
        }

        if wait {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// Release `key` once its timer expires, following any extensions.
async fn expire(state: SharedKeyState, key: KeyName, mut deadline: Instant) {
    loop {
        tokio::time::sleep_until(deadline).await;

        let mut guard = state.lock().await;
        match guard.timers.get(&key) {
            Some(timer) if timer.expiry > deadline => {
                deadline = timer.expiry;
                continue;
            }
            Some(_) => {}
            None => return,
        }

        guard.timers.remove(&key);
        guard.release(&key, PressSource::Simulated);
        tracing::debug!("Simulation of '{}' expired", key);
        return;
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{advance, sleep};

    use super::*;
    use crate::engine::InputEvent;
    use crate::listeners::KeyEvent;
    use crate::settings::Settings;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_press_releases_on_expiry() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("space", 0.5, false).await;

        {
            let state = engine.lock().await;
            assert!(state.is_pressed("space"));
            assert!(state.is_simulated("space"));
            assert!(!state.is_truly_pressed("space"));
        }

        sleep(Duration::from_millis(600)).await;
        let state = engine.lock().await;
        assert!(!state.is_pressed("space"));
        assert!(state.simulated_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_simulation_extends_single_press() {
        let (state, mut events) = KeyState::with_notifications(Settings::default(), 16);
        let engine = KeySense::new(state);

        engine.simulate("space", 1.0, false).await;
        sleep(Duration::from_millis(500)).await;
        engine.simulate("space", 1.0, false).await;

        sleep(Duration::from_millis(600)).await;
        assert!(
            engine.lock().await.is_pressed("space"),
            "Extension must keep the key down past the first expiry"
        );

        sleep(Duration::from_millis(500)).await;
        {
            let state = engine.lock().await;
            assert!(!state.is_pressed("space"));
            let since = state.time_since_released("space").seconds_or(-1.0);
            assert!((since - 0.1).abs() < 0.01, "Released at 1.5s, got {} ago", since);
        }

        assert!(matches!(events.try_recv(), Ok(KeyEvent::Pressed { .. })));
        assert!(matches!(events.try_recv(), Ok(KeyEvent::Released { .. })));
        assert!(events.try_recv().is_err(), "Only one press/release pair expected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_simulation_does_not_shorten() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("a", 1.0, false).await;
        engine.simulate("a", 0.2, true).await;

        let state = engine.lock().await;
        assert!(state.is_pressed("a"));
        let remaining = state.time_until_sim_ends("a").seconds_or(0.0);
        assert!((remaining - 0.8).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_suspends_for_duration() {
        let engine = KeySense::new(KeyState::default());
        let start = Instant::now();
        engine.simulate("a", 0.25, true).await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_sim_ends() {
        let engine = KeySense::new(KeyState::default());
        assert_eq!(
            engine.lock().await.time_until_sim_ends("a"),
            TimeReading::Unavailable("Key is Not Simulated".to_string())
        );

        engine.simulate("a", 1.0, false).await;
        advance(Duration::from_millis(250)).await;
        assert_eq!(
            engine.lock().await.time_until_sim_ends("a"),
            TimeReading::Seconds(0.75)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_physical_press_outlives_simulation() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("k", 0.2, false).await;
        engine
            .handle_input(InputEvent::key_down("KeyK"))
            .await;

        sleep(Duration::from_millis(300)).await;
        {
            let state = engine.lock().await;
            assert!(state.is_pressed("k"), "Physical press keeps the key down");
            assert!(!state.is_simulated("k"));
        }

        engine
            .handle_input(InputEvent::key_up("KeyK"))
            .await;
        assert!(!engine.lock().await.is_pressed("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_outlives_physical_release() {
        let engine = KeySense::new(KeyState::default());
        engine
            .handle_input(InputEvent::key_down("KeyK"))
            .await;
        engine.simulate("k", 0.5, false).await;
        engine
            .handle_input(InputEvent::key_up("KeyK"))
            .await;

        assert!(engine.lock().await.is_pressed("k"));
        sleep(Duration::from_millis(600)).await;
        assert!(!engine.lock().await.is_pressed("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_key_is_not_simulated() {
        let engine = KeySense::new(KeyState::default());
        engine.lock().await.block_key("a");
        engine.simulate("a", 1.0, false).await;

        let state = engine.lock().await;
        assert!(!state.is_pressed("a"));
        assert!(state.simulated_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_simulations() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("a", 5.0, false).await;
        engine.simulate("b", 5.0, false).await;

        engine.shutdown().await;

        let state = engine.lock().await;
        assert_eq!(state.pressed_count(), 0);
        assert!(state.simulated_keys().is_empty());
        assert_eq!(state.time_until_sim_ends("a").seconds(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_blur_is_harmless() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("a", 0.1, false).await;
        engine.handle_input(InputEvent::FocusLost).await;

        sleep(Duration::from_millis(200)).await;
        let state = engine.lock().await;
        assert!(!state.is_pressed("a"));
        assert!(state.simulated_keys().is_empty());
    }

    #[test]
    fn test_hold_duration_rejects_bad_input() {
        assert_eq!(hold_duration(-1.0), Duration::ZERO);
        assert_eq!(hold_duration(f64::NAN), Duration::ZERO);
        assert_eq!(hold_duration(f64::INFINITY), Duration::ZERO);
        assert_eq!(hold_duration(0.5), Duration::from_millis(500));
    }

    #[test]
    fn test_huge_hold_is_clamped() {
        assert_eq!(hold_duration(1e19), MAX_HOLD);

        let now = Instant::now();
        assert_eq!(hold_deadline(now, 1e19), now + MAX_HOLD);
        assert_eq!(hold_deadline(now, -3.0), now);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_simulation_stays_pressed() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("a", 1e19, false).await;

        advance(Duration::from_secs(3600)).await;
        let state = engine.lock().await;
        assert!(state.is_pressed("a"));
        assert!(state.is_simulated("a"));
        let remaining = state.time_until_sim_ends("a").seconds_or(0.0);
        assert!(remaining > 1e8, "Expected a clamped far deadline, got {}", remaining);
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_ids_are_resolved() {
        let engine = KeySense::new(KeyState::default());
        engine.simulate("Space", 0.5, false).await;
        engine.simulate("KeyA", 0.5, false).await;

        {
            let state = engine.lock().await;
            assert!(state.is_pressed("space"));
            assert!(state.is_pressed("a"));
            assert_eq!(state.pressed_keys(), vec!["space", "a"]);
            assert_eq!(state.simulated_keys(), vec!["a", "space"]);
        }

        // A resolved name extends the same simulation
        engine.simulate("space", 1.0, false).await;
        sleep(Duration::from_millis(600)).await;
        {
            let state = engine.lock().await;
            assert!(state.is_pressed("space"));
            assert!(!state.is_pressed("a"));
        }

        sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.lock().await.pressed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocklist_applies_to_platform_ids() {
        let engine = KeySense::new(KeyState::default());
        engine.lock().await.block_key("a");
        engine.simulate("KeyA", 1.0, false).await;

        let state = engine.lock().await;
        assert_eq!(state.pressed_count(), 0);
        assert!(state.simulated_keys().is_empty());
    }
}

//! Press/release listeners and key event notifications
//!
//! Two outbound paths exist:
//!
//! - **Listeners**: synchronous callbacks registered for `keydown` or `keyup`,
//!   run inline with the state change. A failing (or panicking) listener is
//!   logged and skipped; the others still run.
//! - **Notifications**: a [`KeyEvent`] pushed through a bounded mpsc channel
//!   for the host's own event-dispatch loop.
//!
//! ```text
//! +-----------+      +--------+      +------------------+
//! | KeyState  | ---> | mpsc   | ---> | Host dispatch    |
//! | (press)   |      | channel|      | loop             |
//! +-----------+      +--------+      +------------------+
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::keys::KeyName;
use crate::tracker::PressSource;

/// Default buffer size for the notification channel
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Event kinds listeners can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ListenerKind {
    KeyDown,
    KeyUp,
}

impl FromStr for ListenerKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keydown" => Ok(Self::KeyDown),
            "keyup" => Ok(Self::KeyUp),
            _ => Err(EngineError::UnknownEvent(s.to_string())),
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::KeyDown => write!(f, "keydown"),
            ListenerKind::KeyUp => write!(f, "keyup"),
        }
    }
}

/// Callback receiving the resolved key name
pub type Listener = Box<dyn FnMut(&str) -> anyhow::Result<()> + Send>;

/// Registered listeners per kind
#[derive(Default)]
pub struct Listeners {
    key_down: Vec<Listener>,
    key_up: Vec<Listener>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("key_down", &self.key_down.len())
            .field("key_up", &self.key_up.len())
            .finish()
    }
}

impl Listeners {
    pub fn add(&mut self, kind: ListenerKind, listener: Listener) {
        self.slot(kind).push(listener);
    }

    pub fn len(&self, kind: ListenerKind) -> usize {
        match kind {
            ListenerKind::KeyDown => self.key_down.len(),
            ListenerKind::KeyUp => self.key_up.len(),
        }
    }

    fn slot(&mut self, kind: ListenerKind) -> &mut Vec<Listener> {
        match kind {
            ListenerKind::KeyDown => &mut self.key_down,
            ListenerKind::KeyUp => &mut self.key_up,
        }
    }

    /// Run every listener of `kind` for `key`.
    pub fn dispatch(&mut self, kind: ListenerKind, key: &str) {
        for (index, listener) in self.slot(kind).iter_mut().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(key))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("{} listener #{} failed for '{}': {:#}", kind, index, key, e);
                }
                Err(_) => {
                    tracing::warn!("{} listener #{} panicked for '{}'", kind, index, key);
                }
            }
        }
    }
}

/// Notification sent to the host for every key that goes down or up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KeyEvent {
    Pressed { key: KeyName, source: PressSource },
    Released { key: KeyName },
}

impl KeyEvent {
    pub fn key(&self) -> &str {
        match self {
            KeyEvent::Pressed { key, .. } | KeyEvent::Released { key } => key,
        }
    }
}

/// Receiving end of the notification channel
pub type KeyEventReceiver = mpsc::Receiver<KeyEvent>;

/// Sending end of the notification channel
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<KeyEvent>,
}

impl Notifier {
    /// Create a notifier and its receiver with the given buffer size.
    pub fn new(buffer_size: usize) -> (Self, KeyEventReceiver) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }

    /// Send without blocking; events are dropped (and logged) if the host
    /// is not keeping up or has gone away.
    pub fn notify(&self, event: KeyEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!("Notification channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!("Notification receiver closed, dropping {:?}", event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_listener_kind_parsing() {
        assert_eq!("keydown".parse::<ListenerKind>(), Ok(ListenerKind::KeyDown));
        assert_eq!("keyup".parse::<ListenerKind>(), Ok(ListenerKind::KeyUp));
        assert_eq!(
            "keypress".parse::<ListenerKind>(),
            Err(EngineError::UnknownEvent("keypress".to_string()))
        );
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();

        listeners.add(
            ListenerKind::KeyDown,
            Box::new(|_: &str| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) }),
        );
        listeners.add(
            ListenerKind::KeyDown,
            Box::new(|_: &str| -> anyhow::Result<()> { panic!("listener panic") }),
        );
        let sink = seen.clone();
        listeners.add(
            ListenerKind::KeyDown,
            Box::new(move |key: &str| -> anyhow::Result<()> {
                sink.lock().unwrap().push(key.to_string());
                Ok(())
            }),
        );

        listeners.dispatch(ListenerKind::KeyDown, "a");
        listeners.dispatch(ListenerKind::KeyUp, "a");

        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
        assert_eq!(listeners.len(ListenerKind::KeyDown), 3);
        assert_eq!(listeners.len(ListenerKind::KeyUp), 0);
    }

    #[test]
    fn test_notifier_delivers_and_drops_when_full() {
        let (notifier, mut receiver) = Notifier::new(1);
        notifier.notify(KeyEvent::Released { key: "a".to_string() });
        notifier.notify(KeyEvent::Released { key: "b".to_string() });

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.key(), "a");
        assert!(receiver.try_recv().is_err(), "Second event should have been dropped");
    }

    #[test]
    fn test_notifier_survives_closed_receiver() {
        let (notifier, receiver) = Notifier::new(4);
        drop(receiver);
        notifier.notify(KeyEvent::Pressed {
            key: "a".to_string(),
            source: PressSource::Physical,
        });
    }
}

//! Configuration data model

use keysense_engine::{KeyState, Keybinding, Settings};

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: SettingsConfig,
    pub tags: Vec<TagConfig>,
    pub keybinds: Vec<KeybindConfig>,
    /// Keys to block at startup, in file order
    pub blocked: Vec<String>,
}

impl Config {
    /// Install settings, tags, keybindings and blocked keys into an engine.
    ///
    /// Later entries replace earlier ones with the same name.
    pub fn apply(&self, state: &mut KeyState) {
        *state.settings_mut() = self.settings.engine.clone();

        for tag in &self.tags {
            state.set_tag(&tag.name, tag.members.iter().cloned());
        }

        for keybind in &self.keybinds {
            match &keybind.binding {
                Keybinding::Single { key } => state.bind_key(&keybind.name, key),
                Keybinding::Multiple { keys, ordered } => {
                    state.bind_keys(&keybind.name, keys.iter().cloned(), *ordered)
                }
            }
        }

        for key in &self.blocked {
            state.block_key(key);
        }

        tracing::debug!(
            "Applied config: {} tag(s), {} keybind(s), {} blocked key(s)",
            self.tags.len(),
            self.keybinds.len(),
            self.blocked.len()
        );
    }

    /// A fresh engine configured from this file.
    pub fn build_state(&self) -> KeyState {
        let mut state = KeyState::new(self.settings.engine.clone());
        self.apply(&mut state);
        state
    }
}

/// The `settings` block
#[derive(Debug, Clone, Default)]
pub struct SettingsConfig {
    pub log_level: LogLevel,
    pub engine: Settings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// A `tag` node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagConfig {
    /// Tag name without the `#`
    pub name: String,
    pub members: Vec<String>,
}

/// A `keybind` node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeybindConfig {
    pub name: String,
    pub binding: Keybinding,
}

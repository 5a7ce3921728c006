//! Host-settable engine settings
//!
//! Settings are never persisted; a host sets them on startup (or through
//! `keysense-config`) and may revert them with `KeyState::reset_settings`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::EngineError;

/// Default hit/release window in seconds
pub const DEFAULT_SENSITIVITY: f64 = 0.03;

/// Window used when a host supplies an unusable sensitivity (zero, negative, NaN)
pub const FALLBACK_SENSITIVITY: f64 = 0.028;

pub const DEFAULT_NOT_SIMULATED_MESSAGE: &str = "Key is Not Simulated";
pub const DEFAULT_NOT_INITIALIZED_MESSAGE: &str = "Key is Not Initialized";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Empty all press state when the host window loses focus
    pub clear_on_blur: bool,
    /// Seconds after a press/release during which hit/released queries report true
    pub sensitivity: f64,
    /// Returned by `time_until_sim_ends` for keys without an active simulation
    pub not_simulated_message: String,
    /// Returned by `time_since_released` for keys never released
    pub not_initialized_message: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clear_on_blur: true,
            sensitivity: DEFAULT_SENSITIVITY,
            not_simulated_message: DEFAULT_NOT_SIMULATED_MESSAGE.to_string(),
            not_initialized_message: DEFAULT_NOT_INITIALIZED_MESSAGE.to_string(),
        }
    }
}

impl Settings {
    /// Set the sensitivity window, falling back to [`FALLBACK_SENSITIVITY`]
    /// for values that are not positive and finite.
    pub fn set_sensitivity(&mut self, seconds: f64) {
        self.sensitivity = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            tracing::debug!("Sensitivity {} rejected, using {}", seconds, FALLBACK_SENSITIVITY);
            FALLBACK_SENSITIVITY
        };
    }

    /// Read a setting by name.
    pub fn get(&self, setting: Setting) -> Value {
        match setting {
            Setting::ClearOnBlur => Value::Bool(self.clear_on_blur),
            Setting::Sensitivity => Value::Number(self.sensitivity),
            Setting::NotSimulatedMessage => Value::Text(self.not_simulated_message.clone()),
            Setting::NotInitializedMessage => Value::Text(self.not_initialized_message.clone()),
        }
    }

    /// Set a setting from its textual value.
    ///
    /// Booleans accept `true`/`false`/`1`/`0`/`yes`/`no`. Sensitivity values
    /// that do not parse fall back like [`Settings::set_sensitivity`].
    pub fn set(&mut self, setting: Setting, value: &str) -> Result<(), EngineError> {
        match setting {
            Setting::ClearOnBlur => {
                self.clear_on_blur = match value.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" | "enabled" => true,
                    "false" | "0" | "no" | "disabled" => false,
                    _ => {
                        return Err(EngineError::InvalidSetting {
                            setting: setting.to_string(),
                            value: value.to_string(),
                        })
                    }
                };
            }
            Setting::Sensitivity => {
                self.set_sensitivity(value.trim().parse().unwrap_or(0.0));
            }
            Setting::NotSimulatedMessage => self.not_simulated_message = value.to_string(),
            Setting::NotInitializedMessage => self.not_initialized_message = value.to_string(),
        }
        Ok(())
    }
}

/// Names of the host-settable settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    ClearOnBlur,
    Sensitivity,
    NotSimulatedMessage,
    NotInitializedMessage,
}

impl Setting {
    pub const ALL: [Setting; 4] = [
        Setting::ClearOnBlur,
        Setting::Sensitivity,
        Setting::NotSimulatedMessage,
        Setting::NotInitializedMessage,
    ];
}

impl FromStr for Setting {
    type Err = EngineError;

    /// Accepts both the host's menu labels and kebab-case config names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clear on blur" | "clear-on-blur" => Ok(Self::ClearOnBlur),
            "detection sensitivity" | "sensitivity" => Ok(Self::Sensitivity),
            "error message - not simulated" | "not-simulated-message" => {
                Ok(Self::NotSimulatedMessage)
            }
            "error message - not yet initialized" | "not-initialized-message" => {
                Ok(Self::NotInitializedMessage)
            }
            _ => Err(EngineError::UnknownSetting(s.to_string())),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::ClearOnBlur => write!(f, "clear on blur"),
            Setting::Sensitivity => write!(f, "detection sensitivity"),
            Setting::NotSimulatedMessage => write!(f, "error message - not simulated"),
            Setting::NotInitializedMessage => write!(f, "error message - not yet initialized"),
        }
    }
}

/// A loosely typed value handed back to the host (settings, key attributes).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.clear_on_blur);
        assert_eq!(settings.sensitivity, DEFAULT_SENSITIVITY);
        assert_eq!(settings.not_simulated_message, "Key is Not Simulated");
        assert_eq!(settings.not_initialized_message, "Key is Not Initialized");
    }

    #[test]
    fn test_sensitivity_fallback() {
        let mut settings = Settings::default();
        settings.set_sensitivity(0.1);
        assert_eq!(settings.sensitivity, 0.1);
        settings.set_sensitivity(0.0);
        assert_eq!(settings.sensitivity, FALLBACK_SENSITIVITY);
        settings.set_sensitivity(f64::NAN);
        assert_eq!(settings.sensitivity, FALLBACK_SENSITIVITY);
        settings.set_sensitivity(-1.0);
        assert_eq!(settings.sensitivity, FALLBACK_SENSITIVITY);
    }

    #[test]
    fn test_set_by_name() {
        let mut settings = Settings::default();
        let setting: Setting = "clear on blur".parse().unwrap();
        settings.set(setting, "false").unwrap();
        assert_eq!(settings.get(Setting::ClearOnBlur), Value::Bool(false));

        settings.set("sensitivity".parse().unwrap(), "abc").unwrap();
        assert_eq!(settings.get(Setting::Sensitivity), Value::Number(FALLBACK_SENSITIVITY));

        settings
            .set("error message - not simulated".parse().unwrap(), "n/a")
            .unwrap();
        assert_eq!(settings.not_simulated_message, "n/a");
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut settings = Settings::default();
        let result = settings.set(Setting::ClearOnBlur, "maybe");
        assert!(matches!(result, Err(EngineError::InvalidSetting { .. })));
        assert!(settings.clear_on_blur, "Rejected value must not change the setting");
    }

    #[test]
    fn test_unknown_setting() {
        assert!(matches!(
            "volume".parse::<Setting>(),
            Err(EngineError::UnknownSetting(_))
        ));
    }

    #[test]
    fn test_setting_names_round_trip_through_display() {
        for setting in Setting::ALL {
            assert_eq!(setting.to_string().parse::<Setting>().unwrap(), setting);
        }
    }
}

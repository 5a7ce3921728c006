use thiserror::Error;

/// Errors returned by the few fallible engine operations.
///
/// Queries never fail; they fall back to neutral values or the configured
/// sentinel messages instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Listener registration for an event kind other than `keydown`/`keyup`
    #[error("Event '{0}' is not recognized")]
    UnknownEvent(String),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Invalid value '{value}' for setting '{setting}'")]
    InvalidSetting { setting: String, value: String },

    #[error("Unknown key attribute: {0}")]
    UnknownAttribute(String),
}

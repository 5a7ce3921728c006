use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(keysense::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration at line {line}: {message}")]
    #[diagnostic(code(keysense::config::invalid))]
    Invalid { message: String, line: usize },

    #[error("Missing required field: {field} (line {line})")]
    #[diagnostic(
        code(keysense::config::missing_field),
        help("tag, keybind and block nodes take their names and keys as arguments")
    )]
    MissingField { field: String, line: usize },

    #[error("Unknown key: '{key}' (line {line})")]
    #[diagnostic(code(keysense::config::unknown_key))]
    UnknownKey { key: String, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Configuration parsing for keysense
//!
//! This crate parses the KDL startup file into engine settings, tags,
//! keybindings and blocked keys. The file is only ever read.

use std::path::PathBuf;

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str};

/// Where the config file lives unless told otherwise
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/keysense/config.kdl";

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

//! KDL configuration parser

use std::path::Path;

use keysense_engine::{Keybinding, TAG_PREFIX};

use crate::error::ConfigError;
use crate::model::*;

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Line of a node's name in the source
fn node_line(node: &kdl::KdlNode, source: &str) -> usize {
    offset_to_line_col(source, node.name().span().offset()).0
}

/// Positional arguments of a node (entries without a name)
fn arguments(node: &kdl::KdlNode) -> impl Iterator<Item = &kdl::KdlValue> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

/// A key name from a string or integer value (`5` is the key "5")
fn value_to_key(value: &kdl::KdlValue) -> Option<String> {
    value
        .as_string()
        .map(str::to_string)
        .or_else(|| value.as_i64().map(|n| n.to_string()))
}

fn value_to_f64(value: &kdl::KdlValue) -> Option<f64> {
    value.as_f64().or_else(|| value.as_i64().map(|n| n as f64))
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl reports spans with its own miette version
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "settings" => {
                config.settings = parse_settings(node, content)?;
            }
            "tag" => {
                config.tags.push(parse_tag(node, content)?);
            }
            "keybind" => {
                config.keybinds.push(parse_keybind(node, content)?);
            }
            "block" => {
                config.blocked.extend(parse_block(node, content)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_settings(node: &kdl::KdlNode, source: &str) -> Result<SettingsConfig, ConfigError> {
    let mut settings = SettingsConfig::default();

    let Some(children) = node.children() else {
        return Ok(settings);
    };

    for child in children.nodes() {
        let line = node_line(child, source);
        let name = child.name().value();
        let Some(value) = arguments(child).next() else {
            return Err(ConfigError::MissingField {
                field: format!("{} value", name),
                line,
            });
        };

        match name {
            "log-level" => {
                let level = value.as_string().ok_or_else(|| ConfigError::Invalid {
                    message: "log-level must be a string".to_string(),
                    line,
                })?;
                settings.log_level = level
                    .parse()
                    .map_err(|message| ConfigError::Invalid { message, line })?;
            }
            "clear-on-blur" => {
                settings.engine.clear_on_blur =
                    value.as_bool().ok_or_else(|| ConfigError::Invalid {
                        message: "clear-on-blur must be true or false".to_string(),
                        line,
                    })?;
            }
            "sensitivity" => {
                let seconds = value_to_f64(value).ok_or_else(|| ConfigError::Invalid {
                    message: "sensitivity must be a number of seconds".to_string(),
                    line,
                })?;
                settings.engine.set_sensitivity(seconds);
            }
            "not-simulated-message" | "not-initialized-message" => {
                let message = value.as_string().ok_or_else(|| ConfigError::Invalid {
                    message: format!("{} must be a string", name),
                    line,
                })?;
                if name == "not-simulated-message" {
                    settings.engine.not_simulated_message = message.to_string();
                } else {
                    settings.engine.not_initialized_message = message.to_string();
                }
            }
            name => {
                tracing::warn!("Unknown settings option: {}", name);
            }
        }
    }

    Ok(settings)
}

/// Key names from the given arguments; empty names are rejected.
fn parse_keys<'a>(
    values: impl Iterator<Item = &'a kdl::KdlValue>,
    line: usize,
) -> Result<Vec<String>, ConfigError> {
    values
        .map(|value| match value_to_key(value) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            Some(key) => Err(ConfigError::UnknownKey { key, line }),
            None => Err(ConfigError::UnknownKey {
                key: value.to_string(),
                line,
            }),
        })
        .collect()
}

fn parse_tag(node: &kdl::KdlNode, source: &str) -> Result<TagConfig, ConfigError> {
    let line = node_line(node, source);
    let mut args = arguments(node);

    let name = args
        .next()
        .and_then(|v| v.as_string())
        .map(|s| s.strip_prefix(TAG_PREFIX).unwrap_or(s).to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: "tag name".to_string(),
            line,
        })?;

    let members = parse_keys(args, line)?;
    if let Some(nested) = members.iter().find(|m| m.starts_with(TAG_PREFIX)) {
        return Err(ConfigError::Invalid {
            message: format!("tag #{} cannot contain tag {}", name, nested),
            line,
        });
    }

    Ok(TagConfig { name, members })
}

fn parse_keybind(node: &kdl::KdlNode, source: &str) -> Result<KeybindConfig, ConfigError> {
    let line = node_line(node, source);
    let mut args = arguments(node);

    let name = args
        .next()
        .and_then(value_to_key)
        .ok_or_else(|| ConfigError::MissingField {
            field: "keybind name".to_string(),
            line,
        })?;

    let mut keys = parse_keys(args, line)?;
    if keys.is_empty() {
        return Err(ConfigError::MissingField {
            field: format!("keys for keybind '{}'", name),
            line,
        });
    }

    let mut ordered = None;
    for entry in node.entries() {
        let Some(property) = entry.name() else {
            continue;
        };
        match property.value() {
            "ordered" => {
                ordered = Some(entry.value().as_bool().ok_or_else(|| ConfigError::Invalid {
                    message: "ordered must be true or false".to_string(),
                    line,
                })?);
            }
            other => {
                tracing::warn!("Unknown keybind property: {}", other);
            }
        }
    }

    let binding = match (keys.len(), ordered) {
        (1, None) => Keybinding::Single { key: keys.remove(0) },
        (_, ordered) => Keybinding::Multiple {
            keys,
            ordered: ordered.unwrap_or(false),
        },
    };

    Ok(KeybindConfig { name, binding })
}

fn parse_block(node: &kdl::KdlNode, source: &str) -> Result<Vec<String>, ConfigError> {
    let line = node_line(node, source);
    let keys = parse_keys(arguments(node), line)?;
    if keys.is_empty() {
        return Err(ConfigError::MissingField {
            field: "keys to block".to_string(),
            line,
        });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use keysense_engine::{KeyState, PressSource, RawAttributes, FALLBACK_SENSITIVITY};

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            settings {
                log-level "debug"
                clear-on-blur false
                sensitivity 0.05
                not-simulated-message "idle"
                not-initialized-message "never"
            }
            tag "arrows" "up arrow" "down arrow" "left arrow" "right arrow"
            keybind "jump" "space"
            keybind "dash" "left shift" "d" ordered=true
            block "escape" "tab"
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.settings.log_level, LogLevel::Debug);
        assert!(!result.settings.engine.clear_on_blur);
        assert_eq!(result.settings.engine.sensitivity, 0.05);
        assert_eq!(result.settings.engine.not_simulated_message, "idle");
        assert_eq!(result.settings.engine.not_initialized_message, "never");

        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.tags[0].name, "arrows");
        assert_eq!(result.tags[0].members.len(), 4);

        assert_eq!(
            result.keybinds[0].binding,
            Keybinding::Single {
                key: "space".to_string()
            }
        );
        assert_eq!(
            result.keybinds[1].binding,
            Keybinding::Multiple {
                keys: vec!["left shift".to_string(), "d".to_string()],
                ordered: true
            }
        );
        assert_eq!(result.blocked, vec!["escape", "tab"]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let result = parse_config_str("").unwrap();
        assert_eq!(result.settings.log_level, LogLevel::Info);
        assert!(result.settings.engine.clear_on_blur);
        assert!(result.tags.is_empty());
        assert!(result.keybinds.is_empty());
    }

    #[test]
    fn test_integer_keys_and_sensitivity() {
        let config = r#"
            settings {
                sensitivity 0
            }
            keybind "pick" 1 2
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.settings.engine.sensitivity, FALLBACK_SENSITIVITY);
        assert_eq!(
            result.keybinds[0].binding,
            Keybinding::Multiple {
                keys: vec!["1".to_string(), "2".to_string()],
                ordered: false
            }
        );
    }

    #[test]
    fn test_tag_name_prefix_is_optional() {
        let result = parse_config_str(r##"tag "#moves" "w" "a" "s" "d""##).unwrap();
        assert_eq!(result.tags[0].name, "moves");
    }

    #[test]
    fn test_nested_tag_rejected() {
        let config = r##"
            tag "mods" "left shift" "#control"
        "##;

        match parse_config_str(config) {
            Err(ConfigError::Invalid { message, line }) => {
                assert!(message.contains("#control"), "got: {}", message);
                assert_eq!(line, 2);
            }
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_keybind_without_keys() {
        let result = parse_config_str(r#"keybind "jump""#);
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_block_without_keys() {
        let result = parse_config_str("block");
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_empty_key_name_reported() {
        let result = parse_config_str(r#"block "escape" """#);
        match result {
            Err(ConfigError::UnknownKey { key, line }) => {
                assert_eq!(key, "");
                assert_eq!(line, 1);
            }
            other => panic!("Expected UnknownKey error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_settings_values() {
        let bad_level = r#"settings { log-level "loud"; }"#;
        assert!(matches!(
            parse_config_str(bad_level),
            Err(ConfigError::Invalid { .. })
        ));

        let bad_bool = r#"settings { clear-on-blur "yes"; }"#;
        assert!(matches!(
            parse_config_str(bad_bool),
            Err(ConfigError::Invalid { .. })
        ));

        let missing_value = "settings { sensitivity; }";
        assert!(matches!(
            parse_config_str(missing_value),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_kdl_syntax_error() {
        let result = parse_config_str("settings {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            device "Keyboard"
            keybind "jump" "space"
        "#;
        let result = parse_config_str(config).unwrap();
        assert_eq!(result.keybinds.len(), 1);
    }

    #[test]
    fn test_offset_to_line_col() {
        let source = "a\nbc\nd";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 3), (2, 2));
        assert_eq!(offset_to_line_col(source, 5), (3, 1));
    }

    #[test]
    fn test_apply_installs_everything() {
        let config = parse_config_str(
            r##"
            settings {
                sensitivity 0.1
            }
            tag "arrows" "up arrow" "down arrow"
            keybind "up" "#arrows"
            keybind "combo" "a" "b" ordered=true
            block "escape"
        "##,
        )
        .unwrap();

        let mut state = config.build_state();
        assert_eq!(state.settings().sensitivity, 0.1);
        assert_eq!(state.tag_members("arrows"), ["up arrow", "down arrow"]);
        assert!(state.list_tags().contains(&"#arrows"));
        assert_eq!(state.list_keybinds(), vec!["up", "combo"]);
        assert_eq!(state.blocked_keys(), vec!["escape"]);

        state.press("down arrow", PressSource::Physical, RawAttributes::default());
        assert!(state.is_keybind_triggered("up"));

        state.press("escape", PressSource::Physical, RawAttributes::default());
        assert!(!state.is_pressed("escape"));
    }

    #[test]
    fn test_apply_replaces_existing_state() {
        let config = parse_config_str(r#"keybind "jump" "w""#).unwrap();

        let mut state = KeyState::default();
        state.bind_key("jump", "space");
        config.apply(&mut state);

        assert_eq!(state.keys_bound_to("jump"), vec!["w"]);
    }

    #[test]
    fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "keybind \"jump\" \"space\"\nblock \"tab\"\n").unwrap();

        let result = parse_config(&path).unwrap();
        assert_eq!(result.keybinds[0].name, "jump");
        assert_eq!(result.blocked, vec!["tab"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_config(&dir.path().join("missing.kdl"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

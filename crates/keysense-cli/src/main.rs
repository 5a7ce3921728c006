//! keysense CLI
//!
//! Watches a keyboard through evdev and reports what the key-state engine
//! makes of it.

mod input;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use keysense_config::{Config, ConfigError, DEFAULT_CONFIG_PATH};
use keysense_engine::{KeyEvent, KeyResolver, KeySense, KeyState, DEFAULT_CHANNEL_BUFFER};
use miette::IntoDiagnostic;

#[derive(Parser, Debug)]
#[command(name = "keysense")]
#[command(about = "Keyboard state tracking for Linux input devices")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List available input devices
    Devices,

    /// Track a keyboard and print key events and active keybinds
    Watch {
        /// Device to read (defaults to the first keyboard found)
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the key names the engine gives to platform key identifiers
    Resolve {
        /// Identifiers such as KeyA, ShiftLeft or AudioVolumeUp
        #[arg(required = true)]
        raw_ids: Vec<String>,
    },

    /// Simulate a key press and report the resulting events
    Simulate {
        /// Key name or platform identifier, e.g. "space", "left shift" or "KeyA"
        key: String,

        /// Hold duration in seconds
        #[arg(short, long, default_value_t = 1.0)]
        duration: f64,

        /// Block until the duration has passed
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let config_path = keysense_config::expand_path(&cli.config);

    // The config decides the default log level, so load it before tracing is up
    let loaded = load_config(&config_path);
    let default_level = loaded
        .as_ref()
        .ok()
        .and_then(|c| c.as_ref())
        .map(|c| c.settings.log_level.as_filter())
        .unwrap_or("info");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path, loaded),
        Commands::Devices => cmd_devices(),
        Commands::Watch { device, json } => {
            let config = config_or_default(&config_path, loaded)?;
            cmd_watch(&config, device.as_deref(), json)
                .await
                .map_err(|e| miette::miette!("{:#}", e))
        }
        Commands::Resolve { raw_ids } => cmd_resolve(&raw_ids),
        Commands::Simulate {
            key,
            duration,
            wait,
        } => {
            let config = config_or_default(&config_path, loaded)?;
            cmd_simulate(&config, &key, duration, wait).await
        }
    }
}

/// Load the config; a missing file is `Ok(None)`.
fn load_config(path: &Path) -> miette::Result<Option<Config>> {
    match keysense_config::parse_config(path) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(miette::Report::new(e)),
    }
}

/// The loaded config, or defaults when there is no file.
fn config_or_default(path: &Path, loaded: miette::Result<Option<Config>>) -> miette::Result<Config> {
    match loaded? {
        Some(config) => Ok(config),
        None => {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }
}

fn cmd_validate(config_path: &Path, loaded: miette::Result<Option<Config>>) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    match loaded? {
        Some(config) => {
            println!("Configuration is valid!");
            println!("  Log level: {}", config.settings.log_level.as_filter());
            println!("  Sensitivity: {}s", config.settings.engine.sensitivity);
            println!("  Clear on blur: {}", config.settings.engine.clear_on_blur);
            println!("  Tags: {}", config.tags.len());
            for tag in &config.tags {
                println!("    - #{} ({} key(s))", tag.name, tag.members.len());
            }
            println!("  Keybinds: {}", config.keybinds.len());
            for keybind in &config.keybinds {
                println!("    - {}: {}", keybind.name, keybind.binding.keys().join(" + "));
            }
            println!("  Blocked keys: {}", config.blocked.len());
            Ok(())
        }
        None => Err(miette::miette!(
            "Configuration file not found: {}",
            config_path.display()
        )),
    }
}

fn cmd_devices() -> miette::Result<()> {
    println!("Available input devices:\n");

    for path in input::event_device_paths().map_err(|e| miette::miette!("{:#}", e))? {
        match evdev::Device::open(&path) {
            Ok(device) => {
                let name = device.name().unwrap_or("Unknown");
                let id = device.input_id();
                let vendor_product = format!("{:04x}:{:04x}", id.vendor(), id.product());
                let device_type = if input::is_keyboard(&device) {
                    "keyboard"
                } else {
                    "other"
                };

                println!("  {} [{}]", name, device_type);
                println!("    Path: {}", path.display());
                println!("    ID: {}", vendor_product);
                println!();
            }
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}

fn cmd_resolve(raw_ids: &[String]) -> miette::Result<()> {
    let mut resolver = KeyResolver::new();
    for raw_id in raw_ids {
        println!("{} -> {}", raw_id, resolver.resolve(raw_id));
    }
    Ok(())
}

fn print_event(event: &KeyEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to serialize {:?}: {}", event, e),
        }
    } else {
        match event {
            KeyEvent::Pressed { key, source } => println!("down  {} ({:?})", key, source),
            KeyEvent::Released { key } => println!("up    {}", key),
        }
    }
}

async fn print_snapshot(engine: &KeySense) -> miette::Result<()> {
    let snapshot = engine.lock().await.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

async fn cmd_watch(config: &Config, device: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (path, device) = input::open_keyboard(device)?;
    let name = device.name().unwrap_or("Unknown").to_string();
    let mut stream = device.into_event_stream()?;

    let (mut state, mut events) =
        KeyState::with_notifications(config.settings.engine.clone(), DEFAULT_CHANNEL_BUFFER);
    config.apply(&mut state);
    let engine = KeySense::new(state);

    tracing::info!("Watching {} ({})", name, path.display());
    eprintln!("Watching {} - press Ctrl+C to stop", name);

    let mut active: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            event = stream.next_event() => {
                let event = event?;
                let Some(input) = input::to_input_event(&event) else {
                    continue;
                };
                engine.handle_input(input).await;

                let now_active = engine.lock().await.list_active_keybinds();
                if now_active != active {
                    tracing::info!("Active keybinds: {:?}", now_active);
                    active = now_active;
                }
            }
            Some(event) = events.recv() => {
                print_event(&event, json);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    engine.shutdown().await;
    let snapshot = engine.lock().await.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn cmd_simulate(config: &Config, key: &str, duration: f64, wait: bool) -> miette::Result<()> {
    let (mut state, mut events) =
        KeyState::with_notifications(config.settings.engine.clone(), DEFAULT_CHANNEL_BUFFER);
    config.apply(&mut state);
    let engine = KeySense::new(state);

    let name = KeyResolver::new().resolve(key);
    engine.simulate(key, duration, wait).await;
    print_snapshot(&engine).await?;

    // Wait for the release, with some slack past the requested duration
    let limit = Duration::try_from_secs_f64(duration)
        .unwrap_or(Duration::ZERO)
        .saturating_add(Duration::from_secs(1));

    let released = tokio::time::timeout(limit, async {
        while let Some(event) = events.recv().await {
            print_event(&event, false);
            if matches!(&event, KeyEvent::Released { key } if *key == name) {
                break;
            }
        }
    })
    .await;

    if released.is_err() {
        tracing::warn!("'{}' was not released within {:?}", name, limit);
    }

    engine.shutdown().await;
    Ok(())
}

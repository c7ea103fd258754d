//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.bowser/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::frame_loop::DEFAULT_FRAME_RATE;
use super::pool::DEFAULT_WORKERS;
use crate::systems::audio::AudioSettings;
use crate::systems::mixer::DEFAULT_WORDS_PER_MINUTE;
use crate::systems::navigation::NavigationTheme;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BowserConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub frame_rate: Option<u32>,
    pub worker_threads: Option<usize>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AudioConfig {
    pub words_per_minute: Option<u32>,
    pub speech_channel: Option<String>,
    pub effects_channel: Option<String>,
    /// Effect name → length in milliseconds. Replaces the built-in table.
    pub effects: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NavigationConfig {
    pub default_theme: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_LOG_FILE: &str = "bowser.log";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub frame_rate: u32,
    pub worker_threads: usize,
    pub log_level: LevelFilter,
    pub log_file: String,
    pub audio: AudioSettings,
    pub default_theme: NavigationTheme,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve_with(&BowserConfig::default(), &Overrides::default(), |_| None)
    }
}

/// Values given on the command line. `None` means not specified.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub frame_rate: Option<u32>,
    pub theme: Option<String>,
    pub log_level: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.bowser/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".bowser").join("config.toml"))
}

/// Load config from `~/.bowser/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `BowserConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<BowserConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(BowserConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<BowserConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(BowserConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: BowserConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Bowser Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# frame_rate = 30                    # Or set BOWSER_FRAME_RATE
# worker_threads = 4                 # Or set BOWSER_WORKERS
# log_level = "debug"                # "error", "warn", "info", "debug", "trace"
# log_file = "bowser.log"

# [audio]
# words_per_minute = 180
# speech_channel = "main-tts"
# effects_channel = "effects"

# [audio.effects]                    # Replaces the built-in table
# chime = 630                        # Length in milliseconds

# [navigation]
# default_theme = "horizontal"       # "horizontal", "vertical", "reverse_horizontal", "reverse_vertical"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &BowserConfig, cli: &Overrides) -> ResolvedConfig {
    resolve_with(config, cli, |name| std::env::var(name).ok())
}

/// [`resolve`] with an injectable environment lookup.
pub fn resolve_with(
    config: &BowserConfig,
    cli: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Frame rate: CLI → env → config → default
    let frame_rate = cli
        .frame_rate
        .or_else(|| parse_env(&env, "BOWSER_FRAME_RATE"))
        .or(config.general.frame_rate)
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_FRAME_RATE);

    // Workers: env → config → default
    let worker_threads = parse_env(&env, "BOWSER_WORKERS")
        .or(config.general.worker_threads)
        .filter(|workers| *workers > 0)
        .unwrap_or(DEFAULT_WORKERS);

    // Log level: CLI → env → config → default
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| env("BOWSER_LOG_LEVEL"))
        .or_else(|| config.general.log_level.clone())
        .and_then(|level| match level.parse::<LevelFilter>() {
            Ok(level) => Some(level),
            Err(_) => {
                warn!("Ignoring unknown log level: {}", level);
                None
            }
        })
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Theme: CLI → env → config → default
    let default_theme = cli
        .theme
        .clone()
        .or_else(|| env("BOWSER_THEME"))
        .or_else(|| config.navigation.default_theme.clone())
        .and_then(|theme| match theme.parse::<NavigationTheme>() {
            Ok(theme) => Some(theme),
            Err(e) => {
                warn!("Ignoring configured theme: {}", e);
                None
            }
        })
        .unwrap_or_default();

    let defaults = AudioSettings::default();
    let audio = AudioSettings {
        speech_channel: config
            .audio
            .speech_channel
            .clone()
            .unwrap_or(defaults.speech_channel),
        effects_channel: config
            .audio
            .effects_channel
            .clone()
            .unwrap_or(defaults.effects_channel),
        words_per_minute: config
            .audio
            .words_per_minute
            .filter(|wpm| *wpm > 0)
            .unwrap_or(DEFAULT_WORDS_PER_MINUTE),
        effects: config
            .audio
            .effects
            .as_ref()
            .map(|table| {
                table
                    .iter()
                    .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
                    .collect()
            })
            .unwrap_or(defaults.effects),
    };

    ResolvedConfig {
        frame_rate,
        worker_threads,
        log_level,
        log_file: config
            .general
            .log_file
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        audio,
        default_theme,
    }
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = env(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

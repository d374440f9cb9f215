//! Configuration file support for livemidi
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/livemidi/config.toml`
//! - macOS: `~/Library/Application Support/livemidi/config.toml`
//! - Windows: `%APPDATA%\livemidi\config.toml`

use crate::error::{Error, Result};
use crate::form::{Part, DEFAULT_BARS, DEFAULT_BEATS};
use crate::looper::{Loop, LoopOptions, DEFAULT_MAX_RESTARTS};
use crate::timing::{DEFAULT_BPM, DEFAULT_OFFSET_MS};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tempo and form of the loop
    pub transport: TransportSettings,
    /// MIDI port selection
    pub midi: MidiSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::from_path(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Load configuration from a specific file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "livemidi") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        write_default_config(&path)?;
        Ok(path)
    }

    /// Build a stopped loop from the transport settings
    pub fn to_loop(&self) -> Loop {
        self.transport.to_loop()
    }
}

const DEFAULT_CONFIG: &str = r#"# livemidi configuration file

[transport]
# Tempo in beats per minute (clamped to 1-999)
bpm = 120.0

# Form used when no parts are given
bars = 4
beats = 16

# Parts override bars/beats, one table per part:
# [[transport.parts]]
# bars = 2
# beats = 8

# Start over at the end of the form
repeat = false

# Restarts allowed while repeating
max_restarts = 16

# Delay before the first beat, in milliseconds
offset_ms = 100.0

[midi]
# Client name announced to the MIDI backend
client_name = "livemidi"

# Output port, matched by substring (falls back to output_index)
# output_port = "FLUID Synth"

output_index = 0
input_index = 0
"#;

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)?;
    Ok(())
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Tempo in beats per minute
    pub bpm: f64,
    /// Bars when the form has no parts
    pub bars: u32,
    /// Beats per bar when the form has no parts
    pub beats: u32,
    /// Parts of the form
    pub parts: Vec<Part>,
    /// Start over at the end of the form
    pub repeat: bool,
    /// Restarts allowed while repeating
    pub max_restarts: u32,
    /// Delay before the first beat, in milliseconds
    pub offset_ms: f64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            bars: DEFAULT_BARS,
            beats: DEFAULT_BEATS,
            parts: Vec::new(),
            repeat: false,
            max_restarts: DEFAULT_MAX_RESTARTS,
            offset_ms: DEFAULT_OFFSET_MS,
        }
    }
}

impl TransportSettings {
    pub fn to_loop(&self) -> Loop {
        let mut looper = Loop::new(LoopOptions {
            bars: Some(self.bars),
            beats: Some(self.beats),
            parts: Some(self.parts.clone()),
            repeat: Some(self.repeat),
            max_restarts: Some(self.max_restarts),
        })
        .with_offset(self.offset_ms);
        looper.set_tempo(self.bpm);
        looper
    }
}

/// MIDI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Client name announced to the MIDI backend
    pub client_name: String,
    /// Output port name (substring match)
    pub output_port: Option<String>,
    /// Output port index used when no name is given or matches
    pub output_index: usize,
    /// Input port index
    pub input_index: usize,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            client_name: "livemidi".to_string(),
            output_port: None,
            output_index: 0,
            input_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Coordinate;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.bpm, 120.0);
        assert_eq!(config.transport.bars, 4);
        assert_eq!(config.transport.beats, 16);
        assert_eq!(config.transport.max_restarts, 16);
        assert_eq!(config.midi.client_name, "livemidi");
        assert_eq!(config.midi.output_port, None);
    }

    #[test]
    fn test_default_file_parses() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let parsed: Config = toml::from_str(
            r#"
            [transport]
            bpm = 90.0

            [[transport.parts]]
            bars = 2
            beats = 8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.transport.bpm, 90.0);
        assert_eq!(parsed.transport.parts, vec![Part::new(2, 8)]);
        assert_eq!(parsed.transport.beats, 16);
        assert_eq!(parsed.midi, MidiSettings::default());
    }

    #[test]
    fn test_save_and_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.transport.repeat = true;
        config.midi.output_port = Some("Synth".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(Config::from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_path(&dir.path().join("absent.toml")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_to_loop() {
        let mut config = Config::default();
        config.transport.bpm = 60.0;
        config.transport.parts = vec![Part::new(1, 4), Part::new(2, 8)];
        config.transport.repeat = true;
        config.transport.offset_ms = 0.0;

        let looper = config.to_loop();
        assert_eq!(looper.interval(), 1000.0);
        assert_eq!(looper.offset(), 0.0);
        assert!(looper.is_repeating());
        assert_eq!(looper.form().last(), Coordinate::new(2, 2, 8));
    }
}

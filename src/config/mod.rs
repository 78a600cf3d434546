use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analysis::notes::{NoteOptions, NotePairing};
use crate::explain::DumpOptions;
use crate::midi::reader::ParseOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reject malformed files instead of recovering with warnings
    #[serde(default)]
    pub strict: bool,

    /// Spell accidentals as flats (Eb4) instead of sharps (D#4)
    #[serde(default)]
    pub use_flats: bool,

    /// How repeated Note On events for the same key are paired with releases
    #[serde(default)]
    pub note_pairing: NotePairing,

    /// Bytes per row in the annotated dump
    #[serde(default = "default_hex_bytes_per_line")]
    pub hex_bytes_per_line: usize,

    /// Payload bytes shown for long SysEx and meta events before truncating
    #[serde(default = "default_max_payload_preview")]
    pub max_payload_preview: usize,

    /// Playback speed multiplier
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f32,

    /// MIDI output port name (None for virtual port)
    #[serde(default)]
    pub midi_port: Option<String>,

    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_hex_bytes_per_line() -> usize {
    8
}

fn default_max_payload_preview() -> usize {
    16
}

fn default_playback_speed() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: false,
            use_flats: false,
            note_pairing: NotePairing::default(),
            hex_bytes_per_line: default_hex_bytes_per_line(),
            max_payload_preview: default_max_payload_preview(),
            playback_speed: default_playback_speed(),
            midi_port: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path))?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config {}", path))?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=32).contains(&self.hex_bytes_per_line) {
            anyhow::bail!(
                "hex_bytes_per_line ({}) must be between 1 and 32",
                self.hex_bytes_per_line
            );
        }
        if self.max_payload_preview == 0 {
            anyhow::bail!("max_payload_preview must be at least 1");
        }
        if self.playback_speed.is_nan() || self.playback_speed <= 0.0 || self.playback_speed > 8.0
        {
            anyhow::bail!(
                "playback_speed ({}) must be greater than 0 and at most 8",
                self.playback_speed
            );
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.strict,
        }
    }

    pub fn note_options(&self) -> NoteOptions {
        NoteOptions {
            pairing: self.note_pairing,
            use_flats: self.use_flats,
        }
    }

    pub fn dump_options(&self, track: Option<usize>) -> DumpOptions {
        DumpOptions {
            hex_bytes_per_line: self.hex_bytes_per_line,
            max_payload_preview: self.max_payload_preview,
            track,
            use_flats: self.use_flats,
            strict: self.strict,
        }
    }
}

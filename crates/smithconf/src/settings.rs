//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the model artifact and rendered output live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Trained model artifact (JSON).
    /// Default: ~/.local/share/chordsmith/model.json
    #[serde(default = "PathsConfig::default_model")]
    pub model: PathBuf,

    /// Harmonized MIDI output. When unset, output goes next to the input
    /// as `<stem>.chords.mid`.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl PathsConfig {
    fn default_model() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/chordsmith/model.json"))
            .unwrap_or_else(|| PathBuf::from("chordsmith-model.json"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            output: None,
        }
    }
}

/// Melody windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Melody notes per window.
    /// Default: 8
    #[serde(default = "SequenceConfig::default_seq_length")]
    pub seq_length: usize,
}

impl SequenceConfig {
    fn default_seq_length() -> usize {
        8
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            seq_length: Self::default_seq_length(),
        }
    }
}

/// How predicted chords are written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Added to each predicted value to get a MIDI pitch.
    /// Default: 24
    #[serde(default = "RenderConfig::default_pitch_offset")]
    pub pitch_offset: u8,

    /// Default: 75
    #[serde(default = "RenderConfig::default_velocity")]
    pub velocity: u8,

    /// GM program of the chord track.
    /// Default: 0 (acoustic grand piano)
    #[serde(default)]
    pub program: u8,

    /// Chord length when chords are placed on downbeats.
    /// Default: 0.5
    #[serde(default = "RenderConfig::default_fallback_slot_seconds")]
    pub fallback_slot_seconds: f64,
}

impl RenderConfig {
    fn default_pitch_offset() -> u8 {
        24
    }

    fn default_velocity() -> u8 {
        75
    }

    fn default_fallback_slot_seconds() -> f64 {
        0.5
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pitch_offset: Self::default_pitch_offset(),
            velocity: Self::default_velocity(),
            program: 0,
            fallback_slot_seconds: Self::default_fallback_slot_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Share of corpus rows held out for accuracy reporting. 0 disables.
    /// Default: 0.2
    #[serde(default = "TrainingConfig::default_holdout_fraction")]
    pub holdout_fraction: f64,
}

impl TrainingConfig {
    fn default_holdout_fraction() -> f64 {
        0.2
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: Self::default_holdout_fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_defaults() {
        let render = RenderConfig::default();
        assert_eq!(render.pitch_offset, 24);
        assert_eq!(render.velocity, 75);
        assert_eq!(render.program, 0);
        assert_eq!(render.fallback_slot_seconds, 0.5);
    }

    #[test]
    fn model_path_is_json() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.model.extension().and_then(|e| e.to_str()),
            Some("json")
        );
        assert!(paths.output.is_none());
    }
}

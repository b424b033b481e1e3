//! Layered configuration for chordsmith.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/chordsmith/config.toml` (system)
//! 2. `~/.config/chordsmith/config.toml` (user)
//! 3. `./chordsmith.toml` or the `--config` path (local override)
//! 4. Environment variables (`CHORDSMITH_*`, `RUST_LOG`)
//!
//! Files merge key by key, so an override only needs the keys it changes.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! model = "~/.local/share/chordsmith/model.json"
//!
//! [sequence]
//! seq_length = 8
//!
//! [render]
//! pitch_offset = 24
//! velocity = 75
//! program = 0
//! fallback_slot_seconds = 0.5
//!
//! [training]
//! holdout_fraction = 0.2
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{PathsConfig, RenderConfig, SequenceConfig, TelemetryConfig, TrainingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChordsmithConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub sequence: SequenceConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ChordsmithConfig {
    /// Load configuration from all standard sources, with `config_path` in
    /// place of `./chordsmith.toml`, and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = Self::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Merge the given files in order over compiled defaults. No env overlay.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            merged = loader::merge_tables(merged, table);
            sources.files.push(path.clone());
        }

        let origin = files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let config = loader::table_to_config(merged, &origin)?;
        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Chordsmith Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!("model = \"{}\"\n", self.paths.model.display()));
        match &self.paths.output {
            Some(path) => output.push_str(&format!("output = \"{}\"\n", path.display())),
            None => output.push_str("# output = \"<input>.chords.mid\"\n"),
        }

        output.push_str("\n[sequence]\n");
        output.push_str(&format!("seq_length = {}\n", self.sequence.seq_length));

        output.push_str("\n[render]\n");
        output.push_str(&format!("pitch_offset = {}\n", self.render.pitch_offset));
        output.push_str(&format!("velocity = {}\n", self.render.velocity));
        output.push_str(&format!("program = {}\n", self.render.program));
        output.push_str(&format!(
            "fallback_slot_seconds = {:?}\n",
            self.render.fallback_slot_seconds
        ));

        output.push_str("\n[training]\n");
        output.push_str(&format!(
            "holdout_fraction = {:?}\n",
            self.training.holdout_fraction
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChordsmithConfig::default();
        assert_eq!(config.sequence.seq_length, 8);
        assert_eq!(config.render.velocity, 75);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = ChordsmithConfig::default();
        config.paths.model = PathBuf::from("/models/chords.json");
        config.render.fallback_slot_seconds = 1.0;

        let toml = config.to_toml();
        assert!(toml.contains("[render]"));
        assert!(toml.contains("fallback_slot_seconds = 1.0"));

        let parsed = loader::parse_toml(&toml, Path::new("rendered.toml")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_later_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&system, "[sequence]\nseq_length = 4\n\n[render]\nvelocity = 60\n").unwrap();
        std::fs::write(&local, "[render]\nvelocity = 100\n").unwrap();

        let (config, sources) =
            ChordsmithConfig::load_files(&[system.clone(), local.clone()]).unwrap();

        assert_eq!(config.sequence.seq_length, 4);
        assert_eq!(config.render.velocity, 100);
        assert_eq!(sources.files, vec![system, local]);
    }

    #[test]
    fn test_broken_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[render\nvelocity = ").unwrap();

        match ChordsmithConfig::load_files(&[path.clone()]) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let (config, sources) = ChordsmithConfig::load_files(&[]).unwrap();
        assert_eq!(config, ChordsmithConfig::default());
        assert!(sources.files.is_empty());
    }
}

//! Config file discovery, loading, and environment variable overlay.

use crate::{ChordsmithConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/chordsmith/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("chordsmith/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("chordsmith.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one config file as a raw TOML table, checking it parses as a config.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let table = parse_table(&contents, path)?;
    table_to_config(table.clone(), path)?;
    Ok(table)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse config from TOML string.
pub fn parse_toml(contents: &str, path: &Path) -> Result<ChordsmithConfig, ConfigError> {
    table_to_config(parse_table(contents, path)?, path)
}

pub(crate) fn table_to_config(table: toml::Table, path: &Path) -> Result<ChordsmithConfig, ConfigError> {
    let mut config: ChordsmithConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

    config.paths.model = expand_path(&config.paths.model.to_string_lossy());
    config.paths.output = config
        .paths
        .output
        .map(|p| expand_path(&p.to_string_lossy()));
    Ok(config)
}

/// Merge two tables key by key, with `overlay` taking precedence.
///
/// Nested tables merge recursively, so a later file that sets only
/// `render.velocity` keeps the earlier `render.pitch_offset`.
pub fn merge_tables(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
    for (key, value) in overlay {
        match (base.remove(&key), value) {
            (Some(toml::Value::Table(inner)), toml::Value::Table(over)) => {
                base.insert(key, toml::Value::Table(merge_tables(inner, over)));
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
    base
}

/// Apply `CHORDSMITH_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ChordsmithConfig, sources: &mut ConfigSources) {
    apply_overrides(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any key lookup. Values that fail to parse are ignored.
pub fn apply_overrides<F>(config: &mut ChordsmithConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut hit = |key: &str| {
        let value = lookup(key);
        if value.is_some() {
            sources.env_overrides.push(key.to_string());
        }
        value
    };

    if let Some(v) = hit("CHORDSMITH_MODEL") {
        config.paths.model = expand_path(&v);
    }
    if let Some(v) = hit("CHORDSMITH_OUTPUT") {
        config.paths.output = Some(expand_path(&v));
    }
    if let Some(n) = hit("CHORDSMITH_SEQ_LENGTH").and_then(|v| v.parse().ok()) {
        config.sequence.seq_length = n;
    }
    if let Some(n) = hit("CHORDSMITH_PITCH_OFFSET").and_then(|v| v.parse().ok()) {
        config.render.pitch_offset = n;
    }
    if let Some(n) = hit("CHORDSMITH_VELOCITY").and_then(|v| v.parse().ok()) {
        config.render.velocity = n;
    }
    if let Some(n) = hit("CHORDSMITH_PROGRAM").and_then(|v| v.parse().ok()) {
        config.render.program = n;
    }
    if let Some(n) = hit("CHORDSMITH_SLOT_SECONDS").and_then(|v| v.parse().ok()) {
        config.render.fallback_slot_seconds = n;
    }
    if let Some(n) = hit("CHORDSMITH_HOLDOUT").and_then(|v| v.parse().ok()) {
        config.training.holdout_fraction = n;
    }
    if let Some(v) = hit("CHORDSMITH_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    // Also support RUST_LOG
    if let Some(v) = hit("RUST_LOG") {
        config.telemetry.log_level = v;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        match stripped.split_once('/') {
            Some((var_name, rest)) => env::var(var_name)
                .map(|value| PathBuf::from(value).join(rest))
                .unwrap_or_else(|_| PathBuf::from(path)),
            None => env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path)),
        }
    } else {
        PathBuf::from(path)
    }
}

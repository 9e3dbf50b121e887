//! Configuration management for mnemos.
//!
//! Configuration is loaded with precedence:
//! 1. `--config <PATH>` or `MNEMOS_CONFIG`
//! 2. Config file in the platform config directory (`config.toml`)
//! 3. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use mnemos_core::MnemosConfig;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Memory engine settings (`[embedding]`, `[index]`, `[store]`, ...)
    #[serde(flatten)]
    pub memory: MnemosConfig,

    /// Paths
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where session snapshots are written
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "mnemos", "mnemos")
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_dirs() {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemos")
    }
}

fn default_snapshot_dir() -> PathBuf {
    default_data_dir().join("snapshots")
}

impl Config {
    /// Load configuration from the given file, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Config::default()
        };

        config
            .memory
            .validate()
            .context("Invalid memory configuration")?;

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = project_dirs() {
            proj_dirs.config_dir().join("config.toml")
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Copy of this config with API keys hidden, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let hide = |key: &mut Option<String>| {
            if key.is_some() {
                *key = Some("********".to_string());
            }
        };
        hide(&mut config.memory.embedding.api_key);
        hide(&mut config.memory.cognition.api_key);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::config::{EmbeddingBackend, IndexKind};

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.memory.store.recall_limit, 10);
        assert_eq!(config.memory.index.kind, IndexKind::Hnsw);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[embedding]
backend = "hashed"
dimensions = 128

[store]
recall_threshold = 0.25

[paths]
snapshot_dir = "/tmp/mnemos-snapshots"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.memory.embedding.backend, EmbeddingBackend::Hashed);
        assert_eq!(config.memory.embedding.dimensions, 128);
        assert!((config.memory.store.recall_threshold - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.memory.store.recall_limit, 10);
        assert_eq!(config.paths.snapshot_dir, PathBuf::from("/tmp/mnemos-snapshots"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store]\nrecall_limit = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.memory.index.ef_search = 99;
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.memory.index.ef_search, 99);
    }

    #[test]
    fn test_redacted_hides_keys() {
        let mut config = Config::default();
        config.memory.cognition.api_key = Some("sk-secret".into());

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(config.redacted().memory.embedding.api_key.is_none());
    }
}

use crate::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the shared storage directory used by `FsStore`.
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// How long after its last registration or heartbeat an agent still
    /// counts as active.
    pub liveness_window_secs: u64,
    /// Matches at or below this score are dropped from task rankings.
    pub min_match_score: f64,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".agent_mesh"),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            liveness_window_secs: 300,
            min_match_score: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

impl MeshConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| MeshError::Config(format!("Failed to read config file: {}", e)))?;

        let config: MeshConfig = toml::from_str(&config_str)
            .map_err(|e| MeshError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn load_with_env_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;

        if let Ok(data_dir) = std::env::var("AGENT_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secs) = std::env::var("MESH_LIVENESS_SECS") {
            config.network.liveness_window_secs = secs
                .parse()
                .map_err(|e| MeshError::Config(format!("Invalid MESH_LIVENESS_SECS: {}", e)))?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(MeshError::Config("Storage data_dir cannot be empty".to_string()));
        }

        if self.network.liveness_window_secs == 0 {
            return Err(MeshError::Config("Liveness window cannot be 0".to_string()));
        }

        if !(0.0..1.0).contains(&self.network.min_match_score) {
            return Err(MeshError::Config(
                "min_match_score must be within [0.0, 1.0)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn liveness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.network.liveness_window_secs as i64)
    }
}

pub fn create_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let default_config = MeshConfig::default();
    let toml_str = toml::to_string_pretty(&default_config)
        .map_err(|e| MeshError::Config(format!("Failed to serialize default config: {}", e)))?;

    std::fs::write(path, toml_str)
        .map_err(|e| MeshError::Config(format!("Failed to write default config file: {}", e)))?;

    Ok(())
}

/// Install a global tracing subscriber honoring the configured level.
/// Intended for binaries and demos; the library itself never initializes
/// logging.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MeshConfig::default();
        assert_eq!(config.network.liveness_window_secs, 300);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MeshConfig::default();
        config.network.liveness_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MeshConfig::default();
        config.network.min_match_score = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        create_default_config_file(path).unwrap();
        assert!(path.exists());

        let loaded_config = MeshConfig::load(path).unwrap();
        assert_eq!(loaded_config.network.liveness_window_secs, 300);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[network]\nliveness_window_secs = 60\n").unwrap();

        let config = MeshConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.network.liveness_window_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_config_fails_loudly() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "network = \"nope").unwrap();
        assert!(matches!(
            MeshConfig::load(temp_file.path()),
            Err(MeshError::Config(_))
        ));
    }
}

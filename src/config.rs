use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_data_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_brain_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("beacon")
}

/// Where the snapshots, the Second Brain API, and the local write
/// layer live. Everything has a workable default for a local setup.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Base URL serving the read-only JSON snapshot files.
    pub data_url: String,
    /// Base URL of the Second Brain search/health API.
    pub brain_url: String,
    /// Directory holding the write layer (locally edited collections).
    pub data_dir: PathBuf,
    pub debug_logging: bool,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            data_url: default_data_url(),
            brain_url: default_brain_url(),
            data_dir: default_data_dir(),
            debug_logging: false,
        }
    }
}

impl BeaconConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("beacon")
            .join("config.json")
    }

    /// Load the config file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!(
                        "config {} did not parse ({}), using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Ensure the write-layer directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_services() {
        let config = BeaconConfig::default();
        assert_eq!(config.data_url, "http://localhost:3000");
        assert_eq!(config.brain_url, "http://localhost:3001");
        assert!(config.data_dir.ends_with("beacon"));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: BeaconConfig =
            serde_json::from_str(r#"{"data_url": "http://example.test/data"}"#).unwrap();
        assert_eq!(config.data_url, "http://example.test/data");
        assert_eq!(config.brain_url, "http://localhost:3001");
    }
}

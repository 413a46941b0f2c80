//! Server configuration file: network settings, spatial index mode, and
//! datasets to preload at startup.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::spatial::IndexKind;

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_index_type() -> String {
    "h3".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_index_type")]
    pub index_type: String,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default)]
    pub shortcuts_path: Option<String>,
    #[serde(default)]
    pub edges_path: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            host: default_host(),
            index_type: default_index_type(),
            datasets: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ServerConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn index_kind(&self) -> IndexKind {
        IndexKind::parse(&self.index_type).unwrap_or(IndexKind::Hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.index_kind(), IndexKind::Hex);
    }

    #[test]
    fn test_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            br#"{
                "port": 9000,
                "index_type": "rtree",
                "datasets": [
                    {"name": "belgium", "shortcuts_path": "/data/sc", "edges_path": "/data/edges.csv"}
                ]
            }"#,
        )
        .unwrap();
        let config = ServerConfig::from_file(f.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.index_kind(), IndexKind::Rtree);
        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].name, "belgium");
    }
}

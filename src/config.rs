//! Configuration for kinship-graph

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GraphError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kinship-graph")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directory holding the edge database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Hard cap on pedigree/descendant depth; larger requests are clamped
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,

    /// Depth used by the mini tree when the caller does not pass one
    #[serde(default = "default_mini_tree_generations")]
    pub mini_tree_generations: u32,

    /// Hop limit for relationship path search
    #[serde(default = "default_max_path_hops")]
    pub max_path_hops: u32,

    /// Maximum active biological parents per child
    #[serde(default = "default_max_biological_parents")]
    pub max_biological_parents: usize,

    /// Most nodes a single pedigree or descendant tree may hold before expansion stops
    #[serde(default = "default_max_tree_nodes")]
    pub max_tree_nodes: usize,

    /// Per-traversal deadline in milliseconds (0 = no deadline)
    #[serde(default = "default_traversal_timeout_ms")]
    pub traversal_timeout_ms: u64,

    /// Broadcast capacity of the event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_generations() -> u32 {
    10
}

fn default_mini_tree_generations() -> u32 {
    2
}

fn default_max_path_hops() -> u32 {
    16
}

fn default_max_biological_parents() -> usize {
    2
}

fn default_max_tree_nodes() -> usize {
    2000
}

fn default_traversal_timeout_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_generations: default_max_generations(),
            mini_tree_generations: default_mini_tree_generations(),
            max_path_hops: default_max_path_hops(),
            max_biological_parents: default_max_biological_parents(),
            max_tree_nodes: default_max_tree_nodes(),
            traversal_timeout_ms: default_traversal_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl GraphConfig {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GraphError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), GraphError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GraphError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would leave traversals without a bound
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.max_generations == 0 {
            return Err(GraphError::Config("max_generations must be at least 1".into()));
        }
        if self.max_path_hops == 0 {
            return Err(GraphError::Config("max_path_hops must be at least 1".into()));
        }
        if self.max_biological_parents == 0 {
            return Err(GraphError::Config("max_biological_parents must be at least 1".into()));
        }
        if self.max_tree_nodes == 0 {
            return Err(GraphError::Config("max_tree_nodes must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(GraphError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Get edge database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join("graph.db")
    }

    /// Traversal deadline, if one is configured
    pub fn traversal_timeout(&self) -> Option<Duration> {
        match self.traversal_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_path_hops, 16);
        assert_eq!(config.traversal_timeout(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: GraphConfig = toml::from_str("max_generations = 4\ntraversal_timeout_ms = 0").unwrap();
        assert_eq!(config.max_generations, 4);
        assert_eq!(config.mini_tree_generations, 2);
        assert_eq!(config.traversal_timeout(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = GraphConfig::default();
        config.max_path_hops = 7;
        config.save(&path).unwrap();

        let loaded = GraphConfig::load(&path).unwrap();
        assert_eq!(loaded.max_path_hops, 7);
    }

    #[test]
    fn test_zero_hops_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_path_hops = 0").unwrap();

        assert!(matches!(GraphConfig::load(&path), Err(GraphError::Config(_))));
    }

    #[test]
    fn test_zero_tree_nodes_rejected() {
        let config: GraphConfig = toml::from_str("max_tree_nodes = 0").unwrap();
        assert!(matches!(config.validate(), Err(GraphError::Config(_))));
        assert_eq!(GraphConfig::default().max_tree_nodes, 2000);
    }
}

//! Engine Configuration
//!
//! Tuning knobs for both engines, loadable from a TOML file. Every field
//! has a default, so a partial file (or none at all) is fine.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Character cap for decision-node condition summaries.
    pub condition_label_cap: usize,
    /// Character cap for primitive value text in heap objects.
    pub value_repr_cap: usize,
    /// Recursion bound for heap serialization; objects at the cap are
    /// recorded opaque.
    pub max_serialize_depth: usize,
    /// Call-depth bound for traced programs.
    pub max_call_depth: usize,
    /// Optional instruction-count limit for traced programs. Unset by
    /// default: imposing a wall-clock or step limit is the caller's job.
    pub max_steps: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            condition_label_cap: 20,
            value_repr_cap: 50,
            max_serialize_depth: 64,
            max_call_depth: 200,
            max_steps: None,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.condition_label_cap, 20);
        assert_eq!(config.value_repr_cap, 50);
        assert_eq!(config.max_serialize_depth, 64);
        assert_eq!(config.max_call_depth, 200);
        assert!(config.max_steps.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: EngineConfig = toml::from_str("value_repr_cap = 80").unwrap();
        assert_eq!(config.value_repr_cap, 80);
        assert_eq!(config.condition_label_cap, 20);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = EngineConfig::load(Path::new("/nonexistent/engine.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "max_steps = 5000\nmax_call_depth = 64\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_steps, Some(5000));
        assert_eq!(config.max_call_depth, 64);
    }
}

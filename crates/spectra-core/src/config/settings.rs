use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{AgentId, EventType};

/// 10 ms, in microseconds.
pub const DEFAULT_PROXIMITY_THRESHOLD_US: u64 = 10_000;
pub const DEFAULT_MAX_HOPS: usize = 64;

/// Options passed to every DAG builder invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Gap completion only bridges pairs strictly closer than this.
    pub proximity_threshold_us: u64,
    /// Event types the delegation rule considers.
    pub delegation_types: BTreeSet<EventType>,
    /// Agent-pair convention: delegate for events that do not name one.
    pub delegation_routes: BTreeMap<AgentId, AgentId>,
    /// Match edges on (from, to, reason) instead of (from, to).
    pub match_reasons: bool,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_us: DEFAULT_PROXIMITY_THRESHOLD_US,
            delegation_types: BTreeSet::from([EventType::GoalDelegated]),
            delegation_routes: BTreeMap::new(),
            match_reasons: false,
        }
    }
}

impl ReconstructionConfig {
    pub fn with_threshold_us(mut self, threshold_us: u64) -> Self {
        self.proximity_threshold_us = threshold_us;
        self
    }

    pub fn with_route(mut self, from: impl Into<AgentId>, to: impl Into<AgentId>) -> Self {
        self.delegation_routes.insert(from.into(), to.into());
        self
    }

    pub fn is_delegation_capable(&self, event_type: EventType) -> bool {
        self.delegation_types.contains(&event_type)
    }
}

/// Options for failure propagation analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    pub failure_type: EventType,
    pub max_hops: usize,
    /// Walk `inferred_by_proximity` edges as well as explicit ones.
    pub follow_inferred: bool,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            failure_type: EventType::GoalFailed,
            max_hops: DEFAULT_MAX_HOPS,
            follow_inferred: false,
        }
    }
}

/// Everything configurable, as stored in a JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectraConfig {
    pub reconstruction: ReconstructionConfig,
    pub failure: FailureConfig,
}

impl SpectraConfig {
    /// Read config from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: SpectraConfig = serde_json::from_str(&data)
            .map_err(|e| CoreError::Config(format!("Invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reconstruction.proximity_threshold_us == 0 {
            return Err(CoreError::Config(
                "proximity_threshold_us must be greater than zero".into(),
            ));
        }
        if self.failure.max_hops == 0 {
            return Err(CoreError::Config("max_hops must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SpectraConfig::default();
        assert_eq!(config.reconstruction.proximity_threshold_us, 10_000);
        assert!(config
            .reconstruction
            .is_delegation_capable(EventType::GoalDelegated));
        assert!(!config
            .reconstruction
            .is_delegation_capable(EventType::ReasoningStep));
        assert_eq!(config.failure.failure_type, EventType::GoalFailed);
        assert!(!config.failure.follow_inferred);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spectra.json");
        std::fs::write(
            &path,
            r#"{"reconstruction": {"proximity_threshold_us": 500, "delegation_routes": {"planner": "worker"}}}"#,
        )
        .unwrap();

        let config = SpectraConfig::load(&path).unwrap();
        assert_eq!(config.reconstruction.proximity_threshold_us, 500);
        assert_eq!(
            config.reconstruction.delegation_routes.get(&AgentId::from("planner")),
            Some(&AgentId::from("worker"))
        );
        assert_eq!(config.failure.max_hops, DEFAULT_MAX_HOPS);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spectra.json");
        let mut config = SpectraConfig::default();
        config.failure.follow_inferred = true;
        config.reconstruction = config.reconstruction.with_route("a", "b");
        config.save(&path).unwrap();
        assert_eq!(SpectraConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spectra.json");
        std::fs::write(&path, r#"{"reconstruction": {"proximity_threshold_us": 0}}"#).unwrap();
        assert!(matches!(
            SpectraConfig::load(&path),
            Err(CoreError::Config(_))
        ));
    }
}

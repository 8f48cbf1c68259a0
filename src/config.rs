//! Configuration loading for route guidance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::OffRouteMetric;

/// Thresholds and prompt texts used while following a route.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NavConfig {
    /// Distance to the maneuver below which a step counts as done (meters, default: 20)
    #[serde(default = "default_maneuver_reached")]
    pub maneuver_reached_m: f64,

    /// Distance from the step geometry above which the vehicle is off route (meters, default: 50)
    #[serde(default = "default_off_route")]
    pub off_route_m: f64,

    /// Consecutive on-route samples that end an off-route episode (default: 3)
    #[serde(default = "default_off_route_clear_samples")]
    pub off_route_clear_samples: u32,

    /// Announcement distances, strictly descending (meters, default: 500, 200, 100, 50)
    #[serde(default = "default_buckets")]
    pub announcement_buckets_m: Vec<u32>,

    /// How distance to the step geometry is measured (default: projection)
    #[serde(default)]
    pub off_route_metric: OffRouteMetric,

    #[serde(default)]
    pub prompts: PromptConfig,
}

/// Fixed prompt texts
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PromptConfig {
    #[serde(default = "default_off_route_prompt")]
    pub off_route: String,

    #[serde(default = "default_arrival_prompt")]
    pub arrival: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            off_route: default_off_route_prompt(),
            arrival: default_arrival_prompt(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            maneuver_reached_m: default_maneuver_reached(),
            off_route_m: default_off_route(),
            off_route_clear_samples: default_off_route_clear_samples(),
            announcement_buckets_m: default_buckets(),
            off_route_metric: OffRouteMetric::default(),
            prompts: PromptConfig::default(),
        }
    }
}

fn default_maneuver_reached() -> f64 {
    20.0
}
fn default_off_route() -> f64 {
    50.0
}
fn default_off_route_clear_samples() -> u32 {
    3
}
fn default_buckets() -> Vec<u32> {
    vec![500, 200, 100, 50]
}
fn default_off_route_prompt() -> String {
    "Recalculating route".to_string()
}
fn default_arrival_prompt() -> String {
    "You have arrived at your destination".to_string()
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: NavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds that would make the state machine misbehave.
    pub fn validate(&self) -> Result<()> {
        if !(self.maneuver_reached_m.is_finite() && self.maneuver_reached_m > 0.0) {
            return Err(NavError::Config(format!(
                "maneuver-reached-m must be positive, got {}",
                self.maneuver_reached_m
            )));
        }
        if !(self.off_route_m.is_finite() && self.off_route_m > 0.0) {
            return Err(NavError::Config(format!(
                "off-route-m must be positive, got {}",
                self.off_route_m
            )));
        }
        if self.off_route_clear_samples == 0 {
            return Err(NavError::Config(
                "off-route-clear-samples must be at least 1".to_string(),
            ));
        }
        if self.announcement_buckets_m.contains(&0) {
            return Err(NavError::Config(
                "announcement-buckets-m must not contain 0".to_string(),
            ));
        }
        if self.announcement_buckets_m.windows(2).any(|w| w[0] <= w[1]) {
            return Err(NavError::Config(format!(
                "announcement-buckets-m must be strictly descending, got {:?}",
                self.announcement_buckets_m
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_guidance_constants() {
        let config = NavConfig::default();
        assert_eq!(config.maneuver_reached_m, 20.0);
        assert_eq!(config.off_route_m, 50.0);
        assert_eq!(config.off_route_clear_samples, 3);
        assert_eq!(config.announcement_buckets_m, vec![500, 200, 100, 50]);
        assert_eq!(config.off_route_metric, OffRouteMetric::Projection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = NavConfig::from_toml_str("").unwrap();
        assert_eq!(config.off_route_m, 50.0);
        assert_eq!(config.prompts.arrival, "You have arrived at your destination");
    }

    #[test]
    fn partial_toml_overrides() {
        let config = NavConfig::from_toml_str(
            r#"
off-route-m = 35.0
off-route-metric = "nearest-vertex"
announcement-buckets-m = [1000, 300]

[prompts]
off-route = "Rerouting"
"#,
        )
        .unwrap();

        assert_eq!(config.off_route_m, 35.0);
        assert_eq!(config.maneuver_reached_m, 20.0);
        assert_eq!(config.off_route_metric, OffRouteMetric::NearestVertex);
        assert_eq!(config.announcement_buckets_m, vec![1000, 300]);
        assert_eq!(config.prompts.off_route, "Rerouting");
        assert_eq!(config.prompts.arrival, "You have arrived at your destination");
    }

    #[test]
    fn rejects_unsorted_buckets() {
        let result = NavConfig::from_toml_str("announcement-buckets-m = [100, 200]");
        assert!(matches!(result, Err(NavError::Config(_))));
    }

    #[test]
    fn rejects_non_positive_thresholds() {
        let result = NavConfig::from_toml_str("off-route-m = 0.0");
        assert!(matches!(result, Err(NavError::Config(_))));

        let result = NavConfig::from_toml_str("maneuver-reached-m = -5.0");
        assert!(matches!(result, Err(NavError::Config(_))));

        let result = NavConfig::from_toml_str("off-route-clear-samples = 0");
        assert!(matches!(result, Err(NavError::Config(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        let result = NavConfig::from_toml_str("off-route-m = \"far\"");
        assert!(matches!(result, Err(NavError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "maneuver-reached-m = 15.0").unwrap();

        let config = NavConfig::load(file.path()).unwrap();
        assert_eq!(config.maneuver_reached_m, 15.0);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = NavConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(NavError::Config(_))));
    }
}

use crate::error::{OnboardError, Result};
use crate::paths;
use crate::types::{CheckWarning, WarnLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ProductConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// FlowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// History events kept per progress record.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    crate::progress::DEFAULT_HISTORY_LIMIT
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Workspace configuration, stored at `.onboard/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub product: ProductConfig,
    #[serde(default)]
    pub flows: FlowConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(product_name: &str) -> Self {
        Self {
            version: default_version(),
            product: ProductConfig {
                name: product_name.to_string(),
                description: None,
            },
            flows: FlowConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(OnboardError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<CheckWarning> {
        let mut warnings = Vec::new();

        if self.product.name.trim().is_empty() {
            warnings.push(CheckWarning {
                level: WarnLevel::Error,
                message: "product.name is empty".to_string(),
            });
        }

        if self.flows.history_limit == 0 {
            warnings.push(CheckWarning {
                level: WarnLevel::Warning,
                message: "flows.history_limit is 0; progress history is disabled".to_string(),
            });
        } else if self.flows.history_limit > 500 {
            warnings.push(CheckWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "flows.history_limit={} (>500 is unusual)",
                    self.flows.history_limit
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let config = Config::new("acme-talent");
        config.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.product.name, "acme-talent");
        assert_eq!(
            loaded.flows.history_limit,
            crate::progress::DEFAULT_HISTORY_LIMIT
        );
        assert!(loaded.validate().is_empty());
    }

    #[test]
    fn load_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(OnboardError::NotInitialized)
        ));
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("product:\n  name: demo\n").unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(
            config.flows.history_limit,
            crate::progress::DEFAULT_HISTORY_LIMIT
        );
    }

    #[test]
    fn validate_flags_empty_name_and_odd_limits() {
        let mut config = Config::new("");
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));

        config = Config::new("demo");
        config.flows.history_limit = 0;
        assert!(config
            .validate()
            .iter()
            .any(|w| w.message.contains("history is disabled")));

        config.flows.history_limit = 10_000;
        assert!(config
            .validate()
            .iter()
            .any(|w| w.message.contains("unusual")));
    }
}

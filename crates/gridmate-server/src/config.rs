//! Server configuration.
//!
//! Read from `~/.gridmate/config.toml` unless a path is given on the command
//! line. Every section and key is optional.
//!
//! ```toml
//! [power_flow]
//! algorithm = "nr"
//! max_iteration = 10
//!
//! [contingency]
//! vm_min_pu = 0.95
//! vm_max_pu = 1.05
//! max_loading_percent = 100.0
//! parallel = true
//!
//! [network]
//! f_hz = 50.0
//! sn_mva = 1.0
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use gridmate_algo::{PowerFlowOptions, ViolationLimits};
use gridmate_core::{DEFAULT_F_HZ, DEFAULT_SN_MVA};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub power_flow: PowerFlowOptions,
    #[serde(default)]
    pub contingency: ContingencyConfig,
    #[serde(default)]
    pub network: NetworkDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Violation policy and execution settings for contingency sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyConfig {
    #[serde(default = "default_vm_min")]
    pub vm_min_pu: f64,
    #[serde(default = "default_vm_max")]
    pub vm_max_pu: f64,
    #[serde(default = "default_max_loading")]
    pub max_loading_percent: f64,
    /// Evaluate outages on a thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for ContingencyConfig {
    fn default() -> Self {
        Self {
            vm_min_pu: default_vm_min(),
            vm_max_pu: default_vm_max(),
            max_loading_percent: default_max_loading(),
            parallel: default_parallel(),
        }
    }
}

impl ContingencyConfig {
    pub fn limits(&self) -> ViolationLimits {
        ViolationLimits {
            vm_min_pu: self.vm_min_pu,
            vm_max_pu: self.vm_max_pu,
            max_loading_percent: self.max_loading_percent,
        }
    }
}

fn default_vm_min() -> f64 {
    ViolationLimits::default().vm_min_pu
}

fn default_vm_max() -> f64 {
    ViolationLimits::default().vm_max_pu
}

fn default_max_loading() -> f64 {
    ViolationLimits::default().max_loading_percent
}

fn default_parallel() -> bool {
    true
}

/// Attributes given to networks created without explicit values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDefaults {
    #[serde(default = "default_f_hz")]
    pub f_hz: f64,
    #[serde(default = "default_sn_mva")]
    pub sn_mva: f64,
}

impl Default for NetworkDefaults {
    fn default() -> Self {
        Self {
            f_hz: default_f_hz(),
            sn_mva: default_sn_mva(),
        }
    }
}

fn default_f_hz() -> f64 {
    DEFAULT_F_HZ
}

fn default_sn_mva() -> f64 {
    DEFAULT_SN_MVA
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.power_flow
            .validate()
            .context("invalid [power_flow] section")?;
        self.contingency
            .limits()
            .validate()
            .context("invalid [contingency] section")?;
        if !(self.network.f_hz > 0.0 && self.network.sn_mva > 0.0) {
            return Err(anyhow!(
                "invalid [network] section: f_hz and sn_mva must be positive"
            ));
        }
        Ok(())
    }
}

/// `~/.gridmate`
pub fn gridmate_home() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| anyhow!("Cannot determine home directory"))
        .map(|h| h.join(".gridmate"))
}

/// `~/.gridmate/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(gridmate_home()?.join("config.toml"))
}

/// Loads the configuration. An explicit path must exist; the default path
/// falls back to built-in defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = default_config_path()?;
            if !default.exists() {
                return Ok(ServerConfig::default());
            }
            default
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ServerConfig::from_toml(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmate_algo::Algorithm;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.power_flow.max_iteration, 10);
        assert_eq!(config.contingency.vm_min_pu, 0.95);
        assert_eq!(config.network.sn_mva, 1.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = ServerConfig::from_toml(
            r#"
            [power_flow]
            algorithm = "bfsw"

            [contingency]
            max_loading_percent = 80.0
            parallel = false
            "#,
        )
        .unwrap();
        assert_eq!(config.power_flow.algorithm, Algorithm::BackwardForwardSweep);
        assert!(config.power_flow.calculate_voltage_angles);
        assert_eq!(config.contingency.max_loading_percent, 80.0);
        assert_eq!(config.contingency.vm_max_pu, 1.05);
        assert!(!config.contingency.parallel);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ServerConfig::from_toml("[contingency]\nvm_min_pu = 1.2").is_err());
        assert!(ServerConfig::from_toml("[power_flow]\nmax_iteration = 0").is_err());
        assert!(ServerConfig::from_toml("[network]\nsn_mva = -1.0").is_err());
        assert!(ServerConfig::from_toml("[power_flow]\nalgorithm = \"dc\"").is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let err = load_config(Some(Path::new("/nonexistent/gridmate.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_home_path() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with(".gridmate/config.toml"));
    }
}

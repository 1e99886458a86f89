use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::{Result, anyhow};

use crate::costing::CostingFactors;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoqConfig {
    pub backend: BackendConfig,
    pub costing: CostingConfig,
    pub theme: Theme,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the extraction/costing server
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostingConfig {
    /// Tax applied on top of the subtotal in the display summary
    pub tax_rate: f64,

    /// Factors pre-filled in the costing form
    pub default_factors: CostingFactors,
}

/// Colours used when styling the live table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Theme {
    pub header_background: String,
    pub header_foreground: String,
    pub even_row_background: String,
    pub odd_row_background: String,
    pub focus_outline: String,
    pub focus_background: String,
    pub drop_highlight: String,
    pub border_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub log_dir: String,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_background: "#1a365d".to_string(),
            header_foreground: "#d4af37".to_string(),
            even_row_background: "#f5f5f5".to_string(),
            odd_row_background: "#ffffff".to_string(),
            focus_outline: "#4a90e2".to_string(),
            focus_background: "#eef6ff".to_string(),
            drop_highlight: "#e3f2fd".to_string(),
            border_color: "#dddddd".to_string(),
        }
    }
}

impl Default for BoqConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://127.0.0.1:5000".to_string(),
                timeout_secs: 120,
            },
            costing: CostingConfig {
                tax_rate: 0.05,
                default_factors: CostingFactors::neutral(),
            },
            theme: Theme::default(),
            logging: LogSettings {
                level: "info".to_string(),
                log_dir: "logs".to_string(),
                enable_file_logging: false,
                enable_json_format: false,
            },
        }
    }
}

impl BoqConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: BoqConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Defaults overridden by `BOQ_*` environment variables
    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BOQ_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        if let Ok(timeout) = std::env::var("BOQ_TIMEOUT_SECS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.backend.timeout_secs = value;
            }
        }

        if let Ok(rate) = std::env::var("BOQ_TAX_RATE") {
            if let Ok(value) = rate.parse::<f64>() {
                self.costing.tax_rate = value;
            }
        }

        if let Ok(level) = std::env::var("BOQ_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = BoqConfig::default();
        assert_eq!(config.costing.tax_rate, 0.05);
        assert_eq!(config.costing.default_factors.exchange_rate, 1.0);
        assert_eq!(config.theme.header_background, "#1a365d");
    }

    #[test]
    fn test_config_serialization() {
        let mut config = BoqConfig::default();
        config.backend.base_url = "http://boq.internal:8080".to_string();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("boq.toml");

        config.save_to_file(&config_path).unwrap();

        let loaded = BoqConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.backend.base_url, "http://boq.internal:8080");
        assert_eq!(loaded.theme, Theme::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        assert!(BoqConfig::load_from_file(temp_dir.path().join("nope.toml")).is_err());
    }
}

// ABOUTME: Configuration management for lockstep application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Session values every script starts with; script and `-V` values win
    #[serde(default)]
    pub session_vars: IndexMap<String, serde_yaml::Value>,

    /// Default destination when neither the script nor `--output` sets one
    #[serde(default)]
    pub default_output: Option<String>,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_vars: IndexMap::new(),
            default_output: None,
            continue_on_error: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("lockstep.yaml"),
            PathBuf::from("lockstep.yml"),
            PathBuf::from(".lockstep.yaml"),
            PathBuf::from(".lockstep.yml"),
        ];

        // Check current directory
        if let Some(path) = possible_paths.iter().find(|p| p.exists()) {
            return path.clone();
        }

        // Check home directory
        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".lockstep").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Return default path (may not exist)
        PathBuf::from("lockstep.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("LOCKSTEP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOCKSTEP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOCKSTEP_OUTPUT") {
            self.default_output = Some(output);
        }
        if let Ok(flag) = std::env::var("LOCKSTEP_CONTINUE_ON_ERROR") {
            self.continue_on_error = flag.parse()?;
        }

        Ok(())
    }

    /// Merge additional values into the default session
    pub fn merge_session_vars(&mut self, vars: IndexMap<String, serde_yaml::Value>) {
        self.session_vars.extend(vars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("lockstep.yaml");

        fs::write(
            &config_path,
            r#"
session_vars:
  region: eu
  ids: [1, 2]
default_output: file://./out.txt
logging:
  level: debug
  format: compact
"#,
        )
        .unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.session_vars.len(), 2);
        assert_eq!(config.default_output.as_deref(), Some("file://./out.txt"));
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load(Some(temp_dir.path().join("absent.yaml"))).unwrap();
        assert!(config.session_vars.is_empty());
        assert!(!config.continue_on_error);
    }
}

use std::fs;

use log::{debug, trace, LevelFilter};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{config_error, core::error::Result};

#[derive(Default, Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub log: Log,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {}: {}", path, e))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Log::validate_level"))]
pub struct Log {
    #[serde(default = "Log::default_level")]
    pub level: String,

    /// Enables the file sink when set
    #[validate(length(min = 1))]
    pub path: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            path: None,
        }
    }
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Info)
    }

    fn validate_level(&self) -> Result<(), ValidationError> {
        self.level
            .parse::<LevelFilter>()
            .map(|_| ())
            .map_err(|_| ValidationError::new("invalid_log_level"))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Log recovered service panics
    #[serde(default = "LifecycleConfig::default_verbose")]
    pub verbose: bool,

    /// Let SIGTERM and Ctrl-C release a running orchestrator
    #[serde(default = "LifecycleConfig::default_handle_signals")]
    pub handle_signals: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            verbose: Self::default_verbose(),
            handle_signals: Self::default_handle_signals(),
        }
    }
}

impl LifecycleConfig {
    fn default_verbose() -> bool {
        true
    }

    fn default_handle_signals() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file() {
        let conf_str = r#"
log:
  level: debug
  path: logs/wireup.log
lifecycle:
  verbose: false
  handle_signals: false
        "#
        .to_string();

        let mut path = std::env::temp_dir();
        path.push(format!("wireup-config-{}.yaml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(conf_str.as_bytes()).unwrap();

        let conf = Config::load_from_yaml(path.display().to_string()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(conf.log.level_filter(), LevelFilter::Debug);
        assert_eq!(conf.log.path.as_deref(), Some("logs/wireup.log"));
        assert!(!conf.lifecycle.verbose);
        assert!(!conf.lifecycle.handle_signals);
    }

    #[test]
    fn test_defaults() {
        let conf = Config::from_yaml("{}").unwrap();
        assert_eq!(conf.log.level, "info");
        assert!(conf.log.path.is_none());
        assert!(conf.lifecycle.verbose);
        assert!(conf.lifecycle.handle_signals);
    }

    #[test]
    fn test_valid_log_level() {
        let conf_str = r#"
log:
  level: loud
        "#;
        let err = Config::from_yaml(conf_str).unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_valid_log_path_length() {
        let conf_str = r#"
log:
  path: ""
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load_from_yaml("/nonexistent/wireup.yaml").unwrap_err();
        assert!(err.to_string().contains("Unable to read conf file"));
    }

    #[test]
    fn test_yaml_round_trip_keeps_settings() {
        let mut conf = Config::default();
        conf.lifecycle.verbose = false;
        let yaml = conf.to_yaml().unwrap();
        let loaded = Config::from_yaml(&yaml).unwrap();
        assert!(!loaded.lifecycle.verbose);
        assert_eq!(loaded.log.level, "info");
    }
}

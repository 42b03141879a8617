use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Startup behavior for the persisted tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Load existing tables before accepting new records.
    Append,
    /// Start from empty tables; existing files are overwritten at the
    /// first flush, not deleted eagerly.
    Overwrite,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(Mode::Append),
            "overwrite" => Ok(Mode::Overwrite),
            other => Err(ConfigError::InvalidValue(format!(
                "unrecognized mode: {} (expected append or overwrite)",
                other
            ))),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingArgument(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingArgument(arg) => write!(f, "Missing argument: {}", arg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const DEFAULT_BACKLOG_SZ: usize = 500;

/// Configuration of the persistence engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one table file per entity type.
    pub save_path: PathBuf,
    pub mode: Mode,
    /// Records accumulated in the backlog before a flush is forced.
    pub backlog_sz: usize,
}

impl EngineConfig {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            mode: Mode::Append,
            backlog_sz: DEFAULT_BACKLOG_SZ,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn backlog_sz(mut self, backlog_sz: usize) -> Self {
        self.backlog_sz = backlog_sz;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog_sz == 0 {
            return Err(ConfigError::InvalidValue(
                "backlog_sz must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ambient runtime knobs, read from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub rust_log: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self { rust_log }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("append".parse::<Mode>().unwrap(), Mode::Append);
        assert_eq!("OVERWRITE".parse::<Mode>().unwrap(), Mode::Overwrite);
        assert!("truncate".parse::<Mode>().is_err());
    }

    #[test]
    fn test_zero_backlog_rejected() {
        let config = EngineConfig::new("data").backlog_sz(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::new("data");
        assert!(config.validate().is_ok());
        assert_eq!(config.backlog_sz, DEFAULT_BACKLOG_SZ);
        assert_eq!(config.mode, Mode::Append);
    }
}

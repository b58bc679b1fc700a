// src/config/validate.rs

use std::path::Path;

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DevwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_glob("[stores].glob", &cfg.stores.glob)?;
    validate_glob("[components].glob", &cfg.components.glob)?;
    validate_watch_section(cfg)?;
    Ok(())
}

fn validate_glob(field: &str, pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(DevwatchError::ConfigError(format!("{field} must not be empty")));
    }
    if Path::new(pattern).is_absolute() || pattern.starts_with('/') {
        return Err(DevwatchError::ConfigError(format!(
            "{field} must be relative to the project root (got {pattern:?})"
        )));
    }
    Glob::new(pattern)?;
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.event_capacity == 0 {
        return Err(DevwatchError::ConfigError(
            "[watch].event_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.watch.debounce_ms > 10_000 {
        return Err(DevwatchError::ConfigError(format!(
            "[watch].debounce_ms must be at most 10000 (got {})",
            cfg.watch.debounce_ms
        )));
    }
    Ok(())
}

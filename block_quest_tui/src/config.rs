//! Optional TOML configuration for the terminal front end.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Front-end settings. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TuiConfig {
    /// Delay between two animated steps, in milliseconds.
    pub tick_ms: u64,

    /// Directory of extra `*.toml` level files, merged over the built-in ones.
    pub levels_dir: Option<PathBuf>,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            tick_ms: 400,
            levels_dir: None,
        }
    }
}

impl TuiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(anyhow!("tick_ms must be > 0"));
        }
        Ok(())
    }
}

/// Loads the config file, or the defaults when no file is given or it does
/// not exist.
pub fn load_config(path: Option<&Path>) -> Result<TuiConfig> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(TuiConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: TuiConfig = toml::from_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

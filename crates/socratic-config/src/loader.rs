use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::Config;

/// Environment variable that overrides `dialogue.contextBudget`.
pub const CONTEXT_BUDGET_ENV: &str = "CONTEXT_TOKEN_BUDGET";

/// Expand a leading `~` to the home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~/").unwrap_or(""));
        }
    }
    PathBuf::from(path)
}

/// Find the config file by searching standard locations.
pub fn find_config_path() -> PathBuf {
    // 1. Current directory
    let local = Path::new("config.json");
    if local.exists() {
        return local.to_path_buf();
    }

    // 2. ~/.socratic/config.json
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".socratic").join("config.json");
        if home_config.exists() {
            return home_config;
        }
    }

    // Default: ~/.socratic/config.json (will use defaults if missing)
    dirs::home_dir()
        .map(|h| h.join(".socratic").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

/// Load configuration from a JSON file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply overrides looked up through `lookup` (normally the process environment).
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(CONTEXT_BUDGET_ENV) {
        match raw.trim().parse::<i64>() {
            Ok(budget) => config.dialogue.context_budget = budget,
            Err(e) => warn!("Ignoring {CONTEXT_BUDGET_ENV}='{raw}': {e}"),
        }
    }
}

/// Save configuration to a JSON file.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let contents = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}

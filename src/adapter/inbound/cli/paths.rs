//! Path utilities for stackpilot.
//!
//! Operator state lives under `~/.stackpilot/`:
//! - `~/.stackpilot/config.toml` - main configuration

use std::path::PathBuf;

/// Returns the stackpilot home directory (`~/.stackpilot/`).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stackpilot")
}

/// Returns the default config file path (`~/.stackpilot/config.toml`).
pub fn default_config() -> PathBuf {
    home_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_under_stackpilot_home() {
        let config = default_config();
        assert!(config.starts_with(home_dir()));
        assert!(config.to_string_lossy().contains(".stackpilot"));
        assert!(config.ends_with("config.toml"));
    }
}

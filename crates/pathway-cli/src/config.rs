//! CLI state between runs.
//!
//! Remembers the last email used to sign in and the id of the current
//! session. Stored at `~/.config/pathway/config.json`. The session itself
//! lives in the sealed session store, never here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "pathway";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    pub last_email: Option<String>,
    pub session_id: Option<String>,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;

        // Write then rename so a crash mid-write leaves the old file intact
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write config file")?;
        std::fs::rename(&tmp, path).context("Failed to replace config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_none() {
        let config: CliConfig = serde_json::from_str("{}").expect("parse");
        assert!(config.last_email.is_none());
        assert!(config.session_id.is_none());

        let config: CliConfig =
            serde_json::from_str(r#"{"last_email": "a@b.com"}"#).expect("parse");
        assert_eq!(config.last_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_save_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pathway").join(CONFIG_FILE);

        let mut config = CliConfig {
            last_email: Some("a@b.com".to_string()),
            session_id: Some("abc".to_string()),
        };
        config.save_to(&path).expect("first save");
        config.session_id = None;
        config.save_to(&path).expect("second save");

        let loaded = CliConfig::load_from(&path).expect("load");
        assert_eq!(loaded.last_email.as_deref(), Some("a@b.com"));
        assert!(loaded.session_id.is_none());

        let entries: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CliConfig::load_from(&dir.path().join(CONFIG_FILE)).expect("load");
        assert!(config.session_id.is_none());
    }
}

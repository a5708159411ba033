//! Data directory layout and persisted UI settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{read_json, write_json_atomic};
use crate::error::Result;
use crate::fields::ViewMode;

/// Environment variable overriding the data directory.
pub const DIR_ENV: &str = "TASKBOARD_DIR";

/// Where everything lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    /// Pick the data directory (`--dir`, then `$TASKBOARD_DIR`, then `~/.taskboard`,
    /// then the working directory) and make sure it exists.
    pub fn resolve(dir: Option<PathBuf>) -> Result<Self> {
        let env_dir = std::env::var_os(DIR_ENV).map(PathBuf::from);
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let config = Config::from_sources(dir, env_dir, home);
        fs::create_dir_all(&config.data_dir)?;
        Ok(config)
    }

    fn from_sources(flag: Option<PathBuf>, env_dir: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let data_dir = flag
            .or(env_dir.filter(|p| !p.as_os_str().is_empty()))
            .or_else(|| home.map(|h| h.join(".taskboard")))
            .unwrap_or_else(|| PathBuf::from("."));
        Config { data_dir }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("taskboard.log")
    }

    /// Directory holding `gateway.json` and `session.json`.
    pub fn gateway_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// User preferences remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_project: Option<String>,
    #[serde(default)]
    pub view_mode: ViewMode,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_precedence() {
        let flag = Some(PathBuf::from("/flag"));
        let env = Some(PathBuf::from("/env"));
        let home = Some(PathBuf::from("/home/me"));

        assert_eq!(Config::from_sources(flag, env.clone(), home.clone()).data_dir, PathBuf::from("/flag"));
        assert_eq!(Config::from_sources(None, env, home.clone()).data_dir, PathBuf::from("/env"));
        assert_eq!(
            Config::from_sources(None, Some(PathBuf::new()), home.clone()).data_dir,
            PathBuf::from("/home/me/.taskboard")
        );
        assert_eq!(Config::from_sources(None, None, None).data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_resolve_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let config = Config::resolve(Some(dir.clone())).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.db_path(), dir.join("db.json"));
    }

    #[test]
    fn test_settings_round_trip_and_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        let settings = Settings {
            active_project: Some("p1".into()),
            view_mode: ViewMode::List,
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }
}

use crate::catalog::SortOrder;
use crate::environment::ScanOptions;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 解释器路径或名称，留空则自动查找
    pub python: Option<String>,
    /// 额外视为内置的包名（随解释器分发的 pip 等）
    pub extra_defaults: Vec<String>,
    pub show_sizes: bool,
    pub show_default: bool,
    pub sort: SortOrder,
    pub snapshot_before_remove: bool,
    pub snapshot_dir: PathBuf,
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            python: None,
            extra_defaults: vec!["pip".to_string(), "setuptools".to_string()],
            show_sizes: true,
            show_default: true,
            sort: SortOrder::Name,
            snapshot_before_remove: true,
            snapshot_dir: home_dir().join(".lian/pip"),
        }
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        home_dir().join(".config/lian-pip/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extra_defaults: self.extra_defaults.clone(),
            sort: self.sort,
        }
    }
}

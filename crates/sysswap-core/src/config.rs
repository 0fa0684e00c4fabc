use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "sysswap.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// File name of the protected library, e.g. `Example.Component.dll`.
    pub library: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_suffix")]
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    #[serde(default = "default_restore_program")]
    pub program: String,
    #[serde(default = "default_restore_args")]
    pub args: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            suffix: default_backup_suffix(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            program: default_restore_program(),
            args: default_restore_args(),
        }
    }
}

impl SwapConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse sysswap config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the default config file when present. A missing
    /// default file yields the built-in defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if explicit {
                return Err(anyhow!("config file not found: {}", path.display()));
            }
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(library) = &self.target.library {
            validate_library_name(library)?;
        }
        if self.backup.suffix.trim().is_empty() {
            return Err(anyhow!("backup suffix must not be empty"));
        }
        if self.restore.program.trim().is_empty() {
            return Err(anyhow!("restore program must not be empty"));
        }
        Ok(())
    }

    pub fn library(&self) -> Result<&str> {
        self.target.library.as_deref().ok_or_else(|| {
            anyhow!("no target library configured; set [target] library or pass --library")
        })
    }
}

pub fn validate_library_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("target library name must not be empty"));
    }
    if trimmed != name {
        return Err(anyhow!(
            "target library name must not have surrounding whitespace: '{name}'"
        ));
    }
    if name.contains(['/', '\\', ':']) || name == "." || name == ".." {
        return Err(anyhow!(
            "target library must be a bare file name, got '{name}'"
        ));
    }
    Ok(())
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_backup_suffix() -> String {
    ".bak".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("sysswap.log")
}

fn default_restore_program() -> String {
    "sfc".to_string()
}

fn default_restore_args() -> Vec<String> {
    vec!["/scannow".to_string()]
}

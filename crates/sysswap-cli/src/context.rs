use std::path::PathBuf;

use anyhow::Result;
use sysswap_core::{HostArch, SwapConfig, TargetFile};
use sysswap_installer::{AssetLayout, RestoreCommand, UnlockPlan};
use sysswap_resolver::{detect_arch, resolve_targets, HostInfo};

use crate::Cli;

#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    pub(crate) config: Option<PathBuf>,
    pub(crate) library: Option<String>,
    pub(crate) assets: Option<PathBuf>,
    pub(crate) log_file: Option<PathBuf>,
}

impl From<&Cli> for ConfigOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            library: cli.library.clone(),
            assets: cli.assets.clone(),
            log_file: cli.log_file.clone(),
        }
    }
}

/// Config file values with command-line flags applied on top.
pub(crate) fn load_config(overrides: &ConfigOverrides) -> Result<SwapConfig> {
    let mut config = SwapConfig::load(overrides.config.as_deref())?;
    if let Some(library) = &overrides.library {
        config.target.library = Some(library.clone());
    }
    if let Some(assets) = &overrides.assets {
        config.assets.root = assets.clone();
    }
    if let Some(log_file) = &overrides.log_file {
        config.log.file = log_file.clone();
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub(crate) struct UnlockContext {
    pub(crate) arch: HostArch,
    pub(crate) targets: Vec<TargetFile>,
    pub(crate) plan: UnlockPlan,
}

pub(crate) fn build_unlock_context(
    config: &SwapConfig,
    host: &impl HostInfo,
) -> Result<UnlockContext> {
    let library = config.library()?;
    let arch = detect_arch(host);
    let targets = resolve_targets(host, library)?;
    Ok(UnlockContext {
        arch,
        targets,
        plan: UnlockPlan {
            arch,
            assets: AssetLayout::new(config.assets.root.clone()),
            backup_suffix: config.backup.suffix.clone(),
        },
    })
}

pub(crate) fn restore_command(config: &SwapConfig) -> RestoreCommand {
    RestoreCommand::from_config(&config.restore)
}

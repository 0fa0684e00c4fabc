use std::path::PathBuf;

use anyhow::{anyhow, Result};
use sysswap_core::{validate_library_name, DirRole, TargetFile};

use crate::{detect_arch, HostInfo};

pub fn system_root(host: &impl HostInfo) -> Result<PathBuf> {
    host.env_var("SystemRoot")
        .or_else(|| host.env_var("windir"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("SystemRoot is not set; cannot resolve system directories"))
}

/// Primary directory copy first; the compatibility directory copy only on
/// 64-bit hosts.
pub fn resolve_targets(host: &impl HostInfo, library: &str) -> Result<Vec<TargetFile>> {
    validate_library_name(library)?;
    let root = system_root(host)?;

    let mut roles = vec![DirRole::PrimarySystemDir];
    if detect_arch(host).is_64_bit() {
        roles.push(DirRole::SecondarySystemDir);
    }

    Ok(roles
        .into_iter()
        .map(|role| TargetFile::new(root.join(role.dir_name()).join(library), role))
        .collect())
}

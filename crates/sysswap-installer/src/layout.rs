use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sysswap_core::{DirRole, HostArch};

/// Bundled replacement files, laid out as `<root>/<arch>/<role>/<library>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn arch_dir(&self, arch: HostArch) -> PathBuf {
        self.root.join(arch.as_str())
    }

    pub fn role_dir(&self, arch: HostArch, role: DirRole) -> PathBuf {
        self.arch_dir(arch).join(role.as_str())
    }

    pub fn replacement_path(&self, arch: HostArch, role: DirRole, library: &str) -> PathBuf {
        self.role_dir(arch, role).join(library)
    }

    /// Path of the replacement when one is bundled.
    pub fn find_replacement(&self, arch: HostArch, role: DirRole, library: &str) -> Option<PathBuf> {
        let path = self.replacement_path(arch, role, library);
        path.is_file().then_some(path)
    }
}

/// Sibling backup path: the target's file name with `suffix` appended.
pub fn backup_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirRole {
    PrimarySystemDir,
    SecondarySystemDir,
}

impl DirRole {
    /// Key used for the replacement asset directory.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimarySystemDir => "primary",
            Self::SecondarySystemDir => "secondary",
        }
    }

    /// Directory name below the system root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::PrimarySystemDir => "System32",
            Self::SecondarySystemDir => "SysWOW64",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "primary" | "system32" => Some(Self::PrimarySystemDir),
            "secondary" | "syswow64" => Some(Self::SecondarySystemDir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostArch {
    X64,
    X86,
}

impl HostArch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
        }
    }

    pub fn is_64_bit(self) -> bool {
        self == Self::X64
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "x64" | "amd64" | "x86_64" => Some(Self::X64),
            "x86" | "i386" | "i686" => Some(Self::X86),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    path: PathBuf,
    role: DirRole,
}

impl TargetFile {
    pub fn new(path: impl Into<PathBuf>, role: DirRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> DirRole {
        self.role
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Short label for log lines, e.g. `System32`.
    pub fn label(&self) -> &'static str {
        self.role.dir_name()
    }
}

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use crate::command::{
    build_grant_admin_command, build_set_owner_command, build_take_ownership_command,
    run_command,
};
use crate::fs_utils::clear_readonly;

/// Elevated file operations the workflows are built from. Each call reports
/// success or an error carrying the diagnostic text.
pub trait PrivilegedOps {
    fn take_ownership(&mut self, target: &Path) -> Result<()>;
    fn grant_full_control(&mut self, target: &Path) -> Result<()>;
    fn set_owner(&mut self, target: &Path, principal: &str) -> Result<()>;
    fn delete_file(&mut self, target: &Path) -> Result<()>;
    fn copy_file(&mut self, source: &Path, destination: &Path) -> Result<()>;
}

pub type CommandRunner = fn(&mut Command, &str) -> Result<()>;

/// `PrivilegedOps` backed by `takeown`/`icacls` and direct file system calls.
pub struct SystemOps<RunCommand = CommandRunner> {
    run: RunCommand,
}

impl SystemOps {
    pub fn new() -> Self {
        Self { run: run_command }
    }
}

impl Default for SystemOps {
    fn default() -> Self {
        Self::new()
    }
}

impl<RunCommand> SystemOps<RunCommand>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    pub fn with_runner(run: RunCommand) -> Self {
        Self { run }
    }
}

impl<RunCommand> PrivilegedOps for SystemOps<RunCommand>
where
    RunCommand: FnMut(&mut Command, &str) -> Result<()>,
{
    fn take_ownership(&mut self, target: &Path) -> Result<()> {
        let mut command = build_take_ownership_command(target);
        (self.run)(&mut command, "failed to take ownership")
    }

    fn grant_full_control(&mut self, target: &Path) -> Result<()> {
        let mut command = build_grant_admin_command(target);
        (self.run)(&mut command, "failed to grant full control to Administrators")
    }

    fn set_owner(&mut self, target: &Path, principal: &str) -> Result<()> {
        let mut command = build_set_owner_command(target, principal);
        (self.run)(&mut command, &format!("failed to set owner to {principal}"))
    }

    fn delete_file(&mut self, target: &Path) -> Result<()> {
        if let Err(err) = clear_readonly(target) {
            tracing::debug!(
                "could not clear read-only attribute on {}: {err}",
                target.display()
            );
        }
        fs::remove_file(target).with_context(|| format!("failed to delete {}", target.display()))
    }

    fn copy_file(&mut self, source: &Path, destination: &Path) -> Result<()> {
        fs::copy(source, destination).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        Ok(())
    }
}

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

/// Well-known SID of the local Administrators group; avoids localized names.
pub const ADMINISTRATORS_SID: &str = "*S-1-5-32-544";
pub const TRUSTED_INSTALLER: &str = "NT SERVICE\\TrustedInstaller";

#[cfg(windows)]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub fn build_take_ownership_command(target: &Path) -> Command {
    let mut command = Command::new("takeown");
    command.arg("/f").arg(target).arg("/a");
    hide_console(&mut command);
    command
}

pub fn build_grant_admin_command(target: &Path) -> Command {
    let mut command = Command::new("icacls");
    command
        .arg(target)
        .arg("/grant")
        .arg(format!("{ADMINISTRATORS_SID}:F"))
        .arg("/c");
    hide_console(&mut command);
    command
}

pub fn build_set_owner_command(target: &Path, principal: &str) -> Command {
    let mut command = Command::new("icacls");
    command
        .arg(target)
        .arg("/setowner")
        .arg(principal)
        .arg("/c");
    hide_console(&mut command);
    command
}

pub fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    tracing::debug!("running {command:?}");
    let output = command
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

#[cfg(windows)]
fn hide_console(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_command: &mut Command) {}

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sysswap_core::{
    HostArch, OperationResult, StepOutcome, TargetFile, WorkflowError, WorkflowEvent,
    WorkflowReport,
};
use sysswap_security::files_match;

use crate::command::TRUSTED_INSTALLER;
use crate::fs_utils::remove_file_if_exists;
use crate::layout::{backup_path, AssetLayout};
use crate::ops::PrivilegedOps;

const DELETE_PHASE_END: u8 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockPlan {
    pub arch: HostArch,
    pub assets: AssetLayout,
    pub backup_suffix: String,
}

impl UnlockPlan {
    pub fn backup_path(&self, target: &TargetFile) -> PathBuf {
        backup_path(target.path(), &self.backup_suffix)
    }

    pub fn replacement_for(&self, target: &TargetFile) -> Option<PathBuf> {
        let library = target.file_name()?;
        self.assets.find_replacement(self.arch, target.role(), library)
    }
}

/// What an unlock run would do to one target, without touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTarget {
    pub target: TargetFile,
    pub exists: bool,
    pub backup: PathBuf,
    pub backup_present: bool,
    pub replacement: Option<PathBuf>,
}

pub fn plan_unlock(targets: &[TargetFile], plan: &UnlockPlan) -> Vec<PlannedTarget> {
    targets
        .iter()
        .map(|target| {
            let backup = plan.backup_path(target);
            PlannedTarget {
                target: target.clone(),
                exists: target.path().exists(),
                backup_present: backup.exists(),
                backup,
                replacement: plan.replacement_for(target),
            }
        })
        .collect()
}

struct Reporter<Emit> {
    emit: Emit,
    progress: u8,
}

impl<Emit> Reporter<Emit>
where
    Emit: FnMut(WorkflowEvent),
{
    fn new(emit: Emit) -> Self {
        Self { emit, progress: 0 }
    }

    fn log(&mut self, line: impl Into<String>) {
        (self.emit)(WorkflowEvent::Log(line.into()));
    }

    fn warn(&mut self, line: impl Into<String>) {
        (self.emit)(WorkflowEvent::Warning(line.into()));
    }

    /// Clamped to `[current, 100]` so observers only ever see it grow.
    fn progress(&mut self, value: u8) {
        self.progress = value.clamp(self.progress, 100);
        (self.emit)(WorkflowEvent::Progress(self.progress));
    }
}

fn phase_progress(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = usize::from(end - start);
    start + ((done.min(total) * span) / total) as u8
}

/// Backs up, takes ownership of, unlocks and deletes every target, then copies
/// bundled replacements into the deleted locations.
pub fn run_unlock<Ops, Emit>(
    targets: &[TargetFile],
    plan: &UnlockPlan,
    ops: &mut Ops,
    emit: Emit,
) -> WorkflowReport
where
    Ops: PrivilegedOps + ?Sized,
    Emit: FnMut(WorkflowEvent),
{
    let mut reporter = Reporter::new(emit);
    reporter.progress(0);

    let mut results = Vec::with_capacity(targets.len());
    for (index, target) in targets.iter().enumerate() {
        reporter.log(format!("Checking {}...", target.label()));
        let mut result = OperationResult::new(target.clone());
        if let Err(err) = unlock_target(target, plan, ops, &mut reporter, &mut result) {
            let failure = WorkflowError::unexpected(&err);
            reporter.log(format!("Error: {failure}"));
            result.push(failure.into());
        }
        results.push(result);
        reporter.progress(phase_progress(0, DELETE_PHASE_END, index + 1, targets.len()));
    }

    let deleted = results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.last_step() == Some(&StepOutcome::Deleted))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    for (done, index) in deleted.iter().enumerate() {
        let result = &mut results[*index];
        let target = result.target.clone();
        if let Err(err) = replace_target(&target, plan, ops, &mut reporter, result) {
            let failure = WorkflowError::unexpected(&err);
            reporter.log(format!("Error: {failure}"));
            result.push(failure.into());
        }
        reporter.progress(phase_progress(
            DELETE_PHASE_END,
            100,
            done + 1,
            deleted.len(),
        ));
    }
    reporter.progress(100);

    let report = WorkflowReport::from_results(results);
    if report.success {
        reporter.log("Unlock operation finished.");
    } else {
        reporter.log(format!(
            "Unlock operation finished with {} failed target(s).",
            report.failed_count()
        ));
    }
    report
}

fn unlock_target<Ops, Emit>(
    target: &TargetFile,
    plan: &UnlockPlan,
    ops: &mut Ops,
    reporter: &mut Reporter<Emit>,
    result: &mut OperationResult,
) -> Result<()>
where
    Ops: PrivilegedOps + ?Sized,
    Emit: FnMut(WorkflowEvent),
{
    let path = target.path();
    let label = target.label();
    if !target_exists(path)? {
        reporter.log(format!("File not found in {label}."));
        result.push(WorkflowError::NotFound(path.to_path_buf()).into());
        return Ok(());
    }

    let backup = plan.backup_path(target);
    if target_exists(&backup)? {
        reporter.log(format!("Backup already present: {}", backup.display()));
    } else {
        reporter.log(format!("Backing up {} to {}...", path.display(), backup.display()));
        match backup_original(path, &backup, ops) {
            Ok(digest) => {
                reporter.log(format!("Backup verified (sha256={digest})."));
                result.push(StepOutcome::BackedUp);
            }
            Err(err) => {
                reporter.log(format!("Backup of {label} file failed: {err:#}"));
                result.push(StepOutcome::Failed(format!("backup error: {err:#}")));
                return Ok(());
            }
        }
    }

    reporter.log(format!("Taking ownership of {}...", path.display()));
    if let Err(err) = ops.take_ownership(path) {
        let failure = WorkflowError::OwnershipFailed(format!("{err:#}"));
        reporter.log(format!("Failed to take ownership of {label} file: {err:#}"));
        result.push(failure.into());
        return Ok(());
    }
    result.push(StepOutcome::OwnershipTaken);

    reporter.log("Granting full control to Administrators...");
    if let Err(err) = ops.grant_full_control(path) {
        let failure = WorkflowError::PermissionDenied(format!("{err:#}"));
        reporter.log(format!("Failed to grant permissions on {label} file: {err:#}"));
        result.push(failure.into());
        return Ok(());
    }
    result.push(StepOutcome::PermissionGranted);

    reporter.log(format!("Deleting {}...", path.display()));
    if let Err(err) = ops.delete_file(path) {
        reporter.log(format!("Delete reported an error: {err:#}"));
    }
    if target_exists(path)? {
        reporter.log(format!("Failed to delete {label} file."));
        result.push(WorkflowError::DeleteVerificationFailed(path.to_path_buf()).into());
    } else {
        reporter.log(format!("Successfully deleted {label} file."));
        result.push(StepOutcome::Deleted);
    }
    Ok(())
}

fn backup_original<Ops>(original: &Path, backup: &Path, ops: &mut Ops) -> Result<String>
where
    Ops: PrivilegedOps + ?Sized,
{
    ops.copy_file(original, backup)?;
    match files_match(original, backup)? {
        Some(digest) => Ok(digest),
        None => {
            remove_file_if_exists(backup).with_context(|| {
                format!("failed to discard mismatched backup {}", backup.display())
            })?;
            Err(anyhow!("backup checksum does not match original"))
        }
    }
}

fn replace_target<Ops, Emit>(
    target: &TargetFile,
    plan: &UnlockPlan,
    ops: &mut Ops,
    reporter: &mut Reporter<Emit>,
    result: &mut OperationResult,
) -> Result<()>
where
    Ops: PrivilegedOps + ?Sized,
    Emit: FnMut(WorkflowEvent),
{
    let label = target.label();
    let library = target
        .file_name()
        .ok_or_else(|| anyhow!("target has no file name: {}", target.path().display()))?;
    let expected = plan
        .assets
        .replacement_path(plan.arch, target.role(), library);
    let Some(asset) = plan.replacement_for(target) else {
        reporter.warn(format!(
            "No replacement asset for {label} at {}; leaving the file removed.",
            expected.display()
        ));
        result.push(WorkflowError::AssetMissing(expected).into());
        return Ok(());
    };

    reporter.log(format!(
        "Copying replacement {} into {}...",
        asset.display(),
        target.path().display()
    ));
    let copied = ops
        .copy_file(&asset, target.path())
        .and_then(|()| files_match(&asset, target.path()));
    match copied {
        Ok(Some(_)) => {
            reporter.log(format!("Replaced {label} file."));
            result.push(StepOutcome::Replaced);
        }
        Ok(None) => {
            reporter.log(format!("Replacement copy for {label} does not match the asset."));
            result.push(StepOutcome::Failed(
                "replace: copied file does not match asset".to_string(),
            ));
        }
        Err(err) => {
            reporter.log(format!("Failed to copy replacement for {label}: {err:#}"));
            result.push(StepOutcome::Failed(format!("replace: {err:#}")));
        }
    }
    Ok(())
}

/// Hands ownership of every existing target back to TrustedInstaller.
pub fn restore_ownership<Ops, Emit>(
    targets: &[TargetFile],
    ops: &mut Ops,
    emit: Emit,
) -> WorkflowReport
where
    Ops: PrivilegedOps + ?Sized,
    Emit: FnMut(WorkflowEvent),
{
    let mut reporter = Reporter::new(emit);
    reporter.progress(0);

    let mut results = Vec::with_capacity(targets.len());
    for (index, target) in targets.iter().enumerate() {
        let label = target.label();
        reporter.log(format!("Restoring ownership for {label}..."));
        let mut result = OperationResult::new(target.clone());
        match target_exists(target.path()) {
            Ok(false) => {
                reporter.log(format!("File not found in {label}."));
                result.push(WorkflowError::NotFound(target.path().to_path_buf()).into());
            }
            Ok(true) => match ops.set_owner(target.path(), TRUSTED_INSTALLER) {
                Ok(()) => {
                    reporter.log(format!(
                        "Ownership restored to TrustedInstaller for {label}."
                    ));
                    result.push(StepOutcome::OwnershipRestored);
                }
                Err(err) => {
                    reporter.log(format!("Failed to restore ownership for {label}: {err:#}"));
                    result.push(StepOutcome::Failed(format!("ownership restore: {err:#}")));
                }
            },
            Err(err) => {
                let failure = WorkflowError::unexpected(&err);
                reporter.log(format!("Error: {failure}"));
                result.push(failure.into());
            }
        }
        results.push(result);
        reporter.progress(phase_progress(0, 100, index + 1, targets.len()));
    }
    reporter.progress(100);

    WorkflowReport::from_results(results)
}

fn target_exists(path: &Path) -> Result<bool> {
    path.try_exists()
        .with_context(|| format!("failed to check {}", path.display()))
}

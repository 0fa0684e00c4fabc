use super::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use sysswap_core::{DirRole, HostArch, StepOutcome, TargetFile, WorkflowError, WorkflowEvent};

use crate::restore::OutputSplitter;

const LIBRARY: &str = "Example.Component.dll";

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let mut root = std::env::temp_dir();
        root.push(format!(
            "sysswap-installer-tests-{}-{}-{}",
            std::process::id(),
            nanos,
            TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(root.join("Windows").join("System32")).expect("must create dirs");
        fs::create_dir_all(root.join("Windows").join("SysWOW64")).expect("must create dirs");
        Self { root }
    }

    fn target(&self, role: DirRole) -> TargetFile {
        TargetFile::new(
            self.root
                .join("Windows")
                .join(role.dir_name())
                .join(LIBRARY),
            role,
        )
    }

    fn targets(&self) -> Vec<TargetFile> {
        vec![
            self.target(DirRole::PrimarySystemDir),
            self.target(DirRole::SecondarySystemDir),
        ]
    }

    fn install_original(&self, role: DirRole) -> PathBuf {
        let path = self.target(role).path().to_path_buf();
        fs::write(&path, format!("original {}", role.as_str())).expect("must write original");
        path
    }

    fn install_asset(&self, arch: HostArch, role: DirRole) -> PathBuf {
        let path = self.assets().replacement_path(arch, role, LIBRARY);
        fs::create_dir_all(path.parent().expect("asset parent")).expect("must create asset dir");
        fs::write(&path, format!("replacement {} {}", arch.as_str(), role.as_str()))
            .expect("must write asset");
        path
    }

    fn assets(&self) -> AssetLayout {
        AssetLayout::new(self.root.join("assets"))
    }

    fn plan(&self, arch: HostArch) -> UnlockPlan {
        UnlockPlan {
            arch,
            assets: self.assets(),
            backup_suffix: ".bak".to_string(),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Records every privileged call and performs the file system part for real.
#[derive(Default)]
struct RecordingOps {
    calls: Vec<String>,
    fail_ownership: bool,
    fail_permission: bool,
    fail_backup_copy: bool,
    fail_replace_copy: bool,
    corrupt_replace_copy: bool,
    keep_file_on_delete: bool,
}

impl RecordingOps {
    fn calls_for(&self, path: &Path) -> Vec<String> {
        let suffix = path.display().to_string();
        self.calls
            .iter()
            .filter(|call| call.ends_with(&suffix))
            .cloned()
            .collect()
    }

    fn count(&self, op: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| call.starts_with(&format!("{op} ")))
            .count()
    }
}

impl PrivilegedOps for RecordingOps {
    fn take_ownership(&mut self, target: &Path) -> Result<()> {
        self.calls.push(format!("takeown {}", target.display()));
        if self.fail_ownership {
            return Err(anyhow!("access is denied"));
        }
        Ok(())
    }

    fn grant_full_control(&mut self, target: &Path) -> Result<()> {
        self.calls.push(format!("grant {}", target.display()));
        if self.fail_permission {
            return Err(anyhow!("icacls exit 5"));
        }
        Ok(())
    }

    fn set_owner(&mut self, target: &Path, principal: &str) -> Result<()> {
        self.calls
            .push(format!("setowner {principal} {}", target.display()));
        Ok(())
    }

    fn delete_file(&mut self, target: &Path) -> Result<()> {
        self.calls.push(format!("delete {}", target.display()));
        if self.keep_file_on_delete {
            return Ok(());
        }
        fs::remove_file(target)?;
        Ok(())
    }

    fn copy_file(&mut self, source: &Path, destination: &Path) -> Result<()> {
        self.calls.push(format!(
            "copy {} {}",
            source.display(),
            destination.display()
        ));
        let is_backup = destination.extension().is_some_and(|ext| ext == "bak");
        if self.fail_backup_copy && is_backup {
            return Err(anyhow!("disk full"));
        }
        if !is_backup && self.fail_replace_copy {
            return Err(anyhow!("sharing violation"));
        }
        if !is_backup && self.corrupt_replace_copy {
            fs::write(destination, b"truncated")?;
            return Ok(());
        }
        fs::copy(source, destination)?;
        Ok(())
    }
}

fn collect_events(events: &mut Vec<WorkflowEvent>) -> impl FnMut(WorkflowEvent) + '_ {
    move |event| events.push(event)
}

fn progress_values(events: &[WorkflowEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Progress(value) => Some(*value),
            _ => None,
        })
        .collect()
}

fn full_unlock_steps() -> Vec<StepOutcome> {
    vec![
        StepOutcome::BackedUp,
        StepOutcome::OwnershipTaken,
        StepOutcome::PermissionGranted,
        StepOutcome::Deleted,
        StepOutcome::Replaced,
    ]
}

#[test]
fn unlock_replaces_both_targets_on_64_bit_host() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_original(DirRole::SecondarySystemDir);
    let primary_asset = fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X64, DirRole::SecondarySystemDir);

    let mut ops = RecordingOps::default();
    let mut events = Vec::new();
    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        collect_events(&mut events),
    );

    assert!(report.success);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(result.steps, full_unlock_steps());
        assert!(result.success);
    }
    assert_eq!(progress_values(&events).last(), Some(&100));

    let primary = fixture.target(DirRole::PrimarySystemDir);
    assert_eq!(
        fs::read(primary.path()).expect("replacement present"),
        fs::read(&primary_asset).expect("asset present")
    );
    assert_eq!(
        fs::read_to_string(backup_path(primary.path(), ".bak")).expect("backup present"),
        "original primary"
    );
}

#[test]
fn missing_targets_are_skipped_without_privileged_calls() {
    let fixture = Fixture::new();
    let mut ops = RecordingOps::default();
    let mut events = Vec::new();

    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        collect_events(&mut events),
    );

    assert!(report.success);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(
            result.steps,
            vec![StepOutcome::Skipped("not found".to_string())]
        );
    }
    assert!(ops.calls.is_empty(), "unexpected calls: {:?}", ops.calls);
    assert!(events.contains(&WorkflowEvent::Log(
        "File not found in System32.".to_string()
    )));
    assert_eq!(progress_values(&events).last(), Some(&100));
}

#[test]
fn missing_single_target_does_not_touch_it() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    let mut ops = RecordingOps::default();

    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    let secondary = fixture.target(DirRole::SecondarySystemDir);
    assert!(ops.calls_for(secondary.path()).is_empty());
    assert_eq!(
        report.results[1].steps,
        vec![StepOutcome::Skipped("not found".to_string())]
    );
    assert_eq!(ops.count("takeown"), 1);
}

#[test]
fn backup_is_created_only_once_across_runs() {
    let fixture = Fixture::new();
    let original = fixture.install_original(DirRole::PrimarySystemDir);
    let targets = vec![fixture.target(DirRole::PrimarySystemDir)];
    let plan = fixture.plan(HostArch::X86);
    let backup = backup_path(&original, ".bak");

    let mut ops = RecordingOps::default();
    let first = run_unlock(&targets, &plan, &mut ops, |_| {});
    assert!(first.results[0].has_step(&StepOutcome::BackedUp));
    assert_eq!(
        fs::read_to_string(&backup).expect("backup"),
        "original primary"
    );

    fs::write(&original, "updated original").expect("must reinstall original");
    let mut ops = RecordingOps::default();
    let second = run_unlock(&targets, &plan, &mut ops, |_| {});

    assert!(!second.results[0].has_step(&StepOutcome::BackedUp));
    assert!(second.results[0].has_step(&StepOutcome::Deleted));
    assert_eq!(ops.count("copy"), 0);
    assert_eq!(
        fs::read_to_string(&backup).expect("backup"),
        "original primary",
        "existing backup must never be overwritten"
    );
}

#[test]
fn deletion_without_replacement_asset_still_succeeds() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_original(DirRole::SecondarySystemDir);
    let mut ops = RecordingOps::default();
    let mut events = Vec::new();

    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        collect_events(&mut events),
    );

    assert!(report.success);
    for result in &report.results {
        assert_eq!(
            result.last_step(),
            Some(&StepOutcome::Skipped("no replacement asset".to_string()))
        );
        assert!(result.has_step(&StepOutcome::Deleted));
        assert!(!result.target.path().exists());
    }
    assert!(events
        .iter()
        .any(|event| matches!(event, WorkflowEvent::Warning(line) if line.contains("No replacement asset"))));
}

#[test]
fn replacement_copy_failure_fails_the_report() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);
    let mut ops = RecordingOps {
        fail_replace_copy: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &[fixture.target(DirRole::PrimarySystemDir)],
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    assert_eq!(
        report.results[0].steps,
        vec![
            StepOutcome::BackedUp,
            StepOutcome::OwnershipTaken,
            StepOutcome::PermissionGranted,
            StepOutcome::Deleted,
            StepOutcome::Failed("replace: sharing violation".to_string()),
        ]
    );
    assert_eq!(report.failed_count(), 1);
}

#[test]
fn replacement_copy_mismatch_fails_the_report() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);
    let mut ops = RecordingOps {
        corrupt_replace_copy: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &[fixture.target(DirRole::PrimarySystemDir)],
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    assert_eq!(
        report.results[0].last_step(),
        Some(&StepOutcome::Failed(
            "replace: copied file does not match asset".to_string()
        ))
    );
    assert!(report.results[0].has_step(&StepOutcome::Deleted));
}

// A regular file used as a directory makes the existence check itself fail.
#[cfg(unix)]
#[test]
fn existence_check_error_is_recorded_as_unexpected_failure() {
    let fixture = Fixture::new();
    let blocker = fixture.root.join("blocker");
    fs::write(&blocker, b"not a directory").expect("must write blocker");
    let unreachable = TargetFile::new(blocker.join(LIBRARY), DirRole::PrimarySystemDir);
    fixture.install_original(DirRole::SecondarySystemDir);
    let mut ops = RecordingOps::default();

    let report = run_unlock(
        &[unreachable.clone(), fixture.target(DirRole::SecondarySystemDir)],
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    assert_eq!(report.results[0].steps.len(), 1);
    let Some(StepOutcome::Failed(reason)) = report.results[0].last_step() else {
        panic!("expected a failed step, got {:?}", report.results[0].steps);
    };
    assert!(reason.starts_with("unexpected: failed to check "));
    assert!(ops.calls_for(unreachable.path()).is_empty());
    assert!(report.results[1].has_step(&StepOutcome::Deleted));
}

#[test]
fn replacement_selection_uses_architecture_and_role() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);
    let x86_asset = fixture.install_asset(HostArch::X86, DirRole::PrimarySystemDir);
    let mut ops = RecordingOps::default();

    let report = run_unlock(
        &[fixture.target(DirRole::PrimarySystemDir)],
        &fixture.plan(HostArch::X86),
        &mut ops,
        |_| {},
    );

    assert!(report.results[0].has_step(&StepOutcome::Replaced));
    assert_eq!(
        fs::read(fixture.target(DirRole::PrimarySystemDir).path()).expect("replaced"),
        fs::read(x86_asset).expect("asset")
    );
}

#[test]
fn ownership_failure_stops_that_target_only() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_original(DirRole::SecondarySystemDir);
    let mut ops = RecordingOps {
        fail_ownership: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    assert_eq!(report.failed_count(), 2);
    for result in &report.results {
        assert_eq!(
            result.steps,
            vec![
                StepOutcome::BackedUp,
                StepOutcome::Failed("ownership: access is denied".to_string()),
            ]
        );
        assert!(result.target.path().exists());
    }
    assert_eq!(ops.count("takeown"), 2);
    assert_eq!(ops.count("grant"), 0);
    assert_eq!(ops.count("delete"), 0);
}

#[test]
fn permission_failure_skips_delete() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    let mut ops = RecordingOps {
        fail_permission: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &[fixture.target(DirRole::PrimarySystemDir)],
        &fixture.plan(HostArch::X86),
        &mut ops,
        |_| {},
    );

    assert_eq!(
        report.results[0].last_step(),
        Some(&StepOutcome::Failed("permission: icacls exit 5".to_string()))
    );
    assert_eq!(ops.count("delete"), 0);
}

#[test]
fn delete_is_verified_by_existence_check() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X86, DirRole::PrimarySystemDir);
    let mut ops = RecordingOps {
        keep_file_on_delete: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &[fixture.target(DirRole::PrimarySystemDir)],
        &fixture.plan(HostArch::X86),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    assert_eq!(
        report.results[0].last_step(),
        Some(&StepOutcome::Failed("delete verification failed".to_string()))
    );
    assert!(!report.results[0].has_step(&StepOutcome::Replaced));
}

#[test]
fn backup_failure_aborts_target_but_continues_with_next() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_original(DirRole::SecondarySystemDir);
    let mut ops = RecordingOps {
        fail_backup_copy: true,
        ..RecordingOps::default()
    };

    let report = run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        |_| {},
    );

    assert!(!report.success);
    for result in &report.results {
        assert_eq!(result.steps.len(), 1);
        assert!(matches!(
            &result.steps[0],
            StepOutcome::Failed(reason) if reason.starts_with("backup error: ")
        ));
    }
    assert_eq!(ops.count("takeown"), 0);
}

#[test]
fn progress_is_monotonic_and_bounded() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);
    let mut ops = RecordingOps::default();
    let mut events = Vec::new();

    run_unlock(
        &fixture.targets(),
        &fixture.plan(HostArch::X64),
        &mut ops,
        collect_events(&mut events),
    );

    let values = progress_values(&events);
    assert_eq!(values.first(), Some(&0));
    assert_eq!(values.last(), Some(&100));
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(values.iter().all(|value| *value <= 100));
    assert!(values.contains(&25));
    assert!(values.contains(&50));
}

#[test]
fn empty_target_list_completes() {
    let fixture = Fixture::new();
    let mut events = Vec::new();
    let report = run_unlock(
        &[],
        &fixture.plan(HostArch::X64),
        &mut RecordingOps::default(),
        collect_events(&mut events),
    );
    assert!(report.success);
    assert!(report.results.is_empty());
    assert_eq!(progress_values(&events), vec![0, 100]);
}

#[test]
fn plan_unlock_reports_without_side_effects() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    let asset = fixture.install_asset(HostArch::X64, DirRole::PrimarySystemDir);

    let planned = plan_unlock(&fixture.targets(), &fixture.plan(HostArch::X64));

    assert_eq!(planned.len(), 2);
    assert!(planned[0].exists);
    assert!(!planned[0].backup_present);
    assert_eq!(planned[0].replacement.as_deref(), Some(asset.as_path()));
    assert!(!planned[1].exists);
    assert!(planned[1].replacement.is_none());
    assert!(!planned[0].backup.exists());
}

#[test]
fn restore_ownership_sets_trusted_installer_on_existing_files() {
    let fixture = Fixture::new();
    fixture.install_original(DirRole::PrimarySystemDir);
    let mut ops = RecordingOps::default();

    let report = restore_ownership(&fixture.targets(), &mut ops, |_| {});

    assert!(report.success);
    assert_eq!(
        report.results[0].steps,
        vec![StepOutcome::OwnershipRestored]
    );
    assert_eq!(
        report.results[1].steps,
        vec![StepOutcome::Skipped("not found".to_string())]
    );
    assert_eq!(
        ops.calls,
        vec![format!(
            "setowner {TRUSTED_INSTALLER} {}",
            fixture.target(DirRole::PrimarySystemDir).path().display()
        )]
    );
}

#[test]
fn backup_path_appends_suffix() {
    let path = Path::new("C:\\Windows\\System32").join(LIBRARY);
    assert_eq!(
        backup_path(&path, ".bak"),
        Path::new("C:\\Windows\\System32").join(format!("{LIBRARY}.bak"))
    );
}

#[test]
fn asset_layout_keys_by_arch_and_role() {
    let layout = AssetLayout::new("assets");
    assert_eq!(
        layout.replacement_path(HostArch::X64, DirRole::SecondarySystemDir, LIBRARY),
        Path::new("assets").join("x64").join("secondary").join(LIBRARY)
    );
    assert!(layout
        .find_replacement(HostArch::X86, DirRole::PrimarySystemDir, LIBRARY)
        .is_none());
}

#[test]
fn take_ownership_command_shape() {
    let command = build_take_ownership_command(Path::new("C:\\target.dll"));
    assert_eq!(command.get_program(), "takeown");
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(args, vec!["/f", "C:\\target.dll", "/a"]);
}

#[test]
fn grant_admin_command_uses_well_known_sid() {
    let command = build_grant_admin_command(Path::new("C:\\target.dll"));
    assert_eq!(command.get_program(), "icacls");
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        args,
        vec!["C:\\target.dll", "/grant", "*S-1-5-32-544:F", "/c"]
    );
}

#[test]
fn set_owner_command_shape() {
    let command = build_set_owner_command(Path::new("C:\\target.dll"), TRUSTED_INSTALLER);
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        args,
        vec![
            "C:\\target.dll",
            "/setowner",
            "NT SERVICE\\TrustedInstaller",
            "/c"
        ]
    );
}

#[test]
fn system_ops_routes_commands_through_runner() {
    let mut seen = Vec::new();
    {
        let mut ops = SystemOps::with_runner(|command: &mut Command, context: &str| {
            seen.push((
                command.get_program().to_string_lossy().into_owned(),
                context.to_string(),
            ));
            if command.get_program() == "icacls" {
                return Err(anyhow!("{context}: status=exit code: 5"));
            }
            Ok(())
        });
        ops.take_ownership(Path::new("C:\\target.dll"))
            .expect("takeown must pass through");
        let err = ops
            .grant_full_control(Path::new("C:\\target.dll"))
            .expect_err("icacls failure must surface");
        assert!(err.to_string().contains("status=exit code: 5"));
    }
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "takeown");
    assert_eq!(seen[1].1, "failed to grant full control to Administrators");
}

#[test]
fn system_ops_delete_and_copy_use_file_system() {
    let fixture = Fixture::new();
    let source = fixture.install_original(DirRole::PrimarySystemDir);
    let copy = fixture.root.join("copy.dll");
    let mut ops = SystemOps::new();

    ops.copy_file(&source, &copy).expect("must copy");
    assert!(copy.exists());
    ops.delete_file(&copy).expect("must delete");
    assert!(!copy.exists());
    assert!(ops.delete_file(&copy).is_err());
}

#[cfg(unix)]
#[test]
fn run_command_reports_status_and_output() {
    let mut command = Command::new("sh");
    command.arg("-c").arg("echo denied; exit 3");
    let err = run_command(&mut command, "failed to take ownership").expect_err("must fail");
    let message = err.to_string();
    assert!(message.starts_with("failed to take ownership: status="));
    assert!(message.contains("stdout='denied'"));
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[test]
fn output_splitter_releases_carriage_return_segments_immediately() {
    let mut splitter = OutputSplitter::default();
    assert_eq!(
        splitter.push(b"Verification 10% complete.\rVerification 2"),
        vec!["Verification 10% complete."]
    );
    assert_eq!(
        splitter.push(b"0% complete.\r\n\r\n"),
        vec!["Verification 20% complete."]
    );
    assert!(splitter.push(b"Windows Resource").is_empty());
    assert_eq!(splitter.finish(), vec!["Windows Resource"]);
}

#[test]
fn output_splitter_decodes_utf16_with_non_ascii_text() {
    let mut splitter = OutputSplitter::default();
    let bytes = utf16le("Überprüfung 10%\rÜberprüfung 20%\r\n");
    // Split inside a code unit to exercise buffering.
    assert_eq!(splitter.push(&bytes[..5]), Vec::<String>::new());
    assert_eq!(
        splitter.push(&bytes[5..]),
        vec!["Überprüfung 10%", "Überprüfung 20%"]
    );
    assert!(splitter.finish().is_empty());
}

#[test]
fn output_splitter_keeps_utf16_units_containing_newline_bytes() {
    // U+010A encodes as 0A 01 and must not end the segment.
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(utf16le("\u{010A}ontrôle terminé\r\n"));
    let mut splitter = OutputSplitter::default();
    assert_eq!(splitter.push(&bytes), vec!["\u{010A}ontrôle terminé"]);
}

#[test]
fn output_splitter_decodes_utf8_by_default() {
    let mut splitter = OutputSplitter::default();
    assert_eq!(
        splitter.push("Prüfung abgeschlossen\n".as_bytes()),
        vec!["Prüfung abgeschlossen"]
    );
}

#[test]
fn restore_command_defaults_to_system_file_checker() {
    let spec = RestoreCommand::system_file_checker();
    assert_eq!(spec.program, "sfc");
    assert_eq!(spec.args, vec!["/scannow"]);
    let command = build_restore_command(&spec);
    assert_eq!(command.as_std().get_program(), "sfc");
}

#[cfg(unix)]
#[tokio::test]
async fn restore_reports_failure_exit_code_and_ordered_lines() {
    let spec = RestoreCommand {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "echo 'Beginning system scan.'; echo 'Verification 100% complete.'; echo 'Repair failed.'; exit 1"
                .to_string(),
        ],
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let result = run_restore(&spec, tx).await.expect("process must launch");

    assert!(!result.success);
    assert_eq!(result.exit_code, 1);
    let expected = vec![
        "Beginning system scan.",
        "Verification 100% complete.",
        "Repair failed.",
    ];
    assert_eq!(result.log, expected);

    let mut streamed = Vec::new();
    while let Some(line) = rx.recv().await {
        streamed.push(line);
    }
    assert_eq!(streamed, expected);
}

#[cfg(unix)]
#[tokio::test]
async fn restore_succeeds_on_zero_exit_and_captures_stderr() {
    let spec = RestoreCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "echo 'no integrity violations' 1>&2".to_string()],
    };
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

    let result = run_restore(&spec, tx).await.expect("process must launch");

    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.log, vec!["no integrity violations"]);
}

#[cfg(unix)]
#[tokio::test]
async fn restore_streams_progress_redraws_before_the_line_ends() {
    let spec = RestoreCommand {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "printf 'Verification 10%% complete.\\r'; sleep 2; printf 'Verification 100%% complete.\\r\\n'"
                .to_string(),
        ],
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let run = tokio::spawn(async move { run_restore(&spec, tx).await });

    let first = tokio::time::timeout(std::time::Duration::from_millis(1500), rx.recv())
        .await
        .expect("segment must arrive while the tool is still running");
    assert_eq!(first.as_deref(), Some("Verification 10% complete."));

    let result = run
        .await
        .expect("restore task must join")
        .expect("process must launch");
    assert!(result.success);
    assert_eq!(
        result.log,
        vec!["Verification 10% complete.", "Verification 100% complete."]
    );
}

#[tokio::test]
async fn restore_launch_failure_is_reported() {
    let spec = RestoreCommand {
        program: "sysswap-missing-repair-tool".to_string(),
        args: Vec::new(),
    };
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

    let err = run_restore(&spec, tx).await.expect_err("launch must fail");
    assert!(matches!(err, WorkflowError::ProcessLaunchFailed { .. }));
}

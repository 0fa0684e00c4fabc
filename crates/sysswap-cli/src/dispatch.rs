use std::io;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use sysswap_core::{SwapConfig, WorkflowEvent, DEFAULT_CONFIG_FILE};
use sysswap_installer::{backup_path, plan_unlock, SystemOps};
use sysswap_resolver::{detect_arch, system_root, HostInfo, SystemHost, ARCH_ENV_VARS};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::completion::write_completions_script;
use crate::context::{build_unlock_context, load_config, restore_command, ConfigOverrides};
use crate::logging::init_logging;
use crate::prompt::confirm;
use crate::render::{
    format_plan_lines, format_report_lines, format_restore_lines, render_status_line,
    OutputStyle, TerminalProgress, TerminalRenderer,
};
use crate::worker::{AppEvent, AppState, JobKind, JobOutcome, Supervisor, NOT_ELEVATED_MESSAGE};
use crate::{Cli, Commands};

const FAILURE_EXIT: u8 = 1;
const INTERRUPTED_EXIT: i32 = 130;

pub(crate) async fn run_cli(cli: Cli) -> Result<ExitCode> {
    let overrides = ConfigOverrides::from(&cli);
    let config = load_config(&overrides)?;
    if !matches!(cli.command, Commands::Completions { .. }) {
        init_logging(&config.log.file)?;
        tracing::info!(
            "sysswap {} starting: {:?}",
            env!("CARGO_PKG_VERSION"),
            cli.command
        );
    }

    let host = SystemHost;
    let renderer = TerminalRenderer::current();
    let mut supervisor = Supervisor::new(cli.skip_elevation_check || host.is_elevated());

    match cli.command {
        Commands::Targets => {
            let context = build_unlock_context(&config, &host)?;
            renderer.print_section(&format!("Targets ({} host)", context.arch.as_str()));
            for target in &context.targets {
                let status = if target.path().exists() { "ok" } else { "skip" };
                renderer.print_status(
                    status,
                    &format!("{}: {}", target.label(), target.path().display()),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor => {
            renderer.print_section("Doctor");
            renderer.print_lines(&format_doctor_lines(&overrides, &config, &host));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Unlock { dry_run, json } => {
            let context = build_unlock_context(&config, &host)?;
            if dry_run {
                let planned = plan_unlock(&context.targets, &context.plan);
                renderer.print_section("Unlock preview");
                renderer.print_lines(&format_plan_lines(&planned, renderer.style()));
                return Ok(ExitCode::SUCCESS);
            }
            if !supervisor.elevated() {
                return Ok(refuse_not_elevated(renderer));
            }

            tracing::info!(
                "unlock requested for {} target(s) on {} host",
                context.targets.len(),
                context.arch.as_str()
            );
            let events =
                supervisor.start_unlock(context.targets, context.plan, SystemOps::new())?;
            drive(&mut supervisor, events, renderer, JobKind::Unlock).await;
            finish(supervisor.state(), renderer, json)
        }
        Commands::Restore { yes } => {
            if !supervisor.elevated() {
                return Ok(refuse_not_elevated(renderer));
            }
            renderer.print_status(
                "warn",
                "The system file checker scans every protected system file and can take several minutes. It cannot be cancelled once started.",
            );
            if !yes && !confirm("Start the system file check now?".to_string()).await {
                renderer.print_status("skip", "restore cancelled");
                return Ok(ExitCode::SUCCESS);
            }

            let events = supervisor.start_restore(restore_command(&config))?;
            drive(&mut supervisor, events, renderer, JobKind::Restore).await;
            finish(supervisor.state(), renderer, false)
        }
        Commands::RestoreOwner => {
            let context = build_unlock_context(&config, &host)?;
            if !supervisor.elevated() {
                return Ok(refuse_not_elevated(renderer));
            }
            let events = supervisor.start_restore_ownership(context.targets, SystemOps::new())?;
            drive(&mut supervisor, events, renderer, JobKind::RestoreOwnership).await;
            finish(supervisor.state(), renderer, false)
        }
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn refuse_not_elevated(renderer: TerminalRenderer) -> ExitCode {
    tracing::warn!("{NOT_ELEVATED_MESSAGE}");
    renderer.print_status("warn", NOT_ELEVATED_MESSAGE);
    ExitCode::from(FAILURE_EXIT)
}

/// Renders worker events until the job reports completion; the outcome is
/// left in the supervisor state. Ctrl-C asks before abandoning a run.
async fn drive(
    supervisor: &mut Supervisor,
    mut events: UnboundedReceiver<AppEvent>,
    renderer: TerminalRenderer,
    job: JobKind,
) {
    let label = job.as_str();
    let mut progress = match job {
        JobKind::Restore => renderer.start_spinner(label),
        JobKind::Unlock | JobKind::RestoreOwnership => renderer.start_progress(label),
    };
    let mut interrupt_armed = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::error!("{label} worker stopped without a result");
                    supervisor.worker_lost();
                    break;
                };
                render_event(&event, renderer.style(), &mut progress);
                if supervisor.observe(&event) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if interrupt_armed => {
                if signal.is_err() {
                    interrupt_armed = false;
                    continue;
                }
                if confirm_force_termination().await {
                    let finished = drain_until_finished(
                        supervisor,
                        &mut events,
                        renderer.style(),
                        &mut progress,
                    );
                    if finished {
                        progress.println("The operation finished while waiting for an answer.");
                        break;
                    }
                    tracing::warn!("{label} force-terminated by user");
                    std::process::exit(INTERRUPTED_EXIT);
                }
                progress.println("Continuing; the operation will finish on its own.");
            }
        }
    }

    progress.finish();
}

/// Handles events that are already queued; returns true when one of them
/// ends the job.
pub(crate) fn drain_until_finished(
    supervisor: &mut Supervisor,
    events: &mut UnboundedReceiver<AppEvent>,
    style: OutputStyle,
    progress: &mut TerminalProgress,
) -> bool {
    while let Ok(event) = events.try_recv() {
        render_event(&event, style, progress);
        if supervisor.observe(&event) {
            return true;
        }
    }
    false
}

async fn confirm_force_termination() -> bool {
    confirm(
        "\nAn operation is still running. Force-terminating now can leave a system file with changed ownership or permissions, or deleted without its replacement. Terminate anyway?"
            .to_string(),
    )
    .await
}

fn render_event(event: &AppEvent, style: OutputStyle, progress: &mut TerminalProgress) {
    match event {
        AppEvent::Workflow(WorkflowEvent::Log(line)) => {
            tracing::info!("{line}");
            progress.println(line);
        }
        AppEvent::Workflow(WorkflowEvent::Warning(line)) => {
            tracing::warn!("{line}");
            progress.println(&render_status_line(style, "warn", line));
        }
        AppEvent::Workflow(WorkflowEvent::Progress(percent)) => {
            tracing::debug!("progress {percent}%");
            progress.set(*percent);
        }
        AppEvent::Output(line) => {
            tracing::info!(target: "sfc", "{line}");
            progress.println(line);
        }
        AppEvent::Finished(_) => {}
    }
}

fn finish(state: &AppState, renderer: TerminalRenderer, json: bool) -> Result<ExitCode> {
    let outcome = state
        .last_outcome()
        .ok_or_else(|| anyhow!("worker finished without an outcome"))?;
    let success = outcome.success();
    match outcome {
        JobOutcome::Report(report) => {
            tracing::info!(
                "finished: success={} failed_targets={}",
                report.success,
                report.failed_count()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                renderer.print_section("Report");
                renderer.print_lines(&format_report_lines(report, renderer.style()));
            }
        }
        JobOutcome::Restore(result) => {
            tracing::info!(
                "finished: success={} exit_code={}",
                result.success,
                result.exit_code
            );
            renderer.print_lines(&format_restore_lines(result, renderer.style()));
        }
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(FAILURE_EXIT)
    })
}

pub(crate) fn format_doctor_lines(
    overrides: &ConfigOverrides,
    config: &SwapConfig,
    host: &impl HostInfo,
) -> Vec<String> {
    let mut lines = Vec::new();
    let config_source = match &overrides.config {
        Some(path) => path.display().to_string(),
        None if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
            DEFAULT_CONFIG_FILE.to_string()
        }
        None => "(built-in defaults)".to_string(),
    };
    lines.push(format!("config: {config_source}"));
    lines.push(format!(
        "library: {}",
        config
            .target
            .library
            .as_deref()
            .unwrap_or("(not configured)")
    ));
    lines.push(match system_root(host) {
        Ok(root) => format!("system root: {}", root.display()),
        Err(err) => format!("system root: error: {err}"),
    });

    let arch = detect_arch(host);
    let env_signals = ARCH_ENV_VARS
        .iter()
        .map(|key| {
            format!(
                "{key}={}",
                host.env_var(key).unwrap_or_else(|| "-".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(format!(
        "arch: {} (machine={} {env_signals})",
        arch.as_str(),
        host.machine_arch()
    ));
    lines.push(format!(
        "elevated: {}",
        if host.is_elevated() { "yes" } else { "no" }
    ));
    lines.push(format!("assets: {}", config.assets.root.display()));
    lines.push(format!("log file: {}", config.log.file.display()));

    if let Ok(context) = build_unlock_context(config, host) {
        for target in &context.targets {
            let backup = backup_path(target.path(), &config.backup.suffix);
            lines.push(format!(
                "{}: present={} backup={} replacement={}",
                target.label(),
                yes_no(target.path().exists()),
                yes_no(backup.exists()),
                context
                    .plan
                    .replacement_for(target)
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "none".to_string())
            ));
        }
    }
    lines
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

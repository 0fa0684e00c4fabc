use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use sysswap_core::{OperationResult, RestoreResult, StepOutcome, WorkflowReport};
use sysswap_installer::PlannedTarget;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if !no_color && std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!();
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    /// Percentage bar for workflows that report progress.
    pub(crate) fn start_progress(self, label: &str) -> TerminalProgress {
        let progress_bar = (self.style == OutputStyle::Rich).then(|| {
            let progress_bar = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<14} [{bar:24.cyan/blue}] {pos:>3}% {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars("|/-\\ ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            progress_bar
        });
        self.new_progress(label, progress_bar)
    }

    /// Spinner for long-running work without a known length.
    pub(crate) fn start_spinner(self, label: &str) -> TerminalProgress {
        let progress_bar = (self.style == OutputStyle::Rich).then(|| {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars(".oO@* "));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(120));
            progress_bar
        });
        self.new_progress(label, progress_bar)
    }

    fn new_progress(self, label: &str, progress_bar: Option<ProgressBar>) -> TerminalProgress {
        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    pub(crate) fn set(&mut self, percent: u8) {
        self.current = u64::from(percent.min(100));
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_position(self.current);
        }
    }

    /// Prints above the bar so it is not overwritten.
    pub(crate) fn println(&self, line: &str) {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.println(line),
            None => println!("{line}"),
        }
    }

    pub(crate) fn finish(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };
        progress_bar.finish_and_clear();
        if self.style == OutputStyle::Rich {
            println!(
                "{} {:>3}% complete in {}",
                colorize(progress_label_style(), &self.label),
                self.current,
                format_elapsed(self.started_at.elapsed())
            );
        }
    }
}

/// Plain output keeps success lines unadorned but still marks warnings and
/// errors, so piped output can be grepped for them.
pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => match plain_prefix(status) {
            Some(prefix) => format!("{prefix} {message}"),
            None => message.to_string(),
        },
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn plain_prefix(status: &str) -> Option<&'static str> {
    match status {
        "warn" => Some("warning:"),
        "err" => Some("error:"),
        _ => None,
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        "skip" => "[SKIP]",
        _ => "[..]",
    }
}

fn result_status(result: &OperationResult) -> &'static str {
    if !result.success {
        return "err";
    }
    match result.last_step() {
        Some(StepOutcome::Skipped(_)) if result.steps.len() == 1 => "skip",
        Some(StepOutcome::Skipped(_)) => "warn",
        _ => "ok",
    }
}

pub(crate) fn format_report_lines(report: &WorkflowReport, style: OutputStyle) -> Vec<String> {
    let mut lines = report
        .results
        .iter()
        .map(|result| {
            let steps = result
                .steps
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            render_status_line(
                style,
                result_status(result),
                &format!(
                    "{} ({}): {steps}",
                    result.target.label(),
                    result.target.path().display()
                ),
            )
        })
        .collect::<Vec<_>>();

    let summary = if report.success {
        render_status_line(style, "ok", "operation finished successfully")
    } else {
        render_status_line(
            style,
            "err",
            &format!(
                "operation failed for {} of {} target(s); see the log for details",
                report.failed_count(),
                report.results.len()
            ),
        )
    };
    lines.push(summary);
    lines
}

pub(crate) fn format_restore_lines(result: &RestoreResult, style: OutputStyle) -> Vec<String> {
    if result.success {
        vec![render_status_line(
            style,
            "ok",
            "system file check completed successfully",
        )]
    } else {
        vec![render_status_line(
            style,
            "err",
            &format!(
                "system file check failed (exit code {}); see the log for details",
                result.exit_code
            ),
        )]
    }
}

pub(crate) fn format_plan_lines(planned: &[PlannedTarget], style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::with_capacity(planned.len() * 3);
    for entry in planned {
        let label = entry.target.label();
        if !entry.exists {
            lines.push(render_status_line(
                style,
                "skip",
                &format!("{label}: {} not found", entry.target.path().display()),
            ));
            continue;
        }

        lines.push(render_status_line(
            style,
            "ok",
            &format!("{label}: delete {}", entry.target.path().display()),
        ));
        let backup = if entry.backup_present {
            format!("  backup already present at {}", entry.backup.display())
        } else {
            format!("  backup to {}", entry.backup.display())
        };
        lines.push(backup);
        match &entry.replacement {
            Some(asset) => lines.push(format!("  replace with {}", asset.display())),
            None => lines.push("  no replacement asset; file stays removed".to_string()),
        }
    }
    lines
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

use anyhow::{anyhow, Result};
use sysswap_core::{RestoreResult, TargetFile, WorkflowEvent, WorkflowReport};
use sysswap_installer::{
    restore_ownership, run_restore, run_unlock, PrivilegedOps, RestoreCommand, UnlockPlan,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub(crate) const NOT_ELEVATED_MESSAGE: &str =
    "administrator privileges are required; re-run from an elevated prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobKind {
    Unlock,
    RestoreOwnership,
    Restore,
}

impl JobKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::RestoreOwnership => "restore-owner",
            Self::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerStatus {
    Idle,
    Running(JobKind),
    Completed { job: JobKind, success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Report(WorkflowReport),
    Restore(RestoreResult),
}

impl JobOutcome {
    pub(crate) fn success(&self) -> bool {
        match self {
            Self::Report(report) => report.success,
            Self::Restore(result) => result.success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AppEvent {
    Workflow(WorkflowEvent),
    /// A line of repair tool output.
    Output(String),
    Finished(JobOutcome),
}

/// Front-end view of the worker; changed only by the owning front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppState {
    status: WorkerStatus,
    last_outcome: Option<JobOutcome>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status: WorkerStatus::Idle,
            last_outcome: None,
        }
    }
}

impl AppState {
    pub(crate) fn status(&self) -> WorkerStatus {
        self.status
    }

    pub(crate) fn last_outcome(&self) -> Option<&JobOutcome> {
        self.last_outcome.as_ref()
    }

    fn begin(&mut self, job: JobKind) -> Result<()> {
        if let WorkerStatus::Running(active) = self.status {
            return Err(anyhow!(
                "cannot start {}: {} is still running",
                job.as_str(),
                active.as_str()
            ));
        }
        self.status = WorkerStatus::Running(job);
        Ok(())
    }

    fn complete(&mut self, outcome: JobOutcome) {
        let job = match self.status {
            WorkerStatus::Running(job) => job,
            WorkerStatus::Completed { job, .. } => job,
            WorkerStatus::Idle => return,
        };
        self.status = WorkerStatus::Completed {
            job,
            success: outcome.success(),
        };
        self.last_outcome = Some(outcome);
    }
}

/// Runs at most one workflow at a time on a background task.
pub(crate) struct Supervisor {
    elevated: bool,
    state: AppState,
    active_targets: Vec<TargetFile>,
}

impl Supervisor {
    pub(crate) fn new(elevated: bool) -> Self {
        Self {
            elevated,
            state: AppState::default(),
            active_targets: Vec::new(),
        }
    }

    pub(crate) fn elevated(&self) -> bool {
        self.elevated
    }

    pub(crate) fn state(&self) -> &AppState {
        &self.state
    }

    fn begin(&mut self, job: JobKind, targets: &[TargetFile]) -> Result<()> {
        if !self.elevated {
            return Err(anyhow!(NOT_ELEVATED_MESSAGE));
        }
        self.state.begin(job)?;
        self.active_targets = targets.to_vec();
        Ok(())
    }

    pub(crate) fn start_unlock<Ops>(
        &mut self,
        targets: Vec<TargetFile>,
        plan: UnlockPlan,
        mut ops: Ops,
    ) -> Result<UnboundedReceiver<AppEvent>>
    where
        Ops: PrivilegedOps + Send + 'static,
    {
        self.begin(JobKind::Unlock, &targets)?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let events = tx.clone();
            let report = run_unlock(&targets, &plan, &mut ops, |event| {
                let _ = events.send(AppEvent::Workflow(event));
            });
            let _ = tx.send(AppEvent::Finished(JobOutcome::Report(report)));
        });
        Ok(rx)
    }

    pub(crate) fn start_restore_ownership<Ops>(
        &mut self,
        targets: Vec<TargetFile>,
        mut ops: Ops,
    ) -> Result<UnboundedReceiver<AppEvent>>
    where
        Ops: PrivilegedOps + Send + 'static,
    {
        self.begin(JobKind::RestoreOwnership, &targets)?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let events = tx.clone();
            let report = restore_ownership(&targets, &mut ops, |event| {
                let _ = events.send(AppEvent::Workflow(event));
            });
            let _ = tx.send(AppEvent::Finished(JobOutcome::Report(report)));
        });
        Ok(rx)
    }

    pub(crate) fn start_restore(
        &mut self,
        spec: RestoreCommand,
    ) -> Result<UnboundedReceiver<AppEvent>> {
        self.begin(JobKind::Restore, &[])?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(restore_task(spec, tx));
        Ok(rx)
    }

    /// Applies a received event to the state; returns true once the job is over.
    pub(crate) fn observe(&mut self, event: &AppEvent) -> bool {
        match event {
            AppEvent::Finished(outcome) => {
                self.state.complete(outcome.clone());
                self.active_targets.clear();
                true
            }
            AppEvent::Workflow(_) | AppEvent::Output(_) => false,
        }
    }

    /// The worker went away without reporting, e.g. it panicked.
    pub(crate) fn worker_lost(&mut self) -> JobOutcome {
        let reason = "unexpected: worker stopped before reporting";
        let outcome = match self.state.status() {
            WorkerStatus::Running(JobKind::Restore) => JobOutcome::Restore(RestoreResult {
                success: false,
                exit_code: -1,
                log: vec![reason.to_string()],
            }),
            _ => JobOutcome::Report(WorkflowReport::aborted(reason, &self.active_targets)),
        };
        self.state.complete(outcome.clone());
        self.active_targets.clear();
        outcome
    }
}

async fn restore_task(spec: RestoreCommand, tx: UnboundedSender<AppEvent>) {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let forward_tx = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            let _ = forward_tx.send(AppEvent::Output(line));
        }
    });

    let result = run_restore(&spec, line_tx).await;
    let _ = forward.await;

    let outcome = match result {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("{err}");
            RestoreResult {
                success: false,
                exit_code: -1,
                log: vec![err.to_string()],
            }
        }
    };
    let _ = tx.send(AppEvent::Finished(JobOutcome::Restore(outcome)));
}

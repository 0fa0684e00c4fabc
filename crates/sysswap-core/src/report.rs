use std::fmt;

use serde::{Deserialize, Serialize};

use crate::target::TargetFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    BackedUp,
    OwnershipTaken,
    PermissionGranted,
    Deleted,
    Replaced,
    OwnershipRestored,
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackedUp => "backed-up",
            Self::OwnershipTaken => "ownership-taken",
            Self::PermissionGranted => "permission-granted",
            Self::Deleted => "deleted",
            Self::Replaced => "replaced",
            Self::OwnershipRestored => "ownership-restored",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) | Self::Failed(reason) => {
                write!(f, "{} ({reason})", self.as_str())
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub target: TargetFile,
    pub steps: Vec<StepOutcome>,
    pub success: bool,
}

impl OperationResult {
    pub fn new(target: TargetFile) -> Self {
        Self {
            target,
            steps: Vec::new(),
            success: true,
        }
    }

    pub fn push(&mut self, step: StepOutcome) {
        if step.is_failure() {
            self.success = false;
        }
        self.steps.push(step);
    }

    pub fn last_step(&self) -> Option<&StepOutcome> {
        self.steps.last()
    }

    pub fn has_step(&self, step: &StepOutcome) -> bool {
        self.steps.iter().any(|candidate| candidate == step)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub results: Vec<OperationResult>,
    pub success: bool,
}

impl WorkflowReport {
    pub fn from_results(results: Vec<OperationResult>) -> Self {
        let success = results.iter().all(|result| result.success);
        Self { results, success }
    }

    /// Report for a run that never reached its targets.
    pub fn aborted(reason: &str, targets: &[TargetFile]) -> Self {
        let results = targets
            .iter()
            .cloned()
            .map(|target| {
                let mut result = OperationResult::new(target);
                result.push(StepOutcome::Failed(reason.to_string()));
                result
            })
            .collect();
        let mut report = Self::from_results(results);
        report.success = false;
        report
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|result| !result.success).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub success: bool,
    pub exit_code: i32,
    pub log: Vec<String>,
}

/// Notification sent from a running workflow to whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Log(String),
    Warning(String),
    Progress(u8),
}

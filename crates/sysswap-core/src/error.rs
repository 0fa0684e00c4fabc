use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy of the replacement and restore workflows.
///
/// Variants are rendered into the reason carried by `StepOutcome::Skipped`
/// or `StepOutcome::Failed`; they are not propagated past a single target.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("not found")]
    NotFound(PathBuf),
    #[error("permission: {0}")]
    PermissionDenied(String),
    #[error("ownership: {0}")]
    OwnershipFailed(String),
    #[error("delete verification failed")]
    DeleteVerificationFailed(PathBuf),
    #[error("no replacement asset")]
    AssetMissing(PathBuf),
    #[error("failed to launch '{program}': {source}")]
    ProcessLaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl WorkflowError {
    /// Benign conditions are recorded as skips instead of failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AssetMissing(_))
    }

    pub fn unexpected(err: &anyhow::Error) -> Self {
        Self::Unexpected(format!("{err:#}"))
    }
}

impl From<WorkflowError> for crate::StepOutcome {
    fn from(value: WorkflowError) -> Self {
        if value.is_benign() {
            Self::Skipped(value.to_string())
        } else {
            Self::Failed(value.to_string())
        }
    }
}

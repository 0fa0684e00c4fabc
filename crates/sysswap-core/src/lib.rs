mod config;
mod error;
mod report;
mod target;

pub use config::{
    validate_library_name, AssetsConfig, BackupConfig, LogConfig, RestoreConfig, SwapConfig,
    TargetConfig, DEFAULT_CONFIG_FILE,
};
pub use error::WorkflowError;
pub use report::{OperationResult, RestoreResult, StepOutcome, WorkflowEvent, WorkflowReport};
pub use target::{DirRole, HostArch, TargetFile};

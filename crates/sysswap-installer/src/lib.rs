mod command;
mod fs_utils;
mod layout;
mod ops;
mod restore;
mod workflow;

pub use command::{
    build_grant_admin_command, build_set_owner_command, build_take_ownership_command,
    run_command, ADMINISTRATORS_SID, TRUSTED_INSTALLER,
};
pub use layout::{backup_path, AssetLayout};
pub use ops::{CommandRunner, PrivilegedOps, SystemOps};
pub use restore::{build_restore_command, run_restore, RestoreCommand};
pub use workflow::{plan_unlock, restore_ownership, run_unlock, PlannedTarget, UnlockPlan};

#[cfg(test)]
mod tests;

mod arch;
mod host;
mod resolve;

pub use arch::{detect_arch, env_signals_64_bit, machine_signals_64_bit, ARCH_ENV_VARS};
pub use host::{HostInfo, StaticHost, SystemHost};
pub use resolve::{resolve_targets, system_root};

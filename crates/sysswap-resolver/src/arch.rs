use sysswap_core::HostArch;

use crate::HostInfo;

/// Environment variables that name the processor architecture. The second
/// one is set for 32-bit processes running on a 64-bit OS.
pub const ARCH_ENV_VARS: [&str; 2] = ["PROCESSOR_ARCHITECTURE", "PROCESSOR_ARCHITEW6432"];

/// Either signal reporting 64-bit is enough.
pub fn detect_arch(host: &impl HostInfo) -> HostArch {
    let machine = host.machine_arch();
    let env_values = ARCH_ENV_VARS
        .iter()
        .filter_map(|key| host.env_var(key))
        .collect::<Vec<_>>();

    if machine_signals_64_bit(&machine) || env_signals_64_bit(&env_values) {
        HostArch::X64
    } else {
        HostArch::X86
    }
}

pub fn machine_signals_64_bit(machine: &str) -> bool {
    machine.trim().ends_with("64")
}

pub fn env_signals_64_bit<S: AsRef<str>>(values: &[S]) -> bool {
    values.iter().any(|value| value.as_ref().contains("64"))
}

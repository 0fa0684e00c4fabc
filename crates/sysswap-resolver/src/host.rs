use std::collections::BTreeMap;

/// Host facts the resolver and the workflows depend on.
pub trait HostInfo {
    /// Machine architecture identifier, e.g. `x86_64` or `AMD64`.
    fn machine_arch(&self) -> String;
    fn env_var(&self, key: &str) -> Option<String>;
    /// Whether the current process runs with administrative rights.
    fn is_elevated(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn machine_arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }

    fn is_elevated(&self) -> bool {
        process_is_elevated()
    }
}

#[cfg(windows)]
fn process_is_elevated() -> bool {
    use std::process::{Command, Stdio};

    // `net session` only succeeds from an elevated token.
    let status = Command::new("net")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) => status.success(),
        Err(err) => {
            tracing::warn!("elevation probe failed to start: {err}");
            false
        }
    }
}

#[cfg(unix)]
fn process_is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(windows, unix)))]
fn process_is_elevated() -> bool {
    false
}

/// Fixed host description, for previews and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticHost {
    pub machine_arch: String,
    pub env: BTreeMap<String, String>,
    pub elevated: bool,
}

impl StaticHost {
    pub fn new(machine_arch: &str) -> Self {
        Self {
            machine_arch: machine_arch.to_string(),
            env: BTreeMap::new(),
            elevated: false,
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }
}

impl HostInfo for StaticHost {
    fn machine_arch(&self) -> String {
        self.machine_arch.clone()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }
}

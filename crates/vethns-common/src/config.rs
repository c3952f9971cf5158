//! Runtime configuration for veth operations.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Longest interface name the kernel accepts (`IFNAMSIZ - 1`).
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Default procfs mount used to resolve process namespaces.
pub static PROC_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("VETHNS_PROC_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/proc"))
});

/// Settings shared by the link and namespace collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// Procfs mount point (default: /proc).
    pub proc_root: PathBuf,
    /// Maximum length of a derived interface name.
    pub max_name_len: usize,
}

impl NetConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different procfs mount.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Override the maximum interface name length.
    #[must_use]
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Path of the network namespace file for a process.
    #[must_use]
    pub fn netns_path(&self, pid: i32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("ns").join("net")
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            proc_root: PROC_ROOT.clone(),
            max_name_len: MAX_INTERFACE_NAME_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_limit() {
        assert_eq!(NetConfig::default().max_name_len, 15);
    }

    #[test]
    fn netns_path_under_custom_root() {
        let config = NetConfig::new().with_proc_root("/tmp/fakeproc");
        assert_eq!(
            config.netns_path(1234),
            PathBuf::from("/tmp/fakeproc/1234/ns/net")
        );
    }

    #[test]
    fn builder_overrides_name_limit() {
        let config = NetConfig::new().with_max_name_len(8);
        assert_eq!(config.max_name_len, 8);
    }
}

//! Process network namespace resolution.

use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use vethns_common::{NetConfig, VethError, VethResult};

/// An open reference to a network namespace.
///
/// The descriptor stays open for the life of the handle and is closed on drop.
#[derive(Debug)]
pub struct NamespaceHandle {
    pid: i32,
    fd: OwnedFd,
}

impl NamespaceHandle {
    /// Wrap an open namespace descriptor resolved from `pid`.
    #[must_use]
    pub const fn new(pid: i32, fd: OwnedFd) -> Self {
        Self { pid, fd }
    }

    /// The pid this namespace was resolved from.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }
}

impl AsFd for NamespaceHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for NamespaceHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Maps a pid to its network namespace.
pub trait NamespaceResolver {
    /// Open the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// [`VethError::ProcessNotFound`] if no such process exists, or
    /// [`VethError::NamespaceResolution`] if its namespace cannot be opened.
    fn resolve(&self, pid: i32) -> VethResult<NamespaceHandle>;
}

/// Resolves namespaces through `<proc_root>/<pid>/ns/net`.
#[derive(Debug, Clone, Default)]
pub struct ProcNamespaceResolver {
    config: NetConfig,
}

impl ProcNamespaceResolver {
    /// Create a resolver reading from the configured procfs mount.
    #[must_use]
    pub const fn new(config: NetConfig) -> Self {
        Self { config }
    }
}

impl NamespaceResolver for ProcNamespaceResolver {
    fn resolve(&self, pid: i32) -> VethResult<NamespaceHandle> {
        // 0 and negative values name process groups, never a single process.
        if pid <= 0 {
            return Err(VethError::ProcessNotFound { pid });
        }

        let path = self.config.netns_path(pid);
        let file = File::open(&path).map_err(|e| match e.raw_os_error() {
            Some(libc::ENOENT | libc::ESRCH) => VethError::ProcessNotFound { pid },
            _ => VethError::NamespaceResolution {
                pid,
                path: path.clone(),
                source: e,
            },
        })?;

        tracing::debug!(pid, path = %path.display(), "Resolved network namespace");
        Ok(NamespaceHandle::new(pid, file.into()))
    }
}

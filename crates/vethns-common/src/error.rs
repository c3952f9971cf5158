//! Error types for veth provisioning.
//!
//! Two layers live here. [`KernelError`] is the typed translation of a raw
//! kernel failure (an errno from a netlink ack or a syscall). [`VethError`] is
//! what the public operations return: each variant names the step that failed
//! and, where relevant, carries the [`KernelError`] underneath.
//!
//! Consumers of the veth operations distinguish a missing link from a missing
//! process by message content, so the substrings [`LINK_NOT_FOUND`] and
//! [`NO_SUCH_PROCESS`] are part of the public contract.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Substring present in every link resolution error message.
pub const LINK_NOT_FOUND: &str = "Link not found";

/// Substring present in every process resolution error message.
pub const NO_SUCH_PROCESS: &str = "no such process";

/// Result type alias using [`VethError`].
pub type VethResult<T> = Result<T, VethError>;

/// Errors returned by veth operations.
#[derive(Error, Diagnostic, Debug)]
pub enum VethError {
    /// The prefix yields an interface name the kernel would not accept.
    #[error("invalid interface name '{name}': {reason}")]
    #[diagnostic(
        code(vethns::name::invalid),
        help("Interface names must be 1-15 characters without '/', ':' or whitespace")
    )]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The kernel refused to create the veth pair.
    #[error("failed to create veth pair {host}/{container}: {source}")]
    #[diagnostic(code(vethns::veth::create))]
    Creation {
        /// Host side name.
        host: String,
        /// Container side name.
        container: String,
        /// Kernel failure.
        source: KernelError,
    },

    /// The kernel refused to bring the host side up.
    #[error("failed to bring link {name} up: {source}")]
    #[diagnostic(
        code(vethns::veth::activate),
        help("Setting link state requires CAP_NET_ADMIN")
    )]
    Activation {
        /// Link name.
        name: String,
        /// Kernel failure.
        source: KernelError,
    },

    /// The named link does not exist in the current namespace.
    #[error("Link not found: {name}")]
    #[diagnostic(code(vethns::link::not_found))]
    LinkNotFound {
        /// Link name.
        name: String,
    },

    /// The pid does not refer to a live process.
    #[error("failed to resolve network namespace of pid {pid}: no such process")]
    #[diagnostic(code(vethns::netns::no_such_process))]
    ProcessNotFound {
        /// The pid that was looked up.
        pid: i32,
    },

    /// The process exists but its namespace file could not be opened.
    #[error("failed to open network namespace {} of pid {pid}: {source}", path.display())]
    #[diagnostic(
        code(vethns::netns::open),
        help("Opening another process's namespace usually requires root")
    )]
    NamespaceResolution {
        /// The pid that was looked up.
        pid: i32,
        /// Namespace file path.
        path: PathBuf,
        /// I/O failure.
        source: std::io::Error,
    },

    /// The kernel refused to move the link into the target namespace.
    #[error("failed to move link {name} into network namespace of pid {pid}: {source}")]
    #[diagnostic(code(vethns::netns::move_link))]
    NamespaceMove {
        /// Link name.
        name: String,
        /// Target pid.
        pid: i32,
        /// Kernel failure.
        source: KernelError,
    },

    /// A link query failed for a reason other than absence.
    #[error("failed to look up link {name}: {source}")]
    #[diagnostic(code(vethns::link::lookup))]
    LinkLookup {
        /// Link name.
        name: String,
        /// Kernel failure.
        source: KernelError,
    },

    /// The netlink connection could not be established.
    #[error("failed to open netlink connection: {0}")]
    #[diagnostic(code(vethns::netlink::connect))]
    Connection(#[source] std::io::Error),
}

/// A kernel failure, classified by errno.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// `ENODEV`: no such link.
    #[error("no such device")]
    NotFound,

    /// `EEXIST`: an object with that name already exists.
    #[error("file exists")]
    AlreadyExists,

    /// `ESRCH`: the process is gone.
    #[error("no such process")]
    NoSuchProcess,

    /// `EINVAL`.
    #[error("invalid argument")]
    InvalidArgument,

    /// `EPERM` or `EACCES`.
    #[error("operation not permitted")]
    PermissionDenied,

    /// Any other errno.
    #[error("{message}")]
    Os {
        /// Positive errno value.
        errno: i32,
        /// OS description, e.g. "Cannot allocate memory (os error 12)".
        message: String,
    },

    /// The reply could not be decoded or the request never completed.
    #[error("netlink: {0}")]
    Protocol(String),
}

impl KernelError {
    /// Classify an errno. Netlink acks carry negated values; both signs are accepted.
    #[must_use]
    pub fn from_errno(errno: i32) -> Self {
        // i32::MIN has no positive counterpart; it falls through to `Os`.
        match errno.checked_abs().unwrap_or(errno) {
            libc::ENODEV => Self::NotFound,
            libc::EEXIST => Self::AlreadyExists,
            libc::ESRCH => Self::NoSuchProcess,
            libc::EINVAL => Self::InvalidArgument,
            libc::EPERM | libc::EACCES => Self::PermissionDenied,
            errno => Self::Os {
                errno,
                message: std::io::Error::from_raw_os_error(errno).to_string(),
            },
        }
    }

    /// Classify an I/O error, falling back to [`KernelError::Protocol`] when it
    /// carries no errno.
    #[must_use]
    pub fn from_io(err: &std::io::Error) -> Self {
        err.raw_os_error()
            .map_or_else(|| Self::Protocol(err.to_string()), Self::from_errno)
    }
}

//! # vethns
//!
//! Veth pair provisioning for container network namespaces.
//!
//! [`VethManager`] creates a named veth pair in the host namespace, brings the
//! host side up, and moves the container side into the network namespace of a
//! running process. Kernel access goes through the [`LinkControl`] and
//! [`NamespaceResolver`] traits so both can be replaced in tests.

#![warn(missing_docs)]

pub mod link;
pub mod name;
pub mod netns;
pub mod veth;

pub use link::{CreateOutcome, LinkControl, LinkState, RtnetlinkControl};
pub use name::VethNames;
pub use netns::{NamespaceHandle, NamespaceResolver, ProcNamespaceResolver};
pub use veth::{VethEndpoint, VethManager, VethPair};

pub use vethns_common::{
    KernelError, LINK_NOT_FOUND, NO_SUCH_PROCESS, NetConfig, VethError, VethResult,
};

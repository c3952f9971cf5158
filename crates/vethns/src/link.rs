//! Kernel link control.
//!
//! [`LinkControl`] is the narrow surface the veth manager needs from the
//! kernel: look up a link by name, add a veth pair, set a link up, and move a
//! link into another network namespace. [`RtnetlinkControl`] implements it over
//! an rtnetlink socket.
//!
//! rtnetlink is async; the operations here are not. The controller owns a
//! current-thread runtime and blocks on each request, so the netlink
//! connection task only makes progress while a request is in flight.

use std::os::fd::AsRawFd;

use futures::TryStreamExt;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
use rtnetlink::{Handle, LinkUnspec, LinkVeth};
use tokio::runtime::{Builder, Runtime};
use vethns_common::{KernelError, VethError, VethResult};

use crate::netns::NamespaceHandle;

/// Snapshot of a link as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    /// Interface name.
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
    /// Administrative state (`IFF_UP`).
    pub up: bool,
}

/// Result of a veth add request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The pair was created by this request.
    Created,
    /// A link with the host name was already present.
    AlreadyExists,
}

/// Kernel operations on network links.
pub trait LinkControl {
    /// Look up a link in the current namespace. Absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Any kernel failure other than "no such device".
    fn link_by_name(&self, name: &str) -> Result<Option<LinkState>, KernelError>;

    /// Create a veth pair `host` <-> `peer`.
    ///
    /// # Errors
    ///
    /// Any kernel failure other than "already exists", which is reported as
    /// [`CreateOutcome::AlreadyExists`].
    fn add_veth(&self, host: &str, peer: &str) -> Result<CreateOutcome, KernelError>;

    /// Set a link administratively up.
    ///
    /// # Errors
    ///
    /// The kernel's refusal, e.g. [`KernelError::PermissionDenied`].
    fn set_up(&self, index: u32) -> Result<(), KernelError>;

    /// Move a link into the network namespace behind `namespace`.
    ///
    /// # Errors
    ///
    /// The kernel's refusal.
    fn move_to_namespace(&self, index: u32, namespace: &NamespaceHandle) -> Result<(), KernelError>;
}

impl<T: LinkControl + ?Sized> LinkControl for &T {
    fn link_by_name(&self, name: &str) -> Result<Option<LinkState>, KernelError> {
        (**self).link_by_name(name)
    }

    fn add_veth(&self, host: &str, peer: &str) -> Result<CreateOutcome, KernelError> {
        (**self).add_veth(host, peer)
    }

    fn set_up(&self, index: u32) -> Result<(), KernelError> {
        (**self).set_up(index)
    }

    fn move_to_namespace(&self, index: u32, namespace: &NamespaceHandle) -> Result<(), KernelError> {
        (**self).move_to_namespace(index, namespace)
    }
}

/// [`LinkControl`] backed by an rtnetlink route socket.
pub struct RtnetlinkControl {
    runtime: Runtime,
    handle: Handle,
}

impl RtnetlinkControl {
    /// Open a netlink route socket in the caller's network namespace.
    ///
    /// # Errors
    ///
    /// Returns [`VethError::Connection`] if the runtime or socket cannot be
    /// created.
    pub fn connect() -> VethResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(VethError::Connection)?;

        let (connection, handle, _) = {
            let _guard = runtime.enter();
            rtnetlink::new_connection().map_err(VethError::Connection)?
        };
        runtime.spawn(connection);

        tracing::debug!("Opened rtnetlink connection");
        Ok(Self { runtime, handle })
    }
}

impl LinkControl for RtnetlinkControl {
    fn link_by_name(&self, name: &str) -> Result<Option<LinkState>, KernelError> {
        self.runtime.block_on(async {
            let mut links = self
                .handle
                .link()
                .get()
                .match_name(name.to_string())
                .execute();

            match links.try_next().await {
                Ok(Some(msg)) => Ok(Some(link_state(&msg, name))),
                Ok(None) => Ok(None),
                Err(e) => match classify(e) {
                    KernelError::NotFound => Ok(None),
                    other => Err(other),
                },
            }
        })
    }

    fn add_veth(&self, host: &str, peer: &str) -> Result<CreateOutcome, KernelError> {
        let request = self
            .handle
            .link()
            .add(LinkVeth::new(host, peer).build())
            .execute();

        match self.runtime.block_on(request) {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(e) => match classify(e) {
                KernelError::AlreadyExists => Ok(CreateOutcome::AlreadyExists),
                other => Err(other),
            },
        }
    }

    fn set_up(&self, index: u32) -> Result<(), KernelError> {
        let request = self
            .handle
            .link()
            .set(LinkUnspec::new_with_index(index).up().build())
            .execute();

        self.runtime.block_on(request).map_err(classify)
    }

    fn move_to_namespace(&self, index: u32, namespace: &NamespaceHandle) -> Result<(), KernelError> {
        let request = self
            .handle
            .link()
            .set(
                LinkUnspec::new_with_index(index)
                    .setns_by_fd(namespace.as_raw_fd())
                    .build(),
            )
            .execute();

        self.runtime.block_on(request).map_err(classify)
    }
}

/// Translate an rtnetlink failure into a [`KernelError`].
///
/// This is the only place that looks inside rtnetlink errors.
fn classify(err: rtnetlink::Error) -> KernelError {
    match err {
        rtnetlink::Error::NetlinkError(msg) => msg.code.map_or_else(
            || KernelError::Protocol("netlink ack without error code".to_string()),
            |code| KernelError::from_errno(code.get()),
        ),
        other => KernelError::Protocol(other.to_string()),
    }
}

fn link_state(msg: &LinkMessage, queried: &str) -> LinkState {
    let name = msg
        .attributes
        .iter()
        .find_map(|attr| match attr {
            LinkAttribute::IfName(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| queried.to_string());

    LinkState {
        name,
        index: msg.header.index,
        up: msg.header.flags.contains(LinkFlags::Up),
    }
}

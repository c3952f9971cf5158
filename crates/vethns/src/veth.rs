//! Virtual ethernet pair management.

use std::fmt;

use vethns_common::config::MAX_INTERFACE_NAME_LEN;
use vethns_common::{KernelError, NetConfig, VethError, VethResult};

use crate::link::{CreateOutcome, LinkControl, LinkState, RtnetlinkControl};
use crate::name::VethNames;
use crate::netns::{NamespaceResolver, ProcNamespaceResolver};

/// One side of a veth pair.
///
/// `index` is only valid in the namespace the link was observed in; it goes
/// stale once the link is moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethEndpoint {
    /// Interface name.
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
}

impl From<LinkState> for VethEndpoint {
    fn from(state: LinkState) -> Self {
        Self {
            name: state.name,
            index: state.index,
        }
    }
}

impl AsRef<str> for VethEndpoint {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for VethEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.name, self.index)
    }
}

/// Both ends of a veth pair, as returned by [`VethManager::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// Host side, `<prefix>0`.
    pub host: VethEndpoint,
    /// Container side, `<prefix>1`.
    pub container: VethEndpoint,
}

impl VethPair {
    /// Split into `(host, container)`.
    #[must_use]
    pub fn into_parts(self) -> (VethEndpoint, VethEndpoint) {
        (self.host, self.container)
    }
}

/// Creates veth pairs and moves their container side into process namespaces.
///
/// The manager holds no state of its own; every call works from live kernel
/// state through its collaborators.
pub struct VethManager<L = RtnetlinkControl, R = ProcNamespaceResolver> {
    links: L,
    namespaces: R,
    config: NetConfig,
}

impl VethManager {
    /// Create a manager talking to the kernel with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VethError::Connection`] if the netlink socket cannot be opened.
    pub fn new() -> VethResult<Self> {
        Self::with_config(NetConfig::default())
    }

    /// Create a manager talking to the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`VethError::Connection`] if the netlink socket cannot be opened.
    pub fn with_config(config: NetConfig) -> VethResult<Self> {
        let links = RtnetlinkControl::connect()?;
        let namespaces = ProcNamespaceResolver::new(config.clone());
        Ok(Self::with_collaborators(links, namespaces, config))
    }
}

impl<L: LinkControl, R: NamespaceResolver> VethManager<L, R> {
    /// Create a manager over explicit collaborators.
    pub const fn with_collaborators(links: L, namespaces: R, config: NetConfig) -> Self {
        Self {
            links,
            namespaces,
            config,
        }
    }

    /// Create the veth pair `<prefix>0`/`<prefix>1` if absent and bring the
    /// host side up.
    ///
    /// Calling this again with the same prefix succeeds and returns the same
    /// names. A host side that is already up is left alone.
    ///
    /// # Errors
    ///
    /// - [`VethError::InvalidName`] if the prefix cannot form valid names
    /// - [`VethError::Creation`] if the kernel refuses to add the pair
    /// - [`VethError::Activation`] if the kernel refuses to set the host side up
    /// - [`VethError::LinkNotFound`] if the container side is not in this namespace
    /// - [`VethError::LinkLookup`] if a link query fails
    pub fn create(&self, prefix: &str) -> VethResult<VethPair> {
        let names = VethNames::derive(prefix, self.config.max_name_len)?;
        tracing::debug!(host = %names.host, container = %names.container, "Creating veth pair");

        let host = match self.lookup(&names.host)? {
            Some(state) => {
                tracing::debug!(host = %names.host, index = state.index, "Veth pair already exists");
                state
            }
            None => {
                self.add_pair(&names)?;
                self.lookup(&names.host)?
                    .ok_or_else(|| VethError::Creation {
                        host: names.host.clone(),
                        container: names.container.clone(),
                        source: KernelError::NotFound,
                    })?
            }
        };

        if host.up {
            tracing::debug!(host = %names.host, "Host side already up");
        } else {
            self.links
                .set_up(host.index)
                .map_err(|source| VethError::Activation {
                    name: names.host.clone(),
                    source,
                })?;
            tracing::debug!(host = %names.host, index = host.index, "Host side up");
        }

        let host = self.require(&names.host)?;
        let container = self.require(&names.container)?;

        Ok(VethPair {
            host: host.into(),
            container: container.into(),
        })
    }

    /// Move the named interface into the network namespace of `pid`.
    ///
    /// The process is resolved before the link, so an unknown pid is reported
    /// even when the link is also missing. Moving the same endpoint twice fails
    /// the second time because the link has left this namespace.
    ///
    /// # Errors
    ///
    /// - [`VethError::ProcessNotFound`] if `pid` is not a live process
    /// - [`VethError::NamespaceResolution`] if its namespace cannot be opened
    /// - [`VethError::LinkNotFound`] if the interface is not in this namespace
    /// - [`VethError::NamespaceMove`] if the kernel refuses the move
    pub fn move_to_namespace(&self, endpoint: impl AsRef<str>, pid: i32) -> VethResult<()> {
        let name = endpoint.as_ref();
        tracing::debug!(interface = name, pid, "Moving to netns");

        let namespace = self.namespaces.resolve(pid)?;
        let link = self.require(name)?;

        self.links
            .move_to_namespace(link.index, &namespace)
            .map_err(|source| VethError::NamespaceMove {
                name: name.to_string(),
                pid,
                source,
            })?;

        tracing::info!(interface = name, pid, "Moved link into network namespace");
        Ok(())
    }

    fn add_pair(&self, names: &VethNames) -> VethResult<()> {
        match self.links.add_veth(&names.host, &names.container) {
            Ok(CreateOutcome::Created) => {
                tracing::info!(host = %names.host, container = %names.container, "Veth pair created");
                Ok(())
            }
            Ok(CreateOutcome::AlreadyExists) => {
                tracing::warn!(host = %names.host, "Veth pair created concurrently, reusing it");
                Ok(())
            }
            Err(KernelError::InvalidArgument) => Err(VethError::InvalidName {
                name: names.host.clone(),
                reason: "rejected by the kernel".to_string(),
            }),
            Err(source) => Err(VethError::Creation {
                host: names.host.clone(),
                container: names.container.clone(),
                source,
            }),
        }
    }

    fn lookup(&self, name: &str) -> VethResult<Option<LinkState>> {
        // The kernel answers ERANGE for these rather than ENODEV.
        if name.len() > MAX_INTERFACE_NAME_LEN {
            return Ok(None);
        }
        self.links
            .link_by_name(name)
            .map_err(|source| VethError::LinkLookup {
                name: name.to_string(),
                source,
            })
    }

    fn require(&self, name: &str) -> VethResult<LinkState> {
        self.lookup(name)?.ok_or_else(|| VethError::LinkNotFound {
            name: name.to_string(),
        })
    }
}

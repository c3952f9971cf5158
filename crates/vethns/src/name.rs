//! Deterministic veth name derivation.

use vethns_common::{VethError, VethResult};

/// Suffix of the host side name.
pub const HOST_SUFFIX: char = '0';

/// Suffix of the container side name.
pub const CONTAINER_SUFFIX: char = '1';

/// Host and container names derived from one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethNames {
    /// `<prefix>0`
    pub host: String,
    /// `<prefix>1`
    pub container: String,
}

impl VethNames {
    /// Validate `prefix` and derive both names.
    ///
    /// # Errors
    ///
    /// Returns [`VethError::InvalidName`] if the prefix is empty, contains a
    /// character the kernel rejects, or is too long to take a suffix within
    /// `max_len`.
    pub fn derive(prefix: &str, max_len: usize) -> VethResult<Self> {
        let invalid = |reason: String| VethError::InvalidName {
            name: prefix.to_string(),
            reason,
        };

        if prefix.is_empty() {
            return Err(invalid("prefix is empty".to_string()));
        }
        if let Some(c) = prefix
            .chars()
            .find(|c| *c == '/' || *c == ':' || c.is_whitespace())
        {
            return Err(invalid(format!("contains forbidden character {c:?}")));
        }
        // Suffix is one byte; the kernel limit is in bytes.
        if prefix.len() + 1 > max_len {
            return Err(invalid(format!(
                "prefix is {} bytes, at most {} allowed",
                prefix.len(),
                max_len.saturating_sub(1)
            )));
        }

        Ok(Self {
            host: format!("{prefix}{HOST_SUFFIX}"),
            container: format!("{prefix}{CONTAINER_SUFFIX}"),
        })
    }
}

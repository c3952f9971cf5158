//! # vethns-common
//!
//! Shared types for the vethns crates:
//! - The error taxonomy surfaced by veth operations
//! - Kernel error translation
//! - Runtime configuration

#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::NetConfig;
pub use error::{KernelError, LINK_NOT_FOUND, NO_SUCH_PROCESS, VethError, VethResult};

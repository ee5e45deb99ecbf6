//! # ldapsh core
//!
//! Core library for the ldapsh directory shell.
//! Provides distinguished names, the directory connector seam with LDAP and
//! in-memory implementations, the lazily populated tree cache, navigation,
//! connection history and configuration.

pub mod attributes;
pub mod config;
pub mod connector;
pub mod dn;
pub mod error;
pub mod history;
pub mod ldap;
pub mod memory;
pub mod navigation;
pub mod tree;

// Re-export commonly used types at the crate root.
pub use attributes::{Attributes, Modification};
pub use config::{ShellConfig, load_config};
pub use connector::{DirectoryConnector, Scope, SearchEntry};
pub use dn::{Dn, Rdn};
pub use error::{
    ConfigError, ConnectError, DirectoryError, DnError, HistoryError, LdapshError,
    NavigationError, NodeError, Result,
};
pub use history::{ConnectionData, ConnectionStore};
pub use ldap::LdapConnector;
pub use memory::MemoryDirectory;
pub use navigation::Navigator;
pub use tree::{DirectoryTree, NodeId};

//! Error types for the ldapsh core library.
//!
//! Uses `thiserror` for public API error types, one enum per layer:
//! names, the directory connector, the tree cache, the navigation façade,
//! connection history and configuration. Lower layers are wrapped
//! transparently so that messages reach the user unmodified.

use std::path::PathBuf;

use crate::attributes::Attributes;

/// Top-level error type for the ldapsh core library.
#[derive(Debug, thiserror::Error)]
pub enum LdapshError {
    #[error(transparent)]
    Dn(#[from] DnError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A textual name could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnError {
    #[error("Malformed DN: {text}")]
    Malformed { text: String },
}

/// Errors reported by a directory connector for individual operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("DN does not exist: {dn}")]
    ObjectNotFound { dn: String, matched: Option<String> },

    #[error("DN already exists: {dn}")]
    AlreadyExists { dn: String },

    #[error("Undefined attribute type: {attribute}")]
    UndefinedAttributeType { attribute: String },

    #[error("Value already exists in {dn}: {}", format_attributes(.attributes))]
    ValueAlreadyExists { dn: String, attributes: Attributes },

    #[error("LDAP error: {message}")]
    Protocol { message: String },
}

impl DirectoryError {
    /// Whether this error means the target object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::ObjectNotFound { .. })
    }
}

/// Startup-time failures while connecting or binding. These are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Unable to connect to {uri}.{}", format_info(.info))]
    Connectivity { uri: String, info: Option<String> },

    #[error("Unable to authenticate user: {principal}.{}", format_info(.info))]
    Authentication {
        principal: String,
        info: Option<String>,
    },

    #[error("Server unwilling to perform requested operation.{}", format_info(.info))]
    PolicyRejected { info: Option<String> },
}

/// Errors raised by the directory tree cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("DN does not exist: {dn}")]
    NotFound { dn: String },

    #[error("Need to specify either an old value or a new value.")]
    MissingOperand,

    #[error("{dn} has no such attribute: {attribute}")]
    NoSuchAttribute { dn: String, attribute: String },

    #[error("Attribute {attribute} does not contain value: {value}")]
    NoSuchValue { attribute: String, value: String },

    #[error("The root DSE cannot be modified.")]
    RootNotModifiable,

    #[error(transparent)]
    Dn(#[from] DnError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Errors raised while resolving names relative to the current location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("No such root DN: {name}")]
    NotFoundUnderRoot { name: String },

    #[error("DN does not exist: {name},{cwd}")]
    NotFoundUnderObject { name: String, cwd: String },

    #[error("Already at root.")]
    AlreadyAtBoundary,

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Errors from the persisted connection history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Syntax error parsing connection data: {message}")]
    Syntax { message: String },

    #[error("The {} most recent connection does not exist", nth(.index))]
    NoSuchRecent { index: usize },

    #[error("No saved connection with name: {name}")]
    NoSuchSaved { name: String },

    #[error("Unable to access connection history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),
}

/// Convenience result type for ldapsh core operations.
pub type Result<T> = std::result::Result<T, LdapshError>;

fn format_info(info: &Option<String>) -> String {
    match info {
        Some(info) if !info.is_empty() => format!(" Info: {info}"),
        _ => String::new(),
    }
}

fn nth(index: &usize) -> String {
    ordinal(*index)
}

fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |v| format!("{name}={v}")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// English ordinal for a zero-based position: 0 -> "1st", 1 -> "2nd", ...
pub fn ordinal(index: usize) -> String {
    let n = index + 1;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

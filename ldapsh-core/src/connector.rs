//! The seam between the tree cache and the directory service.
//!
//! Implementations perform blocking round trips. The tree cache is the only
//! caller and never issues two operations concurrently.

use crate::attributes::Attributes;
use crate::dn::Dn;
use crate::error::DirectoryError;

/// Search scope relative to the base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Exactly the base object.
    Base,
    /// The direct children of the base object.
    OneLevel,
}

/// One object returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub dn: String,
    pub attributes: Attributes,
}

/// Operations the tree cache needs from a directory service.
pub trait DirectoryConnector {
    /// The advertised top-level naming contexts.
    fn roots(&mut self) -> Result<Vec<String>, DirectoryError>;

    /// Look up `base` or its children. `attributes` restricts the returned
    /// attribute types; `None` returns all user attributes.
    fn search(
        &mut self,
        base: &Dn,
        scope: Scope,
        attributes: Option<&[&str]>,
    ) -> Result<Vec<SearchEntry>, DirectoryError>;

    /// Apply the minimal difference between `old` and `new` to `dn`.
    fn modify(&mut self, dn: &Dn, old: &Attributes, new: &Attributes)
    -> Result<(), DirectoryError>;

    /// Create `dn` with the given attributes.
    fn add(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError>;

    /// Remove the leaf object `dn`.
    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError>;
}

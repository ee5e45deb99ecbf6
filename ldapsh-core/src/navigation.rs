//! The current location in a directory tree and name resolution against it.

use tracing::debug;

use crate::attributes::Attributes;
use crate::dn::Dn;
use crate::error::{NavigationError, NodeError};
use crate::tree::{DirectoryTree, NodeId};

/// Name of the current object.
pub const CURRENT: &str = ".";
/// Name of the parent of the current object.
pub const PARENT: &str = "..";

/// Owns a [`DirectoryTree`] and a cursor into it.
#[derive(Debug)]
pub struct Navigator {
    tree: DirectoryTree,
    current: NodeId,
}

impl Navigator {
    /// Start at the root of `tree`.
    pub fn new(tree: DirectoryTree) -> Self {
        let current = tree.root();
        Self { tree, current }
    }

    /// Full name of the current object; empty at the root.
    pub fn cwd(&self) -> String {
        self.tree.dn(self.current).to_string()
    }

    /// Resolve `name` against the current object.
    ///
    /// Besides `.` and `..` only direct children are resolvable. The name is
    /// parsed first, so `ou=People` and `ou = People` find the same child.
    pub fn resolve_relative(&mut self, name: &str) -> Result<NodeId, NavigationError> {
        match name {
            CURRENT => Ok(self.current),
            PARENT => self
                .tree
                .parent(self.current)
                .ok_or(NavigationError::AlreadyAtBoundary),
            _ => {
                let key = Dn::parse(name).map_err(NodeError::from)?;
                let found = self
                    .tree
                    .relative_children(self.current)?
                    .get(&key.to_string())
                    .copied();
                found.ok_or_else(|| self.not_found(name))
            }
        }
    }

    fn not_found(&self, name: &str) -> NavigationError {
        if self.tree.is_root(self.current) {
            NavigationError::NotFoundUnderRoot {
                name: name.to_string(),
            }
        } else {
            NavigationError::NotFoundUnderObject {
                name: name.to_string(),
                cwd: self.cwd(),
            }
        }
    }

    pub fn change_directory(&mut self, name: &str) -> Result<(), NavigationError> {
        self.current = self.resolve_relative(name)?;
        debug!(cwd = %self.cwd(), "Changed directory");
        Ok(())
    }

    pub fn go_up(&mut self) -> Result<(), NavigationError> {
        self.change_directory(PARENT)
    }

    /// Relative names of the current object's children, in listing order.
    pub fn children(&mut self) -> Result<Vec<String>, NavigationError> {
        Ok(self
            .tree
            .relative_children(self.current)?
            .keys()
            .cloned()
            .collect())
    }

    pub fn attributes(&mut self, name: &str) -> Result<&Attributes, NavigationError> {
        let id = self.resolve_relative(name)?;
        Ok(self.tree.attributes(id))
    }

    pub fn set_attribute(
        &mut self,
        name: &str,
        attribute: &str,
        new_value: Option<&str>,
        old_value: Option<&str>,
    ) -> Result<(), NavigationError> {
        let id = self.resolve_relative(name)?;
        self.tree
            .set_attribute(id, attribute, new_value, old_value)?;
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), NavigationError> {
        let id = self.resolve_relative(name)?;
        self.tree.delete(id)?;
        Ok(())
    }

    /// Create `rdn` below the current object.
    pub fn add(&mut self, rdn: &str, attributes: Attributes) -> Result<(), NavigationError> {
        self.tree.add(self.current, rdn, attributes)?;
        Ok(())
    }

    /// Children of the current object whose relative name starts with
    /// `prefix`. Only lists children on first use.
    pub fn complete_child(&mut self, prefix: &str) -> Result<Vec<String>, NavigationError> {
        Ok(self
            .tree
            .relative_children(self.current)?
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

//! Directory tree cache.
//!
//! Objects are held in an arena and addressed by [`NodeId`]. Each node records
//! its parent id and, once listed, a map from child relative name to child id,
//! so parent/child links never form ownership cycles. Attributes and children
//! are fetched lazily and memoized; a cache miss costs at most one round trip
//! to the connector.
//!
//! The cache is never refreshed. Changes made to the directory by other
//! clients are not seen until the affected node is created again.

use indexmap::IndexMap;
use tracing::{debug, error, info};

use crate::attributes::Attributes;
use crate::connector::{DirectoryConnector, Scope};
use crate::dn::Dn;
use crate::error::{DnError, NodeError};

/// Handle to a node in a [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    dn: Dn,
    attributes: Attributes,
    parent: Option<NodeId>,
    /// Children keyed by their name relative to this node, in listing order.
    children: Option<IndexMap<String, NodeId>>,
}

/// The cached view of one directory, rooted at the root DSE.
pub struct DirectoryTree {
    connector: Box<dyn DirectoryConnector>,
    nodes: Vec<Node>,
}

impl std::fmt::Debug for DirectoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryTree")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

const ROOT: NodeId = NodeId(0);

impl DirectoryTree {
    /// Build the tree and populate the root with the advertised naming
    /// contexts. A context that cannot be looked up is logged and skipped.
    pub fn new(connector: Box<dyn DirectoryConnector>) -> Result<Self, NodeError> {
        let mut tree = Self {
            connector,
            nodes: vec![Node {
                dn: Dn::root(),
                attributes: Attributes::new(),
                parent: None,
                children: Some(IndexMap::new()),
            }],
        };

        let roots = tree.connector.roots()?;
        debug!(roots = ?roots, "Populating root node");
        for root in roots {
            match tree.construct(&root, None) {
                Ok(id) => {
                    tree.nodes[id.0].parent = Some(ROOT);
                    let key = tree.relative_name(id, None).to_string();
                    if let Some(children) = tree.nodes[ROOT.0].children.as_mut() {
                        children.insert(key, id);
                    }
                }
                Err(e) => {
                    error!("{e}");
                    error!(root = %root, "Skipping root");
                }
            }
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == ROOT
    }

    pub fn dn(&self, id: NodeId) -> &Dn {
        &self.nodes[id.0].dn
    }

    pub fn attributes(&self, id: NodeId) -> &Attributes {
        &self.nodes[id.0].attributes
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Create a standalone node for `dn`, fetching its attributes with a
    /// base-level lookup.
    pub fn open(&mut self, dn: &str) -> Result<NodeId, NodeError> {
        self.construct(dn, None)
    }

    fn construct(&mut self, dn: &str, attributes: Option<Attributes>) -> Result<NodeId, NodeError> {
        info!(dn = %dn, "Creating node");
        let parsed = Dn::parse(dn)?;

        let attributes = match attributes {
            Some(attributes) => attributes,
            None if parsed.is_root() => Attributes::new(),
            None => self.fetch_attributes(&parsed)?,
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            dn: parsed,
            attributes,
            parent: None,
            children: None,
        });
        Ok(id)
    }

    fn fetch_attributes(&mut self, dn: &Dn) -> Result<Attributes, NodeError> {
        let not_found = || NodeError::NotFound { dn: dn.to_string() };
        let entries = match self.connector.search(dn, Scope::Base, None) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let entry = entries.into_iter().next().ok_or_else(not_found)?;
        debug!(dn = %dn, attributes = ?entry.attributes, "Fetched attributes");
        Ok(entry.attributes)
    }

    /// Children of `id` keyed by relative name, listing them on first use.
    pub fn relative_children(&mut self, id: NodeId) -> Result<&IndexMap<String, NodeId>, NodeError> {
        self.populate_children(id)?;
        let children: &IndexMap<String, NodeId> =
            self.nodes[id.0].children.get_or_insert_with(IndexMap::new);
        Ok(children)
    }

    /// Child ids of `id`, in listing order.
    pub fn children(&mut self, id: NodeId) -> Result<Vec<NodeId>, NodeError> {
        Ok(self.relative_children(id)?.values().copied().collect())
    }

    fn populate_children(&mut self, id: NodeId) -> Result<(), NodeError> {
        if self.nodes[id.0].children.is_some() {
            return Ok(());
        }

        let dn = self.nodes[id.0].dn.clone();
        let entries = self.connector.search(&dn, Scope::OneLevel, None)?;

        let mut children = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let child = self.construct(&entry.dn, Some(entry.attributes))?;
            self.nodes[child.0].parent = Some(id);
            children.insert(self.relative_name(child, None).to_string(), child);
        }
        debug!(dn = %dn, children = ?children.keys().collect::<Vec<_>>(), "Populated children");
        self.nodes[id.0].children = Some(children);
        Ok(())
    }

    /// The name of `id` relative to `ancestor`, or to its parent when no
    /// ancestor is given. A parentless node is empty relative to itself.
    ///
    /// An `ancestor` sharing no suffix with the node yields the node's full
    /// name rather than an error.
    pub fn relative_name(&self, id: NodeId, ancestor: Option<&Dn>) -> Dn {
        let node = &self.nodes[id.0];
        match (ancestor, node.parent) {
            (Some(ancestor), _) => node.dn.relative_to(ancestor),
            (None, Some(parent)) => node.dn.relative_to(&self.nodes[parent.0].dn),
            (None, None) => Dn::root(),
        }
    }

    /// Add, remove or replace a single value of `attribute`.
    ///
    /// With only `new_value` the value is added; with only `old_value` it is
    /// removed; with both the first occurrence of `old_value` is replaced in
    /// place. The cache changes only after the directory accepted the change.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        attribute: &str,
        new_value: Option<&str>,
        old_value: Option<&str>,
    ) -> Result<(), NodeError> {
        if self.is_root(id) {
            return Err(NodeError::RootNotModifiable);
        }
        let node = &self.nodes[id.0];

        let (before, mut after) = match (new_value, old_value) {
            (None, None) => return Err(NodeError::MissingOperand),
            (Some(new), None) => {
                let mut after = Attributes::new();
                after.insert(attribute.to_string(), vec![new.to_string()]);
                (Attributes::new(), after)
            }
            (new, Some(old)) => {
                let values =
                    node.attributes
                        .get(attribute)
                        .ok_or_else(|| NodeError::NoSuchAttribute {
                            dn: node.dn.to_string(),
                            attribute: attribute.to_string(),
                        })?;
                let position = values.iter().position(|v| v == old).ok_or_else(|| {
                    NodeError::NoSuchValue {
                        attribute: attribute.to_string(),
                        value: old.to_string(),
                    }
                })?;

                let mut updated = values.clone();
                match new {
                    Some(new) => updated[position] = new.to_string(),
                    None => {
                        updated.remove(position);
                    }
                }

                let mut before = Attributes::new();
                before.insert(attribute.to_string(), values.clone());
                let mut after = Attributes::new();
                after.insert(attribute.to_string(), updated);
                (before, after)
            }
        };

        let dn = node.dn.clone();
        debug!(dn = %dn, attribute, ?new_value, ?old_value, "Modifying attribute");
        self.connector.modify(&dn, &before, &after)?;

        let cached = &mut self.nodes[id.0].attributes;
        match (old_value, after.shift_remove(attribute)) {
            (None, Some(added)) => cached
                .entry(attribute.to_string())
                .or_default()
                .extend(added),
            (Some(_), Some(updated)) if updated.is_empty() => {
                cached.shift_remove(attribute);
            }
            (Some(_), Some(updated)) => {
                cached.insert(attribute.to_string(), updated);
            }
            (_, None) => {}
        }
        Ok(())
    }

    /// Delete `id` and, depth first, everything below it.
    ///
    /// An object that is already gone is not an error, so deleting the same
    /// node twice succeeds. On success the node is dropped from its parent's
    /// children.
    pub fn delete(&mut self, id: NodeId) -> Result<(), NodeError> {
        if self.is_root(id) {
            return Err(NodeError::RootNotModifiable);
        }

        let children = match self.children(id) {
            Ok(children) => children,
            Err(NodeError::Directory(e)) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        for child in children {
            self.delete(child)?;
        }

        let dn = self.nodes[id.0].dn.clone();
        debug!(dn = %dn, "Deleting node");
        match self.connector.delete(&dn) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(dn = %dn, "Already absent"),
            Err(e) => return Err(e.into()),
        }

        self.detach(id);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        let key = self.relative_name(id, None).to_string();
        if let Some(children) = self.nodes[parent.0].children.as_mut()
            && children.get(&key) == Some(&id)
        {
            children.shift_remove(&key);
        }
    }

    /// Create the object `relative,<dn of id>` and cache it as a child of `id`.
    ///
    /// `relative` must be a single name component. If the children of `id`
    /// have not been listed yet nothing is cached; the next listing picks the
    /// new object up.
    pub fn add(
        &mut self,
        id: NodeId,
        relative: &str,
        attributes: Attributes,
    ) -> Result<NodeId, NodeError> {
        let rdn = Dn::parse(relative)?;
        if rdn.len() != 1 {
            return Err(DnError::Malformed {
                text: relative.to_string(),
            }
            .into());
        }
        let dn = self.nodes[id.0].dn.join(&rdn);
        debug!(dn = %dn, "Adding node");
        self.connector.add(&dn, &attributes)?;

        let child = NodeId(self.nodes.len());
        self.nodes.push(Node {
            dn,
            attributes,
            parent: Some(id),
            children: None,
        });
        if let Some(children) = self.nodes[id.0].children.as_mut() {
            children.insert(rdn.to_string(), child);
        }
        Ok(child)
    }
}

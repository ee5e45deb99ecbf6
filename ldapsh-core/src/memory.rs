//! In-process directory service.
//!
//! `MemoryDirectory` behaves like a small LDAP server: it enforces parent
//! existence, leaf-only deletes, an optional attribute schema and duplicate
//! value detection, and it counts every round trip. Handles are cheap clones
//! of the same store, so a caller can keep one to inspect state after handing
//! another to the tree cache.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::trace;

use crate::attributes::{self, Attributes, Modification};
use crate::connector::{DirectoryConnector, Scope, SearchEntry};
use crate::dn::Dn;
use crate::error::{DirectoryError, DnError, LdapshError};

/// Number of round trips served, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub searches: usize,
    pub modifies: usize,
    pub adds: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
struct Store {
    roots: Vec<String>,
    entries: IndexMap<Dn, Attributes>,
    schema: Option<BTreeSet<String>>,
    counts: OperationCounts,
    fail_next: Option<DirectoryError>,
}

/// Shared handle to an in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    store: Rc<RefCell<Store>>,
}

/// On-disk fixture format accepted by [`MemoryDirectory::from_json`].
#[derive(Debug, Deserialize)]
struct Fixture {
    roots: Vec<String>,
    #[serde(default)]
    schema: Option<Vec<String>>,
    #[serde(default)]
    entries: Vec<FixtureEntry>,
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    dn: String,
    #[serde(default)]
    attributes: Attributes,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a JSON fixture:
    /// `{"roots": [...], "schema": [...]?, "entries": [{"dn": ..., "attributes": {...}}]}`.
    pub fn from_json(json: &str) -> Result<Self, LdapshError> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| {
            LdapshError::Directory(DirectoryError::Protocol {
                message: format!("invalid directory fixture: {e}"),
            })
        })?;

        let directory = Self::new();
        for root in &fixture.roots {
            directory.add_root(root);
        }
        if let Some(schema) = &fixture.schema {
            directory.set_schema(schema.iter().map(String::as_str));
        }
        for entry in fixture.entries {
            directory.insert(&entry.dn, entry.attributes)?;
        }
        Ok(directory)
    }

    /// Load a JSON fixture from disk.
    pub fn load(path: &Path) -> Result<Self, LdapshError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Advertise `dn` as a naming context. The entry itself is added separately.
    pub fn add_root(&self, dn: &str) {
        self.store.borrow_mut().roots.push(dn.to_string());
    }

    /// Restrict the attribute types that may be written.
    pub fn set_schema<'a>(&self, attributes: impl IntoIterator<Item = &'a str>) {
        self.store.borrow_mut().schema = Some(
            attributes
                .into_iter()
                .map(|a| a.to_ascii_lowercase())
                .collect(),
        );
    }

    /// Seed an entry without going through the protocol checks or counters.
    pub fn insert(&self, dn: &str, attributes: Attributes) -> Result<(), DnError> {
        let dn = Dn::parse(dn)?;
        self.store.borrow_mut().entries.insert(dn, attributes);
        Ok(())
    }

    /// Make the next round trip fail with `error`.
    pub fn fail_next(&self, error: DirectoryError) {
        self.store.borrow_mut().fail_next = Some(error);
    }

    pub fn entry(&self, dn: &str) -> Option<Attributes> {
        let dn = Dn::parse(dn).ok()?;
        self.store.borrow().entries.get(&dn).cloned()
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.entry(dn).is_some()
    }

    pub fn counts(&self) -> OperationCounts {
        self.store.borrow().counts
    }
}

impl Store {
    fn take_failure(&mut self) -> Result<(), DirectoryError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(&self, dn: &Dn) -> DirectoryError {
        let mut matched = dn.parent();
        while let Some(candidate) = matched.as_ref() {
            if candidate.is_root() || self.entries.contains_key(candidate) {
                break;
            }
            matched = candidate.parent();
        }
        DirectoryError::ObjectNotFound {
            dn: dn.to_string(),
            matched: matched.filter(|m| !m.is_root()).map(|m| m.to_string()),
        }
    }

    fn check_schema(&self, attribute: &str) -> Result<(), DirectoryError> {
        match &self.schema {
            Some(schema) if !schema.contains(&attribute.to_ascii_lowercase()) => {
                Err(DirectoryError::UndefinedAttributeType {
                    attribute: attribute.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn is_root(&self, dn: &Dn) -> bool {
        self.roots
            .iter()
            .any(|r| Dn::parse(r).is_ok_and(|r| &r == dn))
    }

    fn has_children(&self, dn: &Dn) -> bool {
        self.entries
            .keys()
            .any(|k| k.parent().as_ref() == Some(dn))
    }
}

fn project(attributes: &Attributes, filter: Option<&[&str]>) -> Attributes {
    match filter {
        None => attributes.clone(),
        Some(wanted) => attributes
            .iter()
            .filter(|(name, _)| wanted.iter().any(|w| w.eq_ignore_ascii_case(name)))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect(),
    }
}

impl DirectoryConnector for MemoryDirectory {
    fn roots(&mut self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.store.borrow().roots.clone())
    }

    fn search(
        &mut self,
        base: &Dn,
        scope: Scope,
        attributes: Option<&[&str]>,
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        let mut store = self.store.borrow_mut();
        store.counts.searches += 1;
        store.take_failure()?;
        trace!(base = %base, ?scope, "memory search");

        if base.is_root() {
            return Ok(match scope {
                Scope::Base => {
                    let mut dse = Attributes::new();
                    dse.insert("namingContexts".into(), store.roots.clone());
                    vec![SearchEntry {
                        dn: String::new(),
                        attributes: project(&dse, attributes),
                    }]
                }
                Scope::OneLevel => store
                    .entries
                    .iter()
                    .filter(|(dn, _)| store.is_root(dn))
                    .map(|(dn, attrs)| SearchEntry {
                        dn: dn.to_string(),
                        attributes: project(attrs, attributes),
                    })
                    .collect(),
            });
        }

        let Some(entry) = store.entries.get(base) else {
            return Err(store.not_found(base));
        };

        Ok(match scope {
            Scope::Base => vec![SearchEntry {
                dn: base.to_string(),
                attributes: project(entry, attributes),
            }],
            Scope::OneLevel => store
                .entries
                .iter()
                .filter(|(dn, _)| dn.parent().as_ref() == Some(base))
                .map(|(dn, attrs)| SearchEntry {
                    dn: dn.to_string(),
                    attributes: project(attrs, attributes),
                })
                .collect(),
        })
    }

    fn modify(
        &mut self,
        dn: &Dn,
        old: &Attributes,
        new: &Attributes,
    ) -> Result<(), DirectoryError> {
        let mut store = self.store.borrow_mut();
        store.counts.modifies += 1;
        store.take_failure()?;

        let Some(current) = store.entries.get(dn) else {
            return Err(store.not_found(dn));
        };

        let mods = attributes::modifications(old, new);
        let mut staged = current.clone();
        for m in &mods {
            store.check_schema(m.attribute())?;
            match m {
                Modification::Add { attribute, values } => {
                    let existing = staged.get(attribute);
                    let clashing: Vec<String> = values
                        .iter()
                        .filter(|v| existing.is_some_and(|e| e.contains(*v)))
                        .cloned()
                        .collect();
                    if !clashing.is_empty() {
                        let mut clash = Attributes::new();
                        clash.insert(attribute.clone(), clashing);
                        return Err(DirectoryError::ValueAlreadyExists {
                            dn: dn.to_string(),
                            attributes: clash,
                        });
                    }
                }
                Modification::Delete { attribute, values } => {
                    let existing = staged.get(attribute);
                    if let Some(missing) = values
                        .iter()
                        .find(|v| !existing.is_some_and(|e| e.contains(*v)))
                    {
                        return Err(DirectoryError::Protocol {
                            message: format!("No such attribute value: {attribute}={missing}"),
                        });
                    }
                }
            }
            attributes::apply(&mut staged, std::slice::from_ref(m));
        }

        trace!(dn = %dn, changes = mods.len(), "memory modify");
        store.entries.insert(dn.clone(), staged);
        Ok(())
    }

    fn add(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError> {
        let mut store = self.store.borrow_mut();
        store.counts.adds += 1;
        store.take_failure()?;

        if dn.is_root() {
            return Err(DirectoryError::Protocol {
                message: "Cannot add the root DSE".into(),
            });
        }
        if store.entries.contains_key(dn) {
            return Err(DirectoryError::AlreadyExists { dn: dn.to_string() });
        }
        let parent_missing = dn
            .parent()
            .is_some_and(|p| !p.is_root() && !store.entries.contains_key(&p));
        if parent_missing && !store.is_root(dn) {
            return Err(store.not_found(dn));
        }
        for (name, values) in attributes {
            store.check_schema(name)?;
            let mut seen = BTreeSet::new();
            if let Some(dup) = values.iter().find(|v| !seen.insert(v.as_str())) {
                let mut clash = Attributes::new();
                clash.insert(name.clone(), vec![dup.clone()]);
                return Err(DirectoryError::ValueAlreadyExists {
                    dn: dn.to_string(),
                    attributes: clash,
                });
            }
        }

        trace!(dn = %dn, "memory add");
        store.entries.insert(dn.clone(), attributes.clone());
        Ok(())
    }

    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError> {
        let mut store = self.store.borrow_mut();
        store.counts.deletes += 1;
        store.take_failure()?;

        if !store.entries.contains_key(dn) {
            return Err(store.not_found(dn));
        }
        if store.has_children(dn) {
            return Err(DirectoryError::Protocol {
                message: format!("Operation not allowed on non-leaf: {dn}"),
            });
        }
        trace!(dn = %dn, "memory delete");
        store.entries.shift_remove(dn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    fn one(name: &str, value: &str) -> Attributes {
        let mut a = Attributes::new();
        a.insert(name.into(), vec![value.into()]);
        a
    }

    fn sample() -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        dir.add_root("dc=example,dc=com");
        dir.insert("dc=example,dc=com", one("objectClass", "top")).unwrap();
        dir.insert("ou=People,dc=example,dc=com", one("ou", "People"))
            .unwrap();
        dir
    }

    #[test]
    fn test_search_levels() {
        let mut dir = sample();
        let base = dir
            .search(&dn("dc=example,dc=com"), Scope::Base, None)
            .unwrap();
        assert_eq!(base.len(), 1);
        let children = dir
            .search(&dn("dc=example,dc=com"), Scope::OneLevel, None)
            .unwrap();
        assert_eq!(children[0].dn, "ou=People,dc=example,dc=com");
        assert_eq!(dir.counts().searches, 2);
    }

    #[test]
    fn test_search_missing_reports_matched() {
        let mut dir = sample();
        let err = dir
            .search(&dn("cn=x,ou=Nope,dc=example,dc=com"), Scope::Base, None)
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::ObjectNotFound {
                dn: "cn=x,ou=Nope,dc=example,dc=com".into(),
                matched: Some("dc=example,dc=com".into()),
            }
        );
    }

    #[test]
    fn test_root_dse_lists_naming_contexts() {
        let mut dir = sample();
        let dse = dir
            .search(&Dn::root(), Scope::Base, Some(&["namingContexts"]))
            .unwrap();
        assert_eq!(
            dse[0].attributes.get("namingContexts"),
            Some(&vec!["dc=example,dc=com".to_string()])
        );
    }

    #[test]
    fn test_add_requires_parent_and_uniqueness() {
        let mut dir = sample();
        let err = dir
            .add(&dn("cn=x,ou=Nope,dc=example,dc=com"), &one("cn", "x"))
            .unwrap_err();
        assert!(err.is_not_found());

        dir.add(&dn("cn=x,ou=People,dc=example,dc=com"), &one("cn", "x"))
            .unwrap();
        let err = dir
            .add(&dn("cn=x,ou=People,dc=example,dc=com"), &one("cn", "x"))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyExists { .. }));
    }

    #[test]
    fn test_modify_rejects_existing_value_and_schema() {
        let mut dir = sample();
        dir.set_schema(["objectClass", "ou", "description"]);
        let target = dn("ou=People,dc=example,dc=com");

        let err = dir
            .modify(&target, &Attributes::new(), &one("ou", "People"))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::ValueAlreadyExists { .. }));

        let err = dir
            .modify(&target, &Attributes::new(), &one("foo", "bar"))
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::UndefinedAttributeType {
                attribute: "foo".into()
            }
        );

        dir.modify(&target, &Attributes::new(), &one("description", "d"))
            .unwrap();
        assert_eq!(
            dir.entry("ou=People,dc=example,dc=com")
                .unwrap()
                .get("description"),
            Some(&vec!["d".to_string()])
        );
    }

    #[test]
    fn test_delete_leaf_only() {
        let mut dir = sample();
        let err = dir.delete(&dn("dc=example,dc=com")).unwrap_err();
        assert!(matches!(err, DirectoryError::Protocol { .. }));
        dir.delete(&dn("ou=People,dc=example,dc=com")).unwrap();
        assert!(!dir.contains("ou=People,dc=example,dc=com"));
        assert!(dir.delete(&dn("ou=People,dc=example,dc=com")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_injected_failure_is_consumed() {
        let mut dir = sample();
        dir.fail_next(DirectoryError::Protocol {
            message: "boom".into(),
        });
        assert!(dir.search(&dn("dc=example,dc=com"), Scope::Base, None).is_err());
        assert!(dir.search(&dn("dc=example,dc=com"), Scope::Base, None).is_ok());
    }

    #[test]
    fn test_from_json_fixture() {
        let dir = MemoryDirectory::from_json(
            r#"{
                "roots": ["dc=example,dc=com"],
                "entries": [
                    {"dn": "dc=example,dc=com", "attributes": {"objectClass": ["top", "domain"]}},
                    {"dn": "ou=People, dc=example, dc=com", "attributes": {"ou": ["People"]}}
                ]
            }"#,
        )
        .unwrap();
        assert!(dir.contains("ou=People,dc=example,dc=com"));
        assert_eq!(
            dir.entry("dc=example,dc=com").unwrap()["objectClass"],
            vec!["top".to_string(), "domain".to_string()]
        );
    }

    #[test]
    fn test_from_json_rejects_bad_dn() {
        let err = MemoryDirectory::from_json(r#"{"roots": [], "entries": [{"dn": "bogus"}]}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Malformed DN: bogus");
    }
}

//! Directory connector backed by an LDAP server, using the synchronous
//! `ldap3` client.

use std::collections::HashSet;

use ldap3::{LdapConn, LdapError, LdapResult, Mod};
use tracing::{debug, info};

use crate::attributes::{self, Attributes, Modification};
use crate::connector::{DirectoryConnector, Scope, SearchEntry};
use crate::dn::Dn;
use crate::error::{ConnectError, DirectoryError};

const ALL_OBJECTS: &str = "(objectClass=*)";
const ALL_USER_ATTRIBUTES: &str = "*";
const NAMING_CONTEXTS: &str = "namingContexts";

/// LDAP result codes the shell distinguishes.
mod rc {
    pub const UNDEFINED_ATTRIBUTE_TYPE: u32 = 17;
    pub const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
    pub const NO_SUCH_OBJECT: u32 = 32;
    pub const INVALID_CREDENTIALS: u32 = 49;
    pub const UNWILLING_TO_PERFORM: u32 = 53;
    pub const ALREADY_EXISTS: u32 = 68;
}

/// A connection to one LDAP server.
pub struct LdapConnector {
    uri: String,
    conn: LdapConn,
    roots: Option<Vec<String>>,
}

impl std::fmt::Debug for LdapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnector")
            .field("uri", &self.uri)
            .field("roots", &self.roots)
            .finish()
    }
}

fn server_text(e: &LdapError) -> Option<String> {
    match e {
        LdapError::LdapResult { result } if !result.text.is_empty() => Some(result.text.clone()),
        LdapError::LdapResult { .. } => None,
        other => Some(other.to_string()),
    }
}

impl LdapConnector {
    /// Open a connection to `uri` (`ldap://`, `ldaps://` or `ldapi://`).
    pub fn connect(uri: &str) -> Result<Self, ConnectError> {
        info!(uri, "Connecting");
        let conn = LdapConn::new(uri).map_err(|e| ConnectError::Connectivity {
            uri: uri.to_string(),
            info: server_text(&e),
        })?;
        Ok(Self {
            uri: uri.to_string(),
            conn,
            roots: None,
        })
    }

    /// Simple bind. An empty principal binds anonymously.
    pub fn bind(&mut self, principal: &str, credential: &str) -> Result<(), ConnectError> {
        info!(principal, "Binding");
        let result = self
            .conn
            .simple_bind(principal, credential)
            .and_then(LdapResult::success);

        match result {
            Ok(_) => Ok(()),
            Err(LdapError::LdapResult { result }) => {
                let info = Some(result.text).filter(|t| !t.is_empty());
                Err(match result.rc {
                    rc::INVALID_CREDENTIALS => ConnectError::Authentication {
                        principal: principal.to_string(),
                        info,
                    },
                    rc::UNWILLING_TO_PERFORM => ConnectError::PolicyRejected { info },
                    _ => ConnectError::Connectivity {
                        uri: self.uri.clone(),
                        info,
                    },
                })
            }
            Err(e) => Err(ConnectError::Connectivity {
                uri: self.uri.clone(),
                info: server_text(&e),
            }),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Translate a failed operation on `dn`.
fn directory_error(e: LdapError, dn: &Dn, attributes: &Attributes) -> DirectoryError {
    match e {
        LdapError::LdapResult { result } => match result.rc {
            rc::NO_SUCH_OBJECT => DirectoryError::ObjectNotFound {
                dn: dn.to_string(),
                matched: Some(result.matched).filter(|m| !m.is_empty()),
            },
            rc::ALREADY_EXISTS => DirectoryError::AlreadyExists { dn: dn.to_string() },
            rc::UNDEFINED_ATTRIBUTE_TYPE => DirectoryError::UndefinedAttributeType {
                attribute: undefined_attribute(&result.text, attributes),
            },
            rc::ATTRIBUTE_OR_VALUE_EXISTS => DirectoryError::ValueAlreadyExists {
                dn: dn.to_string(),
                attributes: attributes.clone(),
            },
            _ if result.text.is_empty() => DirectoryError::Protocol {
                message: format!("result code {}", result.rc),
            },
            _ => DirectoryError::Protocol {
                message: result.text,
            },
        },
        other => DirectoryError::Protocol {
            message: other.to_string(),
        },
    }
}

/// Servers name the offending type in the diagnostic text, e.g.
/// `foo: attribute type undefined`. Fall back to the request's attributes.
fn undefined_attribute(text: &str, attributes: &Attributes) -> String {
    if let Some((name, _)) = text.split_once(':')
        && attributes.keys().any(|a| a.eq_ignore_ascii_case(name.trim()))
    {
        return name.trim().to_string();
    }
    attributes
        .keys()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_mod(m: Modification) -> Mod<String> {
    match m {
        Modification::Add { attribute, values } => {
            Mod::Add(attribute, values.into_iter().collect::<HashSet<_>>())
        }
        Modification::Delete { attribute, values } => {
            Mod::Delete(attribute, values.into_iter().collect::<HashSet<_>>())
        }
    }
}

impl DirectoryConnector for LdapConnector {
    fn roots(&mut self) -> Result<Vec<String>, DirectoryError> {
        if let Some(roots) = &self.roots {
            return Ok(roots.clone());
        }

        let dse = self.search(&Dn::root(), Scope::Base, Some(&[NAMING_CONTEXTS]))?;
        let roots: Vec<String> = dse
            .into_iter()
            .flat_map(|entry| {
                entry
                    .attributes
                    .into_iter()
                    .filter(|(name, _)| name.eq_ignore_ascii_case(NAMING_CONTEXTS))
                    .flat_map(|(_, values)| values)
            })
            .collect();
        debug!(roots = ?roots, "Read naming contexts");
        self.roots = Some(roots.clone());
        Ok(roots)
    }

    fn search(
        &mut self,
        base: &Dn,
        scope: Scope,
        attributes: Option<&[&str]>,
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        let base_text = base.to_string();
        let requested: Vec<&str> = attributes
            .map(<[&str]>::to_vec)
            .unwrap_or_else(|| vec![ALL_USER_ATTRIBUTES]);
        let ldap_scope = match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::OneLevel => ldap3::Scope::OneLevel,
        };
        debug!(base = %base_text, ?scope, attributes = ?requested, "LDAP search");

        let (entries, _) = self
            .conn
            .search(&base_text, ldap_scope, ALL_OBJECTS, requested)
            .and_then(|r| r.success())
            .map_err(|e| directory_error(e, base, &Attributes::new()))?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = ldap3::SearchEntry::construct(raw);
                let mut names: Vec<String> = entry.attrs.keys().cloned().collect();
                names.sort_by_key(|n| n.to_ascii_lowercase());
                let mut attrs = entry.attrs;
                let attributes = names
                    .into_iter()
                    .filter_map(|n| attrs.remove(&n).map(|v| (n, v)))
                    .collect();
                SearchEntry {
                    dn: entry.dn,
                    attributes,
                }
            })
            .collect())
    }

    fn modify(
        &mut self,
        dn: &Dn,
        old: &Attributes,
        new: &Attributes,
    ) -> Result<(), DirectoryError> {
        let mods = attributes::modifications(old, new);
        if mods.is_empty() {
            return Ok(());
        }
        debug!(dn = %dn, ?mods, "LDAP modify");

        let added: Attributes = mods
            .iter()
            .filter_map(|m| match m {
                Modification::Add { attribute, values } => {
                    Some((attribute.clone(), values.clone()))
                }
                Modification::Delete { .. } => None,
            })
            .collect();
        let touched: Attributes = mods
            .iter()
            .map(|m| (m.attribute().to_string(), m.values().to_vec()))
            .collect();

        let dn_text = dn.to_string();
        self.conn
            .modify(&dn_text, mods.into_iter().map(to_mod).collect())
            .and_then(LdapResult::success)
            .map_err(|e| {
                let exists = matches!(
                    &e,
                    LdapError::LdapResult { result } if result.rc == rc::ATTRIBUTE_OR_VALUE_EXISTS
                );
                directory_error(e, dn, if exists { &added } else { &touched })
            })?;
        Ok(())
    }

    fn add(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError> {
        debug!(dn = %dn, ?attributes, "LDAP add");
        let request: Vec<(String, HashSet<String>)> = attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect();
        self.conn
            .add(&dn.to_string(), request)
            .and_then(LdapResult::success)
            .map_err(|e| directory_error(e, dn, attributes))?;
        Ok(())
    }

    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError> {
        debug!(dn = %dn, "LDAP delete");
        self.conn
            .delete(&dn.to_string())
            .and_then(LdapResult::success)
            .map_err(|e| directory_error(e, dn, &Attributes::new()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(rc: u32, matched: &str, text: &str) -> LdapError {
        LdapError::LdapResult {
            result: LdapResult {
                rc,
                matched: matched.to_string(),
                text: text.to_string(),
                refs: Vec::new(),
                ctrls: Vec::new(),
            },
        }
    }

    fn one(name: &str, value: &str) -> Attributes {
        let mut a = Attributes::new();
        a.insert(name.into(), vec![value.into()]);
        a
    }

    #[test]
    fn test_result_code_mapping() {
        let dn = Dn::parse("cn=x,dc=example").unwrap();

        assert_eq!(
            directory_error(failure(32, "dc=example", ""), &dn, &Attributes::new()),
            DirectoryError::ObjectNotFound {
                dn: "cn=x,dc=example".into(),
                matched: Some("dc=example".into()),
            }
        );
        assert_eq!(
            directory_error(failure(68, "", ""), &dn, &Attributes::new()),
            DirectoryError::AlreadyExists {
                dn: "cn=x,dc=example".into()
            }
        );
        assert_eq!(
            directory_error(
                failure(17, "", "foo: attribute type undefined"),
                &dn,
                &one("foo", "bar")
            ),
            DirectoryError::UndefinedAttributeType {
                attribute: "foo".into()
            }
        );
        assert!(matches!(
            directory_error(failure(20, "", ""), &dn, &one("cn", "x")),
            DirectoryError::ValueAlreadyExists { .. }
        ));
        assert_eq!(
            directory_error(failure(50, "", "insufficient access"), &dn, &Attributes::new())
                .to_string(),
            "LDAP error: insufficient access"
        );
    }

    #[test]
    fn test_server_text() {
        assert_eq!(server_text(&failure(49, "", "")), None);
        assert_eq!(
            server_text(&failure(49, "", "bad password")),
            Some("bad password".into())
        );
    }
}

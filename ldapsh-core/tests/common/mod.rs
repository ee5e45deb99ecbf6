//! Shared fixtures for integration tests.

use ldapsh_core::{Attributes, DirectoryTree, MemoryDirectory, Navigator};

pub const FIXTURE: &str = r#"{
    "roots": ["dc=example,dc=com", "dc=other,dc=com"],
    "schema": ["objectClass", "dc", "ou", "cn", "sn", "description", "member"],
    "entries": [
        {"dn": "dc=example,dc=com", "attributes": {"objectClass": ["top", "domain"], "dc": ["example"]}},
        {"dn": "ou=people,dc=example,dc=com", "attributes": {"objectClass": ["organizationalUnit"], "ou": ["people"]}},
        {"dn": "cn=x,ou=people,dc=example,dc=com", "attributes": {"objectClass": ["person"], "cn": ["x"], "sn": ["X"]}},
        {"dn": "cn=y,ou=people,dc=example,dc=com", "attributes": {"objectClass": ["person"], "cn": ["y"], "sn": ["Y"]}},
        {"dn": "ou=groups,dc=example,dc=com", "attributes": {"objectClass": ["organizationalUnit"], "ou": ["groups"]}},
        {"dn": "dc=other,dc=com", "attributes": {"objectClass": ["top", "domain"], "dc": ["other"]}}
    ]
}"#;

pub fn directory() -> MemoryDirectory {
    MemoryDirectory::from_json(FIXTURE).expect("fixture parses")
}

pub fn navigator() -> (Navigator, MemoryDirectory) {
    let dir = directory();
    let tree = DirectoryTree::new(Box::new(dir.clone())).expect("tree builds");
    (Navigator::new(tree), dir)
}

pub fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

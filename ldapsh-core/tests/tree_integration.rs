//! End-to-end behaviour of the tree cache and navigation against an
//! in-memory directory.

mod common;

use pretty_assertions::assert_eq;

use common::{attrs, navigator};
use ldapsh_core::{DirectoryError, DnError, NavigationError, NodeError};

#[test]
fn root_lists_both_naming_contexts() {
    let (mut nav, _) = navigator();
    assert_eq!(
        nav.children().unwrap(),
        vec!["dc=example,dc=com", "dc=other,dc=com"]
    );
}

#[test]
fn cd_up_from_root_and_back() {
    let (mut nav, _) = navigator();
    let root = nav.cwd();
    assert_eq!(nav.change_directory("..").unwrap_err(), NavigationError::AlreadyAtBoundary);

    nav.change_directory("dc=example,dc=com").unwrap();
    nav.change_directory("ou=people").unwrap();
    nav.change_directory("..").unwrap();
    nav.change_directory("..").unwrap();
    assert_eq!(nav.cwd(), root);
}

#[test]
fn modify_then_cat_then_remove() {
    let (mut nav, dir) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    nav.change_directory("ou=people").unwrap();

    nav.set_attribute("cn=x", "description", Some("hello"), None)
        .unwrap();
    assert_eq!(
        nav.attributes("cn=x").unwrap()["description"],
        vec!["hello".to_string()]
    );
    assert_eq!(
        dir.entry("cn=x,ou=people,dc=example,dc=com").unwrap()["description"],
        vec!["hello".to_string()]
    );

    nav.set_attribute("cn=x", "description", None, Some("hello"))
        .unwrap();
    assert!(!nav.attributes("cn=x").unwrap().contains_key("description"));
    assert!(
        !dir.entry("cn=x,ou=people,dc=example,dc=com")
            .unwrap()
            .contains_key("description")
    );
}

#[test]
fn replace_keeps_other_equal_values() {
    let (mut nav, _) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    nav.add("cn=dup", attrs(&[("cn", &["dup"]), ("sn", &["only"])]))
        .unwrap();

    nav.set_attribute("cn=dup", "sn", Some("changed"), Some("only"))
        .unwrap();
    assert_eq!(nav.attributes("cn=dup").unwrap()["sn"], vec!["changed".to_string()]);

    nav.set_attribute("cn=dup", "description", Some("a"), None)
        .unwrap();
    nav.set_attribute("cn=dup", "description", Some("b"), None)
        .unwrap();
    nav.set_attribute("cn=dup", "description", Some("c"), Some("a"))
        .unwrap();
    assert_eq!(
        nav.attributes("cn=dup").unwrap()["description"],
        vec!["c".to_string(), "b".to_string()]
    );
}

#[test]
fn adding_existing_value_is_rejected_and_cache_unchanged() {
    let (mut nav, _) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    let err = nav
        .set_attribute("ou=people", "ou", Some("people"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        NavigationError::Node(NodeError::Directory(DirectoryError::ValueAlreadyExists { .. }))
    ));
    assert_eq!(nav.attributes("ou=people").unwrap()["ou"], vec!["people".to_string()]);
}

#[test]
fn undefined_attribute_type_is_reported() {
    let (mut nav, _) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    let err = nav
        .set_attribute("ou=people", "foo", Some("bar"), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "Undefined attribute type: foo");
    assert!(!nav.attributes("ou=people").unwrap().contains_key("foo"));
}

#[test]
fn recursive_delete_twice() {
    let (mut nav, dir) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    nav.change_directory("ou=people").unwrap();
    nav.change_directory("..").unwrap();

    nav.delete("ou=people").unwrap();
    assert!(!dir.contains("cn=x,ou=people,dc=example,dc=com"));
    assert!(!dir.contains("ou=people,dc=example,dc=com"));
    assert_eq!(nav.children().unwrap(), vec!["ou=groups"]);

    let err = nav.delete("ou=people").unwrap_err();
    assert_eq!(
        err.to_string(),
        "DN does not exist: ou=people,dc=example,dc=com"
    );
}

#[test]
fn add_then_delete_round_trip() {
    let (mut nav, dir) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    let before = nav.children().unwrap();

    nav.add("ou=devices", attrs(&[("objectClass", &["organizationalUnit"]), ("ou", &["devices"])]))
        .unwrap();
    assert_eq!(nav.children().unwrap().len(), before.len() + 1);

    let searches = dir.counts().searches;
    assert_eq!(nav.attributes("ou=devices").unwrap()["ou"], vec!["devices".to_string()]);
    assert_eq!(dir.counts().searches, searches);

    nav.delete("ou=devices").unwrap();
    assert_eq!(nav.children().unwrap(), before);
}

#[test]
fn add_below_missing_parent_fails() {
    let (mut nav, _) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    nav.change_directory("ou=groups").unwrap();
    nav.delete(".").unwrap();

    let err = nav.add("cn=z", attrs(&[("cn", &["z"])])).unwrap_err();
    assert!(matches!(
        err,
        NavigationError::Node(NodeError::Directory(DirectoryError::ObjectNotFound { .. }))
    ));
}

#[test]
fn add_rejects_nested_names_and_leaves_cache_alone() {
    let (mut nav, dir) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    nav.change_directory("ou=people").unwrap();
    let people = nav.children().unwrap();
    nav.change_directory("..").unwrap();
    let top = nav.children().unwrap();

    let err = nav
        .add("cn=z,ou=people", attrs(&[("cn", &["z"])]))
        .unwrap_err();
    assert!(matches!(
        err,
        NavigationError::Node(NodeError::Dn(DnError::Malformed { .. }))
    ));
    assert!(!dir.contains("cn=z,ou=people,dc=example,dc=com"));
    assert_eq!(nav.children().unwrap(), top);

    nav.change_directory("ou=people").unwrap();
    assert_eq!(nav.children().unwrap(), people);
    nav.add("cn=z", attrs(&[("cn", &["z"])])).unwrap();
    assert_eq!(nav.cwd(), "ou=people,dc=example,dc=com");
    nav.change_directory("cn=z").unwrap();
    assert_eq!(nav.cwd(), "cn=z,ou=people,dc=example,dc=com");
}

#[test]
fn listing_is_fetched_once() {
    let (mut nav, dir) = navigator();
    nav.change_directory("dc=example,dc=com").unwrap();
    let searches = dir.counts().searches;
    nav.children().unwrap();
    nav.complete_child("ou=").unwrap();
    nav.change_directory("ou=people").unwrap();
    nav.change_directory("..").unwrap();
    nav.children().unwrap();
    assert_eq!(dir.counts().searches, searches + 1);
}

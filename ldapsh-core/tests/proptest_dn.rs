//! Property-based tests for name arithmetic using proptest.

use proptest::prelude::*;

use ldapsh_core::dn::{Dn, Rdn};

fn rdn() -> impl Strategy<Value = Rdn> {
    (
        prop::sample::select(vec!["cn", "ou", "dc", "uid"]),
        "[a-zA-Z0-9 ,+=#;<>\"\\\\]{1,8}",
    )
        .prop_map(|(attribute, value)| Rdn::new(attribute, value))
}

fn dn(max: usize) -> impl Strategy<Value = Dn> {
    prop::collection::vec(rdn(), 1..=max).prop_map(Dn::from_rdns)
}

proptest! {
    #[test]
    fn display_then_parse_is_identity(name in dn(5)) {
        let text = name.to_string();
        prop_assert_eq!(Dn::parse(&text).unwrap(), name);
    }

    #[test]
    fn relative_name_rejoins_to_full_name(
        (name, split) in dn(6).prop_flat_map(|n| {
            let len = n.len();
            (Just(n), 1..len.max(2))
        })
    ) {
        prop_assume!(split < name.len());
        let ancestor = Dn::from_rdns(name.rdns()[split..].to_vec());
        let relative = name.relative_to(&ancestor);
        prop_assert_eq!(relative.len(), split);
        prop_assert_eq!(ancestor.join(&relative), name.clone());
        prop_assert!(name.is_descendant_of(&ancestor));
    }

    #[test]
    fn unrelated_ancestor_yields_full_name(name in dn(5)) {
        let unrelated = Dn::from_rdns(vec![Rdn::new("o", "elsewhere")]);
        let relative = name.relative_to(&unrelated);
        prop_assert_eq!(&relative, &name);
        prop_assert_eq!(relative.relative_to(&unrelated), name);
    }

    #[test]
    fn parent_is_one_shorter(name in dn(5)) {
        let parent = name.parent().unwrap();
        prop_assert_eq!(parent.len() + 1, name.len());
        prop_assert_eq!(name.relative_to(&parent).len(), 1);
    }
}

//! Property-based tests for template source parsing.
//!
//! These tests use proptest to generate random repository locations and
//! verify that parsing recovers every component.

#[cfg(test)]
mod proptest_tests {
    use crate::source::parse;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,15}"
    }

    fn reference() -> impl Strategy<Value = String> {
        prop_oneof![
            "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
            "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}\\+[a-z0-9]{1,6}(\\.[0-9]{1,3})?",
            "[a-z]{1,8}(/[a-z]{1,8})?",
            "[0-9a-f]{7,40}",
        ]
    }

    proptest! {
        /// Property: https sources recover namespace, name, subpath and ref
        #[test]
        fn parse_recovers_components(
            ns in segment(),
            name in segment(),
            subpath in proptest::option::of(segment()),
            reference in proptest::option::of(reference()),
        ) {
            let mut source = format!("https://example.com/{}/{}", ns, name);
            if let Some(subpath) = &subpath {
                source.push_str("//");
                source.push_str(subpath);
            }
            if let Some(reference) = &reference {
                source.push_str("?ref=");
                source.push_str(reference);
            }

            let repo = parse(&source).unwrap();
            prop_assert_eq!(repo.namespace, ns.clone());
            prop_assert_eq!(repo.name, name.clone());
            prop_assert_eq!(repo.subpath, subpath);
            prop_assert_eq!(repo.reference, reference);
            prop_assert_eq!(repo.link, format!("https://example.com/{}/{}", ns, name));
        }

        /// Property: a versioned source parses back to the same location
        #[test]
        fn versioned_source_round_trips(
            ns in segment(),
            name in segment(),
            subpath in proptest::option::of(segment()),
            reference in reference(),
        ) {
            let mut source = format!("git::https://example.com/{}/{}.git", ns, name);
            if let Some(subpath) = &subpath {
                source.push_str("//");
                source.push_str(subpath);
            }

            let repo = parse(&source).unwrap();
            let reparsed = parse(&repo.versioned_source(&reference)).unwrap();
            prop_assert_eq!(reparsed.reference.as_deref(), Some(reference.as_str()));
            prop_assert_eq!(&reparsed.link, &repo.link);
            prop_assert_eq!(&reparsed.subpath, &repo.subpath);
            prop_assert_eq!(&reparsed.namespace, &repo.namespace);
            prop_assert_eq!(&reparsed.name, &repo.name);
        }

        /// Property: parsing never panics on arbitrary input
        #[test]
        fn parse_never_panics(input in ".*") {
            let _ = parse(&input);
        }

        /// Property: parsing is deterministic
        #[test]
        fn parse_is_deterministic(input in ".*") {
            let first = parse(&input).ok();
            let second = parse(&input).ok();
            prop_assert_eq!(first, second);
        }
    }
}

//! Property tests for the placeholder rewriter.

use proptest::prelude::*;
use sqlprobe::preprocess::preprocess_sql;

proptest! {
    // A source with no placeholders (and no quoting) passes through
    // byte-identically.
    #[test]
    fn placeholder_free_sources_pass_through(src in "[a-zA-Z0-9 ,.=<>()*+-]{0,80}") {
        let got = preprocess_sql(&src).unwrap();
        prop_assert_eq!(got.sql, src);
        prop_assert!(got.param_names.is_empty());
    }

    // Every `${name}` occurrence is rewritten to `$k` where k is the
    // 1-based first-appearance index of that name.
    #[test]
    fn names_map_to_first_appearance_indices(
        names in proptest::collection::vec("[a-z_][a-z0-9_]{0,8}", 1..6)
    ) {
        let src = names
            .iter()
            .map(|n| format!("${{{}}}", n))
            .collect::<Vec<_>>()
            .join(" , ");
        let got = preprocess_sql(&src).unwrap();

        let mut expected = Vec::new();
        for name in &names {
            if !expected.contains(name) {
                expected.push(name.clone());
            }
        }
        prop_assert_eq!(&got.param_names, &expected);

        let occurrences: Vec<&str> = got.sql.split(" , ").collect();
        prop_assert_eq!(occurrences.len(), names.len());
        for (occurrence, name) in occurrences.iter().zip(&names) {
            let index = got.param_names.iter().position(|p| p == name).unwrap() + 1;
            let expected_occurrence = format!("${}", index);
            prop_assert_eq!(*occurrence, expected_occurrence.as_str());
        }
    }
}

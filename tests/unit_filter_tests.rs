//! # Filter Module Unit Tests / Filter 模块单元测试
//!
//! Unit tests for the pure tree transform: predicate matching, empty
//! subtree pruning, and hook-reference sharing.
//!
//! 纯树变换的单元测试：谓词匹配、空子树剪除与钩子引用共享。

use std::rc::Rc;

use context_runner::core::context::{Context, Entry, TestBody};
use context_runner::core::filter::{Predicate, filter_context};

fn noop() -> Entry {
    Entry::Body(TestBody::sync(|_| {}))
}

fn test_names(context: &Rc<Context>) -> Vec<String> {
    context.tests().iter().map(|t| t.name().to_string()).collect()
}

mod predicate_tests {
    use super::*;

    #[test]
    fn text_matching_is_case_insensitive() {
        let predicate = Predicate::text("Suite ADDS");
        assert!(predicate.matches("suite adds two numbers"));
        assert!(!predicate.matches("suite subtracts"));
    }

    #[test]
    fn patterns_match_case_insensitively() {
        let predicate = Predicate::pattern("TEST \\d").expect("pattern should compile");
        assert!(predicate.matches("suite Test 1"));
        assert!(!predicate.matches("suite test one"));
    }

    #[test]
    fn lists_are_or_combined() {
        let predicate = Predicate::any(vec![
            Predicate::text("adds"),
            Predicate::pattern("overflow").expect("pattern should compile"),
        ]);
        assert!(predicate.matches("suite adds"));
        assert!(predicate.matches("suite handles OVERFLOW"));
        assert!(!predicate.matches("suite subtracts"));
    }
}

mod filter_tests {
    use super::*;

    #[test]
    fn keeps_matching_tests_in_declaration_order() {
        let context = Context::from_entries(
            "suite",
            vec![
                ("test 1".to_string(), noop()),
                ("test 2".to_string(), noop()),
                ("should be dropped".to_string(), noop()),
            ],
        )
        .expect("definition should be valid");

        let filtered = filter_context(&context, Some(&Predicate::text("test ")), "")
            .expect("filtering should succeed")
            .expect("the context retains tests");

        assert_eq!(test_names(&filtered), vec!["test 1", "test 2"]);
    }

    #[test]
    fn a_name_match_alone_keeps_no_subcontext() {
        let context = Context::from_entries(
            "suite",
            vec![("something".to_string(), Entry::Group(vec![]))],
        )
        .expect("definition should be valid");

        // The subcontext name matches, but its subtree has no tests.
        let filtered = filter_context(&context, Some(&Predicate::text("something")), "")
            .expect("filtering should succeed");
        assert!(filtered.is_none());
    }

    #[test]
    fn matching_is_against_the_space_joined_full_path() {
        let context = Context::from_entries(
            "outer",
            vec![(
                "inner".to_string(),
                Entry::Group(vec![("does stuff".to_string(), noop())]),
            )],
        )
        .expect("definition should be valid");

        let filtered = filter_context(&context, Some(&Predicate::text("outer inner does")), "")
            .expect("filtering should succeed")
            .expect("the nested test matches");

        assert!(test_names(&filtered).is_empty());
        let inner = filtered.contexts().remove(0);
        assert_eq!(test_names(&inner), vec!["does stuff"]);
    }

    #[test]
    fn no_predicate_is_an_identity_copy() {
        let context = Context::from_entries(
            "suite",
            vec![
                ("setUp".to_string(), noop()),
                ("adds".to_string(), noop()),
                ("empty corner".to_string(), Entry::Group(vec![])),
            ],
        )
        .expect("definition should be valid");

        let copied = filter_context(&context, None, "")
            .expect("filtering should succeed")
            .expect("identity copy always survives");

        assert_eq!(test_names(&copied), vec!["adds"]);
        // Without a predicate even testless subcontexts are retained.
        assert_eq!(copied.contexts().len(), 1);
    }

    #[test]
    fn surviving_nodes_share_hook_references_unchanged() {
        let context = Context::from_entries(
            "suite",
            vec![("setUp".to_string(), noop()), ("adds".to_string(), noop())],
        )
        .expect("definition should be valid");

        let filtered = filter_context(&context, Some(&Predicate::text("adds")), "")
            .expect("filtering should succeed")
            .expect("the test matches");

        let original_hook = context.get_set_up().expect("original has a set-up hook");
        let filtered_hook = filtered.get_set_up().expect("copy keeps the set-up hook");
        assert!(Rc::ptr_eq(&original_hook, &filtered_hook));
    }

    #[test]
    fn pruned_branches_are_omitted_not_replaced() {
        let context = Context::from_entries(
            "suite",
            vec![
                (
                    "kept".to_string(),
                    Entry::Group(vec![("target test".to_string(), noop())]),
                ),
                (
                    "dropped".to_string(),
                    Entry::Group(vec![("unrelated".to_string(), noop())]),
                ),
            ],
        )
        .expect("definition should be valid");

        let filtered = filter_context(&context, Some(&Predicate::text("target")), "")
            .expect("filtering should succeed")
            .expect("one branch survives");

        let children = filtered.contexts();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "kept");
    }
}

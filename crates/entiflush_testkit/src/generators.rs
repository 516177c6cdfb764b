//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity batches that keep the
//! invariants the engine relies on, such as acyclic category trees.

use crate::fixtures::{placeholder, Account, Category};
use proptest::prelude::*;
use proptest::sample::Index;

/// Strategy for an acyclic category forest of `1..=max_len` new nodes.
///
/// Node `i` gets placeholder key `-(i + 1)` and either no parent or an
/// earlier node as parent. The list is shuffled, so children often come
/// before their parents.
pub fn category_tree_strategy(max_len: usize) -> impl Strategy<Value = Vec<Category>> {
    prop::collection::vec(prop::option::of(any::<Index>()), 1..=max_len)
        .prop_map(|parents| {
            parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let parent_id = match parent {
                        Some(index) if i > 0 => Some(placeholder(index.index(i))),
                        _ => None,
                    };
                    Category::new(placeholder(i), parent_id, &format!("node {i}"))
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Strategy for a chain of `2..=max_len` new categories, each the parent of
/// the next, listed root first.
pub fn category_chain_strategy(max_len: usize) -> impl Strategy<Value = Vec<Category>> {
    (2..=max_len).prop_map(|len| {
        (0..len)
            .map(|i| {
                let parent_id = i.checked_sub(1).map(placeholder);
                Category::new(placeholder(i), parent_id, &format!("level {i}"))
            })
            .collect()
    })
}

/// Strategy for accounts with small key ranges, so that generated values
/// often collide on some fields and differ on others.
pub fn account_strategy() -> impl Strategy<Value = Account> {
    (
        0i64..4,
        prop::option::of(0i64..3),
        prop::string::string_regex("[a-c]{0,2}").expect("Invalid regex"),
    )
        .prop_map(|(id, department_id, email)| Account::new(id, department_id, &email))
}

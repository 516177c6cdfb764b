//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use entiflush_testkit::{placeholder, Account, Category};
use rand::seq::SliceRandom;
use rand::Rng;

/// Generates a shuffled category forest of `count` new nodes.
///
/// Each node has a one in eight chance of being a root; the others hang
/// under a random earlier node.
pub fn random_tree(count: usize) -> Vec<Category> {
    let mut rng = rand::thread_rng();
    let mut tree: Vec<Category> = (0..count)
        .map(|i| {
            let parent_id = (i > 0 && rng.gen_ratio(7, 8)).then(|| placeholder(rng.gen_range(0..i)));
            Category::new(placeholder(i), parent_id, "node")
        })
        .collect();
    tree.shuffle(&mut rng);
    tree
}

/// Generates a chain of `count` new categories, deepest first.
pub fn reversed_chain(count: usize) -> Vec<Category> {
    (0..count)
        .rev()
        .map(|i| Category::new(placeholder(i), i.checked_sub(1).map(placeholder), "level"))
        .collect()
}

/// Generates `count` accounts with random departments and addresses.
pub fn random_accounts(count: usize) -> Vec<Account> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let department_id = rng.gen_ratio(3, 4).then(|| rng.gen_range(1..16));
            let email = format!("user{}@example.com", rng.gen_range(0..64));
            Account::new(i as i64, department_id, &email)
        })
        .collect()
}

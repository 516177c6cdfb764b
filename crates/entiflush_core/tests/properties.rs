//! Property tests for write ordering, identity propagation and comparers.

use entiflush_backend::{BackendCall, Operation};
use entiflush_core::{EntityBatch, FlushConfig, SchemaRegistry, StructuralComparer};
use entiflush_testkit::prelude::*;
use entiflush_value::Value;
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

fn account_comparer(registry: &SchemaRegistry) -> StructuralComparer {
    let schema = registry.get::<Account>().unwrap();
    StructuralComparer::for_fields(&schema, &["department_id", "email"]).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn parents_are_inserted_before_children(tree in category_tree_strategy(16)) {
        let registry = SchemaRegistry::new();
        let mut backend = memory_backend();
        let mut batch = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in tree.clone() {
            batch.insert(category);
        }

        // The backend enforces the foreign key, so a child written before
        // its parent fails here.
        let written = batch
            .write_inserted(&mut backend, &FlushConfig::default())
            .unwrap();
        prop_assert_eq!(written as usize, tree.len());

        let mut seen = HashSet::new();
        for call in backend.calls() {
            let BackendCall::InsertWithIdentity { row, .. } = call else {
                continue;
            };
            if let Some(parent) = row.get("parent_id").filter(|p| !p.is_null()) {
                prop_assert!(seen.contains(parent), "parent {} not written before child", parent);
            }
            if let Some(Value::Integer(id)) = row.get("id") {
                let identity = batch.identities().resolve(&Value::Integer(*id)).cloned();
                prop_assert!(identity.is_some());
                seen.extend(identity);
            }
        }
    }

    #[test]
    fn every_placeholder_is_mapped(tree in category_tree_strategy(16)) {
        let registry = SchemaRegistry::new();
        let mut backend = memory_backend();
        let mut batch = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in tree.clone() {
            batch.insert(category);
        }
        batch.write_inserted(&mut backend, &FlushConfig::default()).unwrap();

        for original in &tree {
            let new = batch.identities().resolve(&Value::Integer(original.id));
            prop_assert!(new.is_some());
        }
        for category in batch.inserted() {
            prop_assert!(category.id >= CATEGORY_SEED);
            if let Some(parent) = category.parent_id {
                prop_assert!(batch.identities().contains_identity(&Value::Integer(parent)));
            }
        }
    }

    #[test]
    fn deletes_respect_foreign_keys(tree in category_tree_strategy(12), seed_order in any::<u64>()) {
        let registry = SchemaRegistry::new();
        let mut backend = memory_backend();
        let mut batch = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in tree {
            batch.insert(category);
        }
        batch.write_inserted(&mut backend, &FlushConfig::default()).unwrap();

        // Rotate the stored entities so deletes are not staged in insert order.
        let mut stored = batch.into_inserted();
        let len = stored.len();
        stored.rotate_left((seed_order as usize) % len);

        let mut deletes = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in stored {
            deletes.delete(category);
        }
        let deleted = deletes
            .write_deleted(&mut backend, &FlushConfig::default())
            .unwrap();

        prop_assert_eq!(deleted as usize, len);
        prop_assert!(backend.rows("categories").unwrap().is_empty());
        prop_assert_eq!(
            backend.calls().iter().filter(|c| c.operation() == Operation::Delete).count(),
            len
        );
    }

    #[test]
    fn chains_of_any_depth_round_trip(chain in category_chain_strategy(24)) {
        let registry = SchemaRegistry::new();
        let mut backend = memory_backend();
        let mut batch = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in chain.iter().rev().cloned() {
            batch.insert(category);
        }
        batch.write_inserted(&mut backend, &FlushConfig::default()).unwrap();

        let ids: Vec<_> = batch.inserted().iter().map(|c| (c.id, c.parent_id)).collect();
        let expected: Vec<_> = (0..chain.len() as i64)
            .map(|level| {
                let parent = (level > 0).then_some(CATEGORY_SEED + level - 1);
                (CATEGORY_SEED + level, parent)
            })
            .collect();
        prop_assert_eq!(ids, expected);

        // Staged root first, so every delete must be reordered.
        let mut deletes = EntityBatch::<Category>::from_registry(&registry).unwrap();
        for category in batch.into_inserted() {
            deletes.delete(category);
        }
        deletes.write_deleted(&mut backend, &FlushConfig::default()).unwrap();

        let keys: Vec<_> = backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Delete { key, .. } => key.get("id").cloned(),
                _ => None,
            })
            .collect();
        let leaf_first: Vec<_> = (0..chain.len() as i64)
            .rev()
            .map(|level| Value::Integer(CATEGORY_SEED + level))
            .collect();
        prop_assert_eq!(keys, leaf_first);
        prop_assert!(backend.rows("categories").unwrap().is_empty());
    }

    #[test]
    fn comparer_is_reflexive_and_consistent(a in account_strategy(), b in account_strategy()) {
        let registry = SchemaRegistry::new();
        let comparer = account_comparer(&registry);

        prop_assert_eq!(comparer.compare(Some(&a), Some(&a)).unwrap(), Ordering::Equal);

        let ab = comparer.compare(Some(&a), Some(&b)).unwrap();
        let ba = comparer.compare(Some(&b), Some(&a)).unwrap();
        prop_assert_eq!(ab, ba.reverse());
        prop_assert_eq!(comparer.equals(Some(&a), Some(&b)).unwrap(), ab == Ordering::Equal);

        let same_fields = a.department_id == b.department_id && a.email == b.email;
        prop_assert_eq!(ab == Ordering::Equal, same_fields);
        if same_fields {
            prop_assert_eq!(comparer.hash(&a).unwrap(), comparer.hash(&b).unwrap());
        }

        let typed = comparer.typed::<Account>().unwrap();
        prop_assert_eq!(typed.compare(&a, &b), ab);
    }

    #[test]
    fn comparer_is_transitive(
        a in account_strategy(),
        b in account_strategy(),
        c in account_strategy(),
    ) {
        let registry = SchemaRegistry::new();
        let comparer = account_comparer(&registry);
        let typed = comparer.typed::<Account>().unwrap();

        let mut sorted = [a, b, c];
        typed.sort(&mut sorted);
        prop_assert_ne!(typed.compare(&sorted[0], &sorted[1]), Ordering::Greater);
        prop_assert_ne!(typed.compare(&sorted[1], &sorted[2]), Ordering::Greater);
        prop_assert_ne!(typed.compare(&sorted[0], &sorted[2]), Ordering::Greater);
    }

    #[test]
    fn null_sorts_first(a in account_strategy(), b in account_strategy()) {
        let registry = SchemaRegistry::new();
        let comparer = account_comparer(&registry);
        let mut a = a;
        a.department_id = None;
        let mut b = b;
        b.department_id.get_or_insert(0);

        prop_assert_eq!(comparer.compare(Some(&a), Some(&b)).unwrap(), Ordering::Less);
        prop_assert_eq!(comparer.compare(None, Some(&a)).unwrap(), Ordering::Less);
    }
}

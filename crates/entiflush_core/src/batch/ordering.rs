//! Dependency-aware ordering of self-referencing entities.
//!
//! Each entity whose self-referencing key matches the parent key of another
//! entity in the same list depends on that entity. The order is produced by
//! repeatedly extracting the earliest entity whose dependencies are already
//! placed, so it is stable: entities that do not depend on each other keep
//! their request order.
//!
//! Only acyclic reference graphs can be ordered. A cycle, including an
//! entity that references itself, is reported as
//! [`CoreError::UnresolvableSelfReference`].

use crate::batch::IdentityMap;
use crate::error::{CoreError, CoreResult};
use crate::schema::{Accessor, EntitySchema, SelfReference};
use entiflush_value::Value;
use std::collections::{BTreeSet, HashMap};

/// Which end of each parent/child edge is written first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Parents before children, for inserts.
    ParentsFirst,
    /// Children before parents, for deletes.
    ChildrenFirst,
}

/// The write order of a list, with the in-list parent relation it was
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteOrder {
    /// Original indices, in write order.
    order: Vec<usize>,
    /// `parents[i]` holds the original indices of entity `i`'s in-list
    /// parents.
    parents: Vec<Vec<usize>>,
}

impl WriteOrder {
    fn unordered(len: usize) -> Self {
        Self {
            order: (0..len).collect(),
            parents: vec![Vec::new(); len],
        }
    }

    /// Returns the original indices in write order.
    pub(crate) fn indices(&self) -> &[usize] {
        &self.order
    }

    /// Returns, for each position of the reordered list, the positions of
    /// its in-list children.
    pub(crate) fn children_by_position(&self) -> Vec<Vec<usize>> {
        let mut position = vec![0; self.order.len()];
        for (at, &index) in self.order.iter().enumerate() {
            position[index] = at;
        }

        let mut children = vec![Vec::new(); self.order.len()];
        for (child, parents) in self.parents.iter().enumerate() {
            for &parent in parents {
                children[position[parent]].push(position[child]);
            }
        }
        children
    }
}

/// Computes the write order of `entities`.
///
/// Parent keys that match no entity in the list are treated as rows that
/// already exist. When `strict` carries the batch's identity map, such a
/// key must instead be a placeholder or identity recorded in the map.
pub(crate) fn dependency_order<T>(
    schema: &EntitySchema<T>,
    entities: &[T],
    direction: Direction,
    strict: Option<&IdentityMap>,
) -> CoreResult<WriteOrder> {
    let Some(reference) = schema.self_reference() else {
        return Ok(WriteOrder::unordered(entities.len()));
    };

    let mut positions: HashMap<Value, Vec<usize>> = HashMap::new();
    for (index, entity) in entities.iter().enumerate() {
        let key = reference.parent_key().get(entity);
        if !key.is_null() {
            positions.entry(key).or_default().push(index);
        }
    }

    // parents[i] holds the in-list parents of entity i.
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); entities.len()];
    for (index, entity) in entities.iter().enumerate() {
        let parent = reference.foreign_key().get(entity);
        if parent.is_null() {
            continue;
        }
        match positions.get(&parent) {
            Some(found) => {
                if found.contains(&index) {
                    return Err(unresolvable(schema, reference, entity));
                }
                parents[index].extend_from_slice(found);
            }
            None => {
                if let Some(identities) = strict {
                    if identities.resolve(&parent).is_none()
                        && !identities.contains_identity(&parent)
                    {
                        return Err(unresolvable(schema, reference, entity));
                    }
                }
            }
        }
    }

    let mut blocked = vec![0usize; entities.len()];
    let mut unlocks: Vec<Vec<usize>> = vec![Vec::new(); entities.len()];
    for (child, found) in parents.iter().enumerate() {
        for &parent in found {
            let (first, second) = match direction {
                Direction::ParentsFirst => (parent, child),
                Direction::ChildrenFirst => (child, parent),
            };
            blocked[second] += 1;
            unlocks[first].push(second);
        }
    }

    let mut ready: BTreeSet<usize> = (0..entities.len()).filter(|&i| blocked[i] == 0).collect();
    let mut order = Vec::with_capacity(entities.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &waiting in &unlocks[next] {
            blocked[waiting] -= 1;
            if blocked[waiting] == 0 {
                ready.insert(waiting);
            }
        }
    }

    if order.len() < entities.len() {
        // Everything left is on or behind a cycle. Report an entity whose
        // parent is also unplaced, which is always a cycle member.
        let mut placed = vec![false; entities.len()];
        for &index in &order {
            placed[index] = true;
        }
        let stuck = (0..entities.len())
            .filter(|&i| !placed[i])
            .find(|&i| parents[i].iter().any(|&p| !placed[p]))
            .or_else(|| (0..entities.len()).find(|&i| !placed[i]))
            .unwrap_or_default();
        return Err(unresolvable(schema, reference, &entities[stuck]));
    }

    Ok(WriteOrder { order, parents })
}

fn unresolvable<T>(
    schema: &EntitySchema<T>,
    reference: &SelfReference<T>,
    entity: &T,
) -> CoreError {
    CoreError::UnresolvableSelfReference {
        table: schema.table().to_string(),
        key: reference.parent_key().get(entity),
        parent: reference.foreign_key().get(entity),
    }
}

/// Rearranges `entities` into `order`.
pub(crate) fn apply_order<T>(entities: &mut Vec<T>, order: &[usize]) {
    let mut slots: Vec<Option<T>> = entities.drain(..).map(Some).collect();
    entities.extend(order.iter().filter_map(|&index| slots[index].take()));
}

/// Rewrites the self-referencing key of the entities at `children` from
/// `old` to `new`.
///
/// Only the children of the entity that received `new` are touched, so a
/// generated identity that happens to equal another entity's placeholder
/// never re-parents anything. Returns the number of rewritten entities.
pub(crate) fn rewrite_parent_keys<T>(
    foreign_key: &Accessor<T>,
    entities: &mut [T],
    children: &[usize],
    old: &Value,
    new: &Value,
) -> CoreResult<usize> {
    let mut rewritten = 0;
    for &child in children {
        let entity = &mut entities[child];
        if foreign_key.get(entity) == *old {
            foreign_key.set(entity, new.clone())?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiflush_value::ValueKind;

    #[derive(Debug, Clone)]
    struct Node {
        id: i64,
        parent: Option<i64>,
    }

    fn node(id: i64, parent: Option<i64>) -> Node {
        Node { id, parent }
    }

    fn schema() -> EntitySchema<Node> {
        EntitySchema::builder("nodes")
            .field(Accessor::new("id", ValueKind::Integer, |n: &Node| n.id.into()))
            .field(
                Accessor::new("parent", ValueKind::Integer, |n: &Node| n.parent.into())
                    .with_setter(|n, v| {
                        n.parent = v.try_into()?;
                        Ok(())
                    }),
            )
            .primary_key(&["id"])
            .self_reference("parent", "id")
            .build()
            .unwrap()
    }

    fn ids(nodes: &[Node], order: &WriteOrder) -> Vec<i64> {
        order.indices().iter().map(|&i| nodes[i].id).collect()
    }

    #[test]
    fn parents_first() {
        let nodes = vec![node(-1, Some(-2)), node(-2, None), node(-3, Some(-1))];
        let order = dependency_order(&schema(), &nodes, Direction::ParentsFirst, None).unwrap();
        assert_eq!(ids(&nodes, &order), [-2, -1, -3]);
    }

    #[test]
    fn children_first() {
        let nodes = vec![node(1, None), node(2, Some(1)), node(3, Some(2))];
        let order = dependency_order(&schema(), &nodes, Direction::ChildrenFirst, None).unwrap();
        assert_eq!(ids(&nodes, &order), [3, 2, 1]);
    }

    #[test]
    fn independent_entities_keep_request_order() {
        let nodes = vec![node(5, None), node(3, Some(100)), node(4, None)];
        let order = dependency_order(&schema(), &nodes, Direction::ParentsFirst, None).unwrap();
        assert_eq!(order.indices(), [0, 1, 2]);
    }

    #[test]
    fn deep_tree_listed_leaves_first() {
        // 1 <- 2, 1 <- 3, 2 <- 4, 3 <- 5, listed deepest first.
        let nodes = vec![
            node(5, Some(3)),
            node(4, Some(2)),
            node(3, Some(1)),
            node(2, Some(1)),
            node(1, None),
        ];
        let order = dependency_order(&schema(), &nodes, Direction::ParentsFirst, None).unwrap();
        assert_eq!(ids(&nodes, &order), [1, 3, 5, 2, 4]);
    }

    #[test]
    fn cycle_is_unresolvable() {
        let nodes = vec![node(0, None), node(1, Some(2)), node(2, Some(1))];
        let err = dependency_order(&schema(), &nodes, Direction::ParentsFirst, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnresolvableSelfReference { key: Value::Integer(1), .. }
        ));
    }

    #[test]
    fn self_loop_is_unresolvable() {
        let nodes = vec![node(1, Some(1))];
        let err = dependency_order(&schema(), &nodes, Direction::ChildrenFirst, None).unwrap_err();
        assert!(matches!(err, CoreError::UnresolvableSelfReference { .. }));
    }

    #[test]
    fn strict_rejects_dangling_parent() {
        let nodes = vec![node(-1, Some(-9))];
        let empty = IdentityMap::new();
        let err =
            dependency_order(&schema(), &nodes, Direction::ParentsFirst, Some(&empty)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnresolvableSelfReference { parent: Value::Integer(-9), .. }
        ));

        let known: IdentityMap = [(Value::Integer(-9), Value::Integer(40))].into_iter().collect();
        assert!(dependency_order(&schema(), &nodes, Direction::ParentsFirst, Some(&known)).is_ok());
    }

    #[test]
    fn children_follow_the_reordered_positions() {
        let nodes = vec![node(-1, Some(-2)), node(-2, None), node(-3, Some(-1))];
        let order = dependency_order(&schema(), &nodes, Direction::ParentsFirst, None).unwrap();
        // Written as -2, -1, -3.
        assert_eq!(order.children_by_position(), [vec![1], vec![2], vec![]]);
    }

    #[test]
    fn apply_and_rewrite() {
        let schema = schema();
        let mut nodes = vec![node(-1, Some(-2)), node(-2, None), node(-3, Some(-1))];
        apply_order(&mut nodes, &[1, 0, 2]);
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), [-2, -1, -3]);

        let fk = schema.self_reference().unwrap().foreign_key();
        let n = rewrite_parent_keys(fk, &mut nodes, &[1], &Value::Integer(-2), &Value::Integer(10))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(nodes[1].parent, Some(10));
        assert_eq!(nodes[2].parent, Some(-1));
    }

    #[test]
    fn rewrite_leaves_other_entities_alone() {
        let schema = schema();
        // Entity 2 already points at the real key 10; entity 1 is the child.
        let mut nodes = vec![node(1, None), node(3, Some(1)), node(4, Some(10))];
        let fk = schema.self_reference().unwrap().foreign_key();

        let n = rewrite_parent_keys(fk, &mut nodes, &[1], &Value::Integer(1), &Value::Integer(10))
            .unwrap();
        assert_eq!(n, 1);
        let n = rewrite_parent_keys(fk, &mut nodes, &[], &Value::Integer(10), &Value::Integer(11))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(nodes[1].parent, Some(10));
        assert_eq!(nodes[2].parent, Some(10));
    }
}

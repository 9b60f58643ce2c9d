//! Grouping a transaction's changes for observer fan-out.

use histkit_core::{ChangeType, HookContext, Transaction};
use std::collections::HashMap;

/// An ordered batch of one transaction's changes sharing an
/// (entity, change type) key.
#[derive(Debug, Clone)]
pub struct ChangeGroup {
    /// Entity name shared by every change in the group.
    pub entity: String,
    /// Change type shared by every change in the group.
    pub change_type: ChangeType,
    /// Hook contexts in the transaction's original relative order.
    pub contexts: Vec<HookContext>,
}

/// Groups one transaction's flat change list by (entity, change type).
///
/// Groups are emitted in the order each distinct key was first
/// encountered while scanning the changes (stable, not sorted), and
/// contexts keep their original relative order. Grouping is scoped to a
/// single transaction: a key appearing in two transactions of the same
/// cycle yields two groups, so subscribers are triggered once per
/// transaction.
pub fn group_transaction(transaction: &Transaction) -> Vec<ChangeGroup> {
    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut positions: HashMap<(String, ChangeType), usize> = HashMap::new();

    for change in &transaction.changes {
        let key = (change.entity.clone(), change.change_type);
        let context = HookContext::new(transaction, change);

        match positions.get(&key) {
            Some(&index) => groups[index].contexts.push(context),
            None => {
                positions.insert(key, groups.len());
                groups.push(ChangeGroup {
                    entity: change.entity.clone(),
                    change_type: change.change_type,
                    contexts: vec![context],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use histkit_core::{Author, Change, LogTimestamp};
    use uuid::Uuid;

    fn txn(changes: Vec<Change>) -> Transaction {
        Transaction::new(Author::new("app1"), LogTimestamp::new(1), changes)
    }

    #[test]
    fn first_seen_order_not_sorted() {
        // [A.insert, B.insert, A.insert] -> two groups: A.insert (2), B.insert (1).
        let a1 = Change::insert(Uuid::new_v4(), "Apple");
        let b = Change::insert(Uuid::new_v4(), "Banana");
        let a2 = Change::insert(Uuid::new_v4(), "Apple");

        let groups = group_transaction(&txn(vec![a1.clone(), b.clone(), a2.clone()]));
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].entity, "Apple");
        assert_eq!(groups[0].contexts.len(), 2);
        assert_eq!(groups[0].contexts[0].change, a1);
        assert_eq!(groups[0].contexts[1].change, a2);

        assert_eq!(groups[1].entity, "Banana");
        assert_eq!(groups[1].contexts.len(), 1);
    }

    #[test]
    fn same_entity_different_change_types_split() {
        let insert = Change::insert(Uuid::new_v4(), "Person");
        let delete = Change::delete(Uuid::new_v4(), "Person");

        let groups = group_transaction(&txn(vec![insert, delete]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].change_type, ChangeType::Insert);
        assert_eq!(groups[1].change_type, ChangeType::Delete);
    }

    #[test]
    fn contexts_carry_transaction_origin() {
        let change = Change::update(Uuid::new_v4(), "Person");
        let transaction =
            Transaction::new(Author::new("app7"), LogTimestamp::new(42), vec![change]);

        let groups = group_transaction(&transaction);
        assert_eq!(groups[0].contexts[0].author, Author::new("app7"));
        assert_eq!(groups[0].contexts[0].timestamp, LogTimestamp::new(42));
    }

    #[test]
    fn empty_transaction_yields_no_groups() {
        assert!(group_transaction(&txn(vec![])).is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_change() -> impl Strategy<Value = Change> {
            (0u8..4, 0u8..3).prop_map(|(entity, kind)| {
                let entity = format!("Entity{entity}");
                let id = Uuid::new_v4();
                match kind {
                    0 => Change::insert(id, entity),
                    1 => Change::update(id, entity),
                    _ => Change::delete(id, entity),
                }
            })
        }

        proptest! {
            #[test]
            fn grouping_preserves_every_change_and_relative_order(
                changes in proptest::collection::vec(arb_change(), 0..30),
            ) {
                let transaction = txn(changes.clone());
                let groups = group_transaction(&transaction);

                // Every change lands in exactly one group.
                let total: usize = groups.iter().map(|g| g.contexts.len()).sum();
                prop_assert_eq!(total, changes.len());

                // Group keys are distinct and members match their key.
                for group in &groups {
                    for ctx in &group.contexts {
                        prop_assert_eq!(&ctx.change.entity, &group.entity);
                        prop_assert_eq!(ctx.change.change_type, group.change_type);
                    }
                }

                // Within a group, members keep their original order.
                for group in &groups {
                    let originals: Vec<_> = changes
                        .iter()
                        .filter(|c| {
                            c.entity == group.entity && c.change_type == group.change_type
                        })
                        .cloned()
                        .collect();
                    let grouped: Vec<_> =
                        group.contexts.iter().map(|ctx| ctx.change.clone()).collect();
                    prop_assert_eq!(grouped, originals);
                }
            }
        }
    }
}

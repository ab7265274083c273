//! Diffing desired custom indexes against the live set.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::custom_index::CustomIndex;

/// Indexes to drop and to create so that the live set matches the plan.
///
/// A changed definition appears in both lists under the same name; drops
/// are always applied before creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexChangeSet {
    /// Names of live indexes to drop, sorted.
    pub to_drop: Vec<String>,
    /// Indexes to create, each with its name resolved, sorted by name.
    pub to_create: Vec<CustomIndex>,
}

impl IndexChangeSet {
    /// Whether nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_drop.is_empty() && self.to_create.is_empty()
    }
}

/// Compute the changes that turn `current` into `desired` for `table`.
///
/// Unnamed desired indexes are named with
/// [`generate_index_name`](super::generate_index_name) first, so an unnamed
/// plan entry matches the index it produced on an earlier run. Live indexes
/// are keyed by their catalog name. When two desired indexes resolve to the
/// same name the later one wins and a warning is logged.
///
/// # Examples
///
/// ```
/// use pgq::domain::{CustomIndex, plan_index_changes};
///
/// let current = vec![CustomIndex::on(["a"]).named("old_idx")];
/// let desired = vec![CustomIndex::on(["b"]).named("new_idx")];
///
/// let changes = plan_index_changes("jobs", &desired, &current);
/// assert_eq!(changes.to_drop, vec!["old_idx".to_owned()]);
/// assert_eq!(changes.to_create, desired);
/// ```
#[must_use]
pub fn plan_index_changes(
    table: &str,
    desired: &[CustomIndex],
    current: &[CustomIndex],
) -> IndexChangeSet {
    let mut wanted: BTreeMap<String, CustomIndex> = BTreeMap::new();
    for index in desired {
        let resolved = index.with_resolved_name(table);
        let name = resolved.resolved_name(table);
        if wanted.insert(name.clone(), resolved).is_some() {
            warn!(
                table,
                index = %name,
                "duplicate desired index name; keeping the later definition"
            );
        }
    }
    let live: BTreeMap<String, &CustomIndex> = current
        .iter()
        .map(|index| (index.resolved_name(table), index))
        .collect();

    let mut changes = IndexChangeSet::default();
    for (name, existing) in &live {
        match wanted.get(name) {
            Some(index) if index.same_definition(existing) => {}
            _ => changes.to_drop.push(name.clone()),
        }
    }
    for (name, index) in wanted {
        match live.get(&name) {
            Some(existing) if index.same_definition(existing) => {}
            _ => changes.to_create.push(index),
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndexType, generate_index_name};
    use rstest::rstest;

    #[rstest]
    fn identical_sets_produce_no_changes() {
        let indexes = vec![
            CustomIndex::on(["a"]).named("a_idx"),
            CustomIndex::on(["b"]).named("b_idx").using(IndexType::Brin),
        ];
        assert!(plan_index_changes("jobs", &indexes, &indexes).is_empty());
    }

    #[rstest]
    fn changed_definitions_are_dropped_then_recreated() {
        let current = vec![CustomIndex::on(["a"]).named("idx")];
        let desired = vec![CustomIndex::on(["a", "b"]).named("idx")];

        let changes = plan_index_changes("jobs", &desired, &current);

        assert_eq!(changes.to_drop, vec!["idx".to_owned()]);
        assert_eq!(changes.to_create, desired);
    }

    #[rstest]
    fn unnamed_indexes_match_their_generated_name() {
        let desired = vec![CustomIndex::on(["user_id"])];
        let generated = generate_index_name("jobs", &["user_id".to_owned()], IndexType::Btree);
        let current = vec![CustomIndex::on(["user_id"]).named(generated)];

        assert!(plan_index_changes("jobs", &desired, &current).is_empty());
    }

    #[rstest]
    fn creates_carry_resolved_names() {
        let desired = vec![CustomIndex::on(["user_id"]).using(IndexType::Hash)];

        let changes = plan_index_changes("jobs", &desired, &[]);

        let expected = generate_index_name("jobs", &["user_id".to_owned()], IndexType::Hash);
        let names: Vec<_> = changes
            .to_create
            .iter()
            .map(|index| index.name.as_deref())
            .collect();
        assert_eq!(names, vec![Some(expected.as_str())]);
        assert!(changes.to_drop.is_empty());
    }

    #[rstest]
    fn outputs_are_sorted_by_name() {
        let current = vec![
            CustomIndex::on(["z"]).named("z_idx"),
            CustomIndex::on(["a"]).named("a_idx"),
        ];
        let desired = vec![
            CustomIndex::on(["y"]).named("y_idx"),
            CustomIndex::on(["b"]).named("b_idx"),
        ];

        let changes = plan_index_changes("jobs", &desired, &current);

        assert_eq!(changes.to_drop, vec!["a_idx".to_owned(), "z_idx".to_owned()]);
        let created: Vec<_> = changes
            .to_create
            .iter()
            .filter_map(|index| index.name.as_deref())
            .collect();
        assert_eq!(created, vec!["b_idx", "y_idx"]);
    }

    #[rstest]
    fn over_long_explicit_names_match_their_clipped_catalog_name() {
        let desired = vec![CustomIndex::on(["a"]).named("x".repeat(70))];
        let current = vec![CustomIndex::on(["a"]).named("x".repeat(63))];

        assert!(plan_index_changes("jobs", &desired, &current).is_empty());
    }

    #[rstest]
    fn duplicate_desired_names_collapse_to_the_later_definition() {
        let desired = vec![
            CustomIndex::on(["a"]).named("idx"),
            CustomIndex::on(["b"]).named("idx").using(IndexType::Hash),
        ];

        let changes = plan_index_changes("jobs", &desired, &[]);

        let [created] = changes.to_create.as_slice() else {
            panic!("expected one create, got {:?}", changes.to_create);
        };
        assert_eq!(created.columns, vec!["b".to_owned()]);
        assert_eq!(created.index_type, IndexType::Hash);
    }

    #[rstest]
    fn unnamed_duplicates_differing_only_by_predicate_collapse() {
        let desired = vec![
            CustomIndex::on(["a"]),
            CustomIndex::on(["a"]).filtered("processed_at IS NULL"),
        ];

        let changes = plan_index_changes("jobs", &desired, &[]);

        let [created] = changes.to_create.as_slice() else {
            panic!("expected one create, got {:?}", changes.to_create);
        };
        assert_eq!(created.predicate(), Some("processed_at IS NULL"));
    }

    #[rstest]
    fn empty_plan_drops_everything() {
        let current = vec![CustomIndex::on(["a"]).named("a_idx")];
        let changes = plan_index_changes("jobs", &[], &current);
        assert_eq!(changes.to_drop, vec!["a_idx".to_owned()]);
        assert!(changes.to_create.is_empty());
    }
}

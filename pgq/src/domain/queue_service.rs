//! Reconciliation of desired queue definitions against the live database.
//!
//! The service composes the [`QueueCatalog`] port into create, read, update,
//! apply and delete operations. It decides what to change; the port decides
//! how.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::ports::QueueCatalog;
use crate::domain::{
    Fqn, IndexChangeSet, PartitionConfig, QueueError, QueueName, QueueSpec, QueueState,
    SchemaName, plan_index_changes,
};

/// What [`QueueService::apply`] or [`QueueService::update`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The queue did not exist and was created.
    Created {
        /// State observed after creation.
        state: QueueState,
    },
    /// The queue existed and was changed in place.
    Updated {
        /// Whether the pg_partman policy was rewritten.
        partitioning_updated: bool,
        /// Index drops and creates that were applied.
        changes: IndexChangeSet,
    },
    /// The queue already matched the definition.
    Unchanged,
    /// The partitioning mode changed, so the queue was dropped and
    /// recreated. Rows in the old table are lost.
    Replaced {
        /// State observed after recreation.
        state: QueueState,
    },
    /// The partitioning mode differs and cannot be changed in place.
    /// Nothing was touched.
    ReplaceRequired {
        /// Whether the live table is partitioned.
        live_partitioned: bool,
        /// Whether the definition asks for a partitioned table.
        desired_partitioned: bool,
    },
}

/// Changes [`QueueService::apply`] would make, computed without issuing DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QueuePlan {
    /// The queue is absent and would be created.
    Create,
    /// The partitioning mode differs; the queue would be dropped and
    /// recreated.
    Replace,
    /// The queue would be changed in place, or left alone when empty.
    Update {
        /// Policy to store, when it differs from the live one.
        #[serde(skip_serializing_if = "Option::is_none")]
        partitioning: Option<PartitionConfig>,
        /// Index drops and creates.
        changes: IndexChangeSet,
    },
}

impl QueuePlan {
    /// Whether applying the plan would do nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Update { partitioning: None, changes } if changes.is_empty())
    }
}

/// Result of [`QueueService::delete`].
#[derive(Debug)]
pub struct DeleteReport {
    /// Queue that was dropped.
    pub fqn: Fqn,
    /// Whether the table was partitioned when deletion started.
    pub was_partitioned: bool,
    /// Failure of the best-effort pg_partman cleanup, if any. The table is
    /// dropped regardless.
    pub partman_cleanup_error: Option<QueueError>,
}

impl DeleteReport {
    /// Whether every step, including the partman cleanup, succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.partman_cleanup_error.is_none()
    }
}

/// Queue lifecycle service driving a [`QueueCatalog`].
#[derive(Clone)]
pub struct QueueService<C> {
    catalog: Arc<C>,
}

impl<C> QueueService<C> {
    /// Create a new service over the given catalog.
    #[must_use]
    pub const fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }
}

impl<C> QueueService<C>
where
    C: QueueCatalog,
{
    /// Create the queue described by `spec` and its custom indexes.
    ///
    /// The table is created first; custom indexes follow in their own
    /// transaction, so an index failure leaves the bare table behind.
    ///
    /// # Errors
    ///
    /// [`QueueError::AlreadyExists`] when the table is present, otherwise
    /// whatever the catalog reports.
    pub async fn create(&self, spec: &QueueSpec) -> Result<QueueState, QueueError> {
        match &spec.partitioning {
            Some(policy) => {
                self.catalog
                    .create_partitioned(&spec.schema, &spec.name, policy)
                    .await?;
            }
            None => self.catalog.create_simple(&spec.schema, &spec.name).await?,
        }

        if !spec.custom_indexes.is_empty() {
            let indexes: Vec<_> = spec
                .custom_indexes
                .iter()
                .map(|index| index.with_resolved_name(spec.name.as_str()))
                .collect();
            self.catalog
                .create_custom_indexes(&spec.schema, &spec.name, &indexes)
                .await?;
        }

        info!(fqn = %spec.fqn(), partitioned = spec.is_partitioned(), "queue created");
        self.read(&spec.schema, &spec.name).await
    }

    /// Observe the live queue.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] when the table is absent; any failure to read
    /// the partition policy or the index list propagates.
    pub async fn read(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<QueueState, QueueError> {
        let queue = self.catalog.get(schema, name).await?;
        let partitioning = if queue.partitioned {
            Some(self.catalog.partition_config(schema, name).await?)
        } else {
            None
        };
        let custom_indexes = self.catalog.custom_indexes(schema, name).await?;
        Ok(QueueState {
            queue,
            partitioning,
            custom_indexes,
        })
    }

    /// Compute what [`Self::apply`] would do without changing anything.
    ///
    /// # Errors
    ///
    /// Propagates catalog failures.
    pub async fn plan(&self, spec: &QueueSpec) -> Result<QueuePlan, QueueError> {
        if !self.catalog.exists(&spec.schema, &spec.name).await? {
            return Ok(QueuePlan::Create);
        }
        let state = self.read(&spec.schema, &spec.name).await?;
        Ok(diff(spec, &state))
    }

    /// Converge an existing queue onto `spec` in place.
    ///
    /// The partition policy is rewritten when it differs (never the
    /// default-partition flag). Index changes are applied as drops followed
    /// by a single transactional batch of creates.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] when the table is absent; any catalog failure
    /// aborts the remaining steps.
    pub async fn update(&self, spec: &QueueSpec) -> Result<ReconcileOutcome, QueueError> {
        let state = self.read(&spec.schema, &spec.name).await?;
        let fqn = spec.fqn();

        let default_drift = match (&spec.partitioning, &state.partitioning) {
            (Some(desired), Some(live)) if desired.default_partition != live.default_partition => {
                Some((desired.default_partition, live.default_partition))
            }
            _ => None,
        };
        if let Some((desired, live)) = default_drift {
            warn!(
                fqn = %fqn,
                desired,
                live,
                "default partition cannot be changed after registration; ignoring"
            );
        }

        let (partitioning, changes) = match diff(spec, &state) {
            QueuePlan::Update {
                partitioning,
                changes,
            } => (partitioning, changes),
            QueuePlan::Create | QueuePlan::Replace => {
                return Ok(ReconcileOutcome::ReplaceRequired {
                    live_partitioned: state.queue.partitioned,
                    desired_partitioned: spec.is_partitioned(),
                });
            }
        };

        let partitioning_updated = partitioning.is_some();
        if let Some(policy) = &partitioning {
            self.catalog
                .update_partition_config(&spec.schema, &spec.name, policy)
                .await?;
        }

        if !changes.to_drop.is_empty() {
            self.catalog
                .drop_custom_indexes(&spec.schema, &spec.name, &changes.to_drop)
                .await?;
        }
        if !changes.to_create.is_empty() {
            self.catalog
                .create_custom_indexes(&spec.schema, &spec.name, &changes.to_create)
                .await?;
        }

        if !partitioning_updated && changes.is_empty() {
            return Ok(ReconcileOutcome::Unchanged);
        }
        info!(
            fqn = %fqn,
            partitioning_updated,
            dropped = changes.to_drop.len(),
            created = changes.to_create.len(),
            "queue updated"
        );
        Ok(ReconcileOutcome::Updated {
            partitioning_updated,
            changes,
        })
    }

    /// Converge onto `spec` whatever the live state.
    ///
    /// Absent queues are created, queues whose partitioning mode differs are
    /// dropped and recreated, and everything else is updated in place.
    ///
    /// # Errors
    ///
    /// Propagates catalog failures from whichever path was taken.
    pub async fn apply(&self, spec: &QueueSpec) -> Result<ReconcileOutcome, QueueError> {
        if !self.catalog.exists(&spec.schema, &spec.name).await? {
            let state = self.create(spec).await?;
            return Ok(ReconcileOutcome::Created { state });
        }

        match self.update(spec).await? {
            ReconcileOutcome::ReplaceRequired { .. } => {
                warn!(fqn = %spec.fqn(), "partitioning mode changed; replacing queue");
                self.delete(&spec.schema, &spec.name).await?;
                let state = self.create(spec).await?;
                Ok(ReconcileOutcome::Replaced { state })
            }
            outcome => Ok(outcome),
        }
    }

    /// Drop the queue, undoing its pg_partman registration first when it is
    /// partitioned.
    ///
    /// The partman cleanup is best-effort: its failure is logged and
    /// reported but does not stop the table from being dropped.
    ///
    /// # Errors
    ///
    /// Fails when the partitioning check or the drop itself fails.
    pub async fn delete(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<DeleteReport, QueueError> {
        let fqn = Fqn::new(schema, name);
        let was_partitioned = self.catalog.is_partitioned(schema, name).await?;

        let partman_cleanup_error = if was_partitioned {
            self.catalog
                .remove_partman_config(schema, name)
                .await
                .err()
                .inspect(|err| {
                    warn!(fqn = %fqn, error = %err, "failed to remove partman config");
                })
        } else {
            None
        };

        self.catalog.drop_queue(schema, name).await?;
        info!(fqn = %fqn, "queue dropped");
        Ok(DeleteReport {
            fqn,
            was_partitioned,
            partman_cleanup_error,
        })
    }
}

fn diff(spec: &QueueSpec, state: &QueueState) -> QueuePlan {
    if spec.is_partitioned() != state.queue.partitioned {
        return QueuePlan::Replace;
    }
    let partitioning = match (&spec.partitioning, &state.partitioning) {
        (Some(desired), Some(live)) if !desired.same_stored_policy(live) => {
            Some(desired.clone())
        }
        _ => None,
    };
    let changes = plan_index_changes(
        spec.name.as_str(),
        &spec.custom_indexes,
        &state.custom_indexes,
    );
    QueuePlan::Update {
        partitioning,
        changes,
    }
}

#[cfg(test)]
#[path = "queue_service_tests.rs"]
mod tests;

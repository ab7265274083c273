//! Port abstraction over the database holding queue tables.

use async_trait::async_trait;

use crate::domain::{
    CustomIndex, PartitionConfig, Queue, QueueError, QueueName, SchemaName,
};

/// Port for creating, probing and removing queue tables along with their
/// custom indexes and pg_partman registration.
///
/// Implementations issue DDL directly; there is no caching and no retry.
/// Every call observes the live catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueCatalog: Send + Sync {
    /// Create a plain queue table and its standard indexes atomically.
    ///
    /// Fails with [`QueueError::AlreadyExists`] when the table is present.
    async fn create_simple(&self, schema: &SchemaName, name: &QueueName)
    -> Result<(), QueueError>;

    /// Create a range-partitioned queue table and register it with
    /// pg_partman.
    ///
    /// The table, standard indexes and template table commit in one
    /// transaction; registration runs in a second one. A
    /// [`QueueError::Partman`] therefore leaves the table in place.
    async fn create_partitioned(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        policy: &PartitionConfig,
    ) -> Result<(), QueueError>;

    /// Whether a table with this name exists in the schema.
    async fn exists(&self, schema: &SchemaName, name: &QueueName) -> Result<bool, QueueError>;

    /// Whether the table is a partitioned parent.
    async fn is_partitioned(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<bool, QueueError>;

    /// Look up the live table.
    ///
    /// Fails with [`QueueError::NotFound`] when it is absent.
    async fn get(&self, schema: &SchemaName, name: &QueueName) -> Result<Queue, QueueError>;

    /// Drop the table and everything depending on it. Idempotent.
    async fn drop_queue(&self, schema: &SchemaName, name: &QueueName) -> Result<(), QueueError>;

    /// List the custom indexes present on the table, sorted by name.
    async fn custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<Vec<CustomIndex>, QueueError>;

    /// Create a batch of custom indexes in a single transaction.
    async fn create_custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        indexes: &[CustomIndex],
    ) -> Result<(), QueueError>;

    /// Drop custom indexes by name, one statement each, stopping at the
    /// first failure.
    async fn drop_custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        index_names: &[String],
    ) -> Result<(), QueueError>;

    /// Read the effective pg_partman policy of a partitioned queue.
    async fn partition_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<PartitionConfig, QueueError>;

    /// Overwrite the stored policy. `default_partition` is never written.
    async fn update_partition_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        policy: &PartitionConfig,
    ) -> Result<(), QueueError>;

    /// Undo the pg_partman registration, folding child data back into the
    /// parent.
    async fn remove_partman_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<(), QueueError>;
}

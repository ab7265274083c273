//! Connection-level pg_partman operations.
//!
//! pg_partman keys its `part_config` rows by the unquoted `schema.table`
//! name, which is exactly the queue [`Fqn`].

use diesel::sql_query;
use diesel::sql_types::{Bool, Integer, Nullable, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::{
    Fqn, PARTITION_CONTROL_COLUMN, PartitionConfig, QueueName, SchemaName, template_table_name,
};

use super::error_mapping::StatementError;
use super::models::{PartConfigRow, PresenceRow};
use super::queue_ddl::{
    CORRECT_PART_CONFIG_SQL, CREATE_PARENT_SQL, DEFAULT_PARTITION_SQL, PART_CONFIG_SQL,
    UNDO_PARTITION_BATCH_SIZE, UNDO_PARTITION_SQL, UPDATE_PART_CONFIG_SQL,
    default_partition_pattern,
};

/// Register the parent table and store the settings `create_parent` does not
/// accept.
///
/// Both statements must run in the same transaction so a half-configured
/// registration is never committed.
pub(crate) async fn register_parent(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
    policy: &PartitionConfig,
) -> Result<(), StatementError> {
    let parent = Fqn::new(schema, name);
    let template = format!("{schema}.{}", template_table_name(name));

    sql_query(CREATE_PARENT_SQL)
        .bind::<Text, _>(parent.as_str())
        .bind::<Text, _>(PARTITION_CONTROL_COLUMN)
        .bind::<Text, _>(policy.interval.as_str())
        .bind::<Integer, _>(policy.premake)
        .bind::<Bool, _>(policy.default_partition)
        .bind::<Text, _>(template.as_str())
        .execute(conn)
        .await
        .map_err(StatementError::at("create_parent"))?;

    sql_query(CORRECT_PART_CONFIG_SQL)
        .bind::<Text, _>(parent.as_str())
        .bind::<Nullable<Text>, _>(policy.retention.as_deref())
        .bind::<Text, _>(policy.datetime_string.as_str())
        .bind::<Integer, _>(policy.optimize_constraint)
        .execute(conn)
        .await
        .map_err(StatementError::at("update_config"))?;

    Ok(())
}

/// Read the effective policy; `default_partition` is checked structurally.
pub(crate) async fn load_partition_config(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
) -> Result<PartitionConfig, StatementError> {
    let parent = Fqn::new(schema, name);
    let row: PartConfigRow = sql_query(PART_CONFIG_SQL)
        .bind::<Text, _>(parent.as_str())
        .get_result(conn)
        .await
        .map_err(StatementError::at("get_config"))?;

    let default_partition: PresenceRow = sql_query(DEFAULT_PARTITION_SQL)
        .bind::<Text, _>(schema.as_str())
        .bind::<Text, _>(name.as_str())
        .bind::<Text, _>(default_partition_pattern())
        .get_result(conn)
        .await
        .map_err(StatementError::at("check_default_partition"))?;

    Ok(PartitionConfig {
        interval: row.partition_interval,
        premake: row.premake,
        retention: row.retention,
        datetime_string: row.datetime_string.unwrap_or_default(),
        optimize_constraint: row.optimize_constraint,
        default_partition: default_partition.present,
    })
}

/// Overwrite the stored policy columns.
pub(crate) async fn store_partition_config(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
    policy: &PartitionConfig,
) -> Result<(), StatementError> {
    let parent = Fqn::new(schema, name);
    sql_query(UPDATE_PART_CONFIG_SQL)
        .bind::<Text, _>(parent.as_str())
        .bind::<Text, _>(policy.interval.as_str())
        .bind::<Integer, _>(policy.premake)
        .bind::<Nullable<Text>, _>(policy.retention.as_deref())
        .bind::<Text, _>(policy.datetime_string.as_str())
        .bind::<Integer, _>(policy.optimize_constraint)
        .execute(conn)
        .await
        .map_err(StatementError::at("update_config"))?;
    Ok(())
}

/// Undo the registration, folding children back into the parent.
pub(crate) async fn undo_partition(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
) -> Result<(), StatementError> {
    let parent = Fqn::new(schema, name);
    sql_query(UNDO_PARTITION_SQL)
        .bind::<Text, _>(parent.as_str())
        .bind::<Integer, _>(UNDO_PARTITION_BATCH_SIZE)
        .execute(conn)
        .await
        .map_err(StatementError::at("undo_partition"))?;
    Ok(())
}

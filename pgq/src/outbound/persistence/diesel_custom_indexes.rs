//! Connection-level custom index operations.
//!
//! These helpers run on whatever connection they are given and never open a
//! transaction themselves, so callers decide the atomicity boundary.

use diesel::sql_query;
use diesel::sql_types::Text;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::{
    CustomIndex, QueueName, SchemaName, parse_index_definition, standard_index_names,
};

use super::error_mapping::StatementError;
use super::models::IndexDefinitionRow;
use super::queue_ddl::{CUSTOM_INDEXES_SQL, create_custom_index_sql, drop_index_sql};

/// Create `indexes` on the queue table using the caller's connection.
///
/// Unnamed indexes get their generated name. Statements are issued in
/// order; run this inside a transaction to make the batch atomic.
///
/// # Errors
///
/// Returns the first failing statement, labelled
/// `create_custom_index_<name>`.
pub async fn create_custom_indexes_in(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
    indexes: &[CustomIndex],
) -> Result<(), StatementError> {
    for index in indexes {
        let index_name = index.resolved_name(name.as_str());
        let sql = create_custom_index_sql(schema, name, &index_name, index);
        sql_query(sql)
            .execute(conn)
            .await
            .map_err(StatementError::at(format!("create_custom_index_{index_name}")))?;
    }
    Ok(())
}

/// List the custom indexes of the queue table, sorted by name.
///
/// The primary key and the four standard indexes are excluded; every other
/// index is parsed back with [`parse_index_definition`].
///
/// # Errors
///
/// Returns the catalog query failure, labelled `get_custom_indexes`.
pub async fn load_custom_indexes(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
) -> Result<Vec<CustomIndex>, StatementError> {
    let [created_at, processed_at, scheduled_for, metadata] = standard_index_names(name);
    let rows: Vec<IndexDefinitionRow> = sql_query(CUSTOM_INDEXES_SQL)
        .bind::<Text, _>(schema.as_str())
        .bind::<Text, _>(name.as_str())
        .bind::<Text, _>(created_at)
        .bind::<Text, _>(processed_at)
        .bind::<Text, _>(scheduled_for)
        .bind::<Text, _>(metadata)
        .load(conn)
        .await
        .map_err(StatementError::at("get_custom_indexes"))?;

    Ok(rows
        .into_iter()
        .map(|row| parse_index_definition(&row.index_name, &row.index_def))
        .collect())
}

/// Drop the named indexes one statement at a time.
///
/// Missing indexes are ignored. Earlier drops stay applied when a later one
/// fails.
///
/// # Errors
///
/// Returns the first failing statement, labelled
/// `drop_custom_index_<name>`.
pub async fn drop_custom_indexes_in(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    index_names: &[String],
) -> Result<(), StatementError> {
    for index_name in index_names {
        sql_query(drop_index_sql(schema, index_name))
            .execute(conn)
            .await
            .map_err(StatementError::at(format!("drop_custom_index_{index_name}")))?;
    }
    Ok(())
}

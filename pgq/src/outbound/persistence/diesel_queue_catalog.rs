//! PostgreSQL-backed implementation of the [`QueueCatalog`] port.

use async_trait::async_trait;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::QueueCatalog;
use crate::domain::{
    CustomIndex, Fqn, PartitionConfig, Queue, QueueError, QueueName, SchemaName,
};

use super::diesel_custom_indexes::{
    create_custom_indexes_in, drop_custom_indexes_in, load_custom_indexes,
};
use super::diesel_partman::{
    load_partition_config, register_parent, store_partition_config, undo_partition,
};
use super::error_mapping::{StatementError, map_partman_pool_error, map_pool_error};
use super::models::PresenceRow;
use super::pool::DbPool;
use super::queue_ddl::{
    IS_PARTITIONED_SQL, TABLE_EXISTS_SQL, create_table_sql, create_template_sql, drop_table_sql,
    standard_indexes_sql,
};

/// Diesel-backed queue catalog.
///
/// Each call checks out its own connection. Multi-statement DDL runs inside
/// a transaction on that connection and rolls back as a whole on failure.
#[derive(Clone)]
pub struct DieselQueueCatalog {
    pool: DbPool,
}

impl DieselQueueCatalog {
    /// Create a new catalog with the given connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn connection(
        &self,
        fqn: &Fqn,
    ) -> Result<PooledConnection<'_, AsyncPgConnection>, QueueError> {
        self.pool.get().await.map_err(|err| map_pool_error(err, fqn))
    }

    async fn partman_connection(
        &self,
        fqn: &Fqn,
    ) -> Result<PooledConnection<'_, AsyncPgConnection>, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|err| map_partman_pool_error(err, fqn))
    }

    async fn ensure_absent(
        conn: &mut AsyncPgConnection,
        schema: &SchemaName,
        name: &QueueName,
        fqn: &Fqn,
    ) -> Result<(), QueueError> {
        if table_exists(conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(fqn))?
        {
            return Err(QueueError::already_exists(fqn.clone()));
        }
        Ok(())
    }
}

async fn table_exists(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
) -> Result<bool, StatementError> {
    presence(conn, TABLE_EXISTS_SQL, schema, name, "check_exists").await
}

async fn table_is_partitioned(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
) -> Result<bool, StatementError> {
    presence(conn, IS_PARTITIONED_SQL, schema, name, "check_partitioned").await
}

async fn presence(
    conn: &mut AsyncPgConnection,
    sql: &'static str,
    schema: &SchemaName,
    name: &QueueName,
    op: &'static str,
) -> Result<bool, StatementError> {
    let row: PresenceRow = sql_query(sql)
        .bind::<Text, _>(schema.as_str())
        .bind::<Text, _>(name.as_str())
        .get_result(conn)
        .await
        .map_err(StatementError::at(op))?;
    Ok(row.present)
}

/// Create the table and its standard indexes, plus the template table for
/// partitioned queues. Runs on the caller's transaction.
async fn create_queue_objects(
    conn: &mut AsyncPgConnection,
    schema: &SchemaName,
    name: &QueueName,
    partitioned: bool,
) -> Result<(), StatementError> {
    sql_query(create_table_sql(schema, name, partitioned))
        .execute(conn)
        .await
        .map_err(StatementError::at("create_table"))?;

    for (op, sql) in standard_indexes_sql(schema, name) {
        sql_query(sql)
            .execute(conn)
            .await
            .map_err(StatementError::at(op))?;
    }

    if partitioned {
        sql_query(create_template_sql(schema, name))
            .execute(conn)
            .await
            .map_err(StatementError::at("create_template"))?;
    }
    Ok(())
}

#[async_trait]
impl QueueCatalog for DieselQueueCatalog {
    async fn create_simple(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<(), QueueError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        Self::ensure_absent(&mut conn, schema, name, &fqn).await?;

        conn.transaction(|conn| {
            async move { create_queue_objects(conn, schema, name, false).await }.scope_boxed()
        })
        .await
        .map_err(|err: StatementError| err.into_ddl(&fqn))?;

        debug!(%fqn, "created queue table");
        Ok(())
    }

    async fn create_partitioned(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        policy: &PartitionConfig,
    ) -> Result<(), QueueError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        Self::ensure_absent(&mut conn, schema, name, &fqn).await?;

        conn.transaction(|conn| {
            async move { create_queue_objects(conn, schema, name, true).await }.scope_boxed()
        })
        .await
        .map_err(|err: StatementError| err.into_ddl(&fqn))?;
        debug!(%fqn, "created partitioned queue table");

        // The table is committed at this point; a registration failure is
        // reported as a partman error and leaves it in place.
        conn.transaction(|conn| {
            async move { register_parent(conn, schema, name, policy).await }.scope_boxed()
        })
        .await
        .map_err(|err: StatementError| err.into_partman(&fqn))?;

        debug!(%fqn, interval = %policy.interval, "registered queue with pg_partman");
        Ok(())
    }

    async fn exists(&self, schema: &SchemaName, name: &QueueName) -> Result<bool, QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        table_exists(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(&fqn))
    }

    async fn is_partitioned(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<bool, QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        table_is_partitioned(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(&fqn))
    }

    async fn get(&self, schema: &SchemaName, name: &QueueName) -> Result<Queue, QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        if !table_exists(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(&fqn))?
        {
            return Err(QueueError::not_found(fqn));
        }
        let partitioned = table_is_partitioned(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(&fqn))?;

        Ok(Queue {
            name: name.clone(),
            schema: schema.clone(),
            partitioned,
        })
    }

    async fn drop_queue(&self, schema: &SchemaName, name: &QueueName) -> Result<(), QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        sql_query(drop_table_sql(schema, name))
            .execute(&mut conn)
            .await
            .map_err(|err| StatementError::new("drop", err).into_ddl(&fqn))?;
        Ok(())
    }

    async fn custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<Vec<CustomIndex>, QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        load_custom_indexes(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_ddl(&fqn))
    }

    async fn create_custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        indexes: &[CustomIndex],
    ) -> Result<(), QueueError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        conn.transaction(|conn| {
            async move { create_custom_indexes_in(conn, schema, name, indexes).await }
                .scope_boxed()
        })
        .await
        .map_err(|err: StatementError| err.into_ddl(&fqn))
    }

    async fn drop_custom_indexes(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        index_names: &[String],
    ) -> Result<(), QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.connection(&fqn).await?;
        drop_custom_indexes_in(&mut conn, schema, index_names)
            .await
            .map_err(|err| err.into_ddl(&fqn))
    }

    async fn partition_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<PartitionConfig, QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.partman_connection(&fqn).await?;
        load_partition_config(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_partman(&fqn))
    }

    async fn update_partition_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
        policy: &PartitionConfig,
    ) -> Result<(), QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.partman_connection(&fqn).await?;
        store_partition_config(&mut conn, schema, name, policy)
            .await
            .map_err(|err| err.into_partman(&fqn))
    }

    async fn remove_partman_config(
        &self,
        schema: &SchemaName,
        name: &QueueName,
    ) -> Result<(), QueueError> {
        let fqn = Fqn::new(schema, name);
        let mut conn = self.partman_connection(&fqn).await?;
        undo_partition(&mut conn, schema, name)
            .await
            .map_err(|err| err.into_partman(&fqn))
    }
}

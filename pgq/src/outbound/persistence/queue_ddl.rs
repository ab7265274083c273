//! SQL text for queue tables, their indexes and pg_partman.
//!
//! Identifiers are always interpolated through
//! [`quote_identifier`](crate::domain::quote_identifier); values always go
//! through bind parameters. Index column expressions and predicates are
//! caller-supplied SQL and are interpolated verbatim.

use crate::domain::{
    CustomIndex, DEFAULT_PARTITION_SUFFIX, PARTITION_CONTROL_COLUMN, QueueName,
    STANDARD_INDEX_SUFFIXES, SchemaName, quote_identifier, standard_index_names,
    template_table_name,
};

/// Rows with `present = true` when the table exists.
pub(crate) const TABLE_EXISTS_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM pg_tables
    WHERE schemaname = $1 AND tablename = $2
) AS present
";

/// Rows with `present = true` when the table is a partitioned parent.
pub(crate) const IS_PARTITIONED_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM pg_partitioned_table pt
    JOIN pg_class c ON pt.partrelid = c.oid
    JOIN pg_namespace n ON c.relnamespace = n.oid
    WHERE n.nspname = $1 AND c.relname = $2
) AS present
";

/// Non-primary, non-standard indexes of a table with their definitions.
pub(crate) const CUSTOM_INDEXES_SQL: &str = r"
SELECT
    i.relname::text AS index_name,
    pg_get_indexdef(i.oid) AS index_def
FROM pg_index x
JOIN pg_class t ON t.oid = x.indrelid
JOIN pg_class i ON i.oid = x.indexrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
WHERE n.nspname = $1
  AND t.relname = $2
  AND i.relname NOT LIKE '%\_pkey'
  AND i.relname NOT IN ($3, $4, $5, $6)
ORDER BY i.relname
";

/// Register a parent table with pg_partman.
///
/// Binds: parent FQN, control column, interval, premake, default-table flag,
/// template FQN.
pub(crate) const CREATE_PARENT_SQL: &str = r"
SELECT partman.create_parent(
    p_parent_table          := $1,
    p_control               := $2,
    p_interval              := $3,
    p_type                  := 'range',
    p_premake               := $4,
    p_default_table         := $5,
    p_automatic_maintenance := 'on',
    p_template_table        := $6,
    p_jobmon                := true
)
";

/// Apply the settings `create_parent` does not accept.
///
/// Binds: parent FQN, retention, datetime string, optimize constraint.
pub(crate) const CORRECT_PART_CONFIG_SQL: &str = r"
UPDATE partman.part_config
SET retention = $2,
    retention_keep_index = TRUE,
    retention_keep_table = FALSE,
    datetime_string = $3,
    optimize_constraint = $4,
    ignore_default_data = TRUE
WHERE parent_table = $1
";

/// Read the stored policy of a parent table.
pub(crate) const PART_CONFIG_SQL: &str = r"
SELECT
    partition_interval::text AS partition_interval,
    premake,
    retention::text AS retention,
    datetime_string,
    optimize_constraint
FROM partman.part_config
WHERE parent_table = $1
";

/// Rows with `present = true` when a default child partition exists.
///
/// Binds: schema, parent name, [`default_partition_pattern`].
pub(crate) const DEFAULT_PARTITION_SQL: &str = r"
SELECT EXISTS (
    SELECT 1 FROM pg_inherits i
    JOIN pg_class parent ON i.inhparent = parent.oid
    JOIN pg_class child ON i.inhrelid = child.oid
    JOIN pg_namespace n ON parent.relnamespace = n.oid
    WHERE n.nspname = $1
      AND parent.relname = $2
      AND child.relname LIKE $3
) AS present
";

/// Overwrite the stored policy. Never touches the default partition.
///
/// Binds: parent FQN, interval, premake, retention, datetime string,
/// optimize constraint.
pub(crate) const UPDATE_PART_CONFIG_SQL: &str = r"
UPDATE partman.part_config
SET partition_interval = $2,
    premake = $3,
    retention = $4,
    datetime_string = $5,
    optimize_constraint = $6
WHERE parent_table = $1
";

/// Fold child partitions back into the parent and drop the registration.
///
/// Binds: parent FQN, batch size.
pub(crate) const UNDO_PARTITION_SQL: &str = r"
SELECT partman.undo_partition(
    p_parent_table := $1,
    p_loop_count   := $2,
    p_keep_table   := false
)
";

/// Number of child partitions folded back per `undo_partition` loop.
pub(crate) const UNDO_PARTITION_BATCH_SIZE: i32 = 20;

const QUEUE_COLUMNS: &str = r"
    id             UUID        NOT NULL DEFAULT gen_random_uuid(),
    created_at     TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    started_at     TIMESTAMPTZ,
    locked_until   TIMESTAMPTZ,
    scheduled_for  TIMESTAMPTZ,
    processed_at   TIMESTAMPTZ,
    consumed_count INTEGER     NOT NULL DEFAULT 0,
    error_detail   TEXT,
    payload        JSONB       NOT NULL,
    metadata       JSONB       NOT NULL,
";

const STANDARD_INDEX_BODIES: [&str; 4] = [
    "(created_at)",
    "(processed_at) WHERE (processed_at IS NULL)",
    "(scheduled_for ASC NULLS LAST) WHERE (processed_at IS NULL)",
    "USING GIN (metadata) WHERE (processed_at IS NULL)",
];

/// `LIKE` pattern matching children named with [`DEFAULT_PARTITION_SUFFIX`].
pub(crate) fn default_partition_pattern() -> String {
    format!("%{}", DEFAULT_PARTITION_SUFFIX.replace('_', "\\_"))
}

fn table_ref(schema: &SchemaName, name: &QueueName) -> String {
    format!("{}.{}", schema.quoted(), name.quoted())
}

/// `CREATE TABLE` for a queue; partitioned tables key on
/// `(id, created_at)` and range-partition on `created_at`.
pub(crate) fn create_table_sql(schema: &SchemaName, name: &QueueName, partitioned: bool) -> String {
    let tail = if partitioned {
        format!(
            "    PRIMARY KEY (id, {PARTITION_CONTROL_COLUMN})\n) PARTITION BY RANGE ({PARTITION_CONTROL_COLUMN})"
        )
    } else {
        "    PRIMARY KEY (id)\n)".to_owned()
    };
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({QUEUE_COLUMNS}{tail}",
        table_ref(schema, name)
    )
}

/// The four standard index statements, each paired with its step label.
pub(crate) fn standard_indexes_sql(schema: &SchemaName, name: &QueueName) -> Vec<(String, String)> {
    let table = table_ref(schema, name);
    STANDARD_INDEX_SUFFIXES
        .iter()
        .zip(standard_index_names(name))
        .zip(STANDARD_INDEX_BODIES)
        .map(|((suffix, index_name), body)| {
            (
                format!("create_index{suffix}"),
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {table} {body}",
                    quote_identifier(&index_name)
                ),
            )
        })
        .collect()
}

/// Template table pg_partman copies into new children.
pub(crate) fn create_template_sql(schema: &SchemaName, name: &QueueName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (LIKE {} INCLUDING ALL)",
        schema.quoted(),
        quote_identifier(&template_table_name(name)),
        table_ref(schema, name)
    )
}

/// Idempotent cascading drop.
pub(crate) fn drop_table_sql(schema: &SchemaName, name: &QueueName) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", table_ref(schema, name))
}

/// `CREATE INDEX` for a custom index whose name is already resolved.
pub(crate) fn create_custom_index_sql(
    schema: &SchemaName,
    name: &QueueName,
    index_name: &str,
    index: &CustomIndex,
) -> String {
    let mut sql = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}",
        quote_identifier(index_name),
        table_ref(schema, name)
    );
    if !index.index_type.is_default() {
        sql.push_str(" USING ");
        sql.push_str(index.index_type.as_str());
    }
    sql.push_str(" (");
    sql.push_str(&index.columns.join(", "));
    sql.push(')');
    if let Some(predicate) = index.predicate() {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }
    sql
}

/// Idempotent index drop.
pub(crate) fn drop_index_sql(schema: &SchemaName, index_name: &str) -> String {
    format!(
        "DROP INDEX IF EXISTS {}.{}",
        schema.quoted(),
        quote_identifier(index_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndexType;
    use rstest::{fixture, rstest};

    #[fixture]
    fn schema() -> SchemaName {
        SchemaName::public()
    }

    #[fixture]
    fn name() -> QueueName {
        QueueName::new("jobs").expect("valid queue name")
    }

    #[rstest]
    fn plain_tables_key_on_id(schema: SchemaName, name: QueueName) {
        let sql = create_table_sql(&schema, &name, false);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"jobs\" ("));
        assert!(sql.contains("PRIMARY KEY (id)\n)"));
        assert!(!sql.contains("PARTITION BY"));
        assert!(sql.contains("payload        JSONB       NOT NULL"));
    }

    #[rstest]
    fn partitioned_tables_key_on_id_and_created_at(schema: SchemaName, name: QueueName) {
        let sql = create_table_sql(&schema, &name, true);

        assert!(sql.contains("PRIMARY KEY (id, created_at)"));
        assert!(sql.ends_with("PARTITION BY RANGE (created_at)"));
    }

    #[rstest]
    fn standard_indexes_are_labelled_by_suffix(schema: SchemaName, name: QueueName) {
        let statements = standard_indexes_sql(&schema, &name);
        let labels: Vec<_> = statements.iter().map(|(op, _)| op.as_str()).collect();

        assert_eq!(
            labels,
            vec![
                "create_index_created_at_idx",
                "create_index_processed_at_null_idx",
                "create_index_scheduled_for_idx",
                "create_index_metadata_idx",
            ]
        );
        assert!(statements.iter().any(|(_, sql)| sql
            == "CREATE INDEX IF NOT EXISTS \"jobs_metadata_idx\" ON \"public\".\"jobs\" USING GIN (metadata) WHERE (processed_at IS NULL)"));
    }

    #[rstest]
    fn template_copies_the_parent(schema: SchemaName, name: QueueName) {
        assert_eq!(
            create_template_sql(&schema, &name),
            "CREATE TABLE IF NOT EXISTS \"public\".\"jobs_template\" (LIKE \"public\".\"jobs\" INCLUDING ALL)"
        );
    }

    #[rstest]
    fn drops_cascade(schema: SchemaName, name: QueueName) {
        assert_eq!(
            drop_table_sql(&schema, &name),
            "DROP TABLE IF EXISTS \"public\".\"jobs\" CASCADE"
        );
        assert_eq!(
            drop_index_sql(&schema, "by_user"),
            "DROP INDEX IF EXISTS \"public\".\"by_user\""
        );
    }

    #[rstest]
    fn custom_btree_indexes_omit_the_access_method(schema: SchemaName, name: QueueName) {
        let index = CustomIndex::on(["user_id", "created_at"]);
        assert_eq!(
            create_custom_index_sql(&schema, &name, "by_user", &index),
            "CREATE INDEX IF NOT EXISTS \"by_user\" ON \"public\".\"jobs\" (user_id, created_at)"
        );
    }

    #[rstest]
    fn custom_partial_indexes_carry_method_and_predicate(schema: SchemaName, name: QueueName) {
        let index = CustomIndex::on(["metadata"])
            .using(IndexType::Gin)
            .filtered("processed_at IS NULL");
        assert_eq!(
            create_custom_index_sql(&schema, &name, "by_meta", &index),
            "CREATE INDEX IF NOT EXISTS \"by_meta\" ON \"public\".\"jobs\" USING gin (metadata) WHERE processed_at IS NULL"
        );
    }

    #[rstest]
    fn default_partition_pattern_escapes_the_underscore() {
        assert_eq!(default_partition_pattern(), "%\\_default");
    }

    #[rstest]
    fn partman_statements_take_the_control_column_and_pattern_as_binds() {
        assert!(CREATE_PARENT_SQL.contains("p_control               := $2"));
        assert!(!CREATE_PARENT_SQL.contains(PARTITION_CONTROL_COLUMN));
        assert!(DEFAULT_PARTITION_SQL.contains("LIKE $3"));
    }

    #[rstest]
    fn quoting_protects_hostile_index_names(schema: SchemaName, name: QueueName) {
        let index = CustomIndex::on(["a"]);
        let sql = create_custom_index_sql(&schema, &name, "x\"; DROP TABLE jobs; --", &index);
        assert!(sql.starts_with("CREATE INDEX IF NOT EXISTS \"x\"\"; DROP TABLE jobs; --\" ON"));
    }
}

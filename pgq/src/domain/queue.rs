//! Queue aggregates: the observed table, the desired definition and the
//! fixed pieces every queue table carries.

use serde::{Deserialize, Serialize};

use super::custom_index::CustomIndex;
use super::identifier::{Fqn, MAX_IDENTIFIER_LENGTH, QueueName, SchemaName, truncate_identifier};
use super::partition::PartitionConfig;

/// Suffix of the index on `created_at`.
pub const INDEX_CREATED_AT: &str = "_created_at_idx";
/// Suffix of the partial index on unprocessed rows.
pub const INDEX_PROCESSED_AT_NULL: &str = "_processed_at_null_idx";
/// Suffix of the partial index ordering unprocessed rows by `scheduled_for`.
pub const INDEX_SCHEDULED_FOR: &str = "_scheduled_for_idx";
/// Suffix of the partial GIN index over `metadata`.
pub const INDEX_METADATA: &str = "_metadata_idx";

/// The four reserved standard index suffixes, in creation order.
pub const STANDARD_INDEX_SUFFIXES: [&str; 4] = [
    INDEX_CREATED_AT,
    INDEX_PROCESSED_AT_NULL,
    INDEX_SCHEDULED_FOR,
    INDEX_METADATA,
];

/// Suffix appended to a partitioned queue's name to form its template table.
pub const TEMPLATE_SUFFIX: &str = "_template";

/// Names of the standard indexes of `name`, clipped the way PostgreSQL
/// clips identifiers so they match what the catalog reports.
#[must_use]
pub fn standard_index_names(name: &QueueName) -> [String; 4] {
    STANDARD_INDEX_SUFFIXES.map(|suffix| {
        let full = format!("{name}{suffix}");
        truncate_identifier(&full, MAX_IDENTIFIER_LENGTH).to_owned()
    })
}

/// A queue table as observed in the live database.
///
/// Values are only ever produced by probing the catalog; `partitioned`
/// reflects `pg_partitioned_table`, not a stored flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Queue {
    /// Queue table name.
    pub name: QueueName,
    /// Schema holding the table.
    pub schema: SchemaName,
    /// Whether the table is a range-partitioned parent.
    pub partitioned: bool,
}

impl Queue {
    /// Fully qualified name of the queue table.
    #[must_use]
    pub fn fqn(&self) -> Fqn {
        Fqn::new(&self.schema, &self.name)
    }

    /// Name of the template table pg_partman copies into new partitions.
    #[must_use]
    pub fn template_name(&self) -> String {
        template_table_name(&self.name)
    }

    /// Fully qualified name of the template table.
    #[must_use]
    pub fn template_fqn(&self) -> Fqn {
        Fqn::from_raw(format!("{}.{}", self.schema, self.template_name()))
    }
}

/// Template table name for the queue `name`.
#[must_use]
pub fn template_table_name(name: &QueueName) -> String {
    format!("{name}{TEMPLATE_SUFFIX}")
}

/// Desired state of a queue, as supplied by a caller.
///
/// # Examples
///
/// ```
/// use pgq::domain::QueueSpec;
///
/// let spec: QueueSpec = serde_json::from_str(
///     r#"{
///         "name": "events",
///         "partitioning": {"interval": "1 week"},
///         "custom_indexes": [{"columns": ["(payload->>'user_id')"]}]
///     }"#,
/// )
/// .expect("valid definition");
///
/// assert_eq!(spec.schema.as_str(), "public");
/// assert_eq!(spec.partitioning.as_ref().map(|p| p.premake), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSpec {
    /// Target schema; defaults to `public`.
    #[serde(default)]
    pub schema: SchemaName,
    /// Queue table name.
    pub name: QueueName,
    /// Partitioning policy; `None` creates a plain table.
    #[serde(default)]
    pub partitioning: Option<PartitionConfig>,
    /// Secondary indexes managed alongside the standard ones.
    #[serde(default)]
    pub custom_indexes: Vec<CustomIndex>,
}

impl QueueSpec {
    /// Definition of a plain queue with no custom indexes.
    #[must_use]
    pub fn simple(schema: SchemaName, name: QueueName) -> Self {
        Self {
            schema,
            name,
            partitioning: None,
            custom_indexes: Vec::new(),
        }
    }

    /// Fully qualified name targeted by this definition.
    #[must_use]
    pub fn fqn(&self) -> Fqn {
        Fqn::new(&self.schema, &self.name)
    }

    /// Whether the definition asks for a partitioned table.
    #[must_use]
    pub const fn is_partitioned(&self) -> bool {
        self.partitioning.is_some()
    }
}

/// Observed state of a queue: the table, its partition policy when
/// partitioned, and the custom indexes currently present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueState {
    /// The live table.
    pub queue: Queue,
    /// Effective pg_partman policy; `None` for plain tables.
    pub partitioning: Option<PartitionConfig>,
    /// Live custom indexes, sorted by name.
    pub custom_indexes: Vec<CustomIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn queue(schema: &str, name: &str) -> Queue {
        Queue {
            name: QueueName::new(name).expect("queue"),
            schema: SchemaName::new(schema).expect("schema"),
            partitioned: false,
        }
    }

    #[rstest]
    fn queue_fqn_joins_schema_and_name() {
        assert_eq!(queue("myschema", "myqueue").fqn().as_str(), "myschema.myqueue");
    }

    #[rstest]
    fn template_names_follow_the_queue() {
        let queue = queue("public", "test");
        assert_eq!(queue.template_name(), "test_template");
        assert_eq!(queue.template_fqn().as_str(), "public.test_template");
    }

    #[rstest]
    fn standard_index_names_use_every_suffix() {
        let name = QueueName::new("jobs").expect("queue");
        assert_eq!(
            standard_index_names(&name),
            [
                "jobs_created_at_idx",
                "jobs_processed_at_null_idx",
                "jobs_scheduled_for_idx",
                "jobs_metadata_idx",
            ]
        );
    }

    #[rstest]
    fn standard_index_names_are_clipped_like_postgres() {
        let name = QueueName::new("q".repeat(60)).expect("queue");
        for index in standard_index_names(&name) {
            assert_eq!(index.len(), MAX_IDENTIFIER_LENGTH);
        }
    }

    #[rstest]
    fn spec_rejects_unknown_fields() {
        let result = serde_json::from_str::<QueueSpec>(r#"{"name": "events", "colour": "red"}"#);
        assert!(result.is_err());
    }

    #[rstest]
    fn spec_rejects_invalid_names_before_any_ddl() {
        let result = serde_json::from_str::<QueueSpec>(r#"{"name": "1events"}"#);
        assert!(result.is_err());
    }
}

//! pg_partman partitioning policy for partitioned queues.
//!
//! Every field except [`PartitionConfig::default_partition`] is stored in
//! `partman.part_config` and read back from there. Whether a default
//! partition exists is a structural fact of the table (a child named
//! `<queue>_default` in `pg_inherits`), so it is checked rather than read and
//! it is only ever written by the initial registration.

use serde::{Deserialize, Serialize};

/// Suffix pg_partman gives the catch-all child partition.
pub const DEFAULT_PARTITION_SUFFIX: &str = "_default";

/// Control column every queue partitions on.
pub const PARTITION_CONTROL_COLUMN: &str = "created_at";

/// Effective or desired partitioning policy.
///
/// Missing fields in a serialized definition take the [`Default`] values.
///
/// # Examples
///
/// ```
/// use pgq::domain::PartitionConfig;
///
/// let config = PartitionConfig::default();
/// assert_eq!(config.interval, "1 day");
/// assert_eq!(config.retention.as_deref(), Some("14 days"));
/// assert!(config.default_partition);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionConfig {
    /// Width of each partition, as a PostgreSQL interval (`1 day`).
    pub interval: String,
    /// Number of partitions created ahead of time.
    pub premake: i32,
    /// How long partitions are kept; `None` keeps them forever.
    pub retention: Option<String>,
    /// Format of the partition name suffix (`YYYYMMDD`).
    pub datetime_string: String,
    /// Number of partitions back that constraint exclusion optimises.
    pub optimize_constraint: i32,
    /// Whether a default partition exists or should be created.
    pub default_partition: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            interval: String::from("1 day"),
            premake: 7,
            retention: Some(String::from("14 days")),
            datetime_string: String::from("YYYYMMDD"),
            optimize_constraint: 30,
            default_partition: true,
        }
    }
}

impl PartitionConfig {
    /// Compare only the fields stored in `part_config`.
    ///
    /// `default_partition` is excluded because the update path never writes
    /// it.
    #[must_use]
    pub fn same_stored_policy(&self, other: &Self) -> bool {
        self.interval == other.interval
            && self.premake == other.premake
            && self.retention == other.retention
            && self.datetime_string == other.datetime_string
            && self.optimize_constraint == other.optimize_constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn partial_definitions_fill_in_defaults() {
        let config: PartitionConfig =
            serde_json::from_str(r#"{"interval": "1 week", "premake": 2}"#).expect("valid");

        assert_eq!(config.interval, "1 week");
        assert_eq!(config.premake, 2);
        assert_eq!(config.datetime_string, "YYYYMMDD");
        assert_eq!(config.optimize_constraint, 30);
    }

    #[rstest]
    fn explicit_null_retention_disables_it() {
        let config: PartitionConfig =
            serde_json::from_str(r#"{"retention": null}"#).expect("valid");
        assert!(config.retention.is_none());
    }

    #[rstest]
    fn stored_policy_comparison_ignores_default_partition() {
        let desired = PartitionConfig::default();
        let live = PartitionConfig {
            default_partition: false,
            ..PartitionConfig::default()
        };
        assert!(desired.same_stored_policy(&live));

        let changed = PartitionConfig {
            premake: 3,
            ..PartitionConfig::default()
        };
        assert!(!desired.same_stored_policy(&changed));
    }
}

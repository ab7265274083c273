//! Row types for the raw catalog and pg_partman queries.
//!
//! These structs are internal to the persistence layer and never leave it.

use diesel::QueryableByName;
use diesel::sql_types::{Bool, Integer, Nullable, Text};

/// Single-column `EXISTS` check result.
#[derive(Debug, QueryableByName)]
pub(crate) struct PresenceRow {
    #[diesel(sql_type = Bool)]
    pub(crate) present: bool,
}

/// One index as reported by `pg_get_indexdef`.
#[derive(Debug, QueryableByName)]
pub(crate) struct IndexDefinitionRow {
    #[diesel(sql_type = Text)]
    pub(crate) index_name: String,
    #[diesel(sql_type = Text)]
    pub(crate) index_def: String,
}

/// Stored policy columns of `partman.part_config`.
#[derive(Debug, QueryableByName)]
pub(crate) struct PartConfigRow {
    #[diesel(sql_type = Text)]
    pub(crate) partition_interval: String,
    #[diesel(sql_type = Integer)]
    pub(crate) premake: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub(crate) retention: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub(crate) datetime_string: Option<String>,
    #[diesel(sql_type = Integer)]
    pub(crate) optimize_constraint: i32,
}

//! Domain model for queue lifecycle management.
//!
//! Purpose: define validated names, the queue aggregates, custom index
//! naming and diffing, the pg_partman policy, the error taxonomy and the
//! reconciliation service. Nothing here talks to a database; persistence is
//! reached through [`ports::QueueCatalog`].

mod macros;
pub(crate) use macros::define_domain_error;

pub mod custom_index;
pub mod error;
pub mod identifier;
pub mod index_plan;
pub mod partition;
pub mod ports;
pub mod queue;
pub mod queue_service;

pub use self::custom_index::{
    CustomIndex, IndexType, IndexTypeError, generate_index_name, parse_index_definition,
};
pub use self::error::{BoxError, QueueError};
pub use self::identifier::{
    Fqn, IdentifierError, MAX_IDENTIFIER_LENGTH, QueueName, SchemaName, is_valid_identifier,
    quote_identifier, truncate_identifier,
};
pub use self::index_plan::{IndexChangeSet, plan_index_changes};
pub use self::partition::{DEFAULT_PARTITION_SUFFIX, PARTITION_CONTROL_COLUMN, PartitionConfig};
pub use self::queue::{
    Queue, QueueSpec, QueueState, STANDARD_INDEX_SUFFIXES, TEMPLATE_SUFFIX, standard_index_names,
    template_table_name,
};
pub use self::queue_service::{DeleteReport, QueuePlan, QueueService, ReconcileOutcome};

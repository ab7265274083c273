//! PostgreSQL persistence adapters using Diesel.
//!
//! Implements the [`QueueCatalog`](crate::domain::ports::QueueCatalog) port
//! against PostgreSQL and pg_partman through `diesel-async` and a `bb8`
//! connection pool.
//!
//! - **Raw SQL**: queue tables have no fixed Diesel schema, so DDL and
//!   catalog lookups go through `sql_query` with typed binds. Identifiers are
//!   always quoted.
//! - **Internal models**: row structs (`models.rs`) never leave this module.
//! - **Labelled errors**: every statement failure carries the step that
//!   issued it and is mapped to a domain [`QueueError`](crate::domain::QueueError).
//!
//! # Example
//!
//! ```no_run
//! use pgq::outbound::persistence::{DbPool, DieselQueueCatalog, PoolConfig};
//!
//! # async fn run() -> Result<(), pgq::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/mydb")).await?;
//! let catalog = DieselQueueCatalog::new(pool);
//! # let _ = catalog;
//! # Ok(())
//! # }
//! ```

mod diesel_custom_indexes;
mod diesel_partman;
mod diesel_queue_catalog;
mod error_mapping;
mod models;
mod pool;
mod queue_ddl;

pub use diesel_custom_indexes::{
    create_custom_indexes_in, drop_custom_indexes_in, load_custom_indexes,
};
pub use diesel_queue_catalog::DieselQueueCatalog;
pub use error_mapping::StatementError;
pub use pool::{DbPool, PoolConfig, PoolError};

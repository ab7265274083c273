//! Declarative lifecycle management for PostgreSQL queue tables.
//!
//! The crate converges a desired queue definition (name, optional pg_partman
//! partitioning policy, named secondary indexes) onto whatever the live
//! database currently holds, issuing the smallest set of DDL needed.
//!
//! # Layout
//!
//! - [`domain`]: validated names, index naming and diffing, partition
//!   policy, the error taxonomy, ports and the reconciliation service.
//! - [`outbound`]: Diesel-backed adapters implementing the ports against
//!   PostgreSQL and pg_partman.
//! - [`config`]: connection settings loaded through `ortho_config`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pgq::domain::{QueueService, QueueSpec};
//! use pgq::outbound::persistence::{DbPool, DieselQueueCatalog, PoolConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/app")).await?;
//! let service = QueueService::new(Arc::new(DieselQueueCatalog::new(pool)));
//! let spec: QueueSpec = serde_json::from_str(r#"{"name": "events"}"#)?;
//! let outcome = service.apply(&spec).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod outbound;

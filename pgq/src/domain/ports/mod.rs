//! Domain ports for the hexagonal boundary.

mod queue_catalog;

#[cfg(test)]
pub use queue_catalog::MockQueueCatalog;
pub use queue_catalog::QueueCatalog;

//! Mapping of pool and Diesel failures into [`QueueError`].
//!
//! Statements run inside a transaction closure cannot build a
//! [`QueueError`] directly, because the closure's error type must absorb the
//! `diesel::result::Error` raised by `BEGIN`/`COMMIT`. [`StatementError`]
//! carries the step label out of the closure instead.

use tracing::debug;

use crate::domain::{Fqn, QueueError};

use super::pool::PoolError;

/// A failed statement tagged with the step that issued it.
///
/// Returned by the connection-level helpers so callers composing their own
/// transactions keep the step label.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {source}")]
pub struct StatementError {
    op: String,
    #[source]
    source: diesel::result::Error,
}

impl StatementError {
    /// Tag a Diesel error with `op`.
    #[must_use]
    pub fn new(op: impl Into<String>, source: diesel::result::Error) -> Self {
        Self {
            op: op.into(),
            source,
        }
    }

    /// Closure form of [`Self::new`] for `map_err`.
    #[must_use]
    pub fn at(op: impl Into<String>) -> impl FnOnce(diesel::result::Error) -> Self {
        let label = op.into();
        move |source| Self::new(label, source)
    }

    /// Label of the failing step.
    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Convert into a [`QueueError::Ddl`] for the queue `fqn`.
    #[must_use]
    pub fn into_ddl(self, fqn: &Fqn) -> QueueError {
        log_diesel_error(&self.op, &self.source);
        QueueError::ddl(self.op, fqn.clone(), self.source)
    }

    /// Convert into a [`QueueError::Partman`] for the queue `fqn`.
    #[must_use]
    pub fn into_partman(self, fqn: &Fqn) -> QueueError {
        log_diesel_error(&self.op, &self.source);
        QueueError::partman(self.op, fqn.clone(), self.source)
    }
}

impl From<diesel::result::Error> for StatementError {
    fn from(source: diesel::result::Error) -> Self {
        Self::new("transaction", source)
    }
}

/// Map a pool checkout failure for the queue `fqn`.
pub(crate) fn map_pool_error(error: PoolError, fqn: &Fqn) -> QueueError {
    debug!(%fqn, %error, "connection checkout failed");
    QueueError::ddl("connect", fqn.clone(), error)
}

/// Map a pool checkout failure ahead of a pg_partman step.
pub(crate) fn map_partman_pool_error(error: PoolError, fqn: &Fqn) -> QueueError {
    debug!(%fqn, %error, "connection checkout failed");
    QueueError::partman("connect", fqn.clone(), error)
}

fn log_diesel_error(op: &str, error: &diesel::result::Error) {
    use diesel::result::Error as DieselError;

    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(op, ?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            op,
            error_type = %std::any::type_name_of_val(error),
            "diesel operation failed"
        ),
    }
}

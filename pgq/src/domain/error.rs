//! Error taxonomy for queue lifecycle operations.
//!
//! Every failure names the queue it concerns by FQN. Database failures keep
//! the driver error as a boxed source so callers can walk the chain without
//! the domain depending on Diesel.

use super::identifier::Fqn;

/// Boxed underlying cause of a database failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a queue lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Creation was requested for a table that already exists.
    #[error("queue {fqn} already exists")]
    AlreadyExists {
        /// Queue the operation targeted.
        fqn: Fqn,
    },
    /// The queue does not exist.
    #[error("queue {fqn} not found")]
    NotFound {
        /// Queue the operation targeted.
        fqn: Fqn,
    },
    /// A DDL statement or catalog lookup failed.
    #[error("failed to {op} for queue {fqn}: {source}")]
    Ddl {
        /// Short label of the failing step, e.g. `create_table`.
        op: String,
        /// Queue the operation targeted.
        fqn: Fqn,
        /// Underlying database error.
        #[source]
        source: BoxError,
    },
    /// A pg_partman call or `part_config` access failed.
    #[error("partman {op} failed for queue {fqn}: {source}")]
    Partman {
        /// Short label of the failing step, e.g. `create_parent`.
        op: String,
        /// Queue the operation targeted.
        fqn: Fqn,
        /// Underlying database error.
        #[source]
        source: BoxError,
    },
}

impl QueueError {
    /// Build an [`QueueError::AlreadyExists`].
    #[must_use]
    pub const fn already_exists(fqn: Fqn) -> Self {
        Self::AlreadyExists { fqn }
    }

    /// Build a [`QueueError::NotFound`].
    #[must_use]
    pub const fn not_found(fqn: Fqn) -> Self {
        Self::NotFound { fqn }
    }

    /// Build a [`QueueError::Ddl`] from any error.
    #[must_use]
    pub fn ddl(
        op: impl Into<String>,
        fqn: Fqn,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Ddl {
            op: op.into(),
            fqn,
            source: source.into(),
        }
    }

    /// Build a [`QueueError::Partman`] from any error.
    #[must_use]
    pub fn partman(
        op: impl Into<String>,
        fqn: Fqn,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Partman {
            op: op.into(),
            fqn,
            source: source.into(),
        }
    }

    /// Queue the failure concerns.
    #[must_use]
    pub const fn fqn(&self) -> &Fqn {
        match self {
            Self::AlreadyExists { fqn }
            | Self::NotFound { fqn }
            | Self::Ddl { fqn, .. }
            | Self::Partman { fqn, .. } => fqn,
        }
    }

    /// Label of the failing step, for database failures.
    #[must_use]
    pub fn op(&self) -> Option<&str> {
        match self {
            Self::Ddl { op, .. } | Self::Partman { op, .. } => Some(op.as_str()),
            Self::AlreadyExists { .. } | Self::NotFound { .. } => None,
        }
    }

    /// Whether the queue was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether creation collided with an existing table.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether the failure came from pg_partman.
    #[must_use]
    pub const fn is_partman(&self) -> bool {
        matches!(self, Self::Partman { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use rstest::rstest;

    fn fqn() -> Fqn {
        Fqn::from_raw("public.events")
    }

    #[rstest]
    fn messages_name_the_queue() {
        assert_eq!(
            QueueError::already_exists(fqn()).to_string(),
            "queue public.events already exists"
        );
        assert_eq!(
            QueueError::not_found(fqn()).to_string(),
            "queue public.events not found"
        );
    }

    #[rstest]
    fn database_failures_keep_their_source() {
        let err = QueueError::ddl("create_table", fqn(), "relation is locked");

        assert_eq!(err.op(), Some("create_table"));
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("relation is locked")
        );
        assert!(err.to_string().contains("create_table"));
    }

    #[rstest]
    #[case(QueueError::not_found(fqn()), true, false, false)]
    #[case(QueueError::already_exists(fqn()), false, true, false)]
    #[case(QueueError::partman("create_parent", fqn(), "boom"), false, false, true)]
    #[case(QueueError::ddl("drop_table", fqn(), "boom"), false, false, false)]
    fn classification_helpers(
        #[case] err: QueueError,
        #[case] not_found: bool,
        #[case] already_exists: bool,
        #[case] partman: bool,
    ) {
        assert_eq!(err.is_not_found(), not_found);
        assert_eq!(err.is_already_exists(), already_exists);
        assert_eq!(err.is_partman(), partman);
        assert_eq!(err.fqn(), &fqn());
    }
}

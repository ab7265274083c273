//! Shared helpers for the embedded PostgreSQL integration suites.
//!
//! Each suite compiles as its own crate, so the helpers live here and are
//! pulled in with `mod support;`.

pub mod pg_embed;

use std::sync::Arc;

use pg_embedded_setup_unpriv::TestCluster;
use pgq::domain::{QueueName, QueueService};
use pgq::outbound::persistence::{DbPool, DieselQueueCatalog, PoolConfig};
use postgres::{Client, NoTls};
use tokio::runtime::Runtime;
use uuid::Uuid;

/// A running cluster with a service wired to it.
///
/// Suites stay synchronous and drive async calls through `runtime`, so no
/// test ever nests a runtime inside another.
pub struct Harness {
    /// Runtime shared by every call in one test.
    pub runtime: Runtime,
    /// Service under test.
    pub service: QueueService<DieselQueueCatalog>,
    /// The catalog behind `service`, for port-level assertions.
    pub catalog: Arc<DieselQueueCatalog>,
    /// URL of the database the catalog talks to.
    pub database_url: String,
    _cluster: TestCluster,
}

impl Harness {
    /// Start a cluster and wire a two-connection pool to its `postgres`
    /// database.
    pub fn start() -> Result<Self, String> {
        let cluster = pg_embed::test_cluster()?;
        let database_url = cluster.connection().database_url("postgres");
        let runtime = Runtime::new().map_err(|err| err.to_string())?;
        let pool = runtime
            .block_on(DbPool::new(
                PoolConfig::new(database_url.as_str()).with_max_size(2),
            ))
            .map_err(|err| err.to_string())?;
        let catalog = Arc::new(DieselQueueCatalog::new(pool));
        Ok(Self {
            runtime,
            service: QueueService::new(Arc::clone(&catalog)),
            catalog,
            database_url,
            _cluster: cluster,
        })
    }
}

/// A queue name no other test uses.
pub fn unique_queue() -> QueueName {
    QueueName::new(format!("q_{}", Uuid::new_v4().simple())).expect("generated name is valid")
}

/// Render a `postgres` error with its SQLSTATE, detail and hint.
///
/// `postgres::Error`'s `Display` often collapses to `db error`, which is
/// useless in CI logs.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    if let Some(hint) = db_error.hint() {
        summary.push_str("; hint: ");
        summary.push_str(hint);
    }
    summary
}

/// Whether `SKIP_TEST_CLUSTER` is set to `1`, `true` or `yes`.
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Skip with a marker when `SKIP_TEST_CLUSTER` is truthy, otherwise fail
/// loudly so CI breakage is not masked.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// Whether a relation with the given qualified name exists.
pub fn relation_exists(url: &str, qualified: &str) -> Result<bool, String> {
    let mut client = connect(url)?;
    let row = client
        .query_one("SELECT to_regclass($1) IS NOT NULL", &[&qualified])
        .map_err(|err| format_postgres_error(&err))?;
    Ok(row.get(0))
}

/// Open a synchronous client for out-of-band assertions.
pub fn connect(url: &str) -> Result<Client, String> {
    Client::connect(url, NoTls).map_err(|err| format_postgres_error(&err))
}

/// Names of every index on `schema.table`, sorted.
pub fn index_names(url: &str, schema: &str, table: &str) -> Result<Vec<String>, String> {
    let mut client = connect(url)?;
    let rows = client
        .query(
            "SELECT indexname::text FROM pg_indexes \
             WHERE schemaname = $1 AND tablename = $2 ORDER BY indexname",
            &[&schema, &table],
        )
        .map_err(|err| format_postgres_error(&err))?;
    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

/// Try to install pg_partman; `Err` carries the reason it is unavailable.
pub fn install_partman(url: &str) -> Result<(), String> {
    let mut client = connect(url)?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS partman; \
             CREATE EXTENSION IF NOT EXISTS pg_partman SCHEMA partman;",
        )
        .map_err(|err| format_postgres_error(&err))
}

//! Apply, plan, inspect and delete queue tables from JSON definitions.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ortho_config::OrthoConfig;
use pgq::config::ConnectionSettings;
use pgq::domain::identifier::FQN_SEPARATOR;
use pgq::domain::{Fqn, IdentifierError, QueueName, QueueService, QueueSpec, SchemaName};
use pgq::outbound::persistence::{DbPool, DieselQueueCatalog, PoolConfig};
use serde::Serialize;
use serde_json::json;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

type Service = QueueService<DieselQueueCatalog>;

/// `pgq` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pgq",
    about = "Declaratively manage PostgreSQL queue tables and their pg_partman policies",
    version
)]
struct CliArgs {
    /// Database connection URL. Overrides `PGQ_*` and libpq settings.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create the queue, or converge an existing one onto the definition.
    Apply {
        /// Path to a JSON queue definition.
        #[arg(value_name = "spec.json")]
        definition: PathBuf,
    },
    /// Print the changes `apply` would make without touching the database.
    Plan {
        /// Path to a JSON queue definition.
        #[arg(value_name = "spec.json")]
        definition: PathBuf,
    },
    /// Print the live state of a queue.
    Show {
        /// Queue as `schema.name`; a bare name targets `public`.
        #[arg(value_name = "schema.name")]
        queue: String,
    },
    /// Drop a queue and its pg_partman registration.
    Delete {
        /// Queue as `schema.name`; a bare name targets `public`.
        #[arg(value_name = "schema.name")]
        queue: String,
    },
}

fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    match run(CliArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "pgq: {err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> io::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: CliArgs) -> io::Result<()> {
    let service = connect(args.database_url.as_deref()).await?;

    match args.command {
        Command::Apply { definition } => {
            let spec = read_definition(&definition)?;
            let outcome = service
                .apply(&spec)
                .await
                .map_err(|error| io::Error::other(format!("apply {}: {error}", spec.fqn())))?;
            write_json(&outcome)
        }
        Command::Plan { definition } => {
            let spec = read_definition(&definition)?;
            let plan = service
                .plan(&spec)
                .await
                .map_err(|error| io::Error::other(format!("plan {}: {error}", spec.fqn())))?;
            write_json(&plan)
        }
        Command::Show { queue } => {
            let (schema, name) = parse_target(&queue).map_err(|error| invalid_input(&error))?;
            let state = service
                .read(&schema, &name)
                .await
                .map_err(|error| io::Error::other(format!("show {queue}: {error}")))?;
            write_json(&state)
        }
        Command::Delete { queue } => {
            let (schema, name) = parse_target(&queue).map_err(|error| invalid_input(&error))?;
            let report = service
                .delete(&schema, &name)
                .await
                .map_err(|error| io::Error::other(format!("delete {queue}: {error}")))?;
            write_json(&json!({
                "fqn": report.fqn,
                "was_partitioned": report.was_partitioned,
                "partman_cleanup_error": report
                    .partman_cleanup_error
                    .as_ref()
                    .map(ToString::to_string),
            }))
        }
    }
}

async fn connect(explicit_url: Option<&str>) -> io::Result<Service> {
    let pool = DbPool::new(pool_config(explicit_url)?)
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    Ok(QueueService::new(Arc::new(DieselQueueCatalog::new(pool))))
}

fn pool_config(explicit_url: Option<&str>) -> io::Result<PoolConfig> {
    let settings = ConnectionSettings::load_from_iter([OsString::from("pgq")])
        .map_err(|error| io::Error::other(format!("load connection settings: {error}")))?;
    pool_config_with(settings, explicit_url)
}

fn pool_config_with(
    settings: ConnectionSettings,
    explicit_url: Option<&str>,
) -> io::Result<PoolConfig> {
    let effective = match explicit_url {
        Some(value) if value.trim().is_empty() => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "--database-url must not be empty when provided",
            ));
        }
        Some(value) => ConnectionSettings {
            database_url: Some(value.to_owned()),
            ..settings
        },
        None => settings,
    };
    effective.pool_config().map_err(|error| invalid_input(&error))
}

fn read_definition(path: &Path) -> io::Result<QueueSpec> {
    let raw = fs::read_to_string(path).map_err(|error| {
        io::Error::new(
            error.kind(),
            format!("read definition '{}': {error}", path.display()),
        )
    })?;
    parse_definition(&raw).map_err(|error| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("parse definition '{}': {error}", path.display()),
        )
    })
}

fn parse_definition(raw: &str) -> Result<QueueSpec, serde_json::Error> {
    serde_json::from_str(raw)
}

fn parse_target(raw: &str) -> Result<(SchemaName, QueueName), IdentifierError> {
    if raw.contains(FQN_SEPARATOR) {
        Fqn::from_raw(raw).parse()
    } else {
        Ok((SchemaName::public(), QueueName::new(raw)?))
    }
}

fn invalid_input(error: &impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(io::stdout().lock(), "{rendered}")
}

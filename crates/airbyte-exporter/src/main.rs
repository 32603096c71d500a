//! Prometheus exporter for the Airbyte data-integration platform.
//!
//! On every scrape the exporter queries Airbyte's PostgreSQL database for
//! aggregate connection, connector and job counts and exposes them at
//! `/metrics` in the text exposition format.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod collector;
mod server;

use std::process;
use std::sync::Arc;

use clap::Parser;
use prometheus::Registry;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use airbyte_exporter_core::db::{self, DatabaseConfig};
use airbyte_exporter_core::repository::Repository;
use airbyte_exporter_core::service::Service;

use collector::AirbyteCollector;

/// Prometheus exporter for Airbyte.
#[derive(Parser)]
#[command(name = "airbyte-exporter", about = "Prometheus exporter for Airbyte", version)]
struct Args {
    /// Listen on this address (host:port).
    #[arg(
        long,
        default_value = "0.0.0.0:8080",
        env = "AIRBYTE_EXPORTER_LISTEN_ADDR"
    )]
    listen_addr: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "AIRBYTE_EXPORTER_LOG_LEVEL")]
    log_level: String,

    /// Database address (host:port).
    #[arg(
        long,
        default_value = "localhost:5432",
        env = "AIRBYTE_EXPORTER_DB_ADDR"
    )]
    db_addr: String,

    /// Database name.
    #[arg(long, default_value = "airbyte", env = "AIRBYTE_EXPORTER_DB_NAME")]
    db_name: String,

    /// Database user.
    #[arg(
        long,
        default_value = "airbyte_exporter",
        env = "AIRBYTE_EXPORTER_DB_USER"
    )]
    db_user: String,

    /// Database password.
    #[arg(
        long,
        default_value = "airbyte_exporter",
        env = "AIRBYTE_EXPORTER_DB_PASSWORD"
    )]
    db_password: String,

    /// Database sslmode (disable, prefer, require).
    #[arg(long, default_value = "disable", env = "AIRBYTE_EXPORTER_DB_SSLMODE")]
    db_sslmode: String,
}

impl Args {
    fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            addr: self.db_addr.clone(),
            name: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            sslmode: self.db_sslmode.clone(),
        }
    }
}

/// Initializes the tracing subscriber from the configured log level.
fn init_logging(log_level: &str) -> Result<(), String> {
    let level: Level = log_level
        .parse()
        .map_err(|_| format!("invalid log level '{log_level}'"))?;

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("airbyte_exporter={level}").parse().unwrap())
        .add_directive(format!("airbyte_exporter_core={level}").parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(err) = init_logging(&args.log_level) {
        eprintln!("{err}");
        process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "airbyte-exporter starting");

    let pool = match db::connect(&args.database_config()) {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                %err,
                db_addr = %args.db_addr,
                db_name = %args.db_name,
                "failed to create the database connection pool"
            );
            process::exit(1);
        }
    };
    info!(db_addr = %args.db_addr, db_name = %args.db_name, "database connection pool ready");

    let repository = Repository::new(pool);
    let service = Service::new(repository);

    let registry = Registry::new();
    if let Err(err) = registry.register(Box::new(AirbyteCollector::new(service))) {
        error!(%err, "failed to register the Airbyte collector");
        process::exit(1);
    }
    let registry = Arc::new(registry);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            if let Err(err) = server::serve(registry, &args.listen_addr).await {
                error!(%err, "HTTP server failed");
                process::exit(1);
            }
        });
}

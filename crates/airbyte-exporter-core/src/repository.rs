//! Query execution and row mapping for the Airbyte database.

use postgres::Row;

use crate::db::ConnectionPool;
use crate::metrics::{ActorCount, ConnectionCount, ConnectionSyncAge, JobCount};
use crate::queries::{self, ActorType};

/// Error type for metric gathering queries.
#[derive(Debug)]
pub enum RepositoryError {
    /// Checking a connection out of the pool failed.
    Pool(r2d2::Error),
    /// Query execution or row decoding failed.
    Query(postgres::Error),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Pool(err) => write!(f, "repository: connection pool: {err}"),
            RepositoryError::Query(err) => write!(f, "repository: query: {err}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<r2d2::Error> for RepositoryError {
    fn from(err: r2d2::Error) -> Self {
        RepositoryError::Pool(err)
    }
}

impl From<postgres::Error> for RepositoryError {
    fn from(err: postgres::Error) -> Self {
        RepositoryError::Query(err)
    }
}

fn connection_count_row(row: &Row) -> Result<ConnectionCount, postgres::Error> {
    Ok(ConnectionCount {
        destination_connector: row.try_get("destination")?,
        schedule_type: row.try_get("schedule_type")?,
        source_connector: row.try_get("source")?,
        status: row.try_get("status")?,
        count: row.try_get::<_, i64>("count")? as u64,
    })
}

fn connection_sync_age_row(row: &Row) -> Result<ConnectionSyncAge, postgres::Error> {
    Ok(ConnectionSyncAge {
        connection_id: row.try_get("connection_id")?,
        destination_connector: row.try_get("destination")?,
        source_connector: row.try_get("source")?,
        hours: row.try_get("hours")?,
    })
}

fn actor_count_row(row: &Row) -> Result<ActorCount, postgres::Error> {
    Ok(ActorCount {
        actor_connector: row.try_get("actor")?,
        tombstone: row.try_get("tombstone")?,
        count: row.try_get::<_, i64>("count")? as u64,
    })
}

fn job_count_row(row: &Row) -> Result<JobCount, postgres::Error> {
    Ok(JobCount {
        destination_connector: row.try_get("destination")?,
        source_connector: row.try_get("source")?,
        job_type: row.try_get("config_type")?,
        status: row.try_get("status")?,
        count: row.try_get::<_, i64>("count")? as u64,
    })
}

/// Runs the fixed set of aggregate queries against the Airbyte PostgreSQL
/// database.
///
/// The repository owns no state beyond the shared pool; every call checks
/// out its own connection and runs a single query.
pub struct Repository {
    pool: ConnectionPool,
}

impl Repository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Runs `query` and maps each returned row through `map`.
    fn query_records<T>(
        &self,
        query: &str,
        map: fn(&Row) -> Result<T, postgres::Error>,
    ) -> Result<Vec<T>, RepositoryError> {
        let mut client = self.pool.get()?;
        let rows = client.query(query, &[])?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(map(row)?);
        }

        Ok(records)
    }

    /// Returns the count of connections, grouped by destination connector,
    /// schedule type, source connector and status.
    pub fn connections_count(&self) -> Result<Vec<ConnectionCount>, RepositoryError> {
        self.query_records(queries::CONNECTIONS_COUNT, connection_count_row)
    }

    /// Returns the age of the last successful sync job attempt for active
    /// connections.
    pub fn connections_last_successful_sync_age(
        &self,
    ) -> Result<Vec<ConnectionSyncAge>, RepositoryError> {
        self.query_records(
            queries::CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE,
            connection_sync_age_row,
        )
    }

    /// Returns the count of sources, grouped by connector and tombstone
    /// status.
    pub fn sources_count(&self) -> Result<Vec<ActorCount>, RepositoryError> {
        self.query_records(
            &queries::build_actor_count_query(ActorType::Source),
            actor_count_row,
        )
    }

    /// Returns the count of destinations, grouped by connector and
    /// tombstone status.
    pub fn destinations_count(&self) -> Result<Vec<ActorCount>, RepositoryError> {
        self.query_records(
            &queries::build_actor_count_query(ActorType::Destination),
            actor_count_row,
        )
    }

    /// Returns the count of completed jobs, grouped by destination
    /// connector, source connector, type and status.
    pub fn jobs_completed_count(&self) -> Result<Vec<JobCount>, RepositoryError> {
        self.query_records(queries::JOBS_COMPLETED_COUNT, job_count_row)
    }

    /// Returns the count of pending jobs, grouped by destination connector,
    /// source connector and type.
    pub fn jobs_pending_count(&self) -> Result<Vec<JobCount>, RepositoryError> {
        self.query_records(queries::JOBS_PENDING_COUNT, job_count_row)
    }

    /// Returns the count of running jobs with a running attempt, grouped by
    /// destination connector, source connector and type.
    pub fn jobs_running_count(&self) -> Result<Vec<JobCount>, RepositoryError> {
        self.query_records(queries::JOBS_RUNNING_COUNT, job_count_row)
    }

    /// Returns the count of running jobs whose connection is missing,
    /// inactive or deprecated.
    pub fn jobs_running_orphans_count(&self) -> Result<u64, RepositoryError> {
        let mut client = self.pool.get()?;
        let row = client.query_one(queries::JOBS_RUNNING_ORPHANS_COUNT, &[])?;

        Ok(row.try_get::<_, i64>("count")? as u64)
    }
}

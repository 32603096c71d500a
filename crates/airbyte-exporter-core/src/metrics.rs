//! Metrics snapshot value types.
//!
//! Every type here is a request-scoped value: built once per scrape by the
//! [`Service`](crate::service::Service), consumed by the Prometheus
//! collector, then discarded. Nothing is shared or cached between scrapes.

/// A count of Airbyte connections, grouped by destination connector,
/// schedule type, source connector and status.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCount {
    pub destination_connector: String,
    pub schedule_type: String,
    pub source_connector: String,
    pub status: String,
    pub count: u64,
}

/// Age of the last successful sync job for an active connection, in
/// fractional hours.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSyncAge {
    pub connection_id: String,
    pub destination_connector: String,
    pub source_connector: String,
    pub hours: f64,
}

/// A count of Airbyte actors (sources or destinations), grouped by
/// connector name and tombstone status.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorCount {
    pub actor_connector: String,
    pub tombstone: bool,
    pub count: u64,
}

/// A count of Airbyte jobs, grouped by destination connector, source
/// connector, job type and status.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCount {
    pub destination_connector: String,
    pub source_connector: String,
    pub job_type: String,
    pub status: String,
    pub count: u64,
}

/// A complete metrics snapshot of the Airbyte database.
///
/// A query returning zero rows yields an empty vector, never an absent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub connections: Vec<ConnectionCount>,
    pub connection_sync_ages: Vec<ConnectionSyncAge>,

    pub sources: Vec<ActorCount>,
    pub destinations: Vec<ActorCount>,

    pub jobs_completed: Vec<JobCount>,
    pub jobs_pending: Vec<JobCount>,
    pub jobs_running: Vec<JobCount>,

    /// Running jobs whose connection is missing, inactive or deprecated.
    pub jobs_running_orphans: u64,
}

//! Snapshot assembly.

use tracing::debug;

use crate::metrics::Metrics;
use crate::repository::{Repository, RepositoryError};

/// Handles domain operations for gathering metrics from the Airbyte
/// database.
pub struct Service {
    repository: Repository,
}

impl Service {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Gathers a complete metrics snapshot.
    ///
    /// Queries run in a fixed order and the first failure aborts the
    /// snapshot; callers never observe a partially populated [`Metrics`].
    pub fn gather_metrics(&self) -> Result<Metrics, RepositoryError> {
        let connections = self.repository.connections_count()?;
        let connection_sync_ages = self.repository.connections_last_successful_sync_age()?;
        let sources = self.repository.sources_count()?;
        let destinations = self.repository.destinations_count()?;
        let jobs_completed = self.repository.jobs_completed_count()?;
        let jobs_pending = self.repository.jobs_pending_count()?;
        let jobs_running = self.repository.jobs_running_count()?;
        let jobs_running_orphans = self.repository.jobs_running_orphans_count()?;

        debug!(
            connections = connections.len(),
            sync_ages = connection_sync_ages.len(),
            sources = sources.len(),
            destinations = destinations.len(),
            jobs_completed = jobs_completed.len(),
            jobs_pending = jobs_pending.len(),
            jobs_running = jobs_running.len(),
            jobs_running_orphans,
            "gathered metrics"
        );

        Ok(Metrics {
            connections,
            connection_sync_ages,
            sources,
            destinations,
            jobs_completed,
            jobs_pending,
            jobs_running,
            jobs_running_orphans,
        })
    }
}

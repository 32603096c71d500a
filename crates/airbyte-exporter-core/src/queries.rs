//! SQL aggregate queries against the Airbyte configuration database.
//!
//! All queries resolve human-readable connector names through
//! `actor` → `actor_definition` joins instead of exposing raw identifiers,
//! group by every label dimension being exposed, and order by those same
//! dimensions so metric ordering stays stable across scrapes.
//!
//! Enum-typed columns (`status`, `config_type`, `schedule_type`) are cast
//! to `VARCHAR` so rows decode as plain strings.

/// Airbyte actor type, as stored in the `actor.actor_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    Source,
    Destination,
}

impl ActorType {
    fn as_sql(self) -> &'static str {
        match self {
            ActorType::Source => "source",
            ActorType::Destination => "destination",
        }
    }
}

/// Connections, grouped by destination connector, schedule type, source
/// connector and status. Connections without an explicit schedule type are
/// reported as `manual`.
pub const CONNECTIONS_COUNT: &str = "
SELECT ad1.name AS destination,
       COALESCE(CAST(c.schedule_type AS VARCHAR), 'manual') AS schedule_type,
       ad2.name AS source,
       CAST(c.status AS VARCHAR) AS status,
       COUNT(*) AS count
FROM connection c
JOIN actor a1 ON c.destination_id = a1.id
JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id
JOIN actor a2 ON c.source_id = a2.id
JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id
GROUP BY ad1.name, COALESCE(CAST(c.schedule_type AS VARCHAR), 'manual'), ad2.name, c.status
ORDER BY ad1.name, COALESCE(CAST(c.schedule_type AS VARCHAR), 'manual'), ad2.name, c.status
";

/// Age of the most recent successful sync job per active connection, in
/// fractional hours as measured by the database server's clock.
pub const CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE: &str = "
WITH last_sync AS (
    SELECT scope, MAX(updated_at) AS updated_at
    FROM jobs
    WHERE config_type = 'sync'
    AND   status = 'succeeded'
    GROUP BY scope
)
SELECT CAST(c.id AS VARCHAR(255)) AS connection_id,
       ad1.name AS destination,
       ad2.name AS source,
       CAST(EXTRACT(EPOCH FROM AGE(NOW(), last_sync.updated_at)) / 3600 AS DOUBLE PRECISION) AS hours
FROM connection c
JOIN last_sync ON last_sync.scope = CAST(c.id AS VARCHAR(255))
JOIN actor a1 ON c.destination_id = a1.id
JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id
JOIN actor a2 ON c.source_id = a2.id
JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id
WHERE c.status = 'active'
ORDER BY ad1.name, ad2.name, connection_id
";

/// Completed jobs (terminal statuses only), grouped by destination
/// connector, source connector, job type and status.
pub const JOBS_COMPLETED_COUNT: &str = "
SELECT ad1.name AS destination,
       ad2.name AS source,
       CAST(j.config_type AS VARCHAR) AS config_type,
       CAST(j.status AS VARCHAR) AS status,
       COUNT(*) AS count
FROM jobs j
JOIN connection c ON j.scope = CAST(c.id AS VARCHAR(255))
JOIN actor a1 ON c.destination_id = a1.id
JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id
JOIN actor a2 ON c.source_id = a2.id
JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id
WHERE j.status IN ('cancelled', 'failed', 'succeeded')
GROUP BY ad1.name, ad2.name, j.config_type, j.status
ORDER BY ad1.name, ad2.name, j.config_type, j.status
";

/// Pending jobs, grouped by destination connector, source connector and
/// job type.
pub const JOBS_PENDING_COUNT: &str = "
SELECT ad1.name AS destination,
       ad2.name AS source,
       CAST(j.config_type AS VARCHAR) AS config_type,
       CAST(j.status AS VARCHAR) AS status,
       COUNT(*) AS count
FROM jobs j
JOIN connection c ON CAST(c.id AS VARCHAR(255)) = j.scope
JOIN actor a1 ON c.destination_id = a1.id
JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id
JOIN actor a2 ON c.source_id = a2.id
JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id
WHERE j.status = 'pending'
GROUP BY ad1.name, ad2.name, j.config_type, j.status
ORDER BY ad1.name, ad2.name, j.config_type, j.status
";

/// Running jobs with at least one attempt currently running, grouped by
/// destination connector, source connector and job type.
pub const JOBS_RUNNING_COUNT: &str = "
SELECT ad1.name AS destination,
       ad2.name AS source,
       CAST(j.config_type AS VARCHAR) AS config_type,
       CAST(j.status AS VARCHAR) AS status,
       COUNT(*) AS count
FROM jobs j
JOIN attempts att ON att.job_id = j.id
JOIN connection c ON j.scope = CAST(c.id AS VARCHAR(255))
JOIN actor a1 ON c.destination_id = a1.id
JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id
JOIN actor a2 ON c.source_id = a2.id
JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id
WHERE j.status = 'running'
AND   att.status = 'running'
GROUP BY ad1.name, ad2.name, j.config_type, j.status
ORDER BY ad1.name, ad2.name, j.config_type, j.status
";

/// Running jobs whose connection is gone or no longer active. The outer
/// join keeps jobs whose scope no longer resolves to a connection.
pub const JOBS_RUNNING_ORPHANS_COUNT: &str = "
SELECT COUNT(*) AS count
FROM jobs j
LEFT JOIN connection c ON CAST(c.id AS VARCHAR(255)) = j.scope
WHERE j.status = 'running'
AND   (c.id IS NULL OR c.status <> 'active')
";

/// Builds the actor count query for the given actor type: actors joined to
/// their connector definition, grouped by connector name and tombstone flag.
pub fn build_actor_count_query(actor_type: ActorType) -> String {
    format!(
        "
SELECT ad.name AS actor,
       a.tombstone AS tombstone,
       COUNT(*) AS count
FROM actor a
JOIN actor_definition ad ON a.actor_definition_id = ad.id
WHERE a.actor_type = '{}'
GROUP BY ad.name, a.tombstone
ORDER BY ad.name, a.tombstone
",
        actor_type.as_sql()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_count_resolves_connector_names() {
        assert!(CONNECTIONS_COUNT.contains("JOIN actor_definition ad1 ON a1.actor_definition_id = ad1.id"));
        assert!(CONNECTIONS_COUNT.contains("JOIN actor_definition ad2 ON a2.actor_definition_id = ad2.id"));
        assert!(!CONNECTIONS_COUNT.contains("c.destination_id AS"));
    }

    #[test]
    fn connections_count_defaults_schedule_type_to_manual() {
        assert!(CONNECTIONS_COUNT.contains("COALESCE(CAST(c.schedule_type AS VARCHAR), 'manual')"));
    }

    #[test]
    fn connections_count_groups_and_orders_by_the_same_dimensions() {
        let group_by = CONNECTIONS_COUNT
            .lines()
            .find(|line| line.starts_with("GROUP BY"))
            .expect("GROUP BY clause");
        let order_by = CONNECTIONS_COUNT
            .lines()
            .find(|line| line.starts_with("ORDER BY"))
            .expect("ORDER BY clause");
        assert_eq!(
            group_by.trim_start_matches("GROUP BY"),
            order_by.trim_start_matches("ORDER BY")
        );
    }

    #[test]
    fn sync_age_targets_active_connections_with_successful_syncs() {
        assert!(CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE.contains("WHERE config_type = 'sync'"));
        assert!(CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE.contains("status = 'succeeded'"));
        assert!(CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE.contains("WHERE c.status = 'active'"));
    }

    #[test]
    fn sync_age_reports_hours_as_double_precision() {
        assert!(
            CONNECTIONS_LAST_SUCCESSFUL_SYNC_AGE
                .contains("CAST(EXTRACT(EPOCH FROM AGE(NOW(), last_sync.updated_at)) / 3600 AS DOUBLE PRECISION) AS hours")
        );
    }

    #[test]
    fn actor_count_query_filters_by_actor_type() {
        let sources = build_actor_count_query(ActorType::Source);
        assert!(sources.contains("WHERE a.actor_type = 'source'"));

        let destinations = build_actor_count_query(ActorType::Destination);
        assert!(destinations.contains("WHERE a.actor_type = 'destination'"));
    }

    #[test]
    fn actor_count_query_groups_by_connector_and_tombstone() {
        let q = build_actor_count_query(ActorType::Source);
        assert!(q.contains("GROUP BY ad.name, a.tombstone"));
        assert!(q.contains("ORDER BY ad.name, a.tombstone"));
    }

    #[test]
    fn completed_jobs_filter_terminal_statuses() {
        assert!(JOBS_COMPLETED_COUNT.contains("WHERE j.status IN ('cancelled', 'failed', 'succeeded')"));
    }

    #[test]
    fn running_jobs_require_a_running_attempt() {
        assert!(JOBS_RUNNING_COUNT.contains("JOIN attempts att ON att.job_id = j.id"));
        assert!(JOBS_RUNNING_COUNT.contains("att.status = 'running'"));
    }

    #[test]
    fn orphan_jobs_use_an_outer_join_on_connection() {
        assert!(JOBS_RUNNING_ORPHANS_COUNT.contains("LEFT JOIN connection c"));
        assert!(JOBS_RUNNING_ORPHANS_COUNT.contains("c.id IS NULL OR c.status <> 'active'"));
    }

    #[test]
    fn enum_columns_are_cast_to_varchar() {
        for query in [JOBS_COMPLETED_COUNT, JOBS_PENDING_COUNT, JOBS_RUNNING_COUNT] {
            assert!(query.contains("CAST(j.config_type AS VARCHAR) AS config_type"));
            assert!(query.contains("CAST(j.status AS VARCHAR) AS status"));
        }
        assert!(CONNECTIONS_COUNT.contains("CAST(c.status AS VARCHAR) AS status"));
    }
}

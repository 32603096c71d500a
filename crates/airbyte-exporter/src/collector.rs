//! Prometheus collector for Airbyte metrics.
//!
//! The collector holds no metric state of its own: every scrape gathers a
//! fresh snapshot from the service and renders it into newly built metric
//! families, so nothing carries over between scrapes.

use std::collections::HashMap;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntGauge, Opts};
use tracing::{error, warn};

use airbyte_exporter_core::metrics::Metrics;
use airbyte_exporter_core::service::Service;
use airbyte_exporter_core::util::sync_age_duration;

const NAMESPACE: &str = "airbyte";

const CONNECTIONS_NAME: &str = "connections";
const CONNECTIONS_HELP: &str =
    "Connections, by destination connector, schedule type, source connector and status";
const CONNECTIONS_LABELS: [&str; 4] = ["destination", "schedule_type", "source", "status"];

const SYNC_AGE_NAME: &str = "connection_last_successful_sync_age_hours";
const SYNC_AGE_HELP: &str =
    "Hours elapsed since the last successful sync of an active connection";
const SYNC_AGE_LABELS: [&str; 2] = ["destination", "source"];
/// Histogram bucket boundaries, in hours.
const SYNC_AGE_BUCKETS: [f64; 7] = [6.0, 12.0, 18.0, 24.0, 48.0, 72.0, 168.0];

const SOURCES_NAME: &str = "sources";
const SOURCES_HELP: &str = "Sources, by connector and tombstone status";
const DESTINATIONS_NAME: &str = "destinations";
const DESTINATIONS_HELP: &str = "Destinations, by connector and tombstone status";
const ACTOR_LABELS: [&str; 2] = ["actor", "tombstone"];

const JOBS_COMPLETED_NAME: &str = "jobs_completed_total";
const JOBS_COMPLETED_HELP: &str =
    "Completed jobs, by destination connector, source connector, type and status";
const JOBS_COMPLETED_LABELS: [&str; 4] = ["destination", "source", "type", "status"];

const JOBS_PENDING_NAME: &str = "jobs_pending";
const JOBS_PENDING_HELP: &str =
    "Pending jobs, by destination connector, source connector and type";
const JOBS_RUNNING_NAME: &str = "jobs_running";
const JOBS_RUNNING_HELP: &str =
    "Running jobs, by destination connector, source connector and type";
const JOB_GAUGE_LABELS: [&str; 3] = ["destination", "source", "type"];

const JOBS_RUNNING_ORPHAN_NAME: &str = "jobs_running_orphan";
const JOBS_RUNNING_ORPHAN_HELP: &str =
    "Running jobs whose connection is missing, inactive or deprecated";

fn fq(name: &str) -> String {
    format!("{NAMESPACE}_{name}")
}

fn desc(name: &str, help: &str, labels: &[&str]) -> Desc {
    Desc::new(
        fq(name),
        help.to_string(),
        labels.iter().map(|label| label.to_string()).collect(),
        HashMap::new(),
    )
    .expect("valid metric descriptor")
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels).expect("valid gauge options")
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
        .expect("valid counter options")
}

fn histogram_vec(name: &str, help: &str, labels: &[&str], buckets: &[f64]) -> HistogramVec {
    HistogramVec::new(
        HistogramOpts::new(name, help)
            .namespace(NAMESPACE)
            .buckets(buckets.to_vec()),
        labels,
    )
    .expect("valid histogram options")
}

fn int_gauge(name: &str, help: &str) -> IntGauge {
    IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE)).expect("valid gauge options")
}

/// Renders a metrics snapshot into Prometheus metric families.
///
/// Sync-age records that fail duration parsing are logged with their
/// connection id and skipped; they never abort the scrape.
fn build_families(metrics: &Metrics) -> Vec<MetricFamily> {
    let mut families = Vec::new();

    let connections = gauge_vec(CONNECTIONS_NAME, CONNECTIONS_HELP, &CONNECTIONS_LABELS);
    for connection in &metrics.connections {
        connections
            .with_label_values(&[
                connection.destination_connector.as_str(),
                connection.schedule_type.as_str(),
                connection.source_connector.as_str(),
                connection.status.as_str(),
            ])
            .set(connection.count as f64);
    }
    families.extend(connections.collect());

    let sync_ages = histogram_vec(
        SYNC_AGE_NAME,
        SYNC_AGE_HELP,
        &SYNC_AGE_LABELS,
        &SYNC_AGE_BUCKETS,
    );
    for age in &metrics.connection_sync_ages {
        match sync_age_duration(age.hours) {
            Ok(duration) => {
                sync_ages
                    .with_label_values(&[
                        age.destination_connector.as_str(),
                        age.source_connector.as_str(),
                    ])
                    .observe(duration.as_secs_f64() / 3600.0);
            }
            Err(err) => {
                warn!(connection_id = %age.connection_id, %err, "skipping sync age record");
            }
        }
    }
    families.extend(sync_ages.collect());

    let sources = gauge_vec(SOURCES_NAME, SOURCES_HELP, &ACTOR_LABELS);
    for source in &metrics.sources {
        sources
            .with_label_values(&[
                source.actor_connector.as_str(),
                if source.tombstone { "true" } else { "false" },
            ])
            .set(source.count as f64);
    }
    families.extend(sources.collect());

    let destinations = gauge_vec(DESTINATIONS_NAME, DESTINATIONS_HELP, &ACTOR_LABELS);
    for destination in &metrics.destinations {
        destinations
            .with_label_values(&[
                destination.actor_connector.as_str(),
                if destination.tombstone { "true" } else { "false" },
            ])
            .set(destination.count as f64);
    }
    families.extend(destinations.collect());

    let jobs_completed = counter_vec(
        JOBS_COMPLETED_NAME,
        JOBS_COMPLETED_HELP,
        &JOBS_COMPLETED_LABELS,
    );
    for job in &metrics.jobs_completed {
        jobs_completed
            .with_label_values(&[
                job.destination_connector.as_str(),
                job.source_connector.as_str(),
                job.job_type.as_str(),
                job.status.as_str(),
            ])
            .inc_by(job.count as f64);
    }
    families.extend(jobs_completed.collect());

    let jobs_pending = gauge_vec(JOBS_PENDING_NAME, JOBS_PENDING_HELP, &JOB_GAUGE_LABELS);
    for job in &metrics.jobs_pending {
        jobs_pending
            .with_label_values(&[
                job.destination_connector.as_str(),
                job.source_connector.as_str(),
                job.job_type.as_str(),
            ])
            .set(job.count as f64);
    }
    families.extend(jobs_pending.collect());

    let jobs_running = gauge_vec(JOBS_RUNNING_NAME, JOBS_RUNNING_HELP, &JOB_GAUGE_LABELS);
    for job in &metrics.jobs_running {
        jobs_running
            .with_label_values(&[
                job.destination_connector.as_str(),
                job.source_connector.as_str(),
                job.job_type.as_str(),
            ])
            .set(job.count as f64);
    }
    families.extend(jobs_running.collect());

    let jobs_running_orphan = int_gauge(JOBS_RUNNING_ORPHAN_NAME, JOBS_RUNNING_ORPHAN_HELP);
    jobs_running_orphan.set(metrics.jobs_running_orphans as i64);
    families.extend(jobs_running_orphan.collect());

    families
}

/// Collects and exposes Airbyte metrics.
pub(crate) struct AirbyteCollector {
    service: Service,
    descs: Vec<Desc>,
}

impl AirbyteCollector {
    /// Initializes a collector with the fixed descriptor set for all
    /// Airbyte metrics.
    pub(crate) fn new(service: Service) -> Self {
        let descs = vec![
            desc(CONNECTIONS_NAME, CONNECTIONS_HELP, &CONNECTIONS_LABELS),
            desc(SYNC_AGE_NAME, SYNC_AGE_HELP, &SYNC_AGE_LABELS),
            desc(SOURCES_NAME, SOURCES_HELP, &ACTOR_LABELS),
            desc(DESTINATIONS_NAME, DESTINATIONS_HELP, &ACTOR_LABELS),
            desc(
                JOBS_COMPLETED_NAME,
                JOBS_COMPLETED_HELP,
                &JOBS_COMPLETED_LABELS,
            ),
            desc(JOBS_PENDING_NAME, JOBS_PENDING_HELP, &JOB_GAUGE_LABELS),
            desc(JOBS_RUNNING_NAME, JOBS_RUNNING_HELP, &JOB_GAUGE_LABELS),
            desc(JOBS_RUNNING_ORPHAN_NAME, JOBS_RUNNING_ORPHAN_HELP, &[]),
        ];

        Self { service, descs }
    }
}

impl Collector for AirbyteCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let metrics = match self.service.gather_metrics() {
            Ok(metrics) => metrics,
            Err(err) => {
                // A failed scrape stays empty; the next scrape retries
                // independently.
                error!(%err, "failed to gather Airbyte metrics");
                return Vec::new();
            }
        };

        build_families(&metrics)
    }
}

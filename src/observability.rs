use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total bookings successfully created.
pub const BOOKINGS_CREATED_TOTAL: &str = "venued_bookings_created_total";

/// Counter: booking attempts rejected because the slot was already taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "venued_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: venues held in memory, retired included.
pub const VENUES_TOTAL: &str = "venued_venues_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "venued_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "venued_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

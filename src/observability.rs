use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "fieldbook_bookings_created_total";

/// Counter: booking attempts rejected by the conflict guard. Labels: kind.
pub const BOOKING_CONFLICTS_TOTAL: &str = "fieldbook_booking_conflicts_total";

/// Counter: duplicate submissions caught by the idempotency index.
pub const DUPLICATE_SUBMISSIONS_TOTAL: &str = "fieldbook_duplicate_submissions_total";

/// Counter: availability queries served.
pub const AVAILABILITY_QUERIES_TOTAL: &str = "fieldbook_availability_queries_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of fields in the store.
pub const FIELDS_ACTIVE: &str = "fieldbook_fields_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "fieldbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "fieldbook_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

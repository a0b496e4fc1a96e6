use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub tracking_points_total: IntCounter,
    pub room_events_total: IntCounterVec,
    pub active_deliveries: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment commits in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Committed status transitions by target status"),
            &["status"],
        )
        .expect("valid transitions_total metric");

        let tracking_points_total = IntCounter::new(
            "tracking_points_total",
            "Accepted location samples",
        )
        .expect("valid tracking_points_total metric");

        let room_events_total = IntCounterVec::new(
            Opts::new("room_events_total", "Events emitted to rooms by event name"),
            &["event"],
        )
        .expect("valid room_events_total metric");

        let active_deliveries = IntGauge::new(
            "active_deliveries",
            "Deliveries currently in assigned/on-route/picked-up",
        )
        .expect("valid active_deliveries metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(tracking_points_total.clone()))
            .expect("register tracking_points_total");
        registry
            .register(Box::new(room_events_total.clone()))
            .expect("register room_events_total");
        registry
            .register(Box::new(active_deliveries.clone()))
            .expect("register active_deliveries");

        Self {
            registry,
            assignments_total,
            assignment_latency_seconds,
            transitions_total,
            tracking_points_total,
            room_events_total,
            active_deliveries,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

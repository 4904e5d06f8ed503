use prometheus::{IntCounter, IntGauge, Opts, Registry};


// Inventory gauges exported by the informer.
#[derive(Clone)]
pub struct InventoryMetrics {
    pub handlers: IntGauge,
    pub actions: IntGauge,
    pub notifiers: IntGauge,
    pub distinct_notifiers: IntGauge,
    pub selective_handlers: IntGauge,
    pub refresh_failures: IntCounter,
}

fn gauge(r: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let g = IntGauge::with_opts(Opts::new(name, help))?;
    r.register(Box::new(g.clone()))?;
    Ok(g)
}

impl InventoryMetrics {

    pub fn register(r: &Registry) -> prometheus::Result<InventoryMetrics> {
        let refresh_failures = IntCounter::with_opts(Opts::new(
            "grafana_alert_handler_informer_refresh_failures",
            "failed handler list refreshes"))?;
        r.register(Box::new(refresh_failures.clone()))?;

        Ok(InventoryMetrics {
            handlers: gauge(r, "grafana_alert_handler_informer_handlers", "handlers detected")?,
            actions: gauge(r, "grafana_alert_handler_informer_actions", "actions declared over all handlers")?,
            notifiers: gauge(r, "grafana_alert_handler_informer_notifiers", "notifiers declared over all handlers")?,
            distinct_notifiers: gauge(r, "grafana_alert_handler_informer_distinct_notifiers", "distinct notifier names")?,
            selective_handlers: gauge(r, "grafana_alert_handler_informer_selective_handlers", "handlers with an alert selector")?,
            refresh_failures,
        })
    }
}

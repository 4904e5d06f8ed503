use std::collections::HashSet;
use std::time::Duration;

use grafana_alert_handler_lib::{discover_handlers, GrafanaAlertHandlerList};
use kube::Client;
use log::{debug, error, info};
use tokio::time::interval;

use crate::metrics::metrics::InventoryMetrics;


// Counts over one snapshot of handlers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InventorySummary {
    pub handlers: usize,
    pub actions: usize,
    pub notifiers: usize,
    pub distinct_notifiers: usize,
    pub selective_handlers: usize,
}

pub fn summarize(handlers: &GrafanaAlertHandlerList) -> InventorySummary {
    let mut summary = InventorySummary::default();
    let mut notifier_names: HashSet<&str> = HashSet::new();

    for handler in handlers.items.iter() {
        summary.handlers += 1;
        summary.actions += handler.spec.actions.len();
        summary.notifiers += handler.spec.notifiers.len();
        notifier_names.extend(handler.spec.notifiers.iter().map(String::as_str));
        if !handler.spec.alert.labels.is_empty() {
            summary.selective_handlers += 1;
        }
    }
    summary.distinct_notifiers = notifier_names.len();
    summary
}

fn publish(metrics: &InventoryMetrics, summary: &InventorySummary) {
    metrics.handlers.set(summary.handlers as i64);
    metrics.actions.set(summary.actions as i64);
    metrics.notifiers.set(summary.notifiers as i64);
    metrics.distinct_notifiers.set(summary.distinct_notifiers as i64);
    metrics.selective_handlers.set(summary.selective_handlers as i64);
}

// List handlers once and publish the counts. Gauges keep their last values on failure.
pub async fn refresh_inventory(k8s_client: Client,
                               namespace: Option<&str>,
                               metrics: &InventoryMetrics) -> Option<InventorySummary> {
    match discover_handlers(k8s_client, namespace).await {
        Ok(handlers) => {
            let summary = summarize(&handlers);
            info!("Discovered {} handlers with {} actions and {} notifiers",
                  summary.handlers, summary.actions, summary.notifiers);
            publish(metrics, &summary);
            Some(summary)
        },
        Err(e) => {
            error!("Failed to discover handlers: {}", e);
            metrics.refresh_failures.inc();
            None
        }
    }
}


// Periodically list GrafanaAlertHandler resources and export inventory gauges.
// Read only: nothing is written back to k8s.
pub async fn tracker(k8s_client: Client,
                     metrics: InventoryMetrics,
                     namespace: Option<String>,
                     ms: u64) {

    let mut interval = interval(Duration::from_millis(ms));

    loop {
        interval.tick().await;
        refresh_inventory(k8s_client.clone(), namespace.as_deref(), &metrics).await;
        debug!("Done tracker tick!");
    }
}

use log::{debug, error, info};
use argh::FromArgs;

use std::net::Ipv4Addr;
use std::process::exit;
use std::convert::Infallible;

use grafana_alert_handler_lib::{add_to_scheme, crd_yaml, load_manifest, TypeRegistry};
use kube::Client;
use prometheus::{Encoder, Registry, TextEncoder};
use warp::log as http_log;
use warp::Filter;

mod metrics;
mod tracker;
use metrics::metrics::InventoryMetrics;
use tracker::tracker::tracker;


#[derive(FromArgs)]
/// GrafanaAlertHandler inventory informer
struct AlertHandlerInformerArgs {
    /// port for serving metrics (default 20094)
    #[argh(option, default = "default_port()")]
    port: u16,

    /// interface for serving http (default 127.0.0.1)
    #[argh(option, default = "String::from(\"127.0.0.1\")")]
    interface: String,

    /// interval between GrafanaAlertHandler list refreshes
    #[argh(option, default = "default_k8s_interval()")]
    kubernetes_poll_interval_seconds: u32,

    /// print the GrafanaAlertHandler CustomResourceDefinition and exit
    #[argh(switch)]
    print_crd: bool,

    /// decode a manifest file through the type registry and exit
    #[argh(option)]
    check_manifest: Option<String>,
}

// port
fn default_port() -> u16 {
    20094
}

// k8s interval
fn default_k8s_interval() -> u32 { 30 }

// Namespace to watch: unset means "default", empty means all namespaces
fn namespace_scope(configured: Option<String>) -> Option<String> {
    match configured {
        None => Some(String::from("default")),
        Some(namespace) if namespace.is_empty() => None,
        Some(namespace) => Some(namespace),
    }
}

fn namespace_from_env() -> Option<String> {
    namespace_scope(std::env::var("GRAFANA_ALERT_HANDLER_NAMESPACE").ok())
}

fn check_manifest(registry: &TypeRegistry, path: &str) -> i32 {
    match load_manifest(registry, path) {
        Ok(object) => {
            let kind = object.gvk();
            info!("{} is a valid {} in {}/{}", path, kind.kind, kind.group, kind.version);
            0
        },
        Err(e) => {
            error!("{} can not be decoded: {}", path, e);
            1
        }
    }
}

#[tokio::main]
pub async fn main() {
    env_logger::init();
    let http_log_wrapper = http_log("GrafanaAlertHandler-Informer");

    let args: AlertHandlerInformerArgs = argh::from_env();

    let mut registry = TypeRegistry::new();
    if let Err(e) = add_to_scheme(&mut registry) {
        error!("Failed to register resource kinds: {}", e);
        exit(1);
    }
    for kind in registry.kinds() {
        debug!("Known kind {} in {}", kind.gvk.kind, kind.api_version());
    }

    if args.print_crd {
        match crd_yaml() {
            Ok(yaml) => {
                print!("{}", yaml);
                exit(0);
            },
            Err(e) => {
                error!("Failed to render CRD: {}", e);
                exit(1);
            }
        }
    }

    if let Some(path) = args.check_manifest.as_ref() {
        exit(check_manifest(&registry, path));
    }

    let r = Registry::new();
    let inventory_metrics = match InventoryMetrics::register(&r) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to register metrics: {}", e);
            exit(1);
        }
    };

    fn with_registry(
        __r: Registry,
    ) -> impl Filter<Extract = (Registry,), Error = Infallible> + Clone {
        warp::any().map(move || __r.clone())
    }

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_registry(r))
        .map(|_r: Registry| {
            // Gather the metrics.
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = _r.gather();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("Failed to encode metrics: {}", e);
            }

            // Output to http body
            String::from_utf8_lossy(&buffer).into_owned()
        }).with(http_log_wrapper);

    let k8s_client = match Client::try_default().await {
        Ok(k_c) => {
            debug!("Initialized k8s client");
            k_c
        },
        Err(e) => {
            error!("Can not initialize k8s client, will go down: {}", e);
            exit(1);
        }
    };

    let k8s_poll_ms = u64::from(args.kubernetes_poll_interval_seconds.max(1)) * 1000;
    tokio::task::spawn(tracker(
        k8s_client,
        inventory_metrics,
        namespace_from_env(),
        k8s_poll_ms));

    let exit_code = match args.interface.parse::<Ipv4Addr>() {
        Ok(ip) => {
            warp::serve(metrics)
                .run((ip, args.port)).await;
            0
        }
        Err(e) => {
            error!("Invalid IP address: {}, err={}", args.interface, e);
            2
        }
    };

    exit(exit_code);
}

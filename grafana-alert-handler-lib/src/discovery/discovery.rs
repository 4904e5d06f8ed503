use kube::{Api, Client, api::ListParams};
use log::{debug, error};

use crate::error::Result;
use crate::v1alpha1::grafanaalerthandler::{GrafanaAlertHandler, GrafanaAlertHandlerList};


// Handlers requested per list call
pub const PAGE_SIZE: u32 = 500;

fn handlers_api(k8s_client: Client, namespace: Option<&str>) -> Api<GrafanaAlertHandler> {
    match namespace {
        Some(ns) => Api::namespaced(k8s_client, ns),
        None => Api::all(k8s_client),
    }
}

// Get a single page of handlers from k8s.
// The returned list carries the continue token of the page, if there are more.
pub async fn refresh_handlers(k8s_client: Client,
                              continue_token: Option<String>,
                              namespace: Option<&str>) -> Result<GrafanaAlertHandlerList> {
    let api = handlers_api(k8s_client, namespace);
    let lp = match continue_token {
        Some(token) => ListParams::default().limit(PAGE_SIZE).continue_token(&token),
        None => ListParams::default().limit(PAGE_SIZE),
    };

    let page = api.list(&lp).await.map_err(|e| {
        error!("Failed to get k8s API response: {}", e);
        e
    })?;

    let mut handlers = GrafanaAlertHandlerList::new(page.items);
    handlers.metadata = page.metadata;
    Ok(handlers)
}


// Retrieve all handlers, following continue tokens until the last page.
// Result is a single snapshot: resource version of the first page, no continue token.
pub async fn discover_handlers(k8s_client: Client, namespace: Option<&str>)
    -> Result<GrafanaAlertHandlerList> {

    let mut snapshot = refresh_handlers(k8s_client.clone(), None, namespace).await?;
    let mut next_token = snapshot.metadata.continue_.take().filter(|t| !t.is_empty());

    while let Some(token) = next_token {
        debug!("Token: {}", token);
        let mut page = refresh_handlers(k8s_client.clone(), Some(token), namespace).await?;
        next_token = page.metadata.continue_.take().filter(|t| !t.is_empty());
        snapshot.items.append(&mut page.items);
    }
    snapshot.metadata.remaining_item_count = None;

    debug!("Finished acquiring {} handlers from k8s", snapshot.items.len());
    Ok(snapshot)
}

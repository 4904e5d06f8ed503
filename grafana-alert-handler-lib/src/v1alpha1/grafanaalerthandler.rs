use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::core::GroupVersionKind;
use kube::{CustomResource, CustomResourceExt};
use log::debug;
use schemars::JsonSchema;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RegistryError;
use crate::registry::registry::{SchemeType, TypeRegistry};


pub const GROUP: &str = "alerting.grafana.io";
pub const VERSION: &str = "v1alpha1";
pub const API_VERSION: &str = "alerting.grafana.io/v1alpha1";
pub const KIND: &str = "GrafanaAlertHandler";
pub const LIST_KIND: &str = "GrafanaAlertHandlerList";

// null reads as the empty value, like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}


// An alert rule reference. Labels select which alerts the handler applies to.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq, Eq, Debug, JsonSchema)]
pub struct GrafanaAlert {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl GrafanaAlert {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.labels.is_empty()
    }
}


// A GrafanaAlertHandler CRD. Desired state of a single alert handler.
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, PartialEq, Eq, Debug, JsonSchema)]
#[kube(group = "alerting.grafana.io", version = "v1alpha1", kind = "GrafanaAlertHandler", namespaced)]
#[kube(status = "GrafanaAlertHandlerStatus", shortname = "gah")]
#[kube(derive = "PartialEq", derive = "Default")]
pub struct GrafanaAlertHandlerSpec {
    // Actions to run when the alert fires, in order
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    // Notification targets
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub notifiers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "GrafanaAlert::is_empty")]
    pub alert: GrafanaAlert,
}


/// Observed state of a GrafanaAlertHandler.
///
/// Carries no fields yet. Any input decodes to the empty value so objects
/// written by a newer controller still read back; new fields must be additive.
#[derive(Serialize, Clone, Default, PartialEq, Eq, Debug, JsonSchema)]
pub struct GrafanaAlertHandlerStatus {}

impl<'de> Deserialize<'de> for GrafanaAlertHandlerStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(GrafanaAlertHandlerStatus {})
    }
}

impl GrafanaAlertHandler {
    // Observed state, empty when the status subresource was never written
    pub fn observed_state(&self) -> GrafanaAlertHandlerStatus {
        self.status.clone().unwrap_or_default()
    }
}

impl SchemeType for GrafanaAlertHandler {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk(GROUP, VERSION, KIND)
    }

    fn namespaced() -> bool {
        true
    }

    fn new_object() -> Self {
        GrafanaAlertHandler::default()
    }

    // spec is optional on the wire; absent or null reads as the empty spec
    fn normalize(document: &mut serde_yaml::Value) {
        if let Some(fields) = document.as_mapping_mut() {
            if fields.get("spec").map_or(true, serde_yaml::Value::is_null) {
                fields.insert(
                    serde_yaml::Value::from("spec"),
                    serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
                );
            }
        }
    }
}


// CRD for GrafanaAlertHandler. No top level field is required.
pub fn handler_crd() -> CustomResourceDefinition {
    let mut crd = GrafanaAlertHandler::crd();
    for version in crd.spec.versions.iter_mut() {
        let props = version
            .schema
            .as_mut()
            .and_then(|schema| schema.open_api_v3_schema.as_mut());
        if let Some(props) = props {
            let none_left = match props.required.as_mut() {
                Some(required) => {
                    required.retain(|field| field != "spec");
                    required.is_empty()
                },
                None => false,
            };
            if none_left {
                props.required = None;
            }
        }
    }
    crd
}


// A list of GrafanaAlertHandler, as returned by collection queries.
#[derive(Deserialize, Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaAlertHandlerList {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<GrafanaAlertHandler>,
}

impl GrafanaAlertHandlerList {
    pub fn new(items: Vec<GrafanaAlertHandler>) -> GrafanaAlertHandlerList {
        GrafanaAlertHandlerList {
            api_version: API_VERSION.to_string(),
            kind: LIST_KIND.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

impl Default for GrafanaAlertHandlerList {
    fn default() -> Self {
        GrafanaAlertHandlerList::new(Vec::new())
    }
}

impl SchemeType for GrafanaAlertHandlerList {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk(GROUP, VERSION, LIST_KIND)
    }

    fn namespaced() -> bool {
        true
    }

    fn new_object() -> Self {
        GrafanaAlertHandlerList::default()
    }
}


// Register the v1alpha1 kinds. Safe to call more than once.
pub fn add_to_scheme(registry: &mut TypeRegistry) -> Result<(), RegistryError> {
    registry.register::<GrafanaAlertHandler>()?;
    registry.register::<GrafanaAlertHandlerList>()?;
    debug!("registered {} and {} in {}", KIND, LIST_KIND, API_VERSION);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use kube::Resource;
    use serde_json::json;

    fn high_cpu() -> GrafanaAlertHandlerSpec {
        GrafanaAlertHandlerSpec {
            actions: vec!["silence".to_string()],
            notifiers: vec!["email-oncall".to_string()],
            alert: GrafanaAlert {
                name: "HighCPU".to_string(),
                labels: BTreeMap::from([("severity".to_string(), "critical".to_string())]),
            },
        }
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        add_to_scheme(&mut registry).unwrap();
        registry
    }

    #[test]
    fn constants_match_resource() {
        assert_eq!(GrafanaAlertHandler::group(&()), GROUP);
        assert_eq!(GrafanaAlertHandler::version(&()), VERSION);
        assert_eq!(GrafanaAlertHandler::kind(&()), KIND);
        assert_eq!(GrafanaAlertHandler::api_version(&()), API_VERSION);
        assert_eq!(GrafanaAlertHandler::plural(&()), "grafanaalerthandlers");
    }

    #[test]
    fn high_cpu_round_trip() {
        let spec = high_cpu();
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded, json!({
            "actions": ["silence"],
            "notifiers": ["email-oncall"],
            "alert": {"name": "HighCPU", "labels": {"severity": "critical"}}
        }));
        let decoded: GrafanaAlertHandlerSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, spec);
    }

    #[test]
    fn zero_values_are_omitted() {
        let encoded = serde_json::to_value(GrafanaAlertHandlerSpec::default()).unwrap();
        assert_eq!(encoded, json!({}));

        let partial = GrafanaAlertHandlerSpec {
            notifiers: vec!["pager".to_string()],
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&partial).unwrap(), json!({"notifiers": ["pager"]}));

        let unnamed = GrafanaAlert {
            name: String::new(),
            labels: BTreeMap::from([("team".to_string(), "infra".to_string())]),
        };
        assert_eq!(serde_json::to_value(&unnamed).unwrap(), json!({"labels": {"team": "infra"}}));
    }

    #[test]
    fn round_trip_keeps_order_and_duplicates() {
        let spec = GrafanaAlertHandlerSpec {
            actions: vec!["scale".into(), "restart".into(), "scale".into()],
            notifiers: vec!["slack".into(), "email".into()],
            alert: GrafanaAlert {
                name: String::new(),
                labels: BTreeMap::from([
                    ("team".to_string(), "infra".to_string()),
                    ("env".to_string(), "prod".to_string()),
                ]),
            },
        };
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let decoded: GrafanaAlertHandlerSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(decoded, spec);
        assert_eq!(decoded.actions, vec!["scale", "restart", "scale"]);
    }

    #[test]
    fn absent_labels_decode_empty() {
        let spec: GrafanaAlertHandlerSpec =
            serde_json::from_value(json!({"alert": {"name": "DiskFull"}})).unwrap();
        assert_eq!(spec.alert.name, "DiskFull");
        assert!(spec.alert.labels.is_empty());

        let spec: GrafanaAlertHandlerSpec =
            serde_json::from_value(json!({"actions": null, "alert": {"labels": null}})).unwrap();
        assert!(spec.actions.is_empty());
        assert!(spec.alert.labels.is_empty());

        let spec: GrafanaAlertHandlerSpec =
            serde_json::from_value(json!({"notifiers": ["pager"], "alert": null})).unwrap();
        assert_eq!(spec.notifiers, vec!["pager"]);
        assert_eq!(spec.alert, GrafanaAlert::default());
    }

    #[test]
    fn status_decodes_empty_for_any_input() {
        for input in [
            json!({}),
            json!({"phase": "Ready", "conditions": [{"type": "Synced"}]}),
            json!("Ready"),
            json!(42),
            json!([1, 2, 3]),
            json!(null),
        ] {
            let status: GrafanaAlertHandlerStatus = serde_json::from_value(input).unwrap();
            assert_eq!(status, GrafanaAlertHandlerStatus {});
        }
        assert_eq!(serde_json::to_value(GrafanaAlertHandlerStatus {}).unwrap(), json!({}));
    }

    #[test]
    fn handler_document_shape() {
        let mut handler = GrafanaAlertHandler::new("cpu-handler", high_cpu());
        handler.metadata.namespace = Some("monitoring".to_string());
        handler.status = Some(GrafanaAlertHandlerStatus {});

        let encoded = serde_json::to_value(&handler).unwrap();
        assert_eq!(encoded["apiVersion"], API_VERSION);
        assert_eq!(encoded["kind"], KIND);
        assert_eq!(encoded["metadata"]["name"], "cpu-handler");
        assert_eq!(encoded["spec"]["alert"]["labels"]["severity"], "critical");
        assert_eq!(encoded["status"], json!({}));

        let decoded: GrafanaAlertHandler = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, handler);
    }

    #[test]
    fn observed_state_defaults_to_empty() {
        let handler = GrafanaAlertHandler::new("bare", GrafanaAlertHandlerSpec::default());
        assert!(handler.status.is_none());
        assert_eq!(handler.observed_state(), GrafanaAlertHandlerStatus::default());
    }

    #[test]
    fn list_always_carries_items() {
        let list = GrafanaAlertHandlerList::default();
        let encoded = serde_json::to_value(&list).unwrap();
        assert_eq!(encoded["apiVersion"], API_VERSION);
        assert_eq!(encoded["kind"], LIST_KIND);
        assert_eq!(encoded["items"], json!([]));

        let decoded: GrafanaAlertHandlerList = serde_json::from_value(json!({
            "apiVersion": API_VERSION,
            "kind": LIST_KIND,
            "metadata": {"resourceVersion": "12"},
            "items": null
        })).unwrap();
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.metadata.resource_version.as_deref(), Some("12"));
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = registry();
        let before = registry.kinds();
        add_to_scheme(&mut registry).unwrap();
        add_to_scheme(&mut registry).unwrap();
        assert_eq!(registry.kinds(), before);

        let kinds: Vec<String> = registry
            .kinds_for_group_version(API_VERSION)
            .into_iter()
            .map(|k| k.gvk.kind)
            .collect();
        assert_eq!(kinds, vec![KIND.to_string(), LIST_KIND.to_string()]);

        let resolved = registry.resolve(&GroupVersionKind::gvk(GROUP, VERSION, KIND)).unwrap();
        assert!(resolved.namespaced);
        assert_eq!(resolved.api_version(), API_VERSION);
    }

    #[test]
    fn registry_decodes_handler_manifest() {
        let registry = registry();
        let manifest = r#"
apiVersion: alerting.grafana.io/v1alpha1
kind: GrafanaAlertHandler
metadata:
  name: cpu-handler
  namespace: monitoring
spec:
  actions: [silence]
  notifiers: [email-oncall]
  alert:
    name: HighCPU
    labels:
      severity: critical
"#;
        let decoded = registry.decode(manifest).unwrap();
        assert_eq!(decoded.gvk().kind, KIND);
        let handler = decoded.downcast::<GrafanaAlertHandler>().unwrap();
        assert_eq!(handler.spec, high_cpu());
        assert_eq!(handler.metadata.namespace.as_deref(), Some("monitoring"));

        let typed: GrafanaAlertHandler = registry.decode_as(manifest).unwrap();
        assert_eq!(typed, handler);
    }

    #[test]
    fn registry_decodes_list_manifest() {
        let registry = registry();
        let handler = GrafanaAlertHandler::new("cpu-handler", high_cpu());
        let list = GrafanaAlertHandlerList::new(vec![handler.clone()]);
        let document = serde_json::to_string(&registry.encode(&list).unwrap()).unwrap();

        let decoded = registry.decode(&document).unwrap();
        assert!(decoded.is::<GrafanaAlertHandlerList>());
        assert_eq!(decoded.downcast::<GrafanaAlertHandlerList>().unwrap().items, vec![handler]);
    }

    #[test]
    fn registry_decodes_handler_without_spec() {
        let registry = registry();
        let manifest = "apiVersion: alerting.grafana.io/v1alpha1\n\
                        kind: GrafanaAlertHandler\n\
                        metadata:\n  name: bare\n";
        let handler = registry
            .decode(manifest)
            .unwrap()
            .downcast::<GrafanaAlertHandler>()
            .unwrap();
        assert_eq!(handler.metadata.name.as_deref(), Some("bare"));
        assert_eq!(handler.spec, GrafanaAlertHandlerSpec::default());

        let typed: GrafanaAlertHandler = registry
            .decode_as(&format!("{}spec: null\n", manifest))
            .unwrap();
        assert_eq!(typed.spec, GrafanaAlertHandlerSpec::default());
    }

    #[test]
    fn handler_crd_requires_no_spec() {
        let crd = handler_crd();
        let props = crd.spec.versions[0]
            .schema
            .as_ref()
            .and_then(|schema| schema.open_api_v3_schema.as_ref())
            .unwrap();
        let required = props.required.clone().unwrap_or_default();
        assert!(!required.contains(&"spec".to_string()));
        assert!(props.properties.as_ref().unwrap().contains_key("spec"));
    }

    #[test]
    fn decode_as_rejects_other_kinds() {
        let registry = registry();
        let err = registry
            .decode_as::<GrafanaAlertHandler>(&format!("apiVersion: {}\nkind: {}\nitems: []\n", API_VERSION, LIST_KIND))
            .unwrap_err();
        assert!(matches!(err, Error::Registry(RegistryError::KindMismatch { .. })));
    }

    #[test]
    fn registry_constructs_empty_objects() {
        let registry = registry();
        let list = registry
            .construct(&GroupVersionKind::gvk(GROUP, VERSION, LIST_KIND))
            .unwrap()
            .downcast::<GrafanaAlertHandlerList>()
            .unwrap();
        assert_eq!(list.kind, LIST_KIND);
        assert!(list.items.is_empty());

        let handler = registry
            .construct(&GroupVersionKind::gvk(GROUP, VERSION, KIND))
            .unwrap()
            .downcast::<GrafanaAlertHandler>()
            .unwrap();
        assert_eq!(handler.spec, GrafanaAlertHandlerSpec::default());
    }

    #[test]
    fn crd_describes_the_resource() {
        let crd = GrafanaAlertHandler::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("grafanaalerthandlers.alerting.grafana.io"));
        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.names.kind, KIND);
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["gah".to_string()]));
        let version = &crd.spec.versions[0];
        assert_eq!(version.name, VERSION);
        assert!(version.subresources.as_ref().and_then(|s| s.status.as_ref()).is_some());
    }
}

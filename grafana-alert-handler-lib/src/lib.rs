// Resource kit for the GrafanaAlertHandler custom resource.
//
// Declares the v1alpha1 resource types, an injectable group/version/kind
// type registry, and read-only collection queries against the API server.

pub mod discovery;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod v1alpha1;

pub use discovery::discovery::{discover_handlers, refresh_handlers};
pub use error::{Error, RegistryError, Result};
pub use manifest::manifest::{crd_yaml, load_manifest};
pub use registry::registry::{DecodedObject, RegisteredKind, SchemeType, TypeRegistry};
pub use v1alpha1::grafanaalerthandler::{
    add_to_scheme, handler_crd, GrafanaAlert, GrafanaAlertHandler, GrafanaAlertHandlerList,
    GrafanaAlertHandlerSpec, GrafanaAlertHandlerStatus,
};

use std::fs;
use std::path::Path;

use log::{debug, error};

use crate::error::Result;
use crate::registry::registry::{DecodedObject, TypeRegistry};
use crate::v1alpha1::grafanaalerthandler::handler_crd;


// Read a YAML or JSON manifest from disk and decode it through the registry.
pub fn load_manifest<P: AsRef<Path>>(registry: &TypeRegistry, path: P) -> Result<DecodedObject> {
    let path = path.as_ref();
    let document = fs::read_to_string(path).map_err(|e| {
        error!("failed to read manifest {}: {}", path.display(), e);
        e
    })?;
    debug!("read {} bytes from {}", document.len(), path.display());
    registry.decode(&document)
}

// CustomResourceDefinition manifest for GrafanaAlertHandler.
pub fn crd_yaml() -> Result<String> {
    Ok(serde_yaml::to_string(&handler_crd())?)
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("kind {kind} in {api_version} is already registered to {existing}")]
    Conflict {
        api_version: String,
        kind: String,
        existing: &'static str,
    },

    #[error("no kind {kind} registered in {api_version}")]
    UnregisteredKind { api_version: String, kind: String },

    #[error("type {0} is not registered")]
    UnregisteredType(&'static str),

    #[error("document has no apiVersion or kind")]
    MissingTypeInformation,

    #[error("document is {found}, expected {expected}")]
    KindMismatch { expected: String, found: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid yaml document: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("failed to encode object: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("k8s communication failure: {0}")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use std::any::{Any, TypeId};
use std::collections::HashMap;

use kube::core::GroupVersionKind;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, RegistryError, Result};


// A type that can be registered under a group/version/kind.
pub trait SchemeType: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn gvk() -> GroupVersionKind;

    fn namespaced() -> bool;

    // Empty instance, as produced by `TypeRegistry::construct`
    fn new_object() -> Self;

    // Adjust a parsed document before it is decoded into Self
    fn normalize(_document: &mut serde_yaml::Value) {}
}

type ErasedObject = Box<dyn Any + Send + Sync>;

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    namespaced: bool,
    decode: fn(serde_yaml::Value) -> Result<ErasedObject>,
    construct: fn() -> ErasedObject,
}

fn decode_erased<T: SchemeType>(mut value: serde_yaml::Value) -> Result<ErasedObject> {
    T::normalize(&mut value);
    let object: T = serde_yaml::from_value(value)?;
    Ok(Box::new(object))
}

fn construct_erased<T: SchemeType>() -> ErasedObject {
    Box::new(T::new_object())
}

// Format a group/version pair the way apiVersion fields carry it.
pub fn api_version_of(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

// Split an apiVersion value and attach a kind.
pub fn gvk_of(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}


/// Description of a kind known to a [`TypeRegistry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredKind {
    pub gvk: GroupVersionKind,
    pub type_name: &'static str,
    pub namespaced: bool,
}

impl RegisteredKind {
    pub fn api_version(&self) -> String {
        api_version_of(&self.gvk)
    }
}


/// An object produced by the registry without the caller naming its type.
pub struct DecodedObject {
    gvk: GroupVersionKind,
    object: ErasedObject,
}

impl DecodedObject {
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    // Take the concrete object out, handing the value back on a type mismatch
    pub fn downcast<T: 'static>(self) -> std::result::Result<T, DecodedObject> {
        let gvk = self.gvk;
        match self.object.downcast::<T>() {
            Ok(object) => Ok(*object),
            Err(object) => Err(DecodedObject { gvk, object }),
        }
    }
}

impl std::fmt::Debug for DecodedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedObject")
            .field("api_version", &api_version_of(&self.gvk))
            .field("kind", &self.gvk.kind)
            .finish_non_exhaustive()
    }
}


/// Mapping from group/version/kind to the Rust type that decodes it.
///
/// Built once at process start with `register` calls and then shared by
/// reference; lookups never mutate it.
#[derive(Default)]
pub struct TypeRegistry {
    kinds: HashMap<GroupVersionKind, Registration>,
    types: HashMap<TypeId, GroupVersionKind>,
}

impl TypeRegistry {

    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    // Register T under its GVK. Registering the same type again is a no-op.
    pub fn register<T: SchemeType>(&mut self) -> std::result::Result<(), RegistryError> {
        let gvk = T::gvk();
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        if let Some(existing) = self.kinds.get(&gvk) {
            if existing.type_id == type_id {
                trace!("kind {} already registered to {}", gvk.kind, type_name);
                return Ok(());
            }
            return Err(RegistryError::Conflict {
                api_version: api_version_of(&gvk),
                kind: gvk.kind.clone(),
                existing: existing.type_name,
            });
        }

        debug!("registering kind {} in {} as {}", gvk.kind, api_version_of(&gvk), type_name);
        self.kinds.insert(gvk.clone(), Registration {
            type_id,
            type_name,
            namespaced: T::namespaced(),
            decode: decode_erased::<T>,
            construct: construct_erased::<T>,
        });
        self.types.insert(type_id, gvk);
        Ok(())
    }

    pub fn resolve(&self, gvk: &GroupVersionKind) -> Option<RegisteredKind> {
        self.kinds.get(gvk).map(|r| RegisteredKind {
            gvk: gvk.clone(),
            type_name: r.type_name,
            namespaced: r.namespaced,
        })
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains_key(gvk)
    }

    // GVK the type was registered under, if any
    pub fn gvk_for<T: 'static>(&self) -> Option<&GroupVersionKind> {
        self.types.get(&TypeId::of::<T>())
    }

    // All registered kinds ordered by group, version and kind
    pub fn kinds(&self) -> Vec<RegisteredKind> {
        let mut kinds: Vec<RegisteredKind> = self
            .kinds
            .keys()
            .filter_map(|gvk| self.resolve(gvk))
            .collect();
        kinds.sort_by(|a, b| {
            (&a.gvk.group, &a.gvk.version, &a.gvk.kind)
                .cmp(&(&b.gvk.group, &b.gvk.version, &b.gvk.kind))
        });
        kinds
    }

    pub fn kinds_for_group_version(&self, api_version: &str) -> Vec<RegisteredKind> {
        self.kinds()
            .into_iter()
            .filter(|k| k.api_version() == api_version)
            .collect()
    }

    // Build an empty object of a registered kind.
    pub fn construct(&self, gvk: &GroupVersionKind) -> Result<DecodedObject> {
        let registration = self.registration(gvk)?;
        Ok(DecodedObject {
            gvk: gvk.clone(),
            object: (registration.construct)(),
        })
    }

    // Decode a YAML or JSON document into whatever type its apiVersion/kind is registered to.
    pub fn decode(&self, document: &str) -> Result<DecodedObject> {
        let value: serde_yaml::Value = serde_yaml::from_str(document)?;
        let gvk = type_information(&value)?;
        let registration = self.registration(&gvk)?;
        trace!("decoding {} as {}", gvk.kind, registration.type_name);
        let object = (registration.decode)(value)?;
        Ok(DecodedObject { gvk, object })
    }

    // Decode a document that must be of T's kind.
    pub fn decode_as<T: SchemeType>(&self, document: &str) -> Result<T> {
        let expected = self
            .gvk_for::<T>()
            .ok_or(RegistryError::UnregisteredType(std::any::type_name::<T>()))?;
        let mut value: serde_yaml::Value = serde_yaml::from_str(document)?;
        let found = type_information(&value)?;
        if &found != expected {
            return Err(RegistryError::KindMismatch {
                expected: format!("{}/{}", api_version_of(expected), expected.kind),
                found: format!("{}/{}", api_version_of(&found), found.kind),
            }.into());
        }
        T::normalize(&mut value);
        Ok(serde_yaml::from_value(value)?)
    }

    pub fn encode<T: SchemeType>(&self, object: &T) -> Result<serde_json::Value> {
        if self.gvk_for::<T>().is_none() {
            return Err(RegistryError::UnregisteredType(std::any::type_name::<T>()).into());
        }
        Ok(serde_json::to_value(object)?)
    }

    fn registration(&self, gvk: &GroupVersionKind) -> std::result::Result<&Registration, RegistryError> {
        self.kinds.get(gvk).ok_or_else(|| RegistryError::UnregisteredKind {
            api_version: api_version_of(gvk),
            kind: gvk.kind.clone(),
        })
    }
}

// Read apiVersion and kind off a decoded document.
fn type_information(value: &serde_yaml::Value) -> std::result::Result<GroupVersionKind, Error> {
    let api_version = value.get("apiVersion").and_then(|v| v.as_str());
    let kind = value.get("kind").and_then(|v| v.as_str());
    match (api_version, kind) {
        (Some(api_version), Some(kind)) if !api_version.is_empty() && !kind.is_empty() => {
            Ok(gvk_of(api_version, kind))
        }
        _ => Err(RegistryError::MissingTypeInformation.into()),
    }
}

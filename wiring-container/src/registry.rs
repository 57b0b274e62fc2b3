//! The registry: what a build hands back to the caller.
//!
//! Holds instantiated services by id, parameters, the tag index and
//! per-service scopes. A [`Registry`] is a cheap handle; duplicates made
//! with [`Registry::copy`] share the same underlying maps.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::declaration::ServiceDeclaration;
use crate::error::{Result, ValidationError};
use crate::scope::Scope;
use crate::service::{downcast, DataService, Service, ServiceRef};
use crate::tag::Tag;

/// The reserved id under which the registry registers itself.
pub const SERVICE_CONTAINER_ID: &str = "service_container";

type SharedParameters = Arc<RwLock<Map<String, Value>>>;

/// One registry's view of the maps. Copies point at the same maps;
/// the parameter slot can be swapped without touching other copies.
#[derive(Default)]
struct RegistryData {
    parameters: RwLock<SharedParameters>,
    services: Arc<DashMap<String, ServiceRef>>,
    // insertion order within a tag name = declaration order
    tags: Arc<RwLock<HashMap<String, Vec<Arc<Tag>>>>>,
    scopes: Arc<DashMap<String, Scope>>,
    declarations: Arc<DashMap<String, Arc<ServiceDeclaration>>>,
}

/// Service, parameter, tag and scope storage.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use wiring_container::registry::Registry;
/// use wiring_container::scope::Scope;
/// use wiring_container::tag::Tag;
///
/// let registry = Registry::new();
/// registry.set_value("settings", json!({"debug": true})).unwrap();
/// registry.set_parameter("env", json!("prod"));
/// registry.add_tag("config", Tag::new("settings", json!({"name": "config"})).unwrap()).unwrap();
///
/// assert!(registry.has("settings"));
/// assert_eq!(registry.parameter("env"), Some(json!("prod")));
/// assert_eq!(registry.tags_by_name("config").unwrap()[0].service_id(), "settings");
/// assert_eq!(registry.scope("settings"), Scope::Global);
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    data: Arc<RegistryData>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Services ──

    /// Returns the service registered under `id`.
    pub fn get(&self, id: &str) -> Option<ServiceRef> {
        self.data.services.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the service registered under `id` as a `T`.
    ///
    /// `None` if the id is unset or holds another type.
    pub fn get_as<T: Service>(&self, id: &str) -> Option<Arc<T>> {
        self.get(id).as_ref().and_then(downcast::<T>)
    }

    /// Stores a service, replacing any previous entry for `id`.
    ///
    /// # Errors
    /// Returns [`ValidationError`] if `id` is empty.
    pub fn set(&self, id: impl Into<String>, service: ServiceRef) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::new("a service id must not be empty").into());
        }

        trace!(id = %id, "Stored service");
        self.data.services.insert(id, service);
        Ok(())
    }

    /// Stores structured data as a service.
    ///
    /// # Errors
    /// Returns [`ValidationError`] for scalars and `null`; the existing
    /// entry for `id`, if any, is left untouched.
    pub fn set_value(&self, id: impl Into<String>, value: Value) -> Result<()> {
        let id = id.into();
        let data = DataService::new(value).map_err(|e| {
            ValidationError::new(format!("cannot store \"{id}\": {}", e.message))
        })?;
        self.set(id, Arc::new(data))
    }

    /// Returns `true` if a service is registered under `id`.
    pub fn has(&self, id: &str) -> bool {
        self.data.services.contains_key(id)
    }

    /// All registered service ids, sorted.
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data.services.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.data.services.len()
    }

    /// Returns true if no services are registered.
    pub fn is_empty(&self) -> bool {
        self.data.services.is_empty()
    }

    /// Registers this registry under [`SERVICE_CONTAINER_ID`].
    ///
    /// Returns the stored handle so the builder can memoize it.
    pub(crate) fn register_self(&self) -> ServiceRef {
        let handle: ServiceRef = Arc::new(ContainerHandle {
            data: Arc::downgrade(&self.data),
        });
        self.data
            .services
            .insert(SERVICE_CONTAINER_ID.to_string(), Arc::clone(&handle));
        debug!(id = SERVICE_CONTAINER_ID, "Registered container");
        handle
    }

    // ── Parameters ──

    /// Returns a snapshot of every parameter.
    pub fn parameters(&self) -> Map<String, Value> {
        self.shared_parameters().read().clone()
    }

    /// Replaces every parameter.
    ///
    /// Only this registry sees the new map; copies keep the old one.
    pub fn set_parameters(&self, parameters: Map<String, Value>) {
        *self.data.parameters.write() = Arc::new(RwLock::new(parameters));
    }

    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.shared_parameters().read().get(name).cloned()
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.shared_parameters()
            .write()
            .insert(name.into(), value.into());
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.shared_parameters().read().contains_key(name)
    }

    fn shared_parameters(&self) -> SharedParameters {
        Arc::clone(&self.data.parameters.read())
    }

    // ── Tags ──

    /// Appends `tag` to the list for `name`.
    ///
    /// # Errors
    /// Returns [`ValidationError`] if `name` is empty.
    pub fn add_tag(&self, name: impl Into<String>, tag: Tag) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::new(format!(
                "invalid tag name for service \"{}\"",
                tag.service_id()
            ))
            .into());
        }

        debug!(tag = %name, service = tag.service_id(), "Added tag");
        self.data
            .tags
            .write()
            .entry(name)
            .or_default()
            .push(Arc::new(tag));
        Ok(())
    }

    /// Every tag registered under `name`, in registration order.
    ///
    /// `None` if the name was never used.
    pub fn tags_by_name(&self, name: &str) -> Option<Vec<Arc<Tag>>> {
        self.data.tags.read().get(name).cloned()
    }

    // ── Scopes ──

    pub fn set_scope(&self, id: impl Into<String>, scope: impl Into<Scope>) {
        self.data.scopes.insert(id.into(), scope.into());
    }

    /// The scope of `id`; [`Scope::Global`] when never set.
    pub fn scope(&self, id: &str) -> Scope {
        self.data
            .scopes
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    // ── Declarations ──

    /// The declaration `id` was built from.
    pub fn declaration(&self, id: &str) -> Option<Arc<ServiceDeclaration>> {
        self.data.declarations.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn set_declaration(&self, declaration: Arc<ServiceDeclaration>) {
        self.data
            .declarations
            .insert(declaration.id().to_string(), declaration);
    }

    /// Returns a new registry over the same maps.
    ///
    /// A shallow duplicate: entries added or changed through either
    /// registry are visible through both, but [`set_parameters`]
    /// replaces the parameter map of one registry only.
    ///
    /// [`set_parameters`]: Registry::set_parameters
    pub fn copy(&self) -> Self {
        let data = RegistryData {
            parameters: RwLock::new(self.shared_parameters()),
            services: Arc::clone(&self.data.services),
            tags: Arc::clone(&self.data.tags),
            scopes: Arc::clone(&self.data.scopes),
            declarations: Arc::clone(&self.data.declarations),
        };
        trace!("Copied registry");
        Self {
            data: Arc::new(data),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.data.services.len())
            .field("parameters", &self.shared_parameters().read().len())
            .field("tags", &self.data.tags.read().len())
            .finish()
    }
}

/// What is stored under [`SERVICE_CONTAINER_ID`].
///
/// Holds the registry weakly so that the registry can contain itself
/// without keeping itself alive.
pub struct ContainerHandle {
    data: Weak<RegistryData>,
}

impl ContainerHandle {
    /// The registry, while any [`Registry`] handle to it is alive.
    pub fn registry(&self) -> Option<Registry> {
        self.data.upgrade().map(|data| Registry { data })
    }
}

impl Service for ContainerHandle {}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("alive", &(self.data.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WiringError;
    use serde_json::json;

    struct Database;
    impl Service for Database {}

    #[test]
    fn set_and_get() {
        let registry = Registry::new();
        registry.set("db", Arc::new(Database)).unwrap();

        assert!(registry.has("db"));
        assert!(registry.get("db").is_some());
        assert!(registry.get_as::<Database>("db").is_some());
        assert!(registry.get_as::<DataService>("db").is_none());
    }

    #[test]
    fn get_missing_is_none() {
        let registry = Registry::new();
        assert!(registry.get("nope").is_none());
        assert!(!registry.has("nope"));
    }

    #[test]
    fn set_overwrites() {
        let registry = Registry::new();
        registry.set("svc", Arc::new(Database)).unwrap();
        registry.set_value("svc", json!({"replaced": true})).unwrap();

        let data = registry.get_as::<DataService>("svc").unwrap();
        assert_eq!(data.get("replaced"), Some(&json!(true)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn set_empty_id_fails() {
        let registry = Registry::new();
        assert!(matches!(
            registry.set("", Arc::new(Database)),
            Err(WiringError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_set_leaves_previous_state() {
        let registry = Registry::new();
        assert!(!registry.has("x"));
        assert!(registry.set_value("x", json!(42)).is_err());
        assert!(!registry.has("x"));

        registry.set("y", Arc::new(Database)).unwrap();
        match registry.set_value("y", json!("scalar")) {
            Err(WiringError::Validation(err)) => assert!(err.message.contains("\"y\"")),
            other => panic!("Expected Validation, got: {other:?}"),
        }
        assert!(registry.get_as::<Database>("y").is_some());
    }

    #[test]
    fn parameters() {
        let registry = Registry::new();
        let mut params = Map::new();
        params.insert("env".to_string(), json!("prod"));
        registry.set_parameters(params);

        assert!(registry.has_parameter("env"));
        assert_eq!(registry.parameter("env"), Some(json!("prod")));

        registry.set_parameter("port", 8080);
        registry.set_parameter("nothing", Value::Null);
        assert_eq!(registry.parameter("port"), Some(json!(8080)));
        assert!(registry.has_parameter("nothing"));
        assert!(!registry.has_parameter("missing"));
        assert_eq!(registry.parameters().len(), 3);
    }

    #[test]
    fn tags_keep_insertion_order() {
        let registry = Registry::new();
        assert!(registry.tags_by_name("listener").is_none());

        registry.add_tag("listener", Tag::new("b", json!({})).unwrap()).unwrap();
        registry.add_tag("listener", Tag::new("a", json!({})).unwrap()).unwrap();

        let tags = registry.tags_by_name("listener").unwrap();
        let ids: Vec<&str> = tags.iter().map(|t| t.service_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn add_tag_with_empty_name_fails() {
        let registry = Registry::new();
        assert!(registry.add_tag("", Tag::new("a", json!({})).unwrap()).is_err());
    }

    #[test]
    fn scope_defaults_to_global() {
        let registry = Registry::new();
        assert_eq!(registry.scope("anything"), Scope::Global);

        registry.set_scope("session", "request");
        assert_eq!(registry.scope("session"), Scope::Request);
    }

    #[test]
    fn copy_shares_data() {
        let registry = Registry::new();
        let copy = registry.copy();

        copy.set("db", Arc::new(Database)).unwrap();
        copy.set_parameter("env", "dev");
        copy.set_scope("db", "request");

        assert!(registry.has("db"));
        assert_eq!(registry.parameter("env"), Some(json!("dev")));
        assert_eq!(registry.scope("db"), Scope::Request);
    }

    #[test]
    fn copy_is_a_separate_registry() {
        let registry = Registry::new();
        registry.set_parameter("env", "prod");

        let copy = registry.copy();
        let mut replaced = Map::new();
        replaced.insert("region".to_string(), json!("eu"));
        copy.set_parameters(replaced);

        assert_eq!(registry.parameter("env"), Some(json!("prod")));
        assert!(!registry.has_parameter("region"));
        assert_eq!(copy.parameter("region"), Some(json!("eu")));
        assert!(!copy.has_parameter("env"));

        // later edits to the original's map no longer reach the copy
        registry.set_parameter("debug", true);
        assert!(!copy.has_parameter("debug"));
    }

    #[test]
    fn container_handle_resolves_registry() {
        let registry = Registry::new();
        let handle = registry.register_self();

        assert!(registry.has(SERVICE_CONTAINER_ID));
        let container = downcast::<ContainerHandle>(&handle).unwrap();
        let resolved = container.registry().unwrap();
        resolved.set_parameter("seen", true);
        assert_eq!(registry.parameter("seen"), Some(json!(true)));

        drop(resolved);
        drop(registry);
        assert!(container.registry().is_none());
    }

    #[test]
    fn debug_display() {
        let registry = Registry::new();
        registry.set("db", Arc::new(Database)).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("Registry"));
        assert!(debug.contains("services: 1"));
    }
}

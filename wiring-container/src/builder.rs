//! # The container builder
//!
//! Turns a declarative service config into a populated [`Registry`].
//!
//! # Phases
//! ```text
//! config ──substitute %params%──> declarations
//!                                      │
//!                         instantiate (eager, memoized)
//!                                      │
//!                                      ▼
//!              initialize (dependency order, one at a time)  ──>  Registry
//! ```
//!
//! Everything up to initialization runs synchronously. Initializers run
//! strictly one after another in the order computed by
//! [`InitializationGraph`]; an asynchronous initializer is awaited before
//! the next one starts. There is no timeout: an initializer that never
//! completes stalls the build.
//!
//! # Examples
//! ```rust
//! use serde_json::json;
//! use wiring_container::prelude::*;
//!
//! struct Greeter {
//!     name: String,
//! }
//! impl Service for Greeter {}
//!
//! let loader = ServiceLoader::new(["app"]).constructor("app/greeter", |args| {
//!     Ok(Greeter { name: args[0].parse()? })
//! });
//!
//! let registry = ContainerBuilder::new()
//!     .loader(loader)
//!     .build_blocking(json!({
//!         "parameters": {"who": "world"},
//!         "services": [{"id": "greeter", "constructor": "greeter", "arguments": ["%who%"]}]
//!     }))
//!     .expect("Failed to build container");
//!
//! let greeter = registry.get_as::<Greeter>("greeter").unwrap();
//! assert_eq!(greeter.name, "world");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, trace};

use wiring_support::rendering::{render_plan, suggest_similar, PlanEntry};

use crate::config::ContainerConfig;
use crate::declaration::{ArgumentSpec, ServiceDeclaration, ServiceReference};
use crate::error::{ConfigError, CyclicDependencyError, InitializationError, Result, WiringError};
use crate::graph::InitializationGraph;
use crate::loader::{Loadable, Loader};
use crate::registry::{Registry, SERVICE_CONTAINER_ID};
use crate::service::{Argument, ServiceRef};
use crate::tag::Tag;

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Registry`] from a service config.
///
/// A builder can be reused; every [`build()`](ContainerBuilder::build)
/// starts from scratch with a fresh registry.
#[derive(Clone, Default)]
pub struct ContainerBuilder {
    loader: Option<Arc<dyn Loader>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the loader that resolves constructor and function references.
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Sets a loader shared with other builders.
    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Builds a registry from `config`.
    ///
    /// # Errors
    /// - [`WiringError::Config`] — no loader, malformed config or declaration,
    ///   unknown reference, missing method
    /// - [`WiringError::Loader`] — a reference could not be loaded
    /// - [`WiringError::ConstructionFailed`] — a constructor or call failed
    /// - [`WiringError::CyclicDependency`] — services reference each other
    /// - [`WiringError::Initialization`] — an initializer failed
    #[instrument(skip_all, name = "container_build")]
    pub async fn build(&self, config: Value) -> Result<Registry> {
        let loader = self.loader.as_deref().ok_or_else(|| {
            ConfigError::new("a service loader is required; call .loader() before .build()")
        })?;

        let config = ContainerConfig::from_value(config)?;
        info!(
            parameters = config.parameters.len(),
            services = config.services.len(),
            "Building container"
        );

        let registry = Registry::new();
        registry.set_parameters(config.parameters.clone());

        let config = config.substitute_parameters()?;
        let declarations = Declarations::from_records(&config.services)?;

        let loaded = Instantiator::new(loader, &registry, &declarations).instantiate_all()?;

        let mut graph = InitializationGraph::new();
        for declaration in &declarations.to_initialize {
            graph.add_declaration(Arc::clone(declaration));
        }
        let order = graph.sorted()?;

        initialize(&registry, &order, &loaded).await?;

        info!(services = registry.len(), "Container built successfully ✓");
        Ok(registry)
    }

    /// Builds on a current-thread runtime, blocking until done.
    ///
    /// # Panics
    /// Panics if called from within an async runtime.
    #[cfg(feature = "blocking")]
    pub fn build_blocking(&self, config: Value) -> Result<Registry> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WiringError::Runtime)?;
        runtime.block_on(self.build(config))
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Declarations
// ═══════════════════════════════════════════

/// Every declaration of one build, indexed by id.
struct Declarations {
    ordered: Vec<Arc<ServiceDeclaration>>,
    by_id: HashMap<String, Arc<ServiceDeclaration>>,
    to_initialize: Vec<Arc<ServiceDeclaration>>,
}

impl Declarations {
    fn from_records(records: &[Value]) -> std::result::Result<Self, ConfigError> {
        let mut declarations = Self {
            ordered: Vec::with_capacity(records.len()),
            by_id: HashMap::with_capacity(records.len()),
            to_initialize: Vec::new(),
        };

        for record in records {
            let declaration = Arc::new(ServiceDeclaration::new(record)?);
            let id = declaration.id().to_string();

            if id == SERVICE_CONTAINER_ID {
                return Err(ConfigError::new(format!("\"{SERVICE_CONTAINER_ID}\" is reserved for the container"))
                    .for_service(id));
            }
            if declarations.by_id.contains_key(&id) {
                return Err(ConfigError::new("service id is declared more than once").for_service(id));
            }

            debug!(
                id = %id,
                reference = declaration.constructor(),
                function = declaration.is_function(),
                "Declared service"
            );

            if declaration.has_initialization() {
                declarations.to_initialize.push(Arc::clone(&declaration));
            }
            declarations.by_id.insert(id, Arc::clone(&declaration));
            declarations.ordered.push(declaration);
        }

        Ok(declarations)
    }

    fn suggestions_for(&self, id: &str) -> Vec<String> {
        let mut known: Vec<&str> = self.ordered.iter().map(|d| d.id()).collect();
        known.push(SERVICE_CONTAINER_ID);
        suggest_similar(id, &known, 3)
    }
}

// ═══════════════════════════════════════════
// Instantiation
// ═══════════════════════════════════════════

/// Instantiates services on demand, each exactly once.
///
/// A service referenced as an argument is instantiated at first use, so
/// instantiation follows first-reference order rather than declaration
/// order.
struct Instantiator<'a> {
    loader: &'a dyn Loader,
    registry: &'a Registry,
    declarations: &'a Declarations,
    loaded: HashMap<String, ServiceRef>,
    /// Ids currently being instantiated, outermost first.
    in_progress: Vec<String>,
}

impl<'a> Instantiator<'a> {
    fn new(loader: &'a dyn Loader, registry: &'a Registry, declarations: &'a Declarations) -> Self {
        Self {
            loader,
            registry,
            declarations,
            loaded: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    fn instantiate_all(mut self) -> Result<HashMap<String, ServiceRef>> {
        let handle = self.registry.register_self();
        self.loaded.insert(SERVICE_CONTAINER_ID.to_string(), handle);

        let declarations = self.declarations;
        for declaration in &declarations.ordered {
            if !self.loaded.contains_key(declaration.id()) {
                self.instantiate(declaration)?;
            }
        }

        Ok(self.loaded)
    }

    fn get_or_instantiate(&mut self, id: &str, required_by: &str) -> Result<ServiceRef> {
        if let Some(service) = self.loaded.get(id) {
            return Ok(Arc::clone(service));
        }

        let declarations = self.declarations;
        let declaration = declarations.by_id.get(id).ok_or_else(|| {
            ConfigError::new(format!("reference to unknown service \"{id}\""))
                .for_service(required_by)
                .with_suggestions(declarations.suggestions_for(id))
        })?;

        self.instantiate(declaration)
    }

    fn instantiate(&mut self, declaration: &'a ServiceDeclaration) -> Result<ServiceRef> {
        let id = declaration.id();

        if let Some(pos) = self.in_progress.iter().position(|p| p == id) {
            let mut chain = self.in_progress[pos..].to_vec();
            chain.push(id.to_string());
            return Err(CyclicDependencyError { chain }.into());
        }
        self.in_progress.push(id.to_string());

        trace!(id, reference = declaration.constructor(), "Loading");
        let loadable = self.loader.load(declaration.constructor())?;
        let args = self.resolve_arguments(id, declaration.arguments())?;

        let service = match (declaration.reference(), loadable) {
            (ServiceReference::Function(_), Loadable::Value(function)) => function,
            (ServiceReference::Function(name), Loadable::Constructor(_)) => {
                return Err(ConfigError::new(format!(
                    "\"{name}\" resolves to a constructor, but the service is declared as a function"
                ))
                .for_service(id)
                .into());
            }
            (ServiceReference::Constructor(_), Loadable::Constructor(construct)) => {
                construct(args).map_err(|source| WiringError::ConstructionFailed {
                    id: id.to_string(),
                    source,
                })?
            }
            (ServiceReference::Constructor(name), Loadable::Value(value)) => {
                trace!(id, reference = %name, "Reference is a ready-made value, using it as-is");
                value
            }
        };

        for call in declaration.calls() {
            let call_args = self.resolve_arguments(id, &call.arguments)?;
            trace!(id, method = %call.method, "Calling method");

            match service.invoke(&call.method, call_args) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    return Err(WiringError::ConstructionFailed {
                        id: id.to_string(),
                        source: format!("call to {}() failed: {e}", call.method).into(),
                    });
                }
                None => {
                    return Err(ConfigError::new(format!("service has no method \"{}\"", call.method))
                        .for_service(id)
                        .into());
                }
            }
        }

        for tag in declaration.tags() {
            self.registry
                .add_tag(tag.name.as_str(), Tag::new(id, tag.config.clone())?)?;
        }

        if let Some(scope) = declaration.scope() {
            debug!(id, scope = %scope, "Applied scope");
            self.registry.set_scope(id, scope.clone());
        }

        self.registry.set(id, Arc::clone(&service))?;
        self.registry
            .set_declaration(Arc::clone(&self.declarations.by_id[id]));
        self.loaded.insert(id.to_string(), Arc::clone(&service));
        self.in_progress.pop();

        debug!(id, "Instantiated service");
        Ok(service)
    }

    fn resolve_arguments(&mut self, owner: &str, specs: &[ArgumentSpec]) -> Result<Vec<Argument>> {
        specs
            .iter()
            .map(|spec| match spec {
                ArgumentSpec::Literal(value) => Ok(Argument::Value(value.clone())),
                ArgumentSpec::Reference(id) => {
                    trace!(owner, dependency = %id, "Resolving reference");
                    self.get_or_instantiate(id, owner).map(Argument::Service)
                }
            })
            .collect()
    }
}

// ═══════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════

/// Runs initializers one at a time, in `order`.
///
/// The first failure aborts the walk.
#[instrument(skip_all, fields(count = order.len()), name = "initialize_services")]
async fn initialize(
    registry: &Registry,
    order: &[Arc<ServiceDeclaration>],
    loaded: &HashMap<String, ServiceRef>,
) -> Result<()> {
    if order.is_empty() {
        return Ok(());
    }

    debug!(plan = %render_plan(&plan_entries(registry, order)), "Initialization plan");

    for declaration in order {
        let id = declaration.id();
        let Some(init) = declaration.initialization() else {
            continue;
        };

        let method = init.method.as_deref().ok_or_else(|| {
            ConfigError::new("\"initialization\" requires a \"method\"").for_service(id)
        })?;

        let service = loaded.get(id).ok_or_else(|| {
            ConfigError::new("service was not instantiated").for_service(id)
        })?;

        debug!(id, method, is_async = init.has_callback, "Initializing service");

        let outcome = if init.has_callback {
            service.invoke_async(method).await
        } else {
            service.invoke(method, Vec::new())
        };

        match outcome {
            Some(Ok(())) => {}
            Some(Err(source)) => {
                return Err(InitializationError {
                    service_id: id.to_string(),
                    method: method.to_string(),
                    source,
                }
                .into());
            }
            None => {
                return Err(ConfigError::new(format!("service has no initialization method \"{method}\""))
                    .for_service(id)
                    .into());
            }
        }
    }

    Ok(())
}

fn plan_entries(registry: &Registry, order: &[Arc<ServiceDeclaration>]) -> Vec<PlanEntry> {
    order
        .iter()
        .map(|declaration| {
            let init = declaration.initialization();
            PlanEntry {
                service_id: declaration.id().to_string(),
                scope: registry.scope(declaration.id()).to_string(),
                method: init.and_then(|i| i.method.clone()),
                is_async: init.is_some_and(|i| i.has_callback),
            }
        })
        .collect()
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::ContainerBuilder;
    pub use crate::config::ContainerConfig;
    pub use crate::declaration::ServiceDeclaration;
    pub use crate::error::{BoxError, Result, WiringError};
    pub use crate::loader::{Loadable, Loader, LoaderEntry, ServiceLoader};
    pub use crate::registry::{ContainerHandle, Registry, SERVICE_CONTAINER_ID};
    pub use crate::scope::Scope;
    pub use crate::service::{Argument, DataService, FunctionService, Service, ServiceRef};
    pub use crate::tag::Tag;
}

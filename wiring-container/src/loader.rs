//! Loaders map a constructor or function reference to a loadable value.
//!
//! The builder depends only on the [`Loader`] trait. [`ServiceLoader`] is
//! the stock implementation: it probes a list of base locations, then the
//! bare reference, then the process-wide entries submitted with
//! [`inventory::submit!`].
//!
//! # Examples
//! ```rust
//! use serde_json::{json, Value};
//! use wiring_container::loader::{Loadable, Loader, ServiceLoader};
//! use wiring_container::service::{DataService, FunctionService};
//!
//! let loader = ServiceLoader::new(["app/services"])
//!     .function("app/services/greet", |args: &[Value]| {
//!         Ok(json!(format!("hello {}", args[0])))
//!     })
//!     .value("settings", DataService::new(json!({"debug": true})).unwrap());
//!
//! assert!(matches!(loader.load("greet"), Ok(Loadable::Value(_))));
//! assert!(matches!(loader.load("settings"), Ok(Loadable::Value(_))));
//! assert!(loader.load("missing").is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

use wiring_support::rendering::suggest_similar;

use crate::error::{BoxError, LoaderError};
use crate::service::{Argument, FunctionService, Service, ServiceRef};

/// Constructs a service from its resolved positional arguments.
///
/// # Why `Arc` and not `Box`?
/// A loaded constructor may be handed out for several declarations, and
/// [`Loadable`] is cloned out of the loader's catalog.
pub type ConstructorFn =
    Arc<dyn Fn(Vec<Argument>) -> Result<ServiceRef, BoxError> + Send + Sync>;

/// What a reference resolves to.
#[derive(Clone)]
pub enum Loadable {
    /// Invoked with the resolved arguments to build a new instance.
    Constructor(ConstructorFn),
    /// Used verbatim as the service (plain functions, ready-made values).
    Value(ServiceRef),
}

impl Loadable {
    /// Wraps a typed constructor.
    pub fn constructor<T: Service>(
        construct: impl Fn(Vec<Argument>) -> Result<T, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Loadable::Constructor(Arc::new(
            move |args: Vec<Argument>| -> Result<ServiceRef, BoxError> {
                Ok(Arc::new(construct(args)?))
            },
        ))
    }

    /// Wraps a plain function.
    pub fn function(
        function: impl Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Loadable::Value(Arc::new(FunctionService::new(function)))
    }

    /// Wraps a ready-made value.
    pub fn value(service: impl Service) -> Self {
        Loadable::Value(Arc::new(service))
    }
}

impl fmt::Debug for Loadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loadable::Constructor(_) => f.write_str("Constructor(..)"),
            Loadable::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// Resolves a reference to something constructible or callable.
pub trait Loader: Send + Sync {
    /// # Errors
    /// Returns [`LoaderError`] if no location yields a match.
    fn load(&self, reference: &str) -> Result<Loadable, LoaderError>;
}

/// A process-wide loader entry, collected at link time.
///
/// ```rust,ignore
/// fn make_clock() -> Loadable {
///     Loadable::constructor(|_| Ok(Clock::default()))
/// }
///
/// inventory::submit! {
///     LoaderEntry::new("clock", make_clock)
/// }
/// ```
pub struct LoaderEntry {
    pub reference: &'static str,
    pub load: fn() -> Loadable,
}

impl LoaderEntry {
    pub const fn new(reference: &'static str, load: fn() -> Loadable) -> Self {
        Self { reference, load }
    }
}

inventory::collect!(LoaderEntry);

/// The default [`Loader`].
///
/// Probe order for `load("mailer")` with paths `["app", "vendor"]`:
/// 1. `app/mailer`
/// 2. `vendor/mailer`
/// 3. `mailer`
/// 4. a [`LoaderEntry`] submitted for `mailer`
#[derive(Default)]
pub struct ServiceLoader {
    paths: Vec<String>,
    catalog: DashMap<String, Loadable>,
}

impl ServiceLoader {
    /// Creates a loader probing `paths` in order.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            catalog: DashMap::new(),
        }
    }

    /// Makes `loadable` available at `location`.
    ///
    /// Replaces any previous entry at the same location.
    pub fn register(&self, location: impl Into<String>, loadable: Loadable) {
        let location = location.into();
        trace!(location = %location, "Registered loadable");
        self.catalog.insert(location, loadable);
    }

    /// Registers a typed constructor at `location`.
    pub fn constructor<T: Service>(
        self,
        location: impl Into<String>,
        construct: impl Fn(Vec<Argument>) -> Result<T, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.register(location, Loadable::constructor(construct));
        self
    }

    /// Registers a plain function at `location`.
    pub fn function(
        self,
        location: impl Into<String>,
        function: impl Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.register(location, Loadable::function(function));
        self
    }

    /// Registers a ready-made value at `location`.
    pub fn value(self, location: impl Into<String>, service: impl Service) -> Self {
        self.register(location, Loadable::value(service));
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    fn candidates(&self, reference: &str) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .paths
            .iter()
            .map(|base| format!("{}/{reference}", base.trim_end_matches('/')))
            .collect();
        candidates.push(reference.to_string());
        candidates
    }

    fn known_references(&self) -> Vec<String> {
        let mut known: Vec<String> = self.catalog.iter().map(|e| e.key().clone()).collect();
        known.extend(inventory::iter::<LoaderEntry>.into_iter().map(|e| e.reference.to_string()));
        known.sort();
        known
    }
}

impl Loader for ServiceLoader {
    fn load(&self, reference: &str) -> Result<Loadable, LoaderError> {
        let candidates = self.candidates(reference);

        for location in &candidates {
            trace!(reference, location = %location, "Probing location");
            if let Some(entry) = self.catalog.get(location) {
                return Ok(entry.value().clone());
            }
        }

        if let Some(entry) = inventory::iter::<LoaderEntry>
            .into_iter()
            .find(|e| e.reference == reference)
        {
            trace!(reference, "Resolved from submitted loader entries");
            return Ok((entry.load)());
        }

        let known = self.known_references();
        let known: Vec<&str> = known.iter().map(String::as_str).collect();

        Err(LoaderError {
            reference: reference.to_string(),
            suggestions: suggest_similar(reference, &known, 3),
            tried: candidates,
        })
    }
}

impl fmt::Debug for ServiceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLoader")
            .field("paths", &self.paths)
            .field("registered", &self.catalog.len())
            .finish()
    }
}

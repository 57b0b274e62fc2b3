//! The service capability model.
//!
//! Everything stored in a [`Registry`](crate::registry::Registry) is a
//! [`Service`]: a type-erased, thread-safe value that may expose named
//! methods for post-construction calls and initialization.
//!
//! Method dispatch is by name at call time. A service answers `None` for a
//! method it does not have, and the builder reports that as a
//! [`ConfigError`](crate::error::ConfigError).
//!
//! # Examples
//! ```rust
//! use wiring_container::service::{Argument, Service};
//! use wiring_container::error::BoxError;
//! use parking_lot::Mutex;
//!
//! struct Mailer {
//!     transport: Mutex<Option<String>>,
//! }
//!
//! impl Service for Mailer {
//!     fn invoke(&self, method: &str, args: Vec<Argument>) -> Option<Result<(), BoxError>> {
//!         match method {
//!             "setTransport" => Some(args[0].parse().map(|t| {
//!                 *self.transport.lock() = Some(t);
//!             })),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BoxError, ValidationError};

/// Shared handle to a type-erased service.
pub type ServiceRef = Arc<dyn Service>;

/// Type-erasure helpers, implemented for every `Send + Sync + 'static` type.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A value that can live in the service namespace.
///
/// Both methods are capability lookups: return `None` when the service
/// has no method with that name. Services mutate themselves through
/// interior mutability since they are shared behind an [`Arc`].
#[async_trait]
pub trait Service: AsAny {
    /// Invokes a named method synchronously.
    ///
    /// Used for declared calls and for initializers without a completion
    /// signal (initializers receive no arguments).
    fn invoke(&self, method: &str, args: Vec<Argument>) -> Option<Result<(), BoxError>> {
        let _ = (method, args);
        None
    }

    /// Invokes a named initializer that completes asynchronously.
    ///
    /// The build does not advance to the next initializer until the
    /// returned future resolves. A future that never resolves stalls
    /// the build.
    async fn invoke_async(&self, method: &str) -> Option<Result<(), BoxError>> {
        let _ = method;
        None
    }
}

impl dyn Service {
    /// Borrows the concrete service, if it is a `T`.
    pub fn downcast_ref<T: Service>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Returns `true` if the concrete service is a `T`.
    pub fn is<T: Service>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }
}

impl fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Service")
    }
}

/// Downcasts a shared service to its concrete type.
pub fn downcast<T: Service>(service: &ServiceRef) -> Option<Arc<T>> {
    Arc::clone(service).into_any().downcast::<T>().ok()
}

/// A resolved constructor or call argument.
///
/// Literal specs arrive as [`Argument::Value`]; `"@id"` references
/// arrive as [`Argument::Service`] holding the referenced instance.
#[derive(Clone)]
pub enum Argument {
    Value(Value),
    Service(ServiceRef),
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(value) => Some(value),
            Argument::Service(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_service(&self) -> Option<&ServiceRef> {
        match self {
            Argument::Service(service) => Some(service),
            Argument::Value(_) => None,
        }
    }

    /// Returns the referenced service as a `T`.
    pub fn downcast<T: Service>(&self) -> Option<Arc<T>> {
        self.as_service().and_then(downcast::<T>)
    }

    /// Deserializes a literal argument into `T`.
    ///
    /// # Errors
    /// Fails for service references and for literals that do not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, BoxError> {
        match self {
            Argument::Value(value) => Ok(T::deserialize(value)?),
            Argument::Service(_) => Err("expected a literal argument, got a service reference".into()),
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Argument::Service(_) => f.write_str("Service(..)"),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<ServiceRef> for Argument {
    fn from(service: ServiceRef) -> Self {
        Argument::Service(service)
    }
}

type FunctionFn = dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync;

/// A plain function used as a service value.
///
/// Declarations marked as function bindings store the loaded function
/// itself; nothing is constructed.
///
/// ```rust
/// use serde_json::{json, Value};
/// use wiring_container::service::FunctionService;
///
/// let echo = FunctionService::new(|args: &[Value]| {
///     Ok(json!(format!("you passed in: {}", args[0].as_str().unwrap_or_default())))
/// });
/// assert_eq!(echo.call(&[json!("x")]).unwrap(), json!("you passed in: x"));
/// ```
pub struct FunctionService {
    function: Box<FunctionFn>,
}

impl FunctionService {
    pub fn new(
        function: impl Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            function: Box::new(function),
        }
    }

    /// Calls the function.
    pub fn call(&self, args: &[Value]) -> Result<Value, BoxError> {
        (self.function)(args)
    }
}

impl Service for FunctionService {}

impl fmt::Debug for FunctionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionService").finish_non_exhaustive()
    }
}

/// Structured data (a JSON object or array) stored as a service.
#[derive(Debug, Clone)]
pub struct DataService {
    value: Value,
}

impl DataService {
    /// Wraps structured data.
    ///
    /// # Errors
    /// Returns [`ValidationError`] for scalars and `null`: only services,
    /// not arbitrary data, occupy the service namespace.
    pub fn new(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(_) | Value::Array(_) => Ok(Self { value }),
            other => Err(ValidationError::new(format!(
                "a service must be an object, array or callable, got {other}"
            ))),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Looks up a top-level key of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }
}

impl Service for DataService {}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Counter {
        hits: Mutex<i64>,
    }

    impl Service for Counter {
        fn invoke(&self, method: &str, args: Vec<Argument>) -> Option<Result<(), BoxError>> {
            match method {
                "add" => Some(args[0].parse::<i64>().map(|n| *self.hits.lock() += n)),
                _ => None,
            }
        }
    }

    #[test]
    fn invoke_known_method() {
        let counter = Counter { hits: Mutex::new(0) };
        let result = counter.invoke("add", vec![Argument::Value(json!(3))]);
        assert!(matches!(result, Some(Ok(()))));
        assert_eq!(*counter.hits.lock(), 3);
    }

    #[test]
    fn invoke_unknown_method_is_none() {
        let counter = Counter { hits: Mutex::new(0) };
        assert!(counter.invoke("subtract", vec![]).is_none());
    }

    #[tokio::test]
    async fn invoke_async_defaults_to_none() {
        let counter = Counter { hits: Mutex::new(0) };
        assert!(counter.invoke_async("init").await.is_none());
    }

    #[test]
    fn downcast_shared_service() {
        let service: ServiceRef = Arc::new(Counter { hits: Mutex::new(7) });
        assert!(service.is::<Counter>());
        assert!(!service.is::<DataService>());

        let counter = downcast::<Counter>(&service).unwrap();
        assert_eq!(*counter.hits.lock(), 7);
        assert!(downcast::<FunctionService>(&service).is_none());

        let borrowed = service.downcast_ref::<Counter>().unwrap();
        assert_eq!(*borrowed.hits.lock(), 7);
        assert!(service.downcast_ref::<DataService>().is_none());
    }

    #[test]
    fn argument_accessors() {
        let literal = Argument::Value(json!("one"));
        assert_eq!(literal.as_str(), Some("one"));
        assert_eq!(literal.as_i64(), None);
        assert!(literal.as_service().is_none());

        assert_eq!(Argument::Value(json!(2)).as_i64(), Some(2));
        assert_eq!(Argument::Value(json!(2.5)).as_f64(), Some(2.5));
        assert_eq!(Argument::Value(json!(true)).as_bool(), Some(true));
        assert_eq!(Argument::Value(json!("true")).as_bool(), None);

        let service = Argument::Service(Arc::new(Counter { hits: Mutex::new(0) }));
        assert!(service.as_value().is_none());
        assert!(service.downcast::<Counter>().is_some());
        assert!(service.parse::<String>().is_err());
    }

    #[test]
    fn argument_parse_typed() {
        let arg = Argument::Value(json!({"host": "localhost", "port": 25}));

        #[derive(serde::Deserialize)]
        struct Smtp {
            host: String,
            port: u16,
        }

        let smtp: Smtp = arg.parse().unwrap();
        assert_eq!(smtp.host, "localhost");
        assert_eq!(smtp.port, 25);
    }

    #[test]
    fn function_service_is_callable() {
        let f = FunctionService::new(|args| {
            Ok(json!(format!("you passed in: {}", args[0].as_str().unwrap_or_default())))
        });
        assert_eq!(f.call(&[json!("x")]).unwrap(), json!("you passed in: x"));
    }

    #[test]
    fn data_service_rejects_scalars() {
        assert!(DataService::new(json!({"a": 1})).is_ok());
        assert!(DataService::new(json!([1, 2])).is_ok());
        assert!(DataService::new(json!(1)).is_err());
        assert!(DataService::new(json!("text")).is_err());
        assert!(DataService::new(Value::Null).is_err());
    }
}

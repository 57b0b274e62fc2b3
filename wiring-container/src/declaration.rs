//! Service declarations: the validated, read-only description of one service.
//!
//! A declaration is created from a raw JSON service record:
//!
//! ```json
//! {
//!   "id": "app.mailer",
//!   "constructor": "mailer",
//!   "arguments": ["%smtp.host%", "@app.logger"],
//!   "calls": [{"method": "setTransport", "arguments": ["smtp"]}],
//!   "tags": [{"name": "kernel.listener", "parameters": {"event": "boot"}}],
//!   "scope": "global",
//!   "initialization": {"method": "connect", "hasCallback": true}
//! }
//! ```
//!
//! A record binds a plain function instead of a constructor by naming it
//! under `"function"`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::scope::Scope;

/// An argument as written in configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSpec {
    /// A literal scalar or structure, passed through unchanged.
    Literal(Value),
    /// `"@id"`: resolve the service with this id.
    Reference(String),
}

impl ArgumentSpec {
    /// Classifies a raw argument. A spec is symbolic iff it is a string
    /// beginning with `@`; only that leading `@` is stripped.
    ///
    /// ```
    /// use serde_json::json;
    /// use wiring_container::declaration::ArgumentSpec;
    ///
    /// assert_eq!(ArgumentSpec::parse(json!("@db")), ArgumentSpec::Reference("db".into()));
    /// assert_eq!(ArgumentSpec::parse(json!("@@db")), ArgumentSpec::Reference("@db".into()));
    /// assert_eq!(ArgumentSpec::parse(json!("db@")), ArgumentSpec::Literal(json!("db@")));
    /// ```
    pub fn parse(raw: Value) -> Self {
        match raw {
            Value::String(s) if s.starts_with('@') => ArgumentSpec::Reference(s[1..].to_string()),
            other => ArgumentSpec::Literal(other),
        }
    }

    /// The referenced service id, for symbolic specs.
    pub fn reference(&self) -> Option<&str> {
        match self {
            ArgumentSpec::Reference(id) => Some(id),
            ArgumentSpec::Literal(_) => None,
        }
    }
}

/// A method invoked on the instance right after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Vec<ArgumentSpec>,
}

/// A tag declared on a service: its name plus the raw tag record.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDeclaration {
    pub name: String,
    pub config: Value,
}

/// How a service is initialized after every service is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationDescriptor {
    /// The method to invoke. An empty descriptor (`{}`) still marks the
    /// service as initializing; the missing method is reported when the
    /// initializer runs.
    #[serde(default)]
    pub method: Option<String>,
    /// `true` if the method completes asynchronously.
    #[serde(default)]
    pub has_callback: bool,
}

/// What a declaration's reference names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReference {
    /// A constructor invoked with the resolved arguments.
    Constructor(String),
    /// A plain function used verbatim as the service.
    Function(String),
}

impl ServiceReference {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceReference::Constructor(name) | ServiceReference::Function(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct RawCall {
    method: String,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
}

/// The immutable description of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDeclaration {
    id: String,
    reference: ServiceReference,
    arguments: Option<Vec<ArgumentSpec>>,
    calls: Option<Vec<MethodCall>>,
    tags: Option<Vec<TagDeclaration>>,
    scope: Option<Scope>,
    initialization: Option<InitializationDescriptor>,
}

impl ServiceDeclaration {
    /// Validates a raw service record.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the record is absent or not an object, if
    /// `id` is missing, not a string or empty, if neither `constructor` nor
    /// `function` is a non-empty string, or if an optional field is malformed.
    pub fn new(record: &Value) -> Result<Self, ConfigError> {
        let fields = match record {
            Value::Null => return Err(ConfigError::new("service declaration requires a config object")),
            Value::Object(fields) => fields,
            other => {
                return Err(ConfigError::new(format!(
                    "service declaration must be an object, got {other}"
                )));
            }
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(ConfigError::new("service declaration must have an \"id\" property")),
        };

        let reference = match (non_empty_str(fields.get("constructor")), non_empty_str(fields.get("function"))) {
            (Some(constructor), None) => ServiceReference::Constructor(constructor.to_string()),
            (None, Some(function)) => ServiceReference::Function(function.to_string()),
            (Some(_), Some(_)) => {
                return Err(ConfigError::new("declare either \"constructor\" or \"function\", not both")
                    .for_service(id));
            }
            (None, None) => {
                return Err(ConfigError::new("service declaration must have a \"constructor\" property")
                    .for_service(id));
            }
        };

        let arguments = optional(fields.get("arguments"))
            .map(|raw| parse_arguments(raw, "arguments"))
            .transpose()
            .map_err(|e| e.for_service(id.clone()))?;

        let calls = optional(fields.get("calls"))
            .map(parse_calls)
            .transpose()
            .map_err(|e| e.for_service(id.clone()))?;

        let tags = optional(fields.get("tags"))
            .map(parse_tags)
            .transpose()
            .map_err(|e| e.for_service(id.clone()))?;

        let scope = match optional(fields.get("scope")) {
            None => None,
            Some(Value::String(scope)) => Some(Scope::from(scope.as_str())),
            Some(other) => {
                return Err(ConfigError::new(format!("\"scope\" must be a string, got {other}"))
                    .for_service(id));
            }
        };

        let initialization = optional(fields.get("initialization"))
            .map(|raw| {
                InitializationDescriptor::deserialize(raw)
                    .map_err(|e| ConfigError::new(format!("invalid \"initialization\": {e}")))
            })
            .transpose()
            .map_err(|e| e.for_service(id.clone()))?;

        Ok(Self {
            id,
            reference,
            arguments,
            calls,
            tags,
            scope,
            initialization,
        })
    }

    /// The service id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    /// The constructor or function name, as written.
    pub fn constructor(&self) -> &str {
        self.reference.as_str()
    }

    /// `true` if the declaration binds a plain function.
    pub fn is_function(&self) -> bool {
        matches!(self.reference, ServiceReference::Function(_))
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        self.arguments.as_deref().unwrap_or_default()
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments().is_empty()
    }

    pub fn calls(&self) -> &[MethodCall] {
        self.calls.as_deref().unwrap_or_default()
    }

    pub fn has_calls(&self) -> bool {
        !self.calls().is_empty()
    }

    pub fn tags(&self) -> &[TagDeclaration] {
        self.tags.as_deref().unwrap_or_default()
    }

    pub fn has_tags(&self) -> bool {
        !self.tags().is_empty()
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn initialization(&self) -> Option<&InitializationDescriptor> {
        self.initialization.as_ref()
    }

    pub fn has_initialization(&self) -> bool {
        self.initialization.is_some()
    }

    /// Every symbolic reference: arguments first, then call arguments,
    /// each in declaration order. Duplicates are kept.
    pub fn dependency_ids(&self) -> Vec<&str> {
        self.arguments()
            .iter()
            .chain(self.calls().iter().flat_map(|call| call.arguments.iter()))
            .filter_map(ArgumentSpec::reference)
            .collect()
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Treats an explicit `null` like a missing field.
fn optional(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn parse_arguments(raw: &Value, field: &str) -> Result<Vec<ArgumentSpec>, ConfigError> {
    match raw {
        Value::Array(items) => Ok(items.iter().cloned().map(ArgumentSpec::parse).collect()),
        other => Err(ConfigError::new(format!("\"{field}\" must be an array, got {other}"))),
    }
}

fn parse_calls(raw: &Value) -> Result<Vec<MethodCall>, ConfigError> {
    let calls = Vec::<RawCall>::deserialize(raw)
        .map_err(|e| ConfigError::new(format!("invalid \"calls\": {e}")))?;

    Ok(calls
        .into_iter()
        .map(|call| MethodCall {
            method: call.method,
            arguments: call
                .arguments
                .unwrap_or_default()
                .into_iter()
                .map(ArgumentSpec::parse)
                .collect(),
        })
        .collect())
}

fn parse_tags(raw: &Value) -> Result<Vec<TagDeclaration>, ConfigError> {
    let Value::Array(items) = raw else {
        return Err(ConfigError::new(format!("\"tags\" must be an array, got {raw}")));
    };

    items
        .iter()
        .map(|tag| match tag.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => Ok(TagDeclaration {
                name: name.to_string(),
                config: tag.clone(),
            }),
            _ => Err(ConfigError::new(format!("tag must have a \"name\", got {tag}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_declaration() {
        let decl = ServiceDeclaration::new(&json!({"id": "svc", "constructor": "simple-service"})).unwrap();

        assert_eq!(decl.id(), "svc");
        assert_eq!(decl.constructor(), "simple-service");
        assert!(!decl.is_function());
        assert!(!decl.has_arguments());
        assert!(!decl.has_calls());
        assert!(!decl.has_tags());
        assert!(!decl.has_scope());
        assert!(!decl.has_initialization());
        assert!(decl.dependency_ids().is_empty());
    }

    #[test]
    fn missing_record_fails() {
        let err = ServiceDeclaration::new(&Value::Null).unwrap_err();
        assert!(err.message.contains("config object"));
    }

    #[test]
    fn missing_or_invalid_id_fails() {
        assert!(ServiceDeclaration::new(&json!({"constructor": "c"})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": "", "constructor": "c"})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": 5, "constructor": "c"})).is_err());
    }

    #[test]
    fn missing_or_invalid_constructor_fails() {
        let err = ServiceDeclaration::new(&json!({"id": "svc"})).unwrap_err();
        assert_eq!(err.service_id.as_deref(), Some("svc"));
        assert!(err.message.contains("constructor"));

        assert!(ServiceDeclaration::new(&json!({"id": "svc", "constructor": ""})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": "svc", "constructor": true})).is_err());
    }

    #[test]
    fn function_binding() {
        let decl = ServiceDeclaration::new(&json!({"id": "f", "function": "basic-function"})).unwrap();
        assert!(decl.is_function());
        assert_eq!(decl.constructor(), "basic-function");

        assert!(ServiceDeclaration::new(&json!({"id": "f", "function": "a", "constructor": "b"})).is_err());
    }

    #[test]
    fn empty_lists_are_not_present() {
        let decl = ServiceDeclaration::new(&json!({
            "id": "svc",
            "constructor": "c",
            "arguments": [],
            "calls": [],
            "tags": []
        }))
        .unwrap();

        assert!(!decl.has_arguments());
        assert!(!decl.has_calls());
        assert!(!decl.has_tags());
    }

    #[test]
    fn empty_initialization_is_present() {
        let decl = ServiceDeclaration::new(&json!({"id": "svc", "constructor": "c", "initialization": {}})).unwrap();

        assert!(decl.has_initialization());
        let init = decl.initialization().unwrap();
        assert_eq!(init.method, None);
        assert!(!init.has_callback);
    }

    #[test]
    fn initialization_descriptor() {
        let decl = ServiceDeclaration::new(&json!({
            "id": "svc",
            "constructor": "c",
            "initialization": {"method": "init", "hasCallback": true}
        }))
        .unwrap();

        let init = decl.initialization().unwrap();
        assert_eq!(init.method.as_deref(), Some("init"));
        assert!(init.has_callback);
    }

    #[test]
    fn scope_is_parsed() {
        let decl = ServiceDeclaration::new(&json!({"id": "svc", "constructor": "c", "scope": "request"})).unwrap();
        assert!(decl.has_scope());
        assert_eq!(decl.scope(), Some(&Scope::Request));

        assert!(ServiceDeclaration::new(&json!({"id": "svc", "constructor": "c", "scope": 3})).is_err());
    }

    #[test]
    fn malformed_optional_fields_fail() {
        assert!(ServiceDeclaration::new(&json!({"id": "s", "constructor": "c", "arguments": "x"})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": "s", "constructor": "c", "calls": [{"arguments": []}]})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": "s", "constructor": "c", "tags": [{"parameters": {}}]})).is_err());
        assert!(ServiceDeclaration::new(&json!({"id": "s", "constructor": "c", "initialization": "init"})).is_err());
    }

    #[test]
    fn dependency_ids_in_order() {
        let decl = ServiceDeclaration::new(&json!({
            "id": "svc",
            "constructor": "c",
            "arguments": ["@a", "literal", 3, "@b"],
            "calls": [
                {"method": "setC", "arguments": ["@c", "x@y"]},
                {"method": "noArgs"},
                {"method": "setA", "arguments": ["@a"]},
            ]
        }))
        .unwrap();

        assert_eq!(decl.dependency_ids(), vec!["a", "b", "c", "a"]);
        assert!(decl.has_calls());
        assert!(decl.calls()[1].arguments.is_empty());
    }

    #[test]
    fn tags_keep_raw_config() {
        let decl = ServiceDeclaration::new(&json!({
            "id": "svc",
            "constructor": "c",
            "tags": [{"name": "my.tag", "parameters": {"x": 1}}]
        }))
        .unwrap();

        assert!(decl.has_tags());
        assert_eq!(decl.tags()[0].name, "my.tag");
        assert_eq!(decl.tags()[0].config["parameters"]["x"], json!(1));
    }
}

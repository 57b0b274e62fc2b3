//! Tags mark services with a named capability for discovery.

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Associates a service id with the parameters of one declared tag.
///
/// The tag config is the raw tag record, e.g.
/// `{"name": "event.listener", "parameters": {"event": "boot"}}`.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use wiring_container::tag::Tag;
///
/// let tag = Tag::new("app.listener", json!({"name": "event.listener", "parameters": {"event": "boot"}})).unwrap();
/// assert_eq!(tag.service_id(), "app.listener");
/// assert_eq!(tag.parameter("event"), Some(&json!("boot")));
/// assert_eq!(tag.parameter("priority"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    service_id: String,
    config: Value,
}

impl Tag {
    /// Creates a tag for `service_id`.
    ///
    /// # Errors
    /// Returns [`ValidationError`] if the service id is empty or the
    /// config is absent (`null`).
    pub fn new(service_id: impl Into<String>, config: Value) -> Result<Self, ValidationError> {
        let service_id = service_id.into();

        if service_id.is_empty() {
            return Err(ValidationError::new("tag requires a valid service id"));
        }

        if config.is_null() {
            return Err(ValidationError::new(format!(
                "tag for service \"{service_id}\" requires a config object"
            )));
        }

        Ok(Self { service_id, config })
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The tag name from the config, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.config.get("name").and_then(Value::as_str)
    }

    /// All tag parameters, or `None` if the tag declares none.
    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.config.get("parameters").and_then(Value::as_object)
    }

    /// A single parameter. No defaults are synthesized.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters().and_then(|params| params.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_exposes_service_and_parameters() {
        let tag = Tag::new(
            "svc.a",
            json!({"name": "my.tag", "parameters": {"priority": 10}}),
        )
        .unwrap();

        assert_eq!(tag.service_id(), "svc.a");
        assert_eq!(tag.name(), Some("my.tag"));
        assert_eq!(tag.parameter("priority"), Some(&json!(10)));
        assert_eq!(tag.parameters().map(|p| p.len()), Some(1));
    }

    #[test]
    fn tag_without_parameters() {
        let tag = Tag::new("svc.a", json!({"name": "my.tag"})).unwrap();
        assert!(tag.parameters().is_none());
        assert!(tag.parameter("anything").is_none());
    }

    #[test]
    fn tag_accepts_empty_config() {
        assert!(Tag::new("svc.a", json!({})).is_ok());
    }

    #[test]
    fn tag_rejects_empty_service_id() {
        assert!(Tag::new("", json!({"name": "my.tag"})).is_err());
    }

    #[test]
    fn tag_rejects_missing_config() {
        let err = Tag::new("svc.a", Value::Null).unwrap_err();
        assert!(err.message.contains("config object"));
    }
}

//! The config envelope and `%parameter%` placeholder substitution.
//!
//! ```json
//! {
//!   "parameters": {"env": "prod"},
//!   "services": [
//!     {"id": "runner", "constructor": "runner", "arguments": ["run-%env%"]}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ConfigError;

/// Parameters plus raw service records.
///
/// Service records stay raw JSON; they are validated one by one when
/// declarations are created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub services: Vec<Value>,
}

impl ContainerConfig {
    /// Reads the envelope from a JSON value.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the config is absent (`null`), not an
    /// object, or has ill-typed `parameters` / `services`.
    pub fn from_value(config: Value) -> Result<Self, ConfigError> {
        match config {
            Value::Null => Err(ConfigError::new("a config object is required")),
            Value::Object(_) => Self::deserialize(config)
                .map_err(|e| ConfigError::new(format!("malformed config: {e}"))),
            other => Err(ConfigError::new(format!("config must be an object, got {other}"))),
        }
    }

    /// Replaces every `%name%` token with the string form of parameter `name`.
    ///
    /// The whole config is rendered to JSON text once. Each parameter, in
    /// enumeration order, replaces all of its tokens in a single pass; text
    /// produced by a replacement is only rescanned by later parameters.
    /// Parameters themselves are substituted too.
    ///
    /// String parameters are inserted as-is, other values as compact JSON.
    /// Replacements are JSON-escaped, since tokens can only occur inside
    /// JSON strings.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the substituted text no longer parses.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use wiring_container::config::ContainerConfig;
    ///
    /// let config = ContainerConfig::from_value(json!({
    ///     "parameters": {"env": "prod"},
    ///     "services": [{"id": "runner", "constructor": "runner", "arguments": ["run-%env%"]}]
    /// })).unwrap();
    ///
    /// let resolved = config.substitute_parameters().unwrap();
    /// assert_eq!(resolved.services[0]["arguments"][0], json!("run-prod"));
    /// ```
    pub fn substitute_parameters(&self) -> Result<Self, ConfigError> {
        let mut text = serde_json::to_string(self)
            .map_err(|e| ConfigError::new(format!("config is not serializable: {e}")))?;

        for (name, value) in &self.parameters {
            // names sit in the text JSON-escaped, like everything else
            let token = format!("%{}%", escape_for_json_string(name));
            if !text.contains(&token) {
                continue;
            }

            let replacement = escape_for_json_string(&parameter_text(value));
            trace!(parameter = %name, "Substituting placeholder");
            text = text.replace(&token, &replacement);
        }

        serde_json::from_str(&text).map_err(|e| {
            ConfigError::new(format!("placeholder substitution produced an invalid config: {e}"))
        })
    }
}

/// The string form of a parameter value.
fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escapes `raw` so it can sit between the quotes of a JSON string.
fn escape_for_json_string(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

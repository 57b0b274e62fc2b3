//! Service lifetime scopes.
//!
//! Scopes classify how long a service lives:
//! - [`Scope::Global`] — one instance for the lifetime of the built registry
//! - [`Scope::Request`] — a shorter, caller-managed lifetime
//! - [`Scope::Custom`] — any other scope string, tracked verbatim
//!
//! The builder only records scopes; enforcing them is left to the caller.
use std::fmt;

/// Defines the lifetime classification of a service.
///
/// # Examples
/// ```
/// use wiring_container::scope::Scope;
///
/// assert_eq!(Scope::default(), Scope::Global);
/// assert_eq!(Scope::from("request"), Scope::Request);
/// assert_eq!(Scope::from("session").to_string(), "session");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Singleton for the lifetime of the registry. The default.
    #[default]
    Global,

    /// One instance per request, managed by the caller.
    Request,

    /// Any other scope name.
    Custom(String),
}

impl Scope {
    /// Returns `true` if the service lives as long as the registry.
    #[inline]
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Returns the scope as it appears in configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Scope::Global => "global",
            Scope::Request => "request",
            Scope::Custom(name) => name,
        }
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        match name {
            "global" => Scope::Global,
            "request" => Scope::Request,
            other => Scope::Custom(other.to_string()),
        }
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Scope::from(name.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Error types for container building and registry operations.
//!
//! Every failure surfaces to the caller of
//! [`ContainerBuilder::build`](crate::builder::ContainerBuilder::build);
//! nothing is retried or recovered internally.

use std::fmt;

use wiring_support::rendering::render_chain;

/// Boxed error returned by user code: constructors, calls and initializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all wiring operations.
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    /// Malformed or missing configuration.
    #[error("{}", .0)]
    Config(ConfigError),

    /// Invalid value passed to a registry or tag mutator.
    #[error("{}", .0)]
    Validation(ValidationError),

    /// No location resolved a constructor or function reference.
    #[error("{}", .0)]
    Loader(LoaderError),

    /// The service graph contains a cycle.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// An initializer failed.
    #[error("{}", .0)]
    Initialization(InitializationError),

    /// A constructor or a post-construction call returned an error.
    #[error("Failed to construct service \"{id}\": {source}")]
    ConstructionFailed {
        id: String,
        #[source]
        source: BoxError,
    },

    /// The runtime for a blocking build could not be started.
    #[cfg(feature = "blocking")]
    #[error("Failed to start the build runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<ConfigError> for WiringError {
    fn from(err: ConfigError) -> Self {
        WiringError::Config(err)
    }
}

impl From<ValidationError> for WiringError {
    fn from(err: ValidationError) -> Self {
        WiringError::Validation(err)
    }
}

impl From<LoaderError> for WiringError {
    fn from(err: LoaderError) -> Self {
        WiringError::Loader(err)
    }
}

impl From<CyclicDependencyError> for WiringError {
    fn from(err: CyclicDependencyError) -> Self {
        WiringError::CyclicDependency(err)
    }
}

impl From<InitializationError> for WiringError {
    fn from(err: InitializationError) -> Self {
        WiringError::Initialization(err)
    }
}

/// Error for a malformed config or service declaration.
#[derive(Debug)]
pub struct ConfigError {
    /// What is wrong
    pub message: String,
    /// The declaration at fault (if known)
    pub service_id: Option<String>,
    /// Declared ids close to a mistyped reference
    pub suggestions: Vec<String>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            service_id: None,
            suggestions: Vec::new(),
        }
    }

    /// Attaches the offending service id.
    pub fn for_service(mut self, id: impl Into<String>) -> Self {
        self.service_id = Some(id.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service_id {
            Some(ref id) => write!(f, "Invalid configuration for service \"{id}\": {}", self.message)?,
            None => write!(f, "Invalid configuration: {}", self.message)?,
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when a registry or tag mutator receives an invalid value.
#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {}", self.message)
    }
}

/// Error when no location resolves a reference.
///
/// Lists every location probed, in order.
#[derive(Debug)]
pub struct LoaderError {
    /// The reference that was requested
    pub reference: String,
    /// Every location tried, in probe order
    pub tried: Vec<String>,
    /// Registered references close to the requested one
    pub suggestions: Vec<String>,
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not load \"{}\" from any of the available locations", self.reference)?;

        if !self.tried.is_empty() {
            write!(f, "\n  Tried:")?;
            for location in &self.tried {
                write!(f, "\n    - {location}")?;
            }
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Register it on the ServiceLoader or submit a LoaderEntry for it"
        )
    }
}

/// Error when the service graph contains a cycle.
///
/// Shows the chain of service ids so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CyclicDependencyError {
    /// The chain of ids that forms the cycle.
    /// Example: ["a", "b", "a"]
    pub chain: Vec<String>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cyclic dependency detected:\n  {}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: Move one of the references into a call on a service without an initializer"
        )
    }
}

/// Error when an initializer fails or reports failure on completion.
#[derive(Debug, thiserror::Error)]
#[error("Failed to initialize service \"{service_id}\" via {method}(): {source}")]
pub struct InitializationError {
    pub service_id: String,
    pub method: String,
    #[source]
    pub source: BoxError,
}

/// Convenient Result type for wiring operations.
pub type Result<T, E = WiringError> = std::result::Result<T, E>;

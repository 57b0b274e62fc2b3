//! Core container implementation for Wiring.

pub mod builder;
pub mod config;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod scope;
pub mod service;
pub mod tag;

pub use builder::{prelude, ContainerBuilder};
pub use error::{Result, WiringError};
pub use registry::Registry;
pub use scope::Scope;
